//! Wire events exchanged over the relay socket.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`. [`ClientEvent`] covers what a
//! client may send; [`ServerEvent`] covers what the relay delivers.
//! Payloads stay raw JSON in both directions.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::payload::Payload;
use super::{Identity, ParticipantId, Role};

/// Close code the relay sends to a connection replaced by a newer one for
/// the same participant. Clients must not reconnect after it.
pub const CLOSE_REPLACED: u16 = 4001;

/// Client → relay events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind this connection to a doctor and join `doctors` + `doctor_<id>`.
    JoinDoctorRoom(ParticipantId),
    /// Bind this connection to a patient and join `patients` + `patient_<id>`.
    JoinPatientRoom(ParticipantId),
    /// A patient entered the waiting queue.
    PatientJoinedQueue(Payload),
    /// A doctor went available, on break or busy.
    DoctorStatusChanged(Payload),
    /// A doctor started seeing a patient.
    ConsultationStarted(Payload),
    /// A doctor finished seeing a patient.
    ConsultationEnded(Payload),
    /// A doctor reshuffled the queue.
    UpdateQueuePosition(Payload),
    /// A doctor issued a prescription.
    PrescriptionCreated(Payload),
    /// An appointment was booked.
    AppointmentCreated(Payload),
    /// Direct notification to one doctor or patient.
    SendNotification(Payload),
    /// Legacy ticket announcement.
    NewTicket(Payload),
}

impl ClientEvent {
    /// Join event announcing `identity` to the relay.
    #[must_use]
    pub fn join(identity: &Identity) -> Self {
        let id = identity.participant_id.clone();
        match identity.role {
            Role::Doctor => Self::JoinDoctorRoom(id),
            Role::Patient => Self::JoinPatientRoom(id),
        }
    }

    /// Returns the wire event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinDoctorRoom(_) => "join_doctor_room",
            Self::JoinPatientRoom(_) => "join_patient_room",
            Self::PatientJoinedQueue(_) => "patient_joined_queue",
            Self::DoctorStatusChanged(_) => "doctor_status_changed",
            Self::ConsultationStarted(_) => "consultation_started",
            Self::ConsultationEnded(_) => "consultation_ended",
            Self::UpdateQueuePosition(_) => "update_queue_position",
            Self::PrescriptionCreated(_) => "prescription_created",
            Self::AppointmentCreated(_) => "appointment_created",
            Self::SendNotification(_) => "send_notification",
            Self::NewTicket(_) => "new_ticket",
        }
    }
}

/// Relay → client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Something about the waiting queue changed (doctors).
    QueueUpdated(Payload),
    /// A doctor's availability changed (patients).
    DoctorAvailabilityChanged(Payload),
    /// A colleague's status changed (doctors).
    DoctorStatusUpdate(Payload),
    /// The patient's consultation has started.
    ConsultationStarted(Payload),
    /// The patient's consultation has ended.
    ConsultationEnded(Payload),
    /// The patient's own queue slot.
    QueuePositionUpdated(Payload),
    /// A prescription addressed to the patient.
    PrescriptionReceived(Payload),
    /// A booking addressed to the doctor.
    NewAppointment(Payload),
    /// A booking confirmation addressed to the patient.
    AppointmentConfirmed(Payload),
    /// Direct notification.
    Notification(Payload),
    /// Legacy ticket announcement (doctors).
    NewPatient(Payload),
}

impl ServerEvent {
    /// Returns the discriminator used for subscriptions.
    #[must_use]
    pub const fn kind(&self) -> ServerEventKind {
        match self {
            Self::QueueUpdated(_) => ServerEventKind::QueueUpdated,
            Self::DoctorAvailabilityChanged(_) => ServerEventKind::DoctorAvailabilityChanged,
            Self::DoctorStatusUpdate(_) => ServerEventKind::DoctorStatusUpdate,
            Self::ConsultationStarted(_) => ServerEventKind::ConsultationStarted,
            Self::ConsultationEnded(_) => ServerEventKind::ConsultationEnded,
            Self::QueuePositionUpdated(_) => ServerEventKind::QueuePositionUpdated,
            Self::PrescriptionReceived(_) => ServerEventKind::PrescriptionReceived,
            Self::NewAppointment(_) => ServerEventKind::NewAppointment,
            Self::AppointmentConfirmed(_) => ServerEventKind::AppointmentConfirmed,
            Self::Notification(_) => ServerEventKind::Notification,
            Self::NewPatient(_) => ServerEventKind::NewPatient,
        }
    }

    /// Returns the wire event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns the payload as delivered.
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        match self {
            Self::QueueUpdated(p)
            | Self::DoctorAvailabilityChanged(p)
            | Self::DoctorStatusUpdate(p)
            | Self::ConsultationStarted(p)
            | Self::ConsultationEnded(p)
            | Self::QueuePositionUpdated(p)
            | Self::PrescriptionReceived(p)
            | Self::NewAppointment(p)
            | Self::AppointmentConfirmed(p)
            | Self::Notification(p)
            | Self::NewPatient(p) => p,
        }
    }

    /// Decodes the payload into a typed view such as
    /// [`super::payload::Notification`].
    ///
    /// # Errors
    ///
    /// Returns the serde error if the payload does not fit `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.payload())
    }
}

/// Payload-free discriminator of [`ServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServerEventKind {
    /// `queue_updated`
    QueueUpdated,
    /// `doctor_availability_changed`
    DoctorAvailabilityChanged,
    /// `doctor_status_update`
    DoctorStatusUpdate,
    /// `consultation_started`
    ConsultationStarted,
    /// `consultation_ended`
    ConsultationEnded,
    /// `queue_position_updated`
    QueuePositionUpdated,
    /// `prescription_received`
    PrescriptionReceived,
    /// `new_appointment`
    NewAppointment,
    /// `appointment_confirmed`
    AppointmentConfirmed,
    /// `notification`
    Notification,
    /// `new_patient`
    NewPatient,
}

impl ServerEventKind {
    /// Every server event kind.
    pub const ALL: [Self; 11] = [
        Self::QueueUpdated,
        Self::DoctorAvailabilityChanged,
        Self::DoctorStatusUpdate,
        Self::ConsultationStarted,
        Self::ConsultationEnded,
        Self::QueuePositionUpdated,
        Self::PrescriptionReceived,
        Self::NewAppointment,
        Self::AppointmentConfirmed,
        Self::Notification,
        Self::NewPatient,
    ];

    /// Returns the wire event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueueUpdated => "queue_updated",
            Self::DoctorAvailabilityChanged => "doctor_availability_changed",
            Self::DoctorStatusUpdate => "doctor_status_update",
            Self::ConsultationStarted => "consultation_started",
            Self::ConsultationEnded => "consultation_ended",
            Self::QueuePositionUpdated => "queue_position_updated",
            Self::PrescriptionReceived => "prescription_received",
            Self::NewAppointment => "new_appointment",
            Self::AppointmentConfirmed => "appointment_confirmed",
            Self::Notification => "notification",
            Self::NewPatient => "new_patient",
        }
    }
}

impl fmt::Display for ServerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
