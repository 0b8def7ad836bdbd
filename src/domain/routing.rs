//! The relay's routing table.
//!
//! Maps each [`ClientEvent`] to the room membership change it requests or to
//! the list of `(room, event)` deliveries it fans out to. Pure: no registry
//! access, no I/O.
//!
//! | Source                  | Rooms                                  | Delivered as                               |
//! |-------------------------|----------------------------------------|--------------------------------------------|
//! | `join_doctor_room`      | —                                      | joins `doctors`, `doctor_<id>`             |
//! | `join_patient_room`     | —                                      | joins `patients`, `patient_<id>`           |
//! | `patient_joined_queue`  | `doctors`                              | `queue_updated`                            |
//! | `doctor_status_changed` | `patients`, `doctors`                  | `doctor_availability_changed`, `doctor_status_update` |
//! | `consultation_started`  | `patient_<id>`, `doctors`              | `consultation_started`, `queue_updated`    |
//! | `consultation_ended`    | `patient_<id>`, `doctors`              | `consultation_ended`, `queue_updated`      |
//! | `update_queue_position` | `patient_<id>` per entry, `doctors`    | `queue_position_updated`, `queue_updated`  |
//! | `prescription_created`  | `patient_<id>`                         | `prescription_received`                    |
//! | `appointment_created`   | `doctor_<id>`, `patient_<id>`          | `new_appointment`, `appointment_confirmed` |
//! | `send_notification`     | `doctor_<id>`, else `patient_<id>`     | `notification`                             |
//! | `new_ticket`            | `doctors`                              | `new_patient`                              |

use super::payload::{self, Payload};
use super::{ClientEvent, Identity, ParticipantId, Role, RoomName, ServerEvent};

/// A single delivery: send `event` to every member of `room`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Target room.
    pub room: RoomName,
    /// Event as the members will receive it.
    pub event: ServerEvent,
}

impl Delivery {
    fn new(room: RoomName, event: ServerEvent) -> Self {
        Self { room, event }
    }
}

/// Outcome of routing one client event.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Bind the sending connection to this identity.
    Bind(Identity),
    /// Fan out to these rooms, in order. May be empty.
    Deliver(Vec<Delivery>),
    /// Nothing routable in the event.
    Reject(&'static str),
}

/// Routes one client event according to the table above.
///
/// Payloads are delivered exactly as received; only `queue_position_updated`
/// carries a per-patient slice. Targets whose routing id is missing or blank
/// are skipped; the remaining targets are still delivered.
#[must_use]
pub fn route(event: ClientEvent) -> Route {
    match event {
        ClientEvent::JoinDoctorRoom(id) => bind(id, Role::Doctor),
        ClientEvent::JoinPatientRoom(id) => bind(id, Role::Patient),

        ClientEvent::PatientJoinedQueue(data) => Route::Deliver(vec![Delivery::new(
            RoomName::doctors(),
            ServerEvent::QueueUpdated(data),
        )]),

        ClientEvent::DoctorStatusChanged(data) => Route::Deliver(vec![
            Delivery::new(
                RoomName::patients(),
                ServerEvent::DoctorAvailabilityChanged(data.clone()),
            ),
            Delivery::new(RoomName::doctors(), ServerEvent::DoctorStatusUpdate(data)),
        ]),

        ClientEvent::ConsultationStarted(data) => {
            consultation(data, ServerEvent::ConsultationStarted)
        }
        ClientEvent::ConsultationEnded(data) => consultation(data, ServerEvent::ConsultationEnded),

        ClientEvent::UpdateQueuePosition(roster) => {
            let positions = payload::queue_positions(&roster);
            let mut out = Vec::with_capacity(positions.len().saturating_add(1));
            for (id, slice) in positions {
                out.push(Delivery::new(
                    RoomName::patient(&id),
                    ServerEvent::QueuePositionUpdated(slice),
                ));
            }
            out.push(Delivery::new(
                RoomName::doctors(),
                ServerEvent::QueueUpdated(roster),
            ));
            Route::Deliver(out)
        }

        ClientEvent::PrescriptionCreated(data) => match payload::routing_id(&data, "patientId") {
            Some(id) => Route::Deliver(vec![Delivery::new(
                RoomName::patient(&id),
                ServerEvent::PrescriptionReceived(data),
            )]),
            None => Route::Reject("prescription without patientId"),
        },

        ClientEvent::AppointmentCreated(data) => {
            let mut out = Vec::with_capacity(2);
            if let Some(id) = payload::routing_id(&data, "doctorId") {
                out.push(Delivery::new(
                    RoomName::doctor(&id),
                    ServerEvent::NewAppointment(data.clone()),
                ));
            }
            if let Some(id) = payload::routing_id(&data, "patientId") {
                out.push(Delivery::new(
                    RoomName::patient(&id),
                    ServerEvent::AppointmentConfirmed(data),
                ));
            }
            if out.is_empty() {
                Route::Reject("appointment without doctorId or patientId")
            } else {
                Route::Deliver(out)
            }
        }

        ClientEvent::SendNotification(data) => match payload::routing_id(&data, "recipientId") {
            Some(id) => {
                let room = RoomName::personal(payload::notification_role(&data), &id);
                Route::Deliver(vec![Delivery::new(room, ServerEvent::Notification(data))])
            }
            None => Route::Reject("notification without recipientId"),
        },

        ClientEvent::NewTicket(data) => Route::Deliver(vec![Delivery::new(
            RoomName::doctors(),
            ServerEvent::NewPatient(data),
        )]),
    }
}

fn bind(id: ParticipantId, role: Role) -> Route {
    if id.is_blank() {
        Route::Reject("join with blank participant id")
    } else {
        Route::Bind(Identity::new(id, role))
    }
}

/// Consultation events: the patient's own room, then `queue_updated` to
/// every doctor.
fn consultation(data: Payload, to_patient: fn(Payload) -> ServerEvent) -> Route {
    let mut out = Vec::with_capacity(2);
    if let Some(id) = payload::routing_id(&data, "patientId") {
        out.push(Delivery::new(RoomName::patient(&id), to_patient(data.clone())));
    }
    out.push(Delivery::new(
        RoomName::doctors(),
        ServerEvent::QueueUpdated(data),
    ));
    Route::Deliver(out)
}
