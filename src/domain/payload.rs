//! Event payloads.
//!
//! The relay forwards every payload as the exact JSON the sender emitted and
//! only reads the handful of fields it routes on: `patientId`, `doctorId`,
//! `recipientType`, `recipientId` and the roster's `patients[].id`. The
//! readers below never fail; a field that cannot be used just resolves to
//! nothing.
//!
//! The typed structs are what the socket manager builds when it emits, and
//! what handlers may decode a received payload into with
//! [`super::ServerEvent::decode`]. Fields the relay does not route on are
//! kept as raw JSON so decoding accepts whatever shape a client sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ParticipantId, Role};

/// Raw event payload, forwarded as received.
pub type Payload = Value;

/// Fields copied from a roster entry into that patient's
/// `queue_position_updated` payload.
const POSITION_FIELDS: [&str; 3] = ["position", "estimatedTime", "tokenNumber"];

/// Reads the routing id stored under `field`.
///
/// Strings and numbers qualify. Missing fields, blank strings and any other
/// JSON type resolve to `None`.
#[must_use]
pub fn routing_id(payload: &Payload, field: &str) -> Option<ParticipantId> {
    payload
        .get(field)
        .and_then(ParticipantId::from_value)
        .filter(|id| !id.is_blank())
}

/// Role a notification is addressed to.
///
/// Only a `recipientType` of exactly `"doctor"` addresses a doctor; a
/// missing, unknown or non-string type addresses a patient.
#[must_use]
pub fn notification_role(payload: &Payload) -> Role {
    match payload.get("recipientType").and_then(Value::as_str) {
        Some("doctor") => Role::Doctor,
        _ => Role::Patient,
    }
}

/// Splits an `update_queue_position` roster into per-patient slices.
///
/// Each entry with a usable `id` yields `(id, {position, estimatedTime,
/// tokenNumber})` with those fields copied as sent (absent ones stay
/// absent). Entries without an id, and a missing or non-array `patients`
/// field, are skipped.
#[must_use]
pub fn queue_positions(roster: &Payload) -> Vec<(ParticipantId, Payload)> {
    let Some(entries) = roster.get("patients").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let Some(id) = routing_id(entry, "id") else {
                tracing::debug!("skipping queue entry without id");
                return None;
            };
            let slice: Map<String, Value> = POSITION_FIELDS
                .iter()
                .filter_map(|field| entry.get(*field).map(|v| ((*field).to_string(), v.clone())))
                .collect();
            Some((id, Value::Object(slice)))
        })
        .collect()
}

/// Availability a doctor advertises to waiting patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    /// Accepting patients.
    Available,
    /// Temporarily away.
    OnBreak,
    /// In a consultation.
    Busy,
}

/// `doctor_status_changed` payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStatus {
    /// Doctor whose status changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<ParticipantId>,
    /// New status, normally one of the [`Availability`] values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    /// Any other client-supplied fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `consultation_started` / `consultation_ended` payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    /// Doctor running the consultation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<ParticipantId>,
    /// Patient being seen. Routes to `patient_<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<ParticipantId>,
    /// Any other client-supplied fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `prescription_created` payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    /// Recipient patient. Routes to `patient_<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<ParticipantId>,
    /// Prescribing doctor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<ParticipantId>,
    /// Prescription body, doctor name, timestamp and so on.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `appointment_created` payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Doctor booked. Routes to `doctor_<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<ParticipantId>,
    /// Patient who booked. Routes to `patient_<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<ParticipantId>,
    /// Slot, reason and other appointment details.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `send_notification` / `notification` payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// `"doctor"` or `"patient"`. See [`notification_role`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_type: Option<Value>,
    /// Recipient participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<ParticipantId>,
    /// Human-readable text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    /// Notification category (`info`, `doctor_status`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    /// RFC 3339 send time, stamped by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    /// Any other client-supplied fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One patient's slot in an `update_queue_position` roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Patient id. Routes to `patient_<id>`.
    pub id: ParticipantId,
    /// 1-based place in the queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    /// Display estimate such as `"15m"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<Value>,
    /// Ticket number shown to the patient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_number: Option<Value>,
}

impl QueueEntry {
    /// Entry for `id` at `position`, with no estimate or token.
    #[must_use]
    pub fn new(id: impl Into<ParticipantId>, position: u32) -> Self {
        Self {
            id: id.into(),
            position: Some(Value::from(position)),
            estimated_time: None,
            token_number: None,
        }
    }
}
