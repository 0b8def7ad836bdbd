//! Room names.
//!
//! A room is nothing more than a name that connections can be members of.
//! Four shapes exist: the two role rooms (`doctors`, `patients`) and one
//! private room per participant (`doctor_<id>`, `patient_<id>`).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ParticipantId, Role};

const DOCTORS: &str = "doctors";
const PATIENTS: &str = "patients";

/// Name of a broadcast room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    /// Wraps an arbitrary room name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Room every doctor connection joins.
    #[must_use]
    pub fn doctors() -> Self {
        Self(DOCTORS.to_string())
    }

    /// Room every patient connection joins.
    #[must_use]
    pub fn patients() -> Self {
        Self(PATIENTS.to_string())
    }

    /// Private room of `doctor_<id>`.
    #[must_use]
    pub fn doctor(id: &ParticipantId) -> Self {
        Self::personal(Role::Doctor, id)
    }

    /// Private room of `patient_<id>`.
    #[must_use]
    pub fn patient(id: &ParticipantId) -> Self {
        Self::personal(Role::Patient, id)
    }

    /// Private room of a participant with the given role.
    #[must_use]
    pub fn personal(role: Role, id: &ParticipantId) -> Self {
        Self(format!("{}_{}", role.as_str(), id.as_str()))
    }

    /// Returns the room name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
