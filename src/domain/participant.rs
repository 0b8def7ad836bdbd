//! Participants: who is on the other end of a connection.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::RoomName;

/// Role a participant connects as. Selects the rooms it is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A doctor working the queue.
    Doctor,
    /// A patient waiting for or in a consultation.
    Patient,
}

impl Role {
    /// Returns the role as its wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
        }
    }

    /// Broadcast room shared by every participant of this role.
    #[must_use]
    pub fn role_room(self) -> RoomName {
        match self {
            Self::Doctor => RoomName::doctors(),
            Self::Patient => RoomName::patients(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque id of a doctor or patient, as issued by the REST layer.
///
/// Accepts either a JSON string or a JSON number on the wire and always
/// serializes back as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wraps the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id is empty or whitespace only. Such ids cannot
    /// address a room.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Reads an id out of a JSON value. Strings and numbers qualify; any
    /// other JSON type yields `None`.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self(s.clone())),
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Number(n) => Self(n.to_string()),
        })
    }
}

/// Association between a connection and the participant behind it.
///
/// Created by the join event. Never mutated: a new join replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Participant id.
    pub participant_id: ParticipantId,
    /// Role the participant joined as.
    pub role: Role,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(participant_id: impl Into<ParticipantId>, role: Role) -> Self {
        Self {
            participant_id: participant_id.into(),
            role,
        }
    }

    /// Private room addressing this participant alone (`doctor_<id>` or
    /// `patient_<id>`).
    #[must_use]
    pub fn identity_room(&self) -> RoomName {
        RoomName::personal(self.role, &self.participant_id)
    }

    /// The two rooms a bound connection belongs to: role room first.
    #[must_use]
    pub fn rooms(&self) -> [RoomName; 2] {
        [self.role.role_room(), self.identity_room()]
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.participant_id)
    }
}
