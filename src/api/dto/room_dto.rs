//! Room introspection DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{ConnectionInfo, RoomSummary};

/// One occupied room in `GET /rooms`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSummaryDto {
    /// Room name (`doctors`, `patient_42`, ...).
    pub room: String,
    /// Number of member connections.
    pub members: usize,
}

impl From<RoomSummary> for RoomSummaryDto {
    fn from(summary: RoomSummary) -> Self {
        Self {
            room: summary.room.to_string(),
            members: summary.members,
        }
    }
}

/// Paginated response for `GET /rooms`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomListResponse {
    /// Rooms on this page, sorted by name.
    pub data: Vec<RoomSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// One member connection in `GET /rooms/{room}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberDto {
    /// Connection id.
    pub connection_id: uuid::Uuid,
    /// Role bound by the join event, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Participant bound by the join event, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    /// When the socket was accepted.
    pub connected_at: DateTime<Utc>,
}

impl From<ConnectionInfo> for MemberDto {
    fn from(info: ConnectionInfo) -> Self {
        let (role, participant_id) = match info.identity {
            Some(identity) => (
                Some(identity.role.to_string()),
                Some(identity.participant_id.to_string()),
            ),
            None => (None, None),
        };
        Self {
            connection_id: *info.connection_id.as_uuid(),
            role,
            participant_id,
            connected_at: info.connected_at,
        }
    }
}

/// Response for `GET /rooms/{room}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomDetailResponse {
    /// Room name.
    pub room: String,
    /// Member count.
    pub members: usize,
    /// Member connections.
    pub connections: Vec<MemberDto>,
}
