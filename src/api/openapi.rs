//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{MemberDto, PaginationMeta, RoomDetailResponse, RoomListResponse, RoomSummaryDto};
use super::handlers::{room, system};
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI description of every REST endpoint the relay serves.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "zycare-relay",
        description = "Operational REST surface of the ZYCARE real-time relay. Event traffic itself flows over the `/ws` socket."
    ),
    paths(
        system::health_handler,
        room::list_rooms,
        room::get_room,
    ),
    components(schemas(
        system::HealthResponse,
        RoomSummaryDto,
        RoomListResponse,
        RoomDetailResponse,
        MemberDto,
        PaginationMeta,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Rooms", description = "Live room membership"),
    )
)]
pub struct ApiDoc;
