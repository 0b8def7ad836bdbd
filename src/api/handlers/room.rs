//! Room introspection handlers: list rooms, inspect one room.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    MemberDto, PaginationParams, RoomDetailResponse, RoomListResponse, RoomSummaryDto,
};
use crate::app_state::AppState;
use crate::domain::RoomName;
use crate::error::{ErrorResponse, RelayError};

/// `GET /rooms` — List occupied rooms with member counts.
#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    summary = "List rooms",
    description = "Returns a paginated list of every room that currently has members, sorted by name.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated room list", body = RoomListResponse),
    )
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let rooms = state.registry.rooms().await;
    let (page, pagination) = params.paginate(rooms);
    Json(RoomListResponse {
        data: page.into_iter().map(RoomSummaryDto::from).collect(),
        pagination,
    })
}

/// `GET /rooms/{room}` — Inspect one room's members.
///
/// # Errors
///
/// Returns [`RelayError::RoomNotFound`] if the room has no members.
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room}",
    tag = "Rooms",
    summary = "Get room members",
    description = "Returns the connections currently in a room along with their bound identities.",
    params(
        ("room" = String, Path, description = "Room name, e.g. `doctors` or `patient_42`"),
    ),
    responses(
        (status = 200, description = "Room members", body = RoomDetailResponse),
        (status = 404, description = "Room has no members", body = ErrorResponse),
    )
)]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let room = RoomName::new(room);
    let ids = state.registry.members(&room).await;
    if ids.is_empty() {
        return Err(RelayError::RoomNotFound(room));
    }

    let mut connections = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(info) = state.registry.connection(id).await {
            connections.push(MemberDto::from(info));
        }
    }

    Ok(Json(RoomDetailResponse {
        room: room.to_string(),
        members: connections.len(),
        connections,
    }))
}

/// Room routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{room}", get(get_room))
}
