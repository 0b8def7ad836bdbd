//! Router assembly and the serve loop.

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the full application router: REST endpoints plus `/ws`.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the application on an already-bound listener until the process
/// stops.
///
/// # Errors
///
/// Returns an I/O error if the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, build_app(state)).await
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::RelayConfig;

    fn app() -> Router {
        build_app(AppState::new(&RelayConfig::default()))
    }

    async fn get(path: &str) -> (StatusCode, serde_json::Value) {
        let Ok(req) = Request::get(path).body(Body::empty()) else {
            panic!("bad request");
        };
        let Ok(resp) = app().oneshot(req).await else {
            panic!("router failed");
        };
        let status = resp.status();
        let Ok(bytes) = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await else {
            panic!("body read failed");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_on_fresh_state_reports_no_connections() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("connections"), Some(&serde_json::json!(0)));
    }

    #[tokio::test]
    async fn rooms_start_empty() {
        let (status, body) = get("/api/v1/rooms").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/pagination/total"), Some(&serde_json::json!(0)));
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let (status, _) = get("/ws").await;
        assert!(status.is_client_error());
    }
}
