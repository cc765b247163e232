//! API Routes
//!
//! Configures the Axum router with the entity collections and cache
//! administration endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, create_handler, delete_handler, delete_key_handler, get_handler,
    get_key_handler, health_handler, invalidate_handler, list_handler, stats_handler,
    update_handler, AppState,
};
use crate::entities::{City, Entity, Event, Location, Project, Registration, Track};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health`
/// - `GET /cache/stats`, `DELETE /cache`
/// - `GET|DELETE /cache/keys/:key`, `POST /cache/invalidate`
/// - `GET|POST /<entities>` and `GET|PATCH|DELETE /<entities>/:id` for
///   cities, locations, events, registrations, projects and tracks
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/cache", delete(clear_handler))
        .route("/cache/stats", get(stats_handler))
        .route(
            "/cache/keys/:key",
            get(get_key_handler).delete(delete_key_handler),
        )
        .route("/cache/invalidate", post(invalidate_handler));

    let router = entity_routes::<City>(router);
    let router = entity_routes::<Location>(router);
    let router = entity_routes::<Event>(router);
    let router = entity_routes::<Registration>(router);
    let router = entity_routes::<Project>(router);
    let router = entity_routes::<Track>(router);

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Mounts the CRUD endpoints for one collection under `/<table>`.
fn entity_routes<E: Entity>(router: Router<AppState>) -> Router<AppState> {
    let collection = format!("/{}", E::TABLE);
    let member = format!("/{}/:id", E::TABLE);

    router
        .route(&collection, get(list_handler::<E>).post(create_handler::<E>))
        .route(
            &member,
            get(get_handler::<E>)
                .patch(update_handler::<E>)
                .delete(delete_handler::<E>),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        create_router(AppState::from_config(&Config::default()))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        create_test_app()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(status_of("GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        assert_eq!(status_of("GET", "/cache/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_every_collection_is_mounted() {
        for table in ["cities", "locations", "events", "registrations", "projects", "tracks"] {
            assert_eq!(
                status_of("GET", &format!("/{table}")).await,
                StatusCode::OK,
                "GET /{table}"
            );
            assert_eq!(
                status_of("GET", &format!("/{table}/1")).await,
                StatusCode::NOT_FOUND,
                "GET /{table}/1"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_route() {
        assert_eq!(status_of("GET", "/get/x").await, StatusCode::NOT_FOUND);
    }
}
