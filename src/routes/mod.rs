use crate::handlers;
use crate::middleware::auth::viewer_middleware;
use crate::websocket;
use axum::{middleware, routing, Router};

pub fn create_routes() -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        // WebSocket route (auth handled inside the handler via query token)
        .route("/ws", routing::get(websocket::notification::ws_handler))
}

fn api_routes() -> Router {
    public_read_routes()
        .merge(notification_routes())
        .merge(event_routes())
        .layer(middleware::from_fn(viewer_middleware))
}

/// Feeds and heatmaps; anonymous viewers see public data only.
fn public_read_routes() -> Router {
    Router::new()
        .route(
            "/users/{id}/activities",
            routing::get(handlers::activity::list_user_activities),
        )
        .route(
            "/users/{id}/heatmap",
            routing::get(handlers::heatmap::get_heatmap),
        )
        .route(
            "/repos/{id}/activities",
            routing::get(handlers::activity::list_repo_activities),
        )
        .route(
            "/teams/{id}/activities",
            routing::get(handlers::activity::list_team_activities),
        )
}

/// Notification inbox of the signed-in user.
fn notification_routes() -> Router {
    Router::new()
        .route(
            "/notifications",
            routing::get(handlers::notification::list_notifications)
                .put(handlers::notification::update_all_status),
        )
        .route(
            "/notifications/unread-count",
            routing::get(handlers::notification::unread_count),
        )
        .route(
            "/notifications/{id}",
            routing::patch(handlers::notification::update_status),
        )
}

/// Events reported by the forge on behalf of the signed-in user.
fn event_routes() -> Router {
    Router::new()
        .route(
            "/repos/{id}/events/push",
            routing::post(handlers::event::record_push),
        )
        .route(
            "/repos/{id}/events/ref",
            routing::post(handlers::event::record_ref),
        )
        .route(
            "/issues/{id}/events",
            routing::post(handlers::event::record_issue_event),
        )
}
