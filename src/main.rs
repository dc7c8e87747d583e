mod config;
mod error;
mod handlers;
mod middleware;
mod migration;
mod models;
mod response;
mod routes;
mod services;
mod utils;
mod websocket;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use config::activity::ActivityConfig;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use services::action::ActionService;
use services::cache::CacheService;
use services::dispatch::NotificationQueue;
use services::heatmap::HeatmapService;
use services::notification::NotificationService;
use services::notifier::ActivityNotifier;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use websocket::hub::NotificationHub;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Activity routes
        crate::handlers::activity::list_user_activities,
        crate::handlers::activity::list_repo_activities,
        crate::handlers::activity::list_team_activities,
        crate::handlers::heatmap::get_heatmap,
        // Notification routes
        crate::handlers::notification::list_notifications,
        crate::handlers::notification::unread_count,
        crate::handlers::notification::update_status,
        crate::handlers::notification::update_all_status,
        // Event intake
        crate::handlers::event::record_push,
        crate::handlers::event::record_ref,
        crate::handlers::event::record_issue_event,
    ),
    components(
        schemas(
            crate::response::ApiResponse<serde_json::Value>,
            crate::response::PaginatedResponse<serde_json::Value>,
            crate::error::AppError,
            crate::models::OpType,
            crate::models::NotificationStatus,
            crate::models::NotificationSource,
            // Activity
            crate::handlers::activity::FeedQuery,
            crate::handlers::activity::ActivityResponse,
            crate::handlers::heatmap::HeatmapResponse,
            crate::services::heatmap::HeatmapBucket,
            // Notification
            crate::handlers::notification::NotificationResponse,
            crate::handlers::notification::UnreadCountResponse,
            crate::handlers::notification::UpdateStatusRequest,
            crate::handlers::notification::UpdateAllStatusRequest,
            // Events
            crate::services::notifier::PushCommit,
            crate::handlers::event::PushEventRequest,
            crate::handlers::event::RefEventRequest,
            crate::handlers::event::IssueEventKind,
            crate::handlers::event::IssueEventRequest,
            crate::handlers::event::RecordedActionResponse,
        )
    ),
    tags(
        (name = "activities", description = "Activity feeds and contribution heatmaps"),
        (name = "notifications", description = "Notification inbox operations"),
        (name = "events", description = "Repository and issue events reported by the forge"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge_activity=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration before doing anything else
    let (jwt_config, activity_config) = validate_config()?;
    utils::jwt::init_jwt_config(jwt_config)?;

    tracing::info!("Starting forge activity service v{}...", env!("CARGO_PKG_VERSION"));

    let db = config::database::get_database().await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let hub = NotificationHub::new();

    let (queue, worker) =
        NotificationQueue::start(db.clone(), activity_config.clone(), hub.clone())?;

    // Redis/Cache is optional - graceful degradation if unavailable
    let cache = match config::redis::get_redis().await {
        Ok(Some(conn)) => {
            tracing::info!("Redis connected successfully");
            Some(CacheService::new(conn))
        }
        Ok(None) => {
            tracing::info!("REDIS_URL not set, running without cache");
            None
        }
        Err(e) => {
            tracing::warn!("Redis unavailable, running without cache: {}", e);
            None
        }
    };

    // Backs the event intake routes.
    let notifier = Arc::new(ActivityNotifier::new(
        db.clone(),
        HeatmapService::new(db.clone(), cache.clone()),
        NotificationService::new(db.clone(), hub.clone()),
        queue,
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    let retention = spawn_retention(db.clone(), activity_config.retention(), stop_rx);

    let app = create_app()
        .layer(Extension(db))
        .layer(Extension(hub))
        .layer(Extension(activity_config))
        .layer(Extension(cache))
        .layer(Extension(notifier));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = stop_tx.send(true);
    if let Some(handle) = retention {
        let _ = handle.await;
    }
    worker.shutdown().await;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Validate all required configuration at startup (fail-fast).
fn validate_config() -> anyhow::Result<(config::jwt::JwtConfig, ActivityConfig)> {
    let jwt_config = config::jwt::JwtConfig::from_env()?;
    let activity_config = ActivityConfig::from_env()?;

    // DATABASE_URL is checked early; the connection itself happens later
    if env::var("DATABASE_URL").is_err() {
        return Err(anyhow::anyhow!(
            "DATABASE_URL environment variable must be set"
        ));
    }

    Ok((jwt_config, activity_config))
}

/// Purges old actions once a day when a retention period is configured.
fn spawn_retention(
    db: DatabaseConnection,
    retention: Option<chrono::Duration>,
    mut stop: watch::Receiver<bool>,
) -> Option<tokio::task::JoinHandle<()>> {
    let older_than = retention?;
    let service = ActionService::new(db);

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(86_400));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = service.delete_old_actions(older_than).await {
                        tracing::error!("Failed to purge old actions: {}", e);
                    }
                }
                _ = stop.changed() => break,
            }
        }
    }))
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app() -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(
    Extension(db): Extension<DatabaseConnection>,
) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "forge-activity",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
