use crate::config::activity::ActivityConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{NotificationModel, NotificationSource, NotificationStatus};
use crate::response::{ApiResponse, PaginatedResponse};
use crate::services::notification::NotificationService;
use crate::websocket::hub::NotificationHub;
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: i32,
    pub repo_id: i32,
    pub status: NotificationStatus,
    pub source: NotificationSource,
    pub issue_id: Option<i32>,
    pub commit_id: Option<String>,
    pub comment_id: Option<i32>,
    pub updated_by: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<NotificationModel> for NotificationResponse {
    fn from(n: NotificationModel) -> Self {
        Self {
            id: n.id,
            repo_id: n.repo_id,
            status: n.status,
            source: n.source,
            issue_id: (n.issue_id != 0).then_some(n.issue_id),
            commit_id: n.commit_id,
            comment_id: n.comment_id,
            updated_by: n.updated_by,
            created_at: n.created_at.to_string(),
            updated_at: n.updated_at.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Comma separated statuses, e.g. `unread,pinned`. Defaults to unread and pinned.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: NotificationStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAllStatusRequest {
    #[serde(default = "default_from_status")]
    pub from: NotificationStatus,
    #[serde(default = "default_to_status")]
    pub to: NotificationStatus,
}

fn default_from_status() -> NotificationStatus {
    NotificationStatus::Unread
}

fn default_to_status() -> NotificationStatus {
    NotificationStatus::Read
}

fn parse_status(raw: &str) -> AppResult<NotificationStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "unread" => Ok(NotificationStatus::Unread),
        "read" => Ok(NotificationStatus::Read),
        "pinned" => Ok(NotificationStatus::Pinned),
        other => Err(AppError::Validation(format!(
            "Unknown notification status: {}",
            other
        ))),
    }
}

fn parse_statuses(raw: Option<&str>) -> AppResult<Vec<NotificationStatus>> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(vec![NotificationStatus::Unread, NotificationStatus::Pinned]);
    };
    let mut statuses = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let status = parse_status(part)?;
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }
    Ok(statuses)
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    security(("jwt_token" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "List of notifications", body = PaginatedResponse<NotificationResponse>),
        (status = 400, description = "Unknown status", body = crate::error::AppError),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
    ),
    tag = "notifications"
)]
pub async fn list_notifications(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<NotificationHub>,
    Extension(config): Extension<ActivityConfig>,
    AuthUser(user): AuthUser,
    Query(params): Query<NotificationQuery>,
) -> AppResult<impl IntoResponse> {
    let statuses = parse_statuses(params.status.as_deref())?;
    let page = params.page.unwrap_or(1).max(1);
    let per_page = config.page_size(params.per_page);

    let service = NotificationService::new(db, hub);
    let (notifications, total) = service
        .list_for_user(user.id, &statuses, page, per_page)
        .await?;
    let items = notifications
        .into_iter()
        .map(NotificationResponse::from)
        .collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Unread notification count", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
    ),
    tag = "notifications"
)]
pub async fn unread_count(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<NotificationHub>,
    AuthUser(user): AuthUser,
) -> AppResult<impl IntoResponse> {
    let service = NotificationService::new(db, hub);
    let count = service.unread_count(user.id).await?;
    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/notifications/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Notification updated", body = NotificationResponse),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
        (status = 403, description = "Not the recipient", body = crate::error::AppError),
        (status = 404, description = "Notification not found", body = crate::error::AppError),
    ),
    tag = "notifications"
)]
pub async fn update_status(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<NotificationHub>,
    AuthUser(user): AuthUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let service = NotificationService::new(db, hub);
    let updated = service.set_status(id, user.id, body.status).await?;
    Ok(ApiResponse::ok(NotificationResponse::from(updated)))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications",
    security(("jwt_token" = [])),
    request_body = UpdateAllStatusRequest,
    responses(
        (status = 200, description = "Notifications updated", body = serde_json::Value),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
    ),
    tag = "notifications"
)]
pub async fn update_all_status(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<NotificationHub>,
    AuthUser(user): AuthUser,
    Json(body): Json<UpdateAllStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let service = NotificationService::new(db, hub);
    let count = service.set_all_status(user.id, body.from, body.to).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "updated": count })))
}
