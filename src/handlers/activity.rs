use crate::config::activity::ActivityConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::Viewer;
use crate::models::{team_user, OpType, Repository, Team, TeamUser, User, UserModel};
use crate::response::{ApiResponse, PaginatedResponse};
use crate::services::feed::{ActivityItem, FeedService};
use crate::services::visibility::FeedOptions;
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct FeedQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Calendar day, `YYYY-MM-DD`, in the server's display timezone.
    pub date: Option<String>,
    pub only_performed_by: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityResponse {
    pub id: i32,
    pub op_type: OpType,
    pub act_user_id: i32,
    pub act_user_name: String,
    pub repo_id: i32,
    pub repo_name: Option<String>,
    pub repo_owner_name: Option<String>,
    pub comment_id: Option<i32>,
    pub issue_id: Option<i32>,
    pub issue_title: Option<String>,
    pub ref_name: Option<String>,
    pub content: String,
    pub is_private: bool,
    pub created_unix: i64,
}

impl From<ActivityItem> for ActivityResponse {
    fn from(item: ActivityItem) -> Self {
        let a = item.action;
        Self {
            id: a.id,
            op_type: a.op_type,
            act_user_id: a.act_user_id,
            act_user_name: item.act_user.name,
            repo_id: a.repo_id,
            repo_name: item.repo.map(|r| r.name),
            repo_owner_name: item.repo_owner.map(|o| o.name),
            comment_id: a.comment_id,
            issue_id: item.issue.as_ref().map(|i| i.id),
            issue_title: item.issue.map(|i| i.title),
            ref_name: a.ref_name,
            content: a.content,
            is_private: a.is_private,
            created_unix: a.created_unix,
        }
    }
}

async fn render_feed(
    db: DatabaseConnection,
    config: ActivityConfig,
    options: FeedOptions,
) -> AppResult<impl IntoResponse> {
    let page = options.page.max(1);
    let per_page = config.page_size(options.page_size);
    let service = FeedService::new(db, config);
    let feed = service.list_feed(&options).await?;
    let total = feed.total;
    let items = feed
        .without_failed()
        .into_iter()
        .map(ActivityResponse::from)
        .collect();
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

fn is_self_or_admin(viewer: Option<&UserModel>, user_id: i32) -> bool {
    viewer.map(|v| v.is_admin || v.id == user_id).unwrap_or(false)
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/activities",
    params(("id" = i32, Path, description = "User or organization ID"), FeedQuery),
    responses(
        (status = 200, description = "Activity feed of a user", body = PaginatedResponse<ActivityResponse>),
        (status = 404, description = "User not found", body = crate::error::AppError),
    ),
    tag = "activities"
)]
pub async fn list_user_activities(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ActivityConfig>,
    Viewer(viewer): Viewer,
    Path(id): Path<i32>,
    Query(query): Query<FeedQuery>,
) -> AppResult<impl IntoResponse> {
    let user = User::find_by_id(id)
        .one(&db)
        .await?
        .ok_or(AppError::NotFound)?;

    let options = FeedOptions {
        include_private: is_self_or_admin(viewer.as_ref(), user.id),
        actor: viewer,
        requested_user: Some(user),
        only_performed_by: query.only_performed_by.unwrap_or(false),
        date: query.date,
        page: query.page.unwrap_or(1),
        page_size: query.per_page,
        ..Default::default()
    };
    render_feed(db, config, options).await
}

#[utoipa::path(
    get,
    path = "/api/v1/repos/{id}/activities",
    params(("id" = i32, Path, description = "Repository ID"), FeedQuery),
    responses(
        (status = 200, description = "Activity feed of a repository", body = PaginatedResponse<ActivityResponse>),
        (status = 404, description = "Repository not found", body = crate::error::AppError),
    ),
    tag = "activities"
)]
pub async fn list_repo_activities(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ActivityConfig>,
    Viewer(viewer): Viewer,
    Path(id): Path<i32>,
    Query(query): Query<FeedQuery>,
) -> AppResult<impl IntoResponse> {
    let repo = Repository::find_by_id(id)
        .one(&db)
        .await?
        .ok_or(AppError::NotFound)?;

    // Readability of the repository itself is enforced by the feed filter.
    let options = FeedOptions {
        actor: viewer,
        requested_repo: Some(repo),
        include_private: true,
        date: query.date,
        page: query.page.unwrap_or(1),
        page_size: query.per_page,
        ..Default::default()
    };
    render_feed(db, config, options).await
}

#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}/activities",
    params(("id" = i32, Path, description = "Team ID"), FeedQuery),
    responses(
        (status = 200, description = "Activity feed of a team", body = PaginatedResponse<ActivityResponse>),
        (status = 404, description = "Team not found", body = crate::error::AppError),
    ),
    tag = "activities"
)]
pub async fn list_team_activities(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ActivityConfig>,
    Viewer(viewer): Viewer,
    Path(id): Path<i32>,
    Query(query): Query<FeedQuery>,
) -> AppResult<impl IntoResponse> {
    let team = Team::find_by_id(id)
        .one(&db)
        .await?
        .ok_or(AppError::NotFound)?;

    let include_private = match viewer.as_ref() {
        Some(v) if v.is_admin => true,
        Some(v) => {
            TeamUser::find()
                .filter(team_user::Column::TeamId.eq(team.id))
                .filter(team_user::Column::UserId.eq(v.id))
                .count(&db)
                .await?
                > 0
        }
        None => false,
    };

    let options = FeedOptions {
        actor: viewer,
        requested_team: Some(team),
        include_private,
        date: query.date,
        page: query.page.unwrap_or(1),
        page_size: query.per_page,
        ..Default::default()
    };
    render_feed(db, config, options).await
}
