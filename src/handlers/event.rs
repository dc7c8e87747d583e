//! Event intake for the forge's git, repository and issue pipelines.
//!
//! Each request reports something the signed-in user just did. The user must
//! be able to read the unit the event belongs to.

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    action::{BRANCH_PREFIX, TAG_PREFIX},
    comment, ActionModel, Comment, Issue, OpType, Repository, RepositoryModel, UnitType,
    UserModel,
};
use crate::response::ApiResponse;
use crate::services::access::can_read_unit;
use crate::services::notifier::{ActivityNotifier, PushCommit, ReviewKind};
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PushEventRequest {
    /// Full ref name, e.g. `refs/heads/main`.
    pub ref_name: String,
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefEventRequest {
    pub ref_name: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueEventKind {
    Opened,
    Commented,
    Closed,
    Reopened,
    Merged,
    ReadyForReview,
    Approved,
    ChangesRequested,
}

impl IssueEventKind {
    fn pull_only(self) -> bool {
        matches!(
            self,
            IssueEventKind::Merged
                | IssueEventKind::ReadyForReview
                | IssueEventKind::Approved
                | IssueEventKind::ChangesRequested
        )
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueEventRequest {
    pub kind: IssueEventKind,
    pub comment_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecordedActionResponse {
    pub id: i32,
    pub op_type: OpType,
    pub repo_id: i32,
    pub comment_id: Option<i32>,
    pub ref_name: Option<String>,
    pub content: String,
    pub created_unix: i64,
}

impl From<ActionModel> for RecordedActionResponse {
    fn from(a: ActionModel) -> Self {
        Self {
            id: a.id,
            op_type: a.op_type,
            repo_id: a.repo_id,
            comment_id: a.comment_id,
            ref_name: a.ref_name,
            content: a.content,
            created_unix: a.created_unix,
        }
    }
}

async fn readable_repo(
    db: &DatabaseConnection,
    repo_id: i32,
    user: &UserModel,
    unit: UnitType,
) -> AppResult<RepositoryModel> {
    let repo = Repository::find_by_id(repo_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound)?;
    if !can_read_unit(db, &repo, user, unit).await? {
        return Err(AppError::Forbidden);
    }
    Ok(repo)
}

fn check_ref_name(ref_name: &str) -> AppResult<()> {
    let short = ref_name
        .strip_prefix(BRANCH_PREFIX)
        .or_else(|| ref_name.strip_prefix(TAG_PREFIX));
    match short {
        Some(name) if !name.is_empty() => Ok(()),
        _ => Err(AppError::Validation(format!(
            "Unsupported ref name '{}'",
            ref_name
        ))),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/repos/{id}/events/push",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Repository ID")),
    request_body = PushEventRequest,
    responses(
        (status = 200, description = "Push recorded", body = RecordedActionResponse),
        (status = 400, description = "Invalid ref name", body = crate::error::AppError),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
        (status = 403, description = "No code access", body = crate::error::AppError),
        (status = 404, description = "Repository not found", body = crate::error::AppError),
    ),
    tag = "events"
)]
pub async fn record_push(
    Extension(db): Extension<DatabaseConnection>,
    Extension(notifier): Extension<Arc<ActivityNotifier>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<PushEventRequest>,
) -> AppResult<impl IntoResponse> {
    check_ref_name(&payload.ref_name)?;
    let repo = readable_repo(&db, id, &user, UnitType::Code).await?;

    let action = notifier
        .notify_push_commits(&user, &repo, &payload.ref_name, &payload.commits)
        .await?;
    tracing::debug!(
        "Push of {} commits to repository {} recorded",
        payload.commits.len(),
        repo.id
    );
    Ok(ApiResponse::ok(RecordedActionResponse::from(action)))
}

#[utoipa::path(
    post,
    path = "/api/v1/repos/{id}/events/ref",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Repository ID")),
    request_body = RefEventRequest,
    responses(
        (status = 200, description = "Ref change recorded", body = RecordedActionResponse),
        (status = 400, description = "Invalid ref name", body = crate::error::AppError),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
        (status = 403, description = "No code access", body = crate::error::AppError),
        (status = 404, description = "Repository not found", body = crate::error::AppError),
    ),
    tag = "events"
)]
pub async fn record_ref(
    Extension(db): Extension<DatabaseConnection>,
    Extension(notifier): Extension<Arc<ActivityNotifier>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<RefEventRequest>,
) -> AppResult<impl IntoResponse> {
    check_ref_name(&payload.ref_name)?;
    let repo = readable_repo(&db, id, &user, UnitType::Code).await?;

    let action = if payload.deleted {
        notifier
            .notify_delete_ref(&user, &repo, &payload.ref_name)
            .await?
    } else {
        notifier
            .notify_create_ref(&user, &repo, &payload.ref_name)
            .await?
    };
    Ok(ApiResponse::ok(RecordedActionResponse::from(action)))
}

#[utoipa::path(
    post,
    path = "/api/v1/issues/{id}/events",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Issue or pull request ID")),
    request_body = IssueEventRequest,
    responses(
        (status = 200, description = "Issue event recorded", body = RecordedActionResponse),
        (status = 400, description = "Event does not fit the issue", body = crate::error::AppError),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
        (status = 403, description = "No access to the issue", body = crate::error::AppError),
        (status = 404, description = "Issue or comment not found", body = crate::error::AppError),
    ),
    tag = "events"
)]
pub async fn record_issue_event(
    Extension(db): Extension<DatabaseConnection>,
    Extension(notifier): Extension<Arc<ActivityNotifier>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<IssueEventRequest>,
) -> AppResult<impl IntoResponse> {
    let issue = Issue::find_by_id(id)
        .one(&db)
        .await?
        .ok_or(AppError::NotFound)?;
    if payload.kind.pull_only() && !issue.is_pull {
        return Err(AppError::Validation(
            "Event only applies to pull requests".to_string(),
        ));
    }

    let unit = if issue.is_pull {
        UnitType::PullRequests
    } else {
        UnitType::Issues
    };
    readable_repo(&db, issue.repo_id, &user, unit).await?;

    let comment = match payload.comment_id {
        Some(comment_id) => Some(
            Comment::find_by_id(comment_id)
                .filter(comment::Column::IssueId.eq(issue.id))
                .one(&db)
                .await?
                .ok_or(AppError::NotFound)?,
        ),
        None => None,
    };

    let action = match payload.kind {
        IssueEventKind::Opened => notifier.notify_new_issue(&issue, &user).await?,
        IssueEventKind::Commented => {
            let comment = comment.ok_or_else(|| {
                AppError::Validation("comment_id is required for comments".to_string())
            })?;
            notifier
                .notify_issue_comment(&issue, &comment, &user)
                .await?
        }
        IssueEventKind::Closed => {
            notifier
                .notify_issue_change_status(&issue, &user, true)
                .await?
        }
        IssueEventKind::Reopened => {
            notifier
                .notify_issue_change_status(&issue, &user, false)
                .await?
        }
        IssueEventKind::Merged => {
            notifier
                .notify_merge_pull_request(&issue, &user, false)
                .await?
        }
        IssueEventKind::ReadyForReview => {
            notifier.notify_pull_ready_for_review(&issue, &user).await?
        }
        IssueEventKind::Approved => {
            notifier
                .notify_pull_review(&issue, comment.as_ref(), &user, ReviewKind::Approve)
                .await?
        }
        IssueEventKind::ChangesRequested => {
            notifier
                .notify_pull_review(&issue, comment.as_ref(), &user, ReviewKind::Reject)
                .await?
        }
    };
    Ok(ApiResponse::ok(RecordedActionResponse::from(action)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_names_need_a_branch_or_tag_prefix() {
        assert!(check_ref_name("refs/heads/main").is_ok());
        assert!(check_ref_name("refs/tags/v1.0").is_ok());
        assert!(check_ref_name("refs/heads/").is_err());
        assert!(check_ref_name("main").is_err());
    }

    #[test]
    fn review_events_are_pull_only() {
        assert!(IssueEventKind::Approved.pull_only());
        assert!(IssueEventKind::Merged.pull_only());
        assert!(!IssueEventKind::Commented.pull_only());
        assert!(!IssueEventKind::Closed.pull_only());
    }
}
