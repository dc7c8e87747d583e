use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::repo_unit::UnitType;

/// The operation an action records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    #[sea_orm(num_value = 1)]
    CreateRepo,
    #[sea_orm(num_value = 2)]
    RenameRepo,
    #[sea_orm(num_value = 3)]
    StarRepo,
    #[sea_orm(num_value = 4)]
    WatchRepo,
    #[sea_orm(num_value = 5)]
    CommitRepo,
    #[sea_orm(num_value = 6)]
    CreateIssue,
    #[sea_orm(num_value = 7)]
    CreatePullRequest,
    #[sea_orm(num_value = 8)]
    TransferRepo,
    #[sea_orm(num_value = 9)]
    PushTag,
    #[sea_orm(num_value = 10)]
    CommentIssue,
    #[sea_orm(num_value = 11)]
    MergePullRequest,
    #[sea_orm(num_value = 12)]
    CloseIssue,
    #[sea_orm(num_value = 13)]
    ReopenIssue,
    #[sea_orm(num_value = 14)]
    ClosePullRequest,
    #[sea_orm(num_value = 15)]
    ReopenPullRequest,
    #[sea_orm(num_value = 16)]
    DeleteTag,
    #[sea_orm(num_value = 17)]
    DeleteBranch,
    #[sea_orm(num_value = 18)]
    MirrorSyncPush,
    #[sea_orm(num_value = 19)]
    MirrorSyncCreate,
    #[sea_orm(num_value = 20)]
    MirrorSyncDelete,
    #[sea_orm(num_value = 21)]
    ApprovePullRequest,
    #[sea_orm(num_value = 22)]
    RejectPullRequest,
    #[sea_orm(num_value = 23)]
    CommentPull,
    #[sea_orm(num_value = 24)]
    PublishRelease,
    #[sea_orm(num_value = 25)]
    PullReviewDismissed,
    #[sea_orm(num_value = 26)]
    PullRequestReadyForReview,
    #[sea_orm(num_value = 27)]
    AutoMergePullRequest,
}

/// Which repository unit a watcher must be able to read to receive an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitScope {
    Code,
    Issues,
    PullRequests,
    /// Fanned out to every watcher.
    Other,
}

impl UnitScope {
    pub fn unit(self) -> Option<UnitType> {
        match self {
            UnitScope::Code => Some(UnitType::Code),
            UnitScope::Issues => Some(UnitType::Issues),
            UnitScope::PullRequests => Some(UnitType::PullRequests),
            UnitScope::Other => None,
        }
    }
}

impl OpType {
    pub const fn unit_scope(self) -> UnitScope {
        match self {
            OpType::CommitRepo
            | OpType::PushTag
            | OpType::DeleteTag
            | OpType::PublishRelease
            | OpType::DeleteBranch => UnitScope::Code,
            OpType::CreateIssue
            | OpType::CommentIssue
            | OpType::CloseIssue
            | OpType::ReopenIssue => UnitScope::Issues,
            OpType::CreatePullRequest
            | OpType::CommentPull
            | OpType::MergePullRequest
            | OpType::ClosePullRequest
            | OpType::ReopenPullRequest
            | OpType::AutoMergePullRequest => UnitScope::PullRequests,
            _ => UnitScope::Other,
        }
    }

    /// Ops whose `content` starts with `<issueIndex>|`.
    pub const fn is_issue_shaped(self) -> bool {
        matches!(
            self,
            OpType::CreateIssue
                | OpType::CreatePullRequest
                | OpType::CommentIssue
                | OpType::MergePullRequest
                | OpType::CloseIssue
                | OpType::ReopenIssue
                | OpType::ClosePullRequest
                | OpType::ReopenPullRequest
                | OpType::ApprovePullRequest
                | OpType::RejectPullRequest
                | OpType::CommentPull
                | OpType::PullReviewDismissed
                | OpType::PullRequestReadyForReview
                | OpType::AutoMergePullRequest
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpType::CreateRepo => "create_repo",
            OpType::RenameRepo => "rename_repo",
            OpType::StarRepo => "star_repo",
            OpType::WatchRepo => "watch_repo",
            OpType::CommitRepo => "commit_repo",
            OpType::CreateIssue => "create_issue",
            OpType::CreatePullRequest => "create_pull_request",
            OpType::TransferRepo => "transfer_repo",
            OpType::PushTag => "push_tag",
            OpType::CommentIssue => "comment_issue",
            OpType::MergePullRequest => "merge_pull_request",
            OpType::CloseIssue => "close_issue",
            OpType::ReopenIssue => "reopen_issue",
            OpType::ClosePullRequest => "close_pull_request",
            OpType::ReopenPullRequest => "reopen_pull_request",
            OpType::DeleteTag => "delete_tag",
            OpType::DeleteBranch => "delete_branch",
            OpType::MirrorSyncPush => "mirror_sync_push",
            OpType::MirrorSyncCreate => "mirror_sync_create",
            OpType::MirrorSyncDelete => "mirror_sync_delete",
            OpType::ApprovePullRequest => "approve_pull_request",
            OpType::RejectPullRequest => "reject_pull_request",
            OpType::CommentPull => "comment_pull",
            OpType::PublishRelease => "publish_release",
            OpType::PullReviewDismissed => "pull_review_dismissed",
            OpType::PullRequestReadyForReview => "pull_request_ready_for_review",
            OpType::AutoMergePullRequest => "auto_merge_pull_request",
        }
    }
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "actions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Feed owner this row is filed under.
    pub user_id: i32,
    pub op_type: OpType,
    /// Who performed the action.
    pub act_user_id: i32,
    pub repo_id: i32,
    pub comment_id: Option<i32>,
    pub ref_name: Option<String>,
    pub is_private: bool,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub is_deleted: bool,
    pub created_unix: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepoId",
        to = "super::repository::Column::Id"
    )]
    Repository,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub const BRANCH_PREFIX: &str = "refs/heads/";
pub const TAG_PREFIX: &str = "refs/tags/";

/// Builds the `content` of an issue-shaped action.
pub fn issue_content(index: i64, text: &str) -> String {
    format!("{}|{}", index, text)
}

/// Splits `content` on the first two `|`, padding missing segments with "".
pub fn split_issue_infos(content: &str) -> [&str; 3] {
    let mut parts = content.splitn(3, '|');
    [
        parts.next().unwrap_or(""),
        parts.next().unwrap_or(""),
        parts.next().unwrap_or(""),
    ]
}

impl Model {
    /// The row filed under the actor's own feed, as opposed to a recipient copy.
    pub fn is_original(&self) -> bool {
        self.user_id == self.act_user_id
    }

    pub fn issue_infos(&self) -> [&str; 3] {
        split_issue_infos(&self.content)
    }

    /// Issue index parsed from `content`, for issue-shaped ops only.
    pub fn issue_index(&self) -> Option<i64> {
        if !self.op_type.is_issue_shaped() {
            return None;
        }
        self.issue_infos()[0].trim().parse().ok()
    }

    pub fn branch(&self) -> Option<&str> {
        self.ref_name
            .as_deref()
            .map(|r| r.strip_prefix(BRANCH_PREFIX).unwrap_or(r))
    }

    pub fn tag(&self) -> Option<&str> {
        self.ref_name
            .as_deref()
            .map(|r| r.strip_prefix(TAG_PREFIX).unwrap_or(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    fn action(op_type: OpType, content: &str) -> Model {
        Model {
            id: 1,
            user_id: 2,
            op_type,
            act_user_id: 2,
            repo_id: 3,
            comment_id: None,
            ref_name: Some("refs/heads/main".to_string()),
            is_private: false,
            content: content.to_string(),
            is_deleted: false,
            created_unix: 0,
        }
    }

    #[test]
    fn issue_infos_pads_missing_segments() {
        assert_eq!(split_issue_infos("12"), ["12", "", ""]);
        assert_eq!(split_issue_infos(""), ["", "", ""]);
        assert_eq!(split_issue_infos("3|title|with|pipes"), ["3", "title", "with|pipes"]);
    }

    #[test]
    fn issue_index_only_for_issue_ops() {
        assert_eq!(action(OpType::CommentIssue, "42|looks good").issue_index(), Some(42));
        assert_eq!(action(OpType::CommitRepo, "42|looks good").issue_index(), None);
        assert_eq!(action(OpType::CreateIssue, "not-a-number|x").issue_index(), None);
    }

    #[test]
    fn branch_strips_ref_prefix() {
        assert_eq!(action(OpType::CommitRepo, "").branch(), Some("main"));
    }

    #[test]
    fn unit_scopes_group_ops() {
        assert_eq!(OpType::CommitRepo.unit_scope(), UnitScope::Code);
        assert_eq!(OpType::PublishRelease.unit_scope(), UnitScope::Code);
        assert_eq!(OpType::CommentIssue.unit_scope(), UnitScope::Issues);
        assert_eq!(OpType::AutoMergePullRequest.unit_scope(), UnitScope::PullRequests);
        assert_eq!(OpType::StarRepo.unit_scope(), UnitScope::Other);
        assert_eq!(OpType::ApprovePullRequest.unit_scope(), UnitScope::Other);
    }

    #[test]
    fn op_types_cover_all_numeric_values() {
        let values: Vec<i32> = OpType::iter().map(|op| op.to_value()).collect();
        assert_eq!(values, (1..=27).collect::<Vec<_>>());
    }

    #[test]
    fn issue_content_round_trips_through_split() {
        let content = issue_content(7, "Fix the build");
        assert_eq!(split_issue_infos(&content), ["7", "Fix the build", ""]);
    }
}
