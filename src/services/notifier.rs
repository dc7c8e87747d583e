//! Turns domain events into activity rows, heatmap points and notification jobs.

use crate::{
    error::{AppError, AppResult},
    models::{
        action::{issue_content, TAG_PREFIX},
        ActionModel, CommentModel, IssueModel, OpType, Repository, RepositoryModel, UserModel,
    },
    services::{
        action::ActionService,
        dispatch::{IssueNotificationJob, NotificationQueue},
        heatmap::{CommitPoint, HeatmapService},
        notification::NotificationService,
        watcher_fanout::{NewAction, WatcherFanout},
    },
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Longest comment excerpt kept in an action's content.
pub const COMMENT_EXCERPT_CHARS: usize = 200;

/// One commit of a push as reported by the git layer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PushCommit {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    /// Author time, epoch seconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewKind {
    Approve,
    Reject,
    Comment,
}

impl ReviewKind {
    fn op_type(self) -> OpType {
        match self {
            ReviewKind::Approve => OpType::ApprovePullRequest,
            ReviewKind::Reject => OpType::RejectPullRequest,
            ReviewKind::Comment => OpType::CommentPull,
        }
    }
}

/// First line of `text`, cut to `max_chars` characters.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.lines()
        .next()
        .unwrap_or("")
        .trim_end()
        .chars()
        .take(max_chars)
        .collect()
}

pub struct ActivityNotifier {
    db: DatabaseConnection,
    watchers: WatcherFanout,
    heatmap: HeatmapService,
    notifications: NotificationService,
    actions: ActionService,
    queue: NotificationQueue,
}

impl ActivityNotifier {
    pub fn new(
        db: DatabaseConnection,
        heatmap: HeatmapService,
        notifications: NotificationService,
        queue: NotificationQueue,
    ) -> Self {
        Self {
            watchers: WatcherFanout::new(db.clone()),
            actions: ActionService::new(db.clone()),
            db,
            heatmap,
            notifications,
            queue,
        }
    }

    async fn repo_of(&self, issue: &IssueModel) -> AppResult<RepositoryModel> {
        Repository::find_by_id(issue.repo_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn record(
        &self,
        doer: &UserModel,
        repo: &RepositoryModel,
        op_type: OpType,
        content: String,
        comment_id: Option<i32>,
        ref_name: Option<String>,
    ) -> AppResult<ActionModel> {
        self.watchers
            .notify_watchers(NewAction {
                act_user_id: doer.id,
                op_type,
                repo_id: repo.id,
                comment_id,
                ref_name,
                is_private: repo.is_private,
                content,
            })
            .await
    }

    /// Queues an issue notification fan-out. Never fails the caller.
    pub fn notify_issue_event(
        &self,
        issue_id: i32,
        comment_id: Option<i32>,
        notifier_id: i32,
        receiver_id: Option<i32>,
    ) {
        self.queue.push(IssueNotificationJob {
            issue_id,
            comment_id,
            notifier_id,
            receiver_id,
        });
    }

    pub async fn notify_create_repo(
        &self,
        doer: &UserModel,
        repo: &RepositoryModel,
    ) -> AppResult<ActionModel> {
        self.record(doer, repo, OpType::CreateRepo, String::new(), None, None)
            .await
    }

    pub async fn notify_rename_repo(
        &self,
        doer: &UserModel,
        repo: &RepositoryModel,
        old_name: &str,
    ) -> AppResult<ActionModel> {
        self.record(doer, repo, OpType::RenameRepo, old_name.to_string(), None, None)
            .await
    }

    pub async fn notify_new_issue(
        &self,
        issue: &IssueModel,
        doer: &UserModel,
    ) -> AppResult<ActionModel> {
        let repo = self.repo_of(issue).await?;
        let op_type = if issue.is_pull {
            OpType::CreatePullRequest
        } else {
            OpType::CreateIssue
        };
        let action = self
            .record(
                doer,
                &repo,
                op_type,
                issue_content(issue.index, &issue.title),
                None,
                None,
            )
            .await?;
        self.notify_issue_event(issue.id, None, doer.id, None);
        Ok(action)
    }

    pub async fn notify_issue_comment(
        &self,
        issue: &IssueModel,
        comment: &CommentModel,
        doer: &UserModel,
    ) -> AppResult<ActionModel> {
        let repo = self.repo_of(issue).await?;
        let op_type = if issue.is_pull {
            OpType::CommentPull
        } else {
            OpType::CommentIssue
        };
        let content = issue_content(issue.index, &excerpt(&comment.content, COMMENT_EXCERPT_CHARS));
        let action = self
            .record(doer, &repo, op_type, content, Some(comment.id), None)
            .await?;
        self.notify_issue_event(issue.id, Some(comment.id), doer.id, None);
        Ok(action)
    }

    /// Targeted notification for a mentioned or assigned user.
    pub fn notify_issue_mention(
        &self,
        issue: &IssueModel,
        comment_id: Option<i32>,
        doer: &UserModel,
        mentioned_id: i32,
    ) {
        if mentioned_id == doer.id {
            return;
        }
        self.notify_issue_event(issue.id, comment_id, doer.id, Some(mentioned_id));
    }

    pub async fn notify_issue_change_status(
        &self,
        issue: &IssueModel,
        doer: &UserModel,
        closed: bool,
    ) -> AppResult<ActionModel> {
        let repo = self.repo_of(issue).await?;
        let op_type = match (issue.is_pull, closed) {
            (false, true) => OpType::CloseIssue,
            (false, false) => OpType::ReopenIssue,
            (true, true) => OpType::ClosePullRequest,
            (true, false) => OpType::ReopenPullRequest,
        };
        let action = self
            .record(
                doer,
                &repo,
                op_type,
                issue_content(issue.index, &issue.title),
                None,
                None,
            )
            .await?;
        self.notify_issue_event(issue.id, None, doer.id, None);
        Ok(action)
    }

    pub async fn notify_merge_pull_request(
        &self,
        pull: &IssueModel,
        doer: &UserModel,
        auto_merge: bool,
    ) -> AppResult<ActionModel> {
        let repo = self.repo_of(pull).await?;
        let op_type = if auto_merge {
            OpType::AutoMergePullRequest
        } else {
            OpType::MergePullRequest
        };
        let action = self
            .record(
                doer,
                &repo,
                op_type,
                issue_content(pull.index, &pull.title),
                None,
                None,
            )
            .await?;
        self.notify_issue_event(pull.id, None, doer.id, None);
        Ok(action)
    }

    pub async fn notify_pull_review(
        &self,
        pull: &IssueModel,
        review: Option<&CommentModel>,
        doer: &UserModel,
        kind: ReviewKind,
    ) -> AppResult<ActionModel> {
        let repo = self.repo_of(pull).await?;
        let body = review
            .map(|c| excerpt(&c.content, COMMENT_EXCERPT_CHARS))
            .unwrap_or_default();
        let comment_id = review.map(|c| c.id);
        let action = self
            .record(
                doer,
                &repo,
                kind.op_type(),
                issue_content(pull.index, &body),
                comment_id,
                None,
            )
            .await?;
        self.notify_issue_event(pull.id, comment_id, doer.id, None);
        Ok(action)
    }

    pub async fn notify_pull_ready_for_review(
        &self,
        pull: &IssueModel,
        doer: &UserModel,
    ) -> AppResult<ActionModel> {
        let repo = self.repo_of(pull).await?;
        let action = self
            .record(
                doer,
                &repo,
                OpType::PullRequestReadyForReview,
                issue_content(pull.index, &pull.title),
                None,
                None,
            )
            .await?;
        self.notify_issue_event(pull.id, None, doer.id, None);
        Ok(action)
    }

    /// Records a push and credits the pusher's heatmap with its commits.
    pub async fn notify_push_commits(
        &self,
        pusher: &UserModel,
        repo: &RepositoryModel,
        ref_full_name: &str,
        commits: &[PushCommit],
    ) -> AppResult<ActionModel> {
        let content = serde_json::to_string(commits)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("encode push commits: {}", e)))?;
        let op_type = if ref_full_name.starts_with(TAG_PREFIX) {
            OpType::PushTag
        } else {
            OpType::CommitRepo
        };
        let action = self
            .record(
                pusher,
                repo,
                op_type,
                content,
                None,
                Some(ref_full_name.to_string()),
            )
            .await?;

        let points: Vec<CommitPoint> = commits
            .iter()
            .map(|c| CommitPoint {
                sha: c.sha.clone(),
                timestamp: c.timestamp,
            })
            .collect();
        self.heatmap
            .record_commits(pusher.id, repo.id, &points)
            .await?;

        Ok(action)
    }

    pub async fn notify_create_ref(
        &self,
        doer: &UserModel,
        repo: &RepositoryModel,
        ref_full_name: &str,
    ) -> AppResult<ActionModel> {
        let op_type = if ref_full_name.starts_with(TAG_PREFIX) {
            OpType::PushTag
        } else {
            OpType::CommitRepo
        };
        self.record(
            doer,
            repo,
            op_type,
            String::new(),
            None,
            Some(ref_full_name.to_string()),
        )
        .await
    }

    pub async fn notify_delete_ref(
        &self,
        doer: &UserModel,
        repo: &RepositoryModel,
        ref_full_name: &str,
    ) -> AppResult<ActionModel> {
        let op_type = if ref_full_name.starts_with(TAG_PREFIX) {
            OpType::DeleteTag
        } else {
            OpType::DeleteBranch
        };
        self.record(
            doer,
            repo,
            op_type,
            String::new(),
            None,
            Some(ref_full_name.to_string()),
        )
        .await
    }

    pub async fn notify_new_release(
        &self,
        doer: &UserModel,
        repo: &RepositoryModel,
        tag_name: &str,
        title: &str,
    ) -> AppResult<ActionModel> {
        let ref_name = if tag_name.starts_with(TAG_PREFIX) {
            tag_name.to_string()
        } else {
            format!("{}{}", TAG_PREFIX, tag_name)
        };
        self.record(
            doer,
            repo,
            OpType::PublishRelease,
            title.to_string(),
            None,
            Some(ref_name),
        )
        .await
    }

    /// `repo` already carries the new owner.
    pub async fn notify_transfer_repo(
        &self,
        doer: &UserModel,
        repo: &RepositoryModel,
        old_owner_name: &str,
        new_owner: &UserModel,
    ) -> AppResult<ActionModel> {
        let action = self
            .record(
                doer,
                repo,
                OpType::TransferRepo,
                format!("{}/{}", old_owner_name, repo.name),
                None,
                None,
            )
            .await?;
        self.notifications
            .create_repo_transfer_notification(doer.id, new_owner, repo)
            .await?;
        Ok(action)
    }

    pub async fn notify_issue_deleted(&self, issue: &IssueModel) -> AppResult<u64> {
        self.actions
            .delete_issue_actions(issue.repo_id, issue.id, issue.index)
            .await
    }

    pub async fn notify_repo_deleted(&self, repo_id: i32) -> AppResult<u64> {
        self.heatmap.delete_for_repo(repo_id).await
    }
}
