use crate::{
    config::activity::ActivityConfig,
    error::{AppError, AppResult},
    models::{
        comment, issue_watch, notification, watch, Comment, Issue, IssueModel, IssueWatch,
        Notification, NotificationModel, NotificationSource, NotificationStatus, Repository,
        UnitType, User, Watch, WatchMode,
    },
    services::{access, notification::now},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QuerySelect, SqlErr, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Creates or refreshes per-user notifications for activity on one issue.
#[derive(Clone)]
pub struct NotificationFanout {
    db: DatabaseConnection,
    config: ActivityConfig,
}

/// Final recipient set. A positive `receiver_id` targets a single user;
/// otherwise the candidates minus the notifier and explicit unwatchers.
pub(crate) fn select_recipients(
    receiver_id: Option<i32>,
    candidates: impl IntoIterator<Item = i32>,
    notifier_id: i32,
    unwatchers: &HashSet<i32>,
) -> BTreeSet<i32> {
    if let Some(receiver) = receiver_id.filter(|id| *id > 0) {
        return BTreeSet::from([receiver]);
    }
    candidates
        .into_iter()
        .filter(|id| *id > 0 && *id != notifier_id && !unwatchers.contains(id))
        .collect()
}

impl NotificationFanout {
    pub fn new(db: DatabaseConnection, config: ActivityConfig) -> Self {
        Self { db, config }
    }

    /// Returns the users whose notification was created or updated.
    pub async fn upsert_issue_notifications(
        &self,
        issue_id: i32,
        comment_id: Option<i32>,
        notifier_id: i32,
        receiver_id: Option<i32>,
    ) -> AppResult<Vec<i32>> {
        let txn = self.db.begin().await?;
        let notified = self
            .upsert_in(&txn, issue_id, comment_id, notifier_id, receiver_id)
            .await?;
        txn.commit().await?;
        Ok(notified)
    }

    async fn upsert_in(
        &self,
        txn: &DatabaseTransaction,
        issue_id: i32,
        comment_id: Option<i32>,
        notifier_id: i32,
        receiver_id: Option<i32>,
    ) -> AppResult<Vec<i32>> {
        let issue = Issue::find_by_id(issue_id)
            .one(txn)
            .await?
            .ok_or(AppError::NotFound)?;
        let repo = Repository::find_by_id(issue.repo_id)
            .one(txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let watches: Vec<(i32, bool)> = IssueWatch::find()
            .select_only()
            .column(issue_watch::Column::UserId)
            .column(issue_watch::Column::IsWatching)
            .filter(issue_watch::Column::IssueId.eq(issue.id))
            .into_tuple()
            .all(txn)
            .await?;
        let unwatchers: HashSet<i32> = watches
            .iter()
            .filter(|(_, watching)| !watching)
            .map(|(id, _)| *id)
            .collect();

        let candidates = if receiver_id.filter(|id| *id > 0).is_some() {
            Vec::new()
        } else {
            let mut ids: Vec<i32> = watches
                .iter()
                .filter(|(_, watching)| *watching)
                .map(|(id, _)| *id)
                .collect();
            if !(issue.is_pull && self.config.is_work_in_progress(&issue.title)) {
                ids.extend(repo_watchers(txn, repo.id).await?);
            }
            ids.extend(participants(txn, &issue).await?);
            ids
        };

        let recipients = select_recipients(receiver_id, candidates, notifier_id, &unwatchers);
        if recipients.is_empty() {
            return Ok(Vec::new());
        }

        let mut existing: HashMap<i32, NotificationModel> = Notification::find()
            .filter(notification::Column::IssueId.eq(issue.id))
            .filter(notification::Column::UserId.is_in(recipients.iter().copied()))
            .all(txn)
            .await?
            .into_iter()
            .map(|n| (n.user_id, n))
            .collect();

        let unit = if issue.is_pull {
            UnitType::PullRequests
        } else {
            UnitType::Issues
        };

        let mut notified = Vec::with_capacity(recipients.len());
        for user_id in recipients {
            let Some(user) = User::find_by_id(user_id).one(txn).await? else {
                tracing::debug!("Skipping notification for missing user {}", user_id);
                continue;
            };
            if !access::can_read_unit(txn, &repo, &user, unit).await? {
                continue;
            }

            match existing.remove(&user_id) {
                Some(current) => {
                    refresh_notification(txn, current, comment_id, notifier_id).await?;
                }
                None => {
                    insert_or_refresh(txn, &issue, user_id, comment_id, notifier_id).await?;
                }
            }
            notified.push(user_id);
        }

        tracing::debug!(
            "Issue {} fan-out notified {} users",
            issue.id,
            notified.len()
        );
        Ok(notified)
    }
}

async fn repo_watchers<C: ConnectionTrait>(conn: &C, repo_id: i32) -> Result<Vec<i32>, DbErr> {
    Watch::find()
        .select_only()
        .column(watch::Column::UserId)
        .filter(watch::Column::RepoId.eq(repo_id))
        .filter(watch::Column::Mode.is_in([WatchMode::Normal, WatchMode::Auto]))
        .into_tuple()
        .all(conn)
        .await
}

/// The issue poster and everyone who commented on the issue.
async fn participants<C: ConnectionTrait>(conn: &C, issue: &IssueModel) -> Result<Vec<i32>, DbErr> {
    let mut ids: Vec<i32> = Comment::find()
        .select_only()
        .column(comment::Column::PosterId)
        .distinct()
        .filter(comment::Column::IssueId.eq(issue.id))
        .into_tuple()
        .all(conn)
        .await?;
    ids.push(issue.poster_id);
    Ok(ids)
}

/// Read notifications become unread and point at the new comment; unread and
/// pinned ones keep their comment and only move up the list.
async fn refresh_notification<C: ConnectionTrait>(
    conn: &C,
    current: NotificationModel,
    comment_id: Option<i32>,
    updated_by: i32,
) -> Result<NotificationModel, DbErr> {
    let was_read = current.status == NotificationStatus::Read;
    let mut active: notification::ActiveModel = current.into();
    if was_read {
        active.status = Set(NotificationStatus::Unread);
        active.comment_id = Set(comment_id);
    }
    active.updated_by = Set(updated_by);
    active.updated_at = Set(now());
    active.update(conn).await
}

/// Inserts inside a savepoint; losing the race against a concurrent producer
/// for the same (user, issue) falls back to refreshing the winner's row.
async fn insert_or_refresh(
    txn: &DatabaseTransaction,
    issue: &IssueModel,
    user_id: i32,
    comment_id: Option<i32>,
    updated_by: i32,
) -> Result<NotificationModel, DbErr> {
    let created = now();
    let model = notification::ActiveModel {
        user_id: Set(user_id),
        repo_id: Set(issue.repo_id),
        status: Set(NotificationStatus::Unread),
        source: Set(NotificationSource::for_issue(issue.is_pull)),
        issue_id: Set(issue.id),
        commit_id: Set(None),
        comment_id: Set(comment_id),
        updated_by: Set(updated_by),
        created_at: Set(created),
        updated_at: Set(created),
        ..Default::default()
    };

    let savepoint = txn.begin().await?;
    match model.insert(&savepoint).await {
        Ok(inserted) => {
            savepoint.commit().await?;
            Ok(inserted)
        }
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            savepoint.rollback().await?;
            tracing::debug!(
                "Notification for user {} on issue {} already exists, updating",
                user_id,
                issue.id
            );
            let current = Notification::find()
                .filter(notification::Column::UserId.eq(user_id))
                .filter(notification::Column::IssueId.eq(issue.id))
                .one(txn)
                .await?
                .ok_or(err)?;
            refresh_notification(txn, current, comment_id, updated_by).await
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_overrides_candidates() {
        let got = select_recipients(Some(7), [1, 2, 3], 1, &HashSet::new());
        assert_eq!(got, BTreeSet::from([7]));
    }

    #[test]
    fn zero_receiver_means_broadcast() {
        let got = select_recipients(Some(0), [2, 3], 1, &HashSet::new());
        assert_eq!(got, BTreeSet::from([2, 3]));
    }

    #[test]
    fn notifier_and_unwatchers_are_excluded() {
        let unwatchers = HashSet::from([3]);
        let got = select_recipients(None, [1, 2, 3, 2, 4], 1, &unwatchers);
        assert_eq!(got, BTreeSet::from([2, 4]));
    }
}
