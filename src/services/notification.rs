use crate::{
    error::{AppError, AppResult},
    models::{
        notification, team, team_user, Notification, NotificationModel, NotificationSource,
        NotificationStatus, RepositoryModel, TeamUser, UserModel,
    },
    websocket::hub::NotificationHub,
};
use chrono::NaiveDateTime;
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait,
    ActiveValue::Set,
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};

pub struct NotificationService {
    db: DatabaseConnection,
    hub: NotificationHub,
}

impl NotificationService {
    pub fn new(db: DatabaseConnection, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    /// Notifications of `user_id` in any of `statuses`, most recently updated first.
    pub async fn list_for_user(
        &self,
        user_id: i32,
        statuses: &[NotificationStatus],
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<NotificationModel>, u64)> {
        let mut query = Notification::find().filter(notification::Column::UserId.eq(user_id));
        if !statuses.is_empty() {
            query = query.filter(notification::Column::Status.is_in(statuses.iter().copied()));
        }

        let paginator = query
            .order_by_desc(notification::Column::UpdatedAt)
            .order_by_desc(notification::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    pub async fn count_by_status(&self, user_id: i32, status: NotificationStatus) -> AppResult<u64> {
        let count = Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Status.eq(status))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<u64> {
        self.count_by_status(user_id, NotificationStatus::Unread).await
    }

    /// Sends the current unread count to every open socket of `user_id`.
    pub async fn push_unread_count(&self, user_id: i32) -> AppResult<()> {
        let count = self.unread_count(user_id).await?;
        self.hub.send_unread_count(user_id, count);
        Ok(())
    }

    /// Pushes the unread count after a committed write; failures are logged only.
    async fn refresh_unread_count(&self, user_id: i32) {
        if let Err(e) = self.push_unread_count(user_id).await {
            tracing::warn!("Failed to push unread count to user {}: {}", user_id, e);
        }
    }

    pub async fn set_status(
        &self,
        id: i32,
        user_id: i32,
        status: NotificationStatus,
    ) -> AppResult<NotificationModel> {
        let existing = Notification::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        if existing.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        let mut active: notification::ActiveModel = existing.into();
        active.status = Set(status);
        active.updated_by = Set(user_id);
        active.updated_at = Set(now());
        let updated = active.update(&self.db).await?;

        self.refresh_unread_count(user_id).await;
        Ok(updated)
    }

    /// Moves every notification of `user_id` in status `from` to `to`.
    pub async fn set_all_status(
        &self,
        user_id: i32,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> AppResult<u64> {
        let result = Notification::update_many()
            .col_expr(notification::Column::Status, Expr::value(to))
            .col_expr(notification::Column::UpdatedBy, Expr::value(user_id))
            .col_expr(notification::Column::UpdatedAt, Expr::value(now()))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Status.eq(from))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            self.refresh_unread_count(user_id).await;
        }
        Ok(result.rows_affected)
    }

    /// Marks the issue notification of `user_id` as read after they viewed the issue.
    pub async fn set_issue_read_by(&self, issue_id: i32, user_id: i32) -> AppResult<()> {
        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Read),
            )
            .col_expr(notification::Column::UpdatedAt, Expr::value(now()))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IssueId.eq(issue_id))
            .filter(notification::Column::Status.eq(NotificationStatus::Unread))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            self.refresh_unread_count(user_id).await;
        }
        Ok(())
    }

    /// Marks unread repository notifications (such as transfers) of one repository as read.
    pub async fn set_repo_read_by(&self, user_id: i32, repo_id: i32) -> AppResult<u64> {
        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Read),
            )
            .col_expr(notification::Column::UpdatedBy, Expr::value(user_id))
            .col_expr(notification::Column::UpdatedAt, Expr::value(now()))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::RepoId.eq(repo_id))
            .filter(notification::Column::Source.eq(NotificationSource::Repository))
            .filter(notification::Column::Status.eq(NotificationStatus::Unread))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            self.refresh_unread_count(user_id).await;
        }
        Ok(result.rows_affected)
    }

    /// Tells the new owner (or, for an organization, the members of its
    /// all-repository teams) that a repository was transferred to them.
    pub async fn create_repo_transfer_notification(
        &self,
        doer_id: i32,
        new_owner: &UserModel,
        repo: &RepositoryModel,
    ) -> AppResult<Vec<i32>> {
        let recipients: Vec<i32> = if new_owner.is_organization {
            let members: Vec<i32> = TeamUser::find()
                .select_only()
                .column(team_user::Column::UserId)
                .filter(
                    team_user::Column::TeamId.in_subquery(
                        Query::select()
                            .column(team::Column::Id)
                            .from(team::Entity)
                            .and_where(Expr::col(team::Column::OrgId).eq(new_owner.id))
                            .and_where(Expr::col(team::Column::IncludesAllRepositories).eq(true))
                            .to_owned(),
                    ),
                )
                .into_tuple()
                .all(&self.db)
                .await?;
            members.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
        } else {
            vec![new_owner.id]
        };

        if recipients.is_empty() {
            return Ok(recipients);
        }

        let created = now();
        let txn = self.db.begin().await?;
        for user_id in &recipients {
            notification::ActiveModel {
                user_id: Set(*user_id),
                repo_id: Set(repo.id),
                status: Set(NotificationStatus::Unread),
                source: Set(NotificationSource::Repository),
                issue_id: Set(0),
                commit_id: Set(None),
                comment_id: Set(None),
                updated_by: Set(doer_id),
                created_at: Set(created),
                updated_at: Set(created),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        tracing::info!(
            "Repository {} transfer notified to {} users",
            repo.id,
            recipients.len()
        );

        for user_id in &recipients {
            self.refresh_unread_count(*user_id).await;
        }
        Ok(recipients)
    }

    /// Unread counts of the users whose notifications changed in `[since, until)`.
    pub async fn unread_counts_since(
        &self,
        since: NaiveDateTime,
        until: NaiveDateTime,
    ) -> AppResult<HashMap<i32, u64>> {
        let rows: Vec<(i32, i64)> = Notification::find()
            .select_only()
            .column(notification::Column::UserId)
            .column_as(Expr::col(notification::Column::Id).count(), "count")
            .filter(notification::Column::Status.eq(NotificationStatus::Unread))
            .filter(
                notification::Column::UserId.in_subquery(
                    Query::select()
                        .column(notification::Column::UserId)
                        .from(notification::Entity)
                        .and_where(Expr::col(notification::Column::UpdatedAt).gte(since))
                        .and_where(Expr::col(notification::Column::UpdatedAt).lt(until))
                        .to_owned(),
                ),
            )
            .group_by(notification::Column::UserId)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, count)| (user_id, count.max(0) as u64))
            .collect())
    }
}

pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
