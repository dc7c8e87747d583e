use crate::{
    error::{AppError, AppResult},
    models::{
        action, user, user_feed, watch, ActionModel, OpType, Repository, User, UserFeed,
        UserModel, Watch, WatchMode,
    },
    services::access::{self, RepoPermission},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QuerySelect, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

/// An event to record in the activity log before it is copied to recipients.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub act_user_id: i32,
    pub op_type: OpType,
    pub repo_id: i32,
    pub comment_id: Option<i32>,
    pub ref_name: Option<String>,
    /// Visibility of the repository when the event happened.
    pub is_private: bool,
    pub content: String,
}

struct RepoContext {
    owner: Option<UserModel>,
    watchers: Vec<(i32, RepoPermission)>,
}

/// Writes an action for its actor, the owning organization and every watcher
/// allowed to see it.
#[derive(Clone)]
pub struct WatcherFanout {
    db: DatabaseConnection,
}

impl WatcherFanout {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the original row (`user_id == act_user_id`).
    pub async fn notify_watchers(&self, action: NewAction) -> AppResult<ActionModel> {
        let mut originals = self.notify_watchers_batch(vec![action]).await?;
        originals
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("fan-out wrote no action")))
    }

    /// All actions are written in one transaction; watcher lists and permissions
    /// are resolved once per repository.
    pub async fn notify_watchers_batch(&self, actions: Vec<NewAction>) -> AppResult<Vec<ActionModel>> {
        let txn = self.db.begin().await?;
        let created_unix = chrono::Utc::now().timestamp();
        let mut contexts: HashMap<i32, RepoContext> = HashMap::new();
        let mut originals = Vec::with_capacity(actions.len());

        for new_action in &actions {
            if !contexts.contains_key(&new_action.repo_id) {
                let ctx = load_repo_context(&txn, new_action.repo_id).await?;
                contexts.insert(new_action.repo_id, ctx);
            }
            let Some(ctx) = contexts.get(&new_action.repo_id) else {
                continue;
            };

            let mut credited = HashSet::new();
            let original = insert_copy(&txn, new_action, new_action.act_user_id, created_unix).await?;
            credited.insert(new_action.act_user_id);

            if let Some(owner) = ctx.owner.as_ref() {
                if owner.is_organization && credited.insert(owner.id) {
                    insert_copy(&txn, new_action, owner.id, created_unix).await?;
                }
            }

            let required = new_action.op_type.unit_scope().unit();
            for (watcher_id, permission) in &ctx.watchers {
                if let Some(unit) = required {
                    if !permission.can_read(unit) {
                        continue;
                    }
                }
                if credited.insert(*watcher_id) {
                    insert_copy(&txn, new_action, *watcher_id, created_unix).await?;
                }
            }

            tracing::debug!(
                "Action {} ({}) on repo {} written for {} users",
                original.id,
                new_action.op_type,
                new_action.repo_id,
                credited.len()
            );
            originals.push(original);
        }

        txn.commit().await?;
        Ok(originals)
    }
}

async fn load_repo_context(txn: &DatabaseTransaction, repo_id: i32) -> AppResult<RepoContext> {
    let repo = Repository::find_by_id(repo_id)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner = User::find_by_id(repo.owner_id).one(txn).await?;

    let watcher_ids: Vec<i32> = Watch::find()
        .select_only()
        .column(watch::Column::UserId)
        .filter(watch::Column::RepoId.eq(repo_id))
        .filter(watch::Column::Mode.is_in([WatchMode::Normal, WatchMode::Auto]))
        .into_tuple()
        .all(txn)
        .await?;

    let mut watchers = Vec::with_capacity(watcher_ids.len());
    if !watcher_ids.is_empty() {
        let users = User::find()
            .filter(user::Column::Id.is_in(watcher_ids))
            .all(txn)
            .await?;
        for user in users {
            let permission = access::repo_permission(txn, &repo, Some(&user)).await?;
            watchers.push((user.id, permission));
        }
    }

    Ok(RepoContext { owner, watchers })
}

async fn insert_copy(
    txn: &DatabaseTransaction,
    new_action: &NewAction,
    user_id: i32,
    created_unix: i64,
) -> AppResult<ActionModel> {
    let row = action::ActiveModel {
        user_id: Set(user_id),
        op_type: Set(new_action.op_type),
        act_user_id: Set(new_action.act_user_id),
        repo_id: Set(new_action.repo_id),
        comment_id: Set(new_action.comment_id),
        ref_name: Set(new_action.ref_name.clone()),
        is_private: Set(new_action.is_private),
        content: Set(new_action.content.clone()),
        is_deleted: Set(false),
        created_unix: Set(created_unix),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    UserFeed::insert(user_feed::ActiveModel {
        user_id: Set(user_id),
        activity_id: Set(row.id),
        ..Default::default()
    })
    .exec(txn)
    .await?;

    Ok(row)
}
