use crate::{
    config::activity::ActivityConfig,
    error::{AppError, AppResult},
    models::{
        action, comment, issue, repository, user, Action, ActionModel, Comment, CommentModel,
        Issue, IssueModel, Repository, RepositoryModel, User, UserModel,
    },
    services::visibility::{activity_condition, FeedOptions},
};
use sea_orm::{
    sea_query::Condition, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// One feed row with its related records attached.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityItem {
    pub action: ActionModel,
    /// Ghost user when the acting account no longer exists.
    pub act_user: UserModel,
    pub repo: Option<RepositoryModel>,
    pub repo_owner: Option<UserModel>,
    pub comment: Option<CommentModel>,
    pub issue: Option<IssueModel>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub items: Vec<ActivityItem>,
    pub total: u64,
    /// Indices into `items` whose repository or repository owner is gone.
    pub failed: Vec<usize>,
}

impl FeedPage {
    pub fn without_failed(self) -> Vec<ActivityItem> {
        let failed = self.failed;
        self.items
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !failed.contains(i))
            .map(|(_, item)| item)
            .collect()
    }
}

pub struct FeedService {
    db: DatabaseConnection,
    config: ActivityConfig,
}

impl FeedService {
    pub fn new(db: DatabaseConnection, config: ActivityConfig) -> Self {
        Self { db, config }
    }

    pub async fn list_feed(&self, options: &FeedOptions) -> AppResult<FeedPage> {
        if !options.has_target() {
            return Err(AppError::Validation(
                "A feed needs a user, team or repository".to_string(),
            ));
        }

        let mut options = options.clone();
        if options.requested_user.is_none() && options.requested_repo.is_none() {
            if let Some(team) = options.requested_team.as_ref() {
                options.requested_user = User::find_by_id(team.org_id).one(&self.db).await?;
            }
        }

        let page = options.page.max(1);
        let per_page = self.config.page_size(options.page_size);

        let base = Action::find()
            .join(JoinType::InnerJoin, action::Relation::Repository.def())
            .filter(activity_condition(&options, &self.config));

        let total = base.clone().count(&self.db).await?;

        // Pages past the addressable range are empty.
        let Some(offset) = (page - 1)
            .checked_mul(per_page)
            .filter(|offset| *offset <= i64::MAX as u64)
        else {
            return Ok(FeedPage {
                total,
                ..Default::default()
            });
        };

        let actions = if page >= self.config.feed_id_first_page_threshold {
            self.page_by_ids(base, offset, per_page).await?
        } else {
            newest_first(base)
                .offset(offset)
                .limit(per_page)
                .all(&self.db)
                .await?
        };

        let (items, failed) = hydrate(&self.db, actions, self.config.max_in_size).await?;
        if !failed.is_empty() {
            tracing::warn!(
                "Feed page {} has {} rows with missing repository data",
                page,
                failed.len()
            );
        }

        Ok(FeedPage {
            items,
            total,
            failed,
        })
    }

    /// Selects the page of matching ids, then loads the rows in that order.
    async fn page_by_ids(
        &self,
        base: Select<Action>,
        offset: u64,
        per_page: u64,
    ) -> AppResult<Vec<ActionModel>> {
        let ids: Vec<i32> = newest_first(base)
            .select_only()
            .column(action::Column::Id)
            .offset(offset)
            .limit(per_page)
            .into_tuple()
            .all(&self.db)
            .await?;

        let rows = find_in_chunks::<Action, _>(
            &self.db,
            action::Column::Id,
            &ids,
            self.config.max_in_size,
        )
        .await?;

        let mut by_id: HashMap<i32, ActionModel> = rows.into_iter().map(|a| (a.id, a)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

fn newest_first(select: Select<Action>) -> Select<Action> {
    select
        .order_by_desc(action::Column::CreatedUnix)
        .order_by_desc(action::Column::Id)
}

async fn find_in_chunks<E, C>(
    conn: &C,
    column: E::Column,
    ids: &[i32],
    chunk_size: usize,
) -> Result<Vec<E::Model>, DbErr>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(chunk_size.max(1)) {
        let rows = E::find()
            .filter(column.is_in(chunk.iter().copied()))
            .all(conn)
            .await?;
        out.extend(rows);
    }
    Ok(out)
}

fn distinct<I: IntoIterator<Item = i32>>(ids: I) -> Vec<i32> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Attaches actors, repositories, owners, comments and issues to `actions`.
///
/// Returns the hydrated rows and the indices of rows whose repository or
/// repository owner could not be found.
pub async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    actions: Vec<ActionModel>,
    max_in_size: usize,
) -> Result<(Vec<ActivityItem>, Vec<usize>), DbErr> {
    let repo_ids = distinct(actions.iter().map(|a| a.repo_id));
    let repos: HashMap<i32, RepositoryModel> =
        find_in_chunks::<Repository, _>(conn, repository::Column::Id, &repo_ids, max_in_size)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

    let user_ids = distinct(
        actions
            .iter()
            .map(|a| a.act_user_id)
            .chain(repos.values().map(|r| r.owner_id)),
    );
    let users: HashMap<i32, UserModel> =
        find_in_chunks::<User, _>(conn, user::Column::Id, &user_ids, max_in_size)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

    let comment_ids = distinct(actions.iter().filter_map(|a| a.comment_id));
    let comments: HashMap<i32, CommentModel> =
        find_in_chunks::<Comment, _>(conn, comment::Column::Id, &comment_ids, max_in_size)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

    let issue_keys: Vec<(i32, i64)> = actions
        .iter()
        .filter_map(|a| a.issue_index().map(|index| (a.repo_id, index)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut issues: HashMap<(i32, i64), IssueModel> = HashMap::new();
    for chunk in issue_keys.chunks(max_in_size.max(1)) {
        let cond = chunk.iter().fold(Condition::any(), |cond, (repo_id, index)| {
            cond.add(
                Condition::all()
                    .add(issue::Column::RepoId.eq(*repo_id))
                    .add(issue::Column::Index.eq(*index)),
            )
        });
        for found in Issue::find().filter(cond).all(conn).await? {
            issues.insert((found.repo_id, found.index), found);
        }
    }

    let mut failed = Vec::new();
    let items = actions
        .into_iter()
        .enumerate()
        .map(|(i, action)| {
            let repo = repos.get(&action.repo_id).cloned();
            let repo_owner = repo.as_ref().and_then(|r| users.get(&r.owner_id).cloned());
            if repo.is_none() || repo_owner.is_none() {
                failed.push(i);
            }
            let act_user = users
                .get(&action.act_user_id)
                .cloned()
                .unwrap_or_else(UserModel::ghost);
            let comment = action.comment_id.and_then(|id| comments.get(&id).cloned());
            let issue = action
                .issue_index()
                .and_then(|index| issues.get(&(action.repo_id, index)).cloned());
            ActivityItem {
                action,
                act_user,
                repo,
                repo_owner,
                comment,
                issue,
            }
        })
        .collect();

    Ok((items, failed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OpType;

    fn item(id: i32) -> ActivityItem {
        ActivityItem {
            action: ActionModel {
                id,
                user_id: 1,
                op_type: OpType::CreateRepo,
                act_user_id: 1,
                repo_id: 1,
                comment_id: None,
                ref_name: None,
                is_private: false,
                content: String::new(),
                is_deleted: false,
                created_unix: 0,
            },
            act_user: UserModel::ghost(),
            repo: None,
            repo_owner: None,
            comment: None,
            issue: None,
        }
    }

    #[test]
    fn without_failed_drops_marked_rows() {
        let page = FeedPage {
            items: vec![item(1), item(2), item(3)],
            total: 3,
            failed: vec![1],
        };
        let ids: Vec<i32> = page.without_failed().iter().map(|i| i.action.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn distinct_sorts_and_dedups() {
        assert_eq!(distinct([3, 1, 3, 2, 1]), vec![1, 2, 3]);
    }
}
