use crate::{
    error::AppResult,
    models::{action, comment, Action, OpType},
};
use sea_orm::{
    sea_query::{Condition, Expr, Query},
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

/// Maintenance of stored actions: soft deletion and retention.
pub struct ActionService {
    db: DatabaseConnection,
}

/// `LIKE` pattern matching the content of actions about issue `index`.
pub fn issue_content_pattern(index: i64) -> String {
    format!("{}|%", index)
}

impl ActionService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Hides every action about an issue: the ones that opened it and the ones
    /// pointing at its comments.
    pub async fn delete_issue_actions(
        &self,
        repo_id: i32,
        issue_id: i32,
        issue_index: i64,
    ) -> AppResult<u64> {
        let comment_ids = Query::select()
            .column(comment::Column::Id)
            .from(comment::Entity)
            .and_where(Expr::col(comment::Column::IssueId).eq(issue_id))
            .to_owned();

        let result = Action::update_many()
            .col_expr(action::Column::IsDeleted, Expr::value(true))
            .filter(
                Condition::any()
                    .add(action::Column::CommentId.in_subquery(comment_ids))
                    .add(
                        Condition::all()
                            .add(action::Column::RepoId.eq(repo_id))
                            .add(
                                action::Column::OpType
                                    .is_in([OpType::CreateIssue, OpType::CreatePullRequest]),
                            )
                            .add(action::Column::Content.like(issue_content_pattern(issue_index))),
                    ),
            )
            .exec(&self.db)
            .await?;

        tracing::info!(
            "Soft-deleted {} actions of issue {} in repo {}",
            result.rows_affected,
            issue_id,
            repo_id
        );
        Ok(result.rows_affected)
    }

    /// Removes actions created more than `older_than` ago. Non-positive
    /// durations leave the log untouched.
    pub async fn delete_old_actions(&self, older_than: chrono::Duration) -> AppResult<u64> {
        if older_than <= chrono::Duration::zero() {
            return Ok(0);
        }
        let cutoff = chrono::Utc::now().timestamp() - older_than.num_seconds();
        let result = Action::delete_many()
            .filter(action::Column::CreatedUnix.lt(cutoff))
            .exec(&self.db)
            .await?;
        tracing::info!("Deleted {} actions older than {}", result.rows_affected, cutoff);
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_anchors_on_index_separator() {
        assert_eq!(issue_content_pattern(12), "12|%");
    }
}
