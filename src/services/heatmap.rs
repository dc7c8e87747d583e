use crate::{
    error::AppResult,
    models::{heatmap_commit, HeatmapCommit, TeamModel, UserModel},
    services::{
        access,
        cache::{self, CacheService},
    },
};
use sea_orm::{
    sea_query::Expr, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Width of one heatmap bucket in seconds.
pub const BUCKET_SECONDS: i64 = 900;
/// One leap year plus a leading week.
pub const WINDOW_DAYS: i64 = 373;

const CACHE_TTL_SECS: u64 = 300;
const BUCKET_EXPR: &str = "(commit_timestamp / 900) * 900";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HeatmapBucket {
    /// Start of the 15-minute window, epoch seconds.
    pub timestamp: i64,
    pub contributions: i64,
}

#[derive(Debug, FromQueryResult)]
struct BucketRow {
    bucket: i64,
    contributions: i64,
}

/// A commit attributed to a user, as reported by the push pipeline.
#[derive(Debug, Clone)]
pub struct CommitPoint {
    pub sha: String,
    pub timestamp: i64,
}

pub fn bucket_start(timestamp: i64) -> i64 {
    timestamp.div_euclid(BUCKET_SECONDS) * BUCKET_SECONDS
}

pub fn total_contributions(buckets: &[HeatmapBucket]) -> i64 {
    buckets.iter().map(|b| b.contributions).sum()
}

pub struct HeatmapService {
    db: DatabaseConnection,
    cache: Option<CacheService>,
}

impl HeatmapService {
    pub fn new(db: DatabaseConnection, cache: Option<CacheService>) -> Self {
        Self { db, cache }
    }

    pub async fn heatmap(
        &self,
        user: &UserModel,
        team: Option<&TeamModel>,
        viewer: Option<&UserModel>,
    ) -> AppResult<Vec<HeatmapBucket>> {
        if !access::activity_readable(user, viewer) {
            return Ok(Vec::new());
        }

        let cache_key = cache::heatmap_key(user.id, team.map(|t| t.id), viewer.map(|v| v.id));
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get::<Vec<HeatmapBucket>>(&cache_key).await {
                return Ok(cached);
            }
        }

        let since = chrono::Utc::now().timestamp() - WINDOW_DAYS * 86_400;

        let mut query = HeatmapCommit::find()
            .select_only()
            .column_as(Expr::cust(BUCKET_EXPR), "bucket")
            .column_as(Expr::col(heatmap_commit::Column::Id).count(), "contributions")
            .filter(heatmap_commit::Column::UserId.eq(user.id))
            .filter(heatmap_commit::Column::CommitTimestamp.gt(0))
            .filter(heatmap_commit::Column::CommitTimestamp.gt(since));

        if !viewer.map(|v| v.is_admin).unwrap_or(false) {
            query = query.filter(
                heatmap_commit::Column::RepoId.in_subquery(access::accessible_repo_ids_query(viewer)),
            );
        }
        if let Some(team) = team {
            query = query
                .filter(heatmap_commit::Column::RepoId.in_subquery(access::team_repo_ids_query(team)));
        }

        let rows = query
            .group_by(Expr::cust(BUCKET_EXPR))
            .order_by_asc(Expr::cust(BUCKET_EXPR))
            .into_model::<BucketRow>()
            .all(&self.db)
            .await?;

        let buckets: Vec<HeatmapBucket> = rows
            .into_iter()
            .filter(|r| r.contributions > 0)
            .map(|r| HeatmapBucket {
                timestamp: r.bucket,
                contributions: r.contributions,
            })
            .collect();

        if let Some(cache) = &self.cache {
            cache.set(&cache_key, &buckets, CACHE_TTL_SECS).await;
        }

        Ok(buckets)
    }

    /// Stores the commits of one push. Non-positive timestamps are skipped.
    pub async fn record_commits(
        &self,
        user_id: i32,
        repo_id: i32,
        commits: &[CommitPoint],
    ) -> AppResult<u64> {
        let rows: Vec<heatmap_commit::ActiveModel> = commits
            .iter()
            .filter(|c| c.timestamp > 0)
            .map(|c| heatmap_commit::ActiveModel {
                user_id: Set(user_id),
                repo_id: Set(repo_id),
                commit_sha: Set(c.sha.clone()),
                commit_timestamp: Set(c.timestamp),
                ..Default::default()
            })
            .collect();

        if rows.is_empty() {
            return Ok(0);
        }

        let count = rows.len() as u64;
        HeatmapCommit::insert_many(rows).exec(&self.db).await?;

        if let Some(cache) = &self.cache {
            cache
                .invalidate_pattern(&cache::heatmap_user_pattern(user_id))
                .await;
        }

        tracing::debug!(
            "Recorded {} heatmap commits for user {} in repo {}",
            count,
            user_id,
            repo_id
        );
        Ok(count)
    }

    /// Users with recorded commits in `repo_id`, ascending.
    pub async fn contributors(&self, repo_id: i32) -> AppResult<Vec<i32>> {
        let users = HeatmapCommit::find()
            .select_only()
            .column(heatmap_commit::Column::UserId)
            .distinct()
            .filter(heatmap_commit::Column::RepoId.eq(repo_id))
            .order_by_asc(heatmap_commit::Column::UserId)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(users)
    }

    /// Drops the commits of a deleted repository and the cached heatmaps they fed.
    pub async fn delete_for_repo(&self, repo_id: i32) -> AppResult<u64> {
        let contributors = match &self.cache {
            Some(_) => self.contributors(repo_id).await?,
            None => Vec::new(),
        };

        let result = HeatmapCommit::delete_many()
            .filter(heatmap_commit::Column::RepoId.eq(repo_id))
            .exec(&self.db)
            .await?;

        if let Some(cache) = &self.cache {
            for user_id in contributors {
                cache
                    .invalidate_pattern(&cache::heatmap_user_pattern(user_id))
                    .await;
            }
        }
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_in_one_window_share_a_bucket() {
        assert_eq!(bucket_start(1602622800), 1602622800);
        assert_eq!(bucket_start(1602622850), 1602622800);
        assert_eq!(bucket_start(1602623699), 1602622800);
        assert_eq!(bucket_start(1602623700), 1602623700);
    }

    #[test]
    fn total_sums_contributions() {
        let buckets = [
            HeatmapBucket {
                timestamp: 0,
                contributions: 2,
            },
            HeatmapBucket {
                timestamp: 900,
                contributions: 5,
            },
        ];
        assert_eq!(total_contributions(&buckets), 7);
        assert_eq!(total_contributions(&[]), 0);
    }
}
