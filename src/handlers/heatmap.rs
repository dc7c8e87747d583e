use crate::error::{AppError, AppResult};
use crate::middleware::Viewer;
use crate::models::{Team, User};
use crate::response::ApiResponse;
use crate::services::cache::CacheService;
use crate::services::heatmap::{total_contributions, HeatmapBucket, HeatmapService};
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HeatmapQuery {
    /// Restrict to repositories of this team (organization heatmaps only).
    pub team: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HeatmapResponse {
    pub buckets: Vec<HeatmapBucket>,
    pub total_contributions: i64,
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/heatmap",
    params(("id" = i32, Path, description = "User or organization ID"), HeatmapQuery),
    responses(
        (status = 200, description = "Contribution heatmap", body = HeatmapResponse),
        (status = 404, description = "User or team not found", body = crate::error::AppError),
    ),
    tag = "activities"
)]
pub async fn get_heatmap(
    Extension(db): Extension<DatabaseConnection>,
    Extension(cache): Extension<Option<CacheService>>,
    Viewer(viewer): Viewer,
    Path(id): Path<i32>,
    Query(query): Query<HeatmapQuery>,
) -> AppResult<impl IntoResponse> {
    let user = User::find_by_id(id)
        .one(&db)
        .await?
        .ok_or(AppError::NotFound)?;

    let team = match query.team {
        Some(team_id) => {
            let team = Team::find_by_id(team_id)
                .one(&db)
                .await?
                .ok_or(AppError::NotFound)?;
            if team.org_id != user.id {
                return Err(AppError::NotFound);
            }
            Some(team)
        }
        None => None,
    };

    let service = HeatmapService::new(db, cache);
    let buckets = service
        .heatmap(&user, team.as_ref(), viewer.as_ref())
        .await?;
    let total = total_contributions(&buckets);

    Ok(ApiResponse::ok(HeatmapResponse {
        buckets,
        total_contributions: total,
    }))
}
