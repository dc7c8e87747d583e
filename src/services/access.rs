//! Repository read-permission answers derived from the identity tables.
//!
//! Functions take any `ConnectionTrait` so they can run inside a fan-out
//! transaction as well as against the pool.

use crate::models::{
    collaboration, repo_unit, repository, team, team_repo, team_unit, team_user, user,
    Collaboration, RepoUnit, RepositoryModel, TeamUnit, TeamUser, UnitType, User, UserModel,
    Visibility,
};
use sea_orm::{
    sea_query::{Condition, Expr, Query, SelectStatement},
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use std::collections::HashSet;

/// Units of one repository a given user may read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoPermission {
    readable: HashSet<UnitType>,
}

impl RepoPermission {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_units(units: impl IntoIterator<Item = UnitType>) -> Self {
        Self {
            readable: units.into_iter().collect(),
        }
    }

    pub fn can_read(&self, unit: UnitType) -> bool {
        self.readable.contains(&unit)
    }

    pub fn can_read_any(&self) -> bool {
        !self.readable.is_empty()
    }
}

/// Whether `viewer` may see the activity of `target`.
pub fn activity_readable(target: &UserModel, viewer: Option<&UserModel>) -> bool {
    match viewer {
        None => !target.keep_activity_private && target.visibility == Visibility::Public,
        Some(v) if v.is_admin || v.id == target.id => true,
        Some(_) => {
            !target.keep_activity_private
                && matches!(target.visibility, Visibility::Public | Visibility::Limited)
        }
    }
}

/// `SELECT org_id FROM team_users WHERE user_id = ?`
pub fn org_ids_of_member(user_id: i32) -> SelectStatement {
    Query::select()
        .column(team_user::Column::OrgId)
        .from(team_user::Entity)
        .and_where(Expr::col(team_user::Column::UserId).eq(user_id))
        .to_owned()
}

/// Predicate over `repositories` joined with its owner in `users`.
fn accessible_repo_condition(actor: Option<&UserModel>) -> Condition {
    let repo_private = Expr::col((repository::Entity, repository::Column::IsPrivate));
    let owner_visibility = Expr::col((user::Entity, user::Column::Visibility));
    let owner_id = Expr::col((repository::Entity, repository::Column::OwnerId));
    let repo_id = Expr::col((repository::Entity, repository::Column::Id));

    let Some(actor) = actor else {
        return Condition::all()
            .add(repo_private.eq(false))
            .add(owner_visibility.eq(Visibility::Public));
    };

    if actor.is_admin {
        return Condition::all();
    }

    let collaborations = Query::select()
        .column(collaboration::Column::RepoId)
        .from(Collaboration)
        .and_where(Expr::col(collaboration::Column::UserId).eq(actor.id))
        .to_owned();

    let team_repos = Query::select()
        .column((team_repo::Entity, team_repo::Column::RepoId))
        .from(team_repo::Entity)
        .inner_join(
            team_user::Entity,
            Expr::col((team_user::Entity, team_user::Column::TeamId))
                .equals((team_repo::Entity, team_repo::Column::TeamId)),
        )
        .and_where(Expr::col((team_user::Entity, team_user::Column::UserId)).eq(actor.id))
        .to_owned();

    let all_repo_orgs = Query::select()
        .column((team::Entity, team::Column::OrgId))
        .from(team::Entity)
        .inner_join(
            team_user::Entity,
            Expr::col((team_user::Entity, team_user::Column::TeamId))
                .equals((team::Entity, team::Column::Id)),
        )
        .and_where(Expr::col((team_user::Entity, team_user::Column::UserId)).eq(actor.id))
        .and_where(Expr::col((team::Entity, team::Column::IncludesAllRepositories)).eq(true))
        .to_owned();

    Condition::any()
        .add(
            Condition::all().add(repo_private.clone().eq(false)).add(
                owner_visibility.is_in([Visibility::Public, Visibility::Limited]),
            ),
        )
        .add(
            Condition::all()
                .add(repo_private.eq(false))
                .add(owner_id.clone().in_subquery(org_ids_of_member(actor.id))),
        )
        .add(owner_id.clone().eq(actor.id))
        .add(repo_id.clone().in_subquery(collaborations))
        .add(repo_id.in_subquery(team_repos))
        .add(owner_id.in_subquery(all_repo_orgs))
}

/// `SELECT repositories.id` for every repository `actor` may read.
pub fn accessible_repo_ids_query(actor: Option<&UserModel>) -> SelectStatement {
    Query::select()
        .column((repository::Entity, repository::Column::Id))
        .from(repository::Entity)
        .inner_join(
            user::Entity,
            Expr::col((user::Entity, user::Column::Id))
                .equals((repository::Entity, repository::Column::OwnerId)),
        )
        .cond_where(accessible_repo_condition(actor))
        .to_owned()
}

/// Repositories granted to a team: its own list, or every repository of the
/// organization when the team includes all of them.
pub fn team_repo_ids_query(team: &team::Model) -> SelectStatement {
    if team.includes_all_repositories {
        return Query::select()
            .column(repository::Column::Id)
            .from(repository::Entity)
            .and_where(Expr::col(repository::Column::OwnerId).eq(team.org_id))
            .to_owned();
    }
    Query::select()
        .column(team_repo::Column::RepoId)
        .from(team_repo::Entity)
        .and_where(Expr::col(team_repo::Column::TeamId).eq(team.id))
        .to_owned()
}

async fn is_org_member<C: ConnectionTrait>(
    conn: &C,
    org_id: i32,
    user_id: i32,
) -> Result<bool, DbErr> {
    let count = TeamUser::find()
        .filter(team_user::Column::OrgId.eq(org_id))
        .filter(team_user::Column::UserId.eq(user_id))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Units of `repo` readable by `viewer` (anonymous when `None`).
pub async fn repo_permission<C: ConnectionTrait>(
    conn: &C,
    repo: &RepositoryModel,
    viewer: Option<&UserModel>,
) -> Result<RepoPermission, DbErr> {
    let enabled: Vec<UnitType> = RepoUnit::find()
        .select_only()
        .column(repo_unit::Column::UnitType)
        .filter(repo_unit::Column::RepoId.eq(repo.id))
        .into_tuple()
        .all(conn)
        .await?;

    if enabled.is_empty() {
        return Ok(RepoPermission::none());
    }

    let owner = User::find_by_id(repo.owner_id).one(conn).await?;

    let Some(viewer) = viewer else {
        let public_owner = owner
            .as_ref()
            .map(|o| o.visibility == Visibility::Public)
            .unwrap_or(false);
        return Ok(if !repo.is_private && public_owner {
            RepoPermission::from_units(enabled)
        } else {
            RepoPermission::none()
        });
    };

    if viewer.is_admin || viewer.id == repo.owner_id {
        return Ok(RepoPermission::from_units(enabled));
    }

    let collaborator = Collaboration::find()
        .filter(collaboration::Column::RepoId.eq(repo.id))
        .filter(collaboration::Column::UserId.eq(viewer.id))
        .count(conn)
        .await?
        > 0;
    if collaborator {
        return Ok(RepoPermission::from_units(enabled));
    }

    let Some(owner) = owner else {
        return Ok(RepoPermission::none());
    };

    let member = owner.is_organization && is_org_member(conn, owner.id, viewer.id).await?;

    if !repo.is_private {
        let owner_visible = match owner.visibility {
            Visibility::Public | Visibility::Limited => true,
            Visibility::Private => member,
        };
        if owner_visible {
            return Ok(RepoPermission::from_units(enabled));
        }
    }

    if !member {
        return Ok(RepoPermission::none());
    }

    // Teams of the viewer inside the owning organization that cover this repository.
    let teams: Vec<team::Model> = team::Entity::find()
        .filter(team::Column::OrgId.eq(owner.id))
        .filter(
            team::Column::Id.in_subquery(
                Query::select()
                    .column(team_user::Column::TeamId)
                    .from(team_user::Entity)
                    .and_where(Expr::col(team_user::Column::UserId).eq(viewer.id))
                    .to_owned(),
            ),
        )
        .all(conn)
        .await?;

    let mut covering = Vec::new();
    for t in &teams {
        if t.includes_all_repositories {
            covering.push(t.id);
            continue;
        }
        let has_repo = team_repo::Entity::find()
            .filter(team_repo::Column::TeamId.eq(t.id))
            .filter(team_repo::Column::RepoId.eq(repo.id))
            .count(conn)
            .await?
            > 0;
        if has_repo {
            covering.push(t.id);
        }
    }

    if covering.is_empty() {
        return Ok(RepoPermission::none());
    }

    let granted: Vec<UnitType> = TeamUnit::find()
        .select_only()
        .column(team_unit::Column::UnitType)
        .filter(team_unit::Column::TeamId.is_in(covering))
        .filter(team_unit::Column::AccessMode.gte(team_unit::ACCESS_MODE_READ))
        .into_tuple()
        .all(conn)
        .await?;

    Ok(RepoPermission::from_units(
        enabled.into_iter().filter(|u| granted.contains(u)),
    ))
}

pub async fn can_read_unit<C: ConnectionTrait>(
    conn: &C,
    repo: &RepositoryModel,
    viewer: &UserModel,
    unit: UnitType,
) -> Result<bool, DbErr> {
    Ok(repo_permission(conn, repo, Some(viewer)).await?.can_read(unit))
}
