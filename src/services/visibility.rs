use crate::config::activity::ActivityConfig;
use crate::models::{action, user, RepositoryModel, TeamModel, UserModel, Visibility};
use crate::services::access;
use chrono::{FixedOffset, NaiveDate, TimeZone};
use sea_orm::{
    sea_query::{Condition, Expr, Query, SelectStatement},
    ColumnTrait,
};

/// What a feed request asks for and who is asking.
#[derive(Debug, Clone, Default)]
pub struct FeedOptions {
    pub actor: Option<UserModel>,
    pub requested_user: Option<UserModel>,
    pub requested_team: Option<TeamModel>,
    pub requested_repo: Option<RepositoryModel>,
    pub include_private: bool,
    pub include_deleted: bool,
    pub only_performed_by: bool,
    /// Calendar day, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// 1-based.
    pub page: u64,
    pub page_size: Option<u64>,
}

impl FeedOptions {
    pub fn has_target(&self) -> bool {
        self.requested_user.is_some()
            || self.requested_team.is_some()
            || self.requested_repo.is_some()
    }
}

fn users_with_public_activity(visibilities: &[Visibility]) -> SelectStatement {
    Query::select()
        .column(user::Column::Id)
        .from(user::Entity)
        .and_where(Expr::col(user::Column::KeepActivityPrivate).eq(false))
        .and_where(Expr::col(user::Column::Visibility).is_in(visibilities.iter().copied()))
        .to_owned()
}

/// Restricts `act_user_id` to identities whose activity the actor may see.
fn acting_user_condition(opts: &FeedOptions) -> Option<Condition> {
    let Some(actor) = opts.actor.as_ref() else {
        return Some(Condition::all().add(
            action::Column::ActUserId.in_subquery(users_with_public_activity(&[Visibility::Public])),
        ));
    };

    if actor.is_admin {
        return None;
    }

    let mut cond = Condition::any()
        .add(action::Column::ActUserId.in_subquery(users_with_public_activity(&[
            Visibility::Public,
            Visibility::Limited,
        ])))
        .add(action::Column::ActUserId.eq(actor.id));

    if let Some(requested) = opts.requested_user.as_ref() {
        if requested.is_organization {
            cond = cond.add(action::Column::ActUserId.eq(requested.id));
        }
        cond = cond.add(
            action::Column::ActUserId.in_subquery(access::org_ids_of_member(requested.id)),
        );
    }

    Some(cond)
}

/// Unix range `[start, start + 86399]` covering `date` in `offset`.
pub fn day_window(date: &str, offset: FixedOffset) -> Option<(i64, i64)> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let midnight = day.and_hms_opt(0, 0, 0)?;
    let start = offset.from_local_datetime(&midnight).single()?.timestamp();
    Some((start, start + 86_399))
}

/// Predicate over `actions` rows visible for `opts`.
///
/// Callers resolve defaults (such as a team's organization standing in for the
/// requested user) before building the condition.
pub fn activity_condition(opts: &FeedOptions, config: &ActivityConfig) -> Condition {
    let mut cond = Condition::all();

    if let Some(acting) = acting_user_condition(opts) {
        cond = cond.add(acting);
    }

    let actor_is_admin = opts.actor.as_ref().map(|a| a.is_admin).unwrap_or(false);
    if !actor_is_admin {
        cond = cond.add(
            action::Column::RepoId
                .in_subquery(access::accessible_repo_ids_query(opts.actor.as_ref())),
        );
    }

    if let Some(repo) = opts.requested_repo.as_ref() {
        cond = cond
            .add(action::Column::RepoId.eq(repo.id))
            .add(
                Expr::col((action::Entity, action::Column::UserId))
                    .equals((action::Entity, action::Column::ActUserId)),
            );
    }

    if let Some(team) = opts.requested_team.as_ref() {
        cond = cond.add(action::Column::RepoId.in_subquery(access::team_repo_ids_query(team)));
    }

    if let Some(requested) = opts.requested_user.as_ref() {
        cond = cond.add(action::Column::UserId.eq(requested.id));
        if opts.only_performed_by {
            cond = cond.add(action::Column::ActUserId.eq(requested.id));
        }
    }

    if !opts.include_private {
        cond = cond.add(action::Column::IsPrivate.eq(false));
    }
    if !opts.include_deleted {
        cond = cond.add(action::Column::IsDeleted.eq(false));
    }

    if let Some(date) = opts.date.as_deref().filter(|d| !d.trim().is_empty()) {
        match day_window(date, config.display_offset) {
            Some((start, end)) => {
                cond = cond.add(action::Column::CreatedUnix.between(start, end));
            }
            None => {
                tracing::warn!("Ignoring malformed feed date filter '{}'", date);
            }
        }
    }

    cond
}
