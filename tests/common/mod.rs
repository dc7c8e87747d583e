#![allow(dead_code)]

use forge_activity::config::activity::ActivityConfig;
use forge_activity::models::{
    collaboration, comment, issue, issue_watch, repo_unit, repository, team, team_repo, team_unit,
    team_user, user, watch, CommentModel, IssueModel, RepositoryModel, TeamModel, UnitType,
    UserModel, Visibility, WatchMode,
};
use forge_activity::services::dispatch::{DispatchWorker, NotificationQueue};
use forge_activity::services::heatmap::HeatmapService;
use forge_activity::services::notification::NotificationService;
use forge_activity::services::notifier::ActivityNotifier;
use forge_activity::utils::jwt::Claims;
use forge_activity::websocket::hub::NotificationHub;
use reqwest::Client;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Once,
};

static INIT: Once = Once::new();
static NAME_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub const JWT_SECRET: &str = "integration_test_secret_that_is_at_least_32_characters_long";

fn init_env() {
    INIT.call_once(|| {
        let _ = forge_activity::utils::jwt::init_jwt_config(
            forge_activity::config::jwt::JwtConfig {
                secret: JWT_SECRET.to_string(),
                leeway_secs: 0,
            },
        );
    });
}

/// Fresh migrated in-memory database. One connection, so every query sees the
/// same database.
pub async fn setup_db() -> DatabaseConnection {
    init_env();

    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt)
        .await
        .expect("Failed to open in-memory database");

    forge_activity::migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, NAME_COUNTER.fetch_add(1, Ordering::SeqCst))
}

pub fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub async fn create_user(db: &DatabaseConnection, prefix: &str) -> UserModel {
    create_account(db, prefix, false, Visibility::Public).await
}

pub async fn create_org(db: &DatabaseConnection, prefix: &str, visibility: Visibility) -> UserModel {
    create_account(db, prefix, true, visibility).await
}

pub async fn create_account(
    db: &DatabaseConnection,
    prefix: &str,
    is_organization: bool,
    visibility: Visibility,
) -> UserModel {
    user::ActiveModel {
        name: Set(unique(prefix)),
        full_name: Set(String::new()),
        is_admin: Set(false),
        is_organization: Set(is_organization),
        visibility: Set(visibility),
        keep_activity_private: Set(false),
        created_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user")
}

pub async fn make_admin(db: &DatabaseConnection, user: UserModel) -> UserModel {
    let mut active: user::ActiveModel = user.into();
    active.is_admin = Set(true);
    active.update(db).await.expect("Failed to make admin")
}

pub async fn set_keep_activity_private(db: &DatabaseConnection, user: UserModel) -> UserModel {
    let mut active: user::ActiveModel = user.into();
    active.keep_activity_private = Set(true);
    active.update(db).await.expect("Failed to update user")
}

/// Repository with every unit enabled.
pub async fn create_repo(db: &DatabaseConnection, owner: &UserModel, is_private: bool) -> RepositoryModel {
    let repo = repository::ActiveModel {
        owner_id: Set(owner.id),
        name: Set(unique("repo")),
        is_private: Set(is_private),
        created_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create repository");

    for unit in [
        UnitType::Code,
        UnitType::Issues,
        UnitType::PullRequests,
        UnitType::Releases,
    ] {
        repo_unit::ActiveModel {
            repo_id: Set(repo.id),
            unit_type: Set(unit),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to enable unit");
    }
    repo
}

pub async fn set_repo_private(db: &DatabaseConnection, repo: RepositoryModel, is_private: bool) -> RepositoryModel {
    let mut active: repository::ActiveModel = repo.into();
    active.is_private = Set(is_private);
    active.update(db).await.expect("Failed to update repository")
}

pub async fn watch_repo(db: &DatabaseConnection, user_id: i32, repo_id: i32) {
    watch::ActiveModel {
        user_id: Set(user_id),
        repo_id: Set(repo_id),
        mode: Set(WatchMode::Normal),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to watch repository");
}

pub async fn add_collaborator(db: &DatabaseConnection, repo_id: i32, user_id: i32) {
    collaboration::ActiveModel {
        repo_id: Set(repo_id),
        user_id: Set(user_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to add collaborator");
}

/// Team of `org` with read access to `units`, covering `repos`.
pub async fn create_team(
    db: &DatabaseConnection,
    org: &UserModel,
    units: &[UnitType],
    repos: &[&RepositoryModel],
) -> TeamModel {
    let team = team::ActiveModel {
        org_id: Set(org.id),
        name: Set(unique("team")),
        includes_all_repositories: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create team");

    for unit in units {
        team_unit::ActiveModel {
            team_id: Set(team.id),
            unit_type: Set(*unit),
            access_mode: Set(team_unit::ACCESS_MODE_READ),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to grant unit");
    }
    for repo in repos {
        team_repo::ActiveModel {
            org_id: Set(org.id),
            team_id: Set(team.id),
            repo_id: Set(repo.id),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to add team repository");
    }
    team
}

pub async fn add_team_member(db: &DatabaseConnection, team: &TeamModel, user_id: i32) {
    team_user::ActiveModel {
        org_id: Set(team.org_id),
        team_id: Set(team.id),
        user_id: Set(user_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to add team member");
}

pub async fn create_issue(
    db: &DatabaseConnection,
    repo: &RepositoryModel,
    poster: &UserModel,
    index: i64,
    title: &str,
) -> IssueModel {
    create_issue_with(db, repo, poster, index, title, false).await
}

pub async fn create_issue_with(
    db: &DatabaseConnection,
    repo: &RepositoryModel,
    poster: &UserModel,
    index: i64,
    title: &str,
    is_pull: bool,
) -> IssueModel {
    issue::ActiveModel {
        repo_id: Set(repo.id),
        index: Set(index),
        poster_id: Set(poster.id),
        title: Set(title.to_string()),
        content: Set(String::new()),
        is_pull: Set(is_pull),
        is_closed: Set(false),
        created_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create issue")
}

pub async fn create_comment(
    db: &DatabaseConnection,
    issue: &IssueModel,
    poster: &UserModel,
    content: &str,
) -> CommentModel {
    comment::ActiveModel {
        issue_id: Set(issue.id),
        poster_id: Set(poster.id),
        content: Set(content.to_string()),
        created_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create comment")
}

pub async fn set_issue_watch(db: &DatabaseConnection, issue_id: i32, user_id: i32, is_watching: bool) {
    issue_watch::ActiveModel {
        user_id: Set(user_id),
        issue_id: Set(issue_id),
        is_watching: Set(is_watching),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to set issue watch");
}

pub fn token_for(user_id: i32) -> String {
    init_env();
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
        token_type: Some("access".to_string()),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub hub: NotificationHub,
    /// Drains the notification jobs queued by event requests on shutdown.
    pub worker: DispatchWorker,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }
}

pub async fn spawn_app() -> TestApp {
    let db = setup_db().await;
    let hub = NotificationHub::new();
    let cache: Option<forge_activity::services::cache::CacheService> = None;
    let (queue, worker) =
        NotificationQueue::start(db.clone(), ActivityConfig::default(), hub.clone())
            .expect("Failed to start dispatch queue");
    let notifier = Arc::new(ActivityNotifier::new(
        db.clone(),
        HeatmapService::new(db.clone(), None),
        NotificationService::new(db.clone(), hub.clone()),
        queue,
    ));

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(forge_activity::routes::create_routes())
        .layer(axum::extract::Extension(db.clone()))
        .layer(axum::extract::Extension(hub.clone()))
        .layer(axum::extract::Extension(ActivityConfig::default()))
        .layer(axum::extract::Extension(cache))
        .layer(axum::extract::Extension(notifier));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        db,
        hub,
        worker,
        client: Client::new(),
    }
}
