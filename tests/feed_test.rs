mod common;

use forge_activity::config::activity::ActivityConfig;
use forge_activity::error::AppError;
use forge_activity::models::{
    action::issue_content, ActionModel, OpType, RepositoryModel, UnitType, UserModel, Visibility,
};
use forge_activity::services::action::ActionService;
use forge_activity::services::feed::{hydrate, FeedService};
use forge_activity::services::visibility::FeedOptions;
use forge_activity::services::watcher_fanout::{NewAction, WatcherFanout};
use sea_orm::DatabaseConnection;

async fn record(
    db: &DatabaseConnection,
    actor: &UserModel,
    repo: &RepositoryModel,
    op_type: OpType,
    content: String,
) -> ActionModel {
    WatcherFanout::new(db.clone())
        .notify_watchers(NewAction {
            act_user_id: actor.id,
            op_type,
            repo_id: repo.id,
            comment_id: None,
            ref_name: None,
            is_private: repo.is_private,
            content,
        })
        .await
        .expect("Failed to record action")
}

async fn user_feed_len(
    db: &DatabaseConnection,
    target: &UserModel,
    viewer: Option<&UserModel>,
    include_private: bool,
) -> u64 {
    let options = FeedOptions {
        actor: viewer.cloned(),
        requested_user: Some(target.clone()),
        include_private,
        page: 1,
        ..Default::default()
    };
    FeedService::new(db.clone(), ActivityConfig::default())
        .list_feed(&options)
        .await
        .expect("Failed to list feed")
        .total
}

#[tokio::test]
async fn public_activity_is_visible_to_everyone() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let bob = common::create_user(&db, "bob").await;
    let admin = common::make_admin(&db, common::create_user(&db, "admin").await).await;
    let repo = common::create_repo(&db, &alice, false).await;

    record(&db, &alice, &repo, OpType::CreateRepo, String::new()).await;

    assert_eq!(user_feed_len(&db, &alice, None, false).await, 1);
    assert_eq!(user_feed_len(&db, &alice, Some(&bob), false).await, 1);
    assert_eq!(user_feed_len(&db, &alice, Some(&alice), true).await, 1);
    assert_eq!(user_feed_len(&db, &alice, Some(&admin), true).await, 1);
}

#[tokio::test]
async fn private_activity_grows_with_viewer_privilege() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let bob = common::create_user(&db, "bob").await;
    let admin = common::make_admin(&db, common::create_user(&db, "admin").await).await;
    let repo = common::create_repo(&db, &alice, true).await;

    record(&db, &alice, &repo, OpType::CreateRepo, String::new()).await;

    assert_eq!(user_feed_len(&db, &alice, None, false).await, 0);
    // Bob cannot read the repository even when private rows are requested.
    assert_eq!(user_feed_len(&db, &alice, Some(&bob), true).await, 0);
    assert_eq!(user_feed_len(&db, &alice, Some(&alice), false).await, 0);
    assert_eq!(user_feed_len(&db, &alice, Some(&alice), true).await, 1);
    assert_eq!(user_feed_len(&db, &alice, Some(&admin), true).await, 1);

    common::add_collaborator(&db, repo.id, bob.id).await;
    assert_eq!(user_feed_len(&db, &alice, Some(&bob), true).await, 1);
}

#[tokio::test]
async fn making_a_repository_private_hides_its_history() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let repo = common::create_repo(&db, &alice, false).await;

    record(&db, &alice, &repo, OpType::CreateRepo, String::new()).await;
    assert_eq!(user_feed_len(&db, &alice, None, false).await, 1);

    common::set_repo_private(&db, repo, true).await;
    assert_eq!(user_feed_len(&db, &alice, None, false).await, 0);
}

#[tokio::test]
async fn anonymous_viewers_skip_private_profiles() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let repo = common::create_repo(&db, &alice, false).await;
    record(&db, &alice, &repo, OpType::CreateRepo, String::new()).await;

    let alice = common::set_keep_activity_private(&db, alice).await;
    assert_eq!(user_feed_len(&db, &alice, None, false).await, 0);
    assert_eq!(user_feed_len(&db, &alice, Some(&alice), true).await, 1);
}

#[tokio::test]
async fn repository_feed_lists_each_event_once() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let bob = common::create_user(&db, "bob").await;
    let carol = common::create_user(&db, "carol").await;
    let repo = common::create_repo(&db, &alice, false).await;
    common::watch_repo(&db, bob.id, repo.id).await;
    common::watch_repo(&db, carol.id, repo.id).await;

    let original = record(&db, &alice, &repo, OpType::CreateRepo, String::new()).await;

    let options = FeedOptions {
        requested_repo: Some(repo.clone()),
        include_private: true,
        page: 1,
        ..Default::default()
    };
    let feed = FeedService::new(db.clone(), ActivityConfig::default())
        .list_feed(&options)
        .await
        .unwrap();
    assert_eq!(feed.total, 1);
    assert_eq!(feed.items[0].action.id, original.id);
    assert!(feed.items[0].action.is_original());

    // Every watcher still gets a copy in their own feed.
    assert_eq!(user_feed_len(&db, &bob, Some(&bob), true).await, 1);
    assert_eq!(user_feed_len(&db, &carol, Some(&carol), true).await, 1);
}

#[tokio::test]
async fn only_performed_by_drops_copies_of_others() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let bob = common::create_user(&db, "bob").await;
    let repo = common::create_repo(&db, &alice, false).await;
    common::watch_repo(&db, bob.id, repo.id).await;

    record(&db, &alice, &repo, OpType::CreateRepo, String::new()).await;

    let mut options = FeedOptions {
        actor: Some(bob.clone()),
        requested_user: Some(bob.clone()),
        include_private: true,
        page: 1,
        ..Default::default()
    };
    let service = FeedService::new(db.clone(), ActivityConfig::default());
    assert_eq!(service.list_feed(&options).await.unwrap().total, 1);

    options.only_performed_by = true;
    assert_eq!(service.list_feed(&options).await.unwrap().total, 0);
}

#[tokio::test]
async fn deleted_issue_actions_leave_the_feed() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let repo = common::create_repo(&db, &alice, false).await;
    let issue = common::create_issue(&db, &repo, &alice, 3, "Broken build").await;
    let other = common::create_issue(&db, &repo, &alice, 30, "Unrelated").await;

    record(
        &db,
        &alice,
        &repo,
        OpType::CreateIssue,
        issue_content(issue.index, &issue.title),
    )
    .await;
    record(
        &db,
        &alice,
        &repo,
        OpType::CreateIssue,
        issue_content(other.index, &other.title),
    )
    .await;
    assert_eq!(user_feed_len(&db, &alice, None, false).await, 2);

    let removed = ActionService::new(db.clone())
        .delete_issue_actions(repo.id, issue.id, issue.index)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(user_feed_len(&db, &alice, None, false).await, 1);

    let options = FeedOptions {
        requested_user: Some(alice.clone()),
        include_deleted: true,
        page: 1,
        ..Default::default()
    };
    let feed = FeedService::new(db.clone(), ActivityConfig::default())
        .list_feed(&options)
        .await
        .unwrap();
    assert_eq!(feed.total, 2);
}

#[tokio::test]
async fn id_first_paging_matches_offset_paging() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let repo = common::create_repo(&db, &alice, false).await;
    for i in 0..7 {
        record(&db, &alice, &repo, OpType::RenameRepo, format!("old-{}", i)).await;
    }

    let options = FeedOptions {
        requested_user: Some(alice.clone()),
        page: 2,
        page_size: Some(3),
        ..Default::default()
    };

    let direct = ActivityConfig {
        feed_id_first_page_threshold: 100,
        ..Default::default()
    };
    let id_first = ActivityConfig {
        feed_id_first_page_threshold: 1,
        max_in_size: 2,
        ..Default::default()
    };

    let a = FeedService::new(db.clone(), direct)
        .list_feed(&options)
        .await
        .unwrap();
    let b = FeedService::new(db.clone(), id_first)
        .list_feed(&options)
        .await
        .unwrap();

    let ids = |page: &forge_activity::services::feed::FeedPage| {
        page.items.iter().map(|i| i.action.id).collect::<Vec<_>>()
    };
    assert_eq!(a.total, 7);
    assert_eq!(ids(&a).len(), 3);
    assert_eq!(ids(&a), ids(&b));
    // Newest first.
    assert!(ids(&a).windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test]
async fn pages_beyond_any_offset_are_empty() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let repo = common::create_repo(&db, &alice, false).await;
    record(&db, &alice, &repo, OpType::CreateRepo, String::new()).await;

    for threshold in [1, 100] {
        let config = ActivityConfig {
            feed_id_first_page_threshold: threshold,
            ..Default::default()
        };
        for page in [u64::MAX, u64::MAX / 2] {
            let options = FeedOptions {
                requested_user: Some(alice.clone()),
                page,
                ..Default::default()
            };
            let result = FeedService::new(db.clone(), config.clone())
                .list_feed(&options)
                .await
                .unwrap();
            assert_eq!(result.total, 1);
            assert!(result.items.is_empty());
        }
    }
}

#[tokio::test]
async fn team_feed_only_covers_team_repositories() {
    let db = common::setup_db().await;
    let org = common::create_org(&db, "org", Visibility::Public).await;
    let member = common::create_user(&db, "member").await;
    let covered = common::create_repo(&db, &org, false).await;
    let uncovered = common::create_repo(&db, &org, false).await;
    let team = common::create_team(&db, &org, &[UnitType::Code], &[&covered]).await;
    common::add_team_member(&db, &team, member.id).await;

    record(&db, &member, &covered, OpType::CreateRepo, String::new()).await;
    record(&db, &member, &uncovered, OpType::CreateRepo, String::new()).await;

    let options = FeedOptions {
        actor: Some(member.clone()),
        requested_team: Some(team),
        include_private: true,
        page: 1,
        ..Default::default()
    };
    let feed = FeedService::new(db.clone(), ActivityConfig::default())
        .list_feed(&options)
        .await
        .unwrap();
    assert_eq!(feed.total, 1);
    assert_eq!(feed.items[0].action.repo_id, covered.id);
    assert_eq!(feed.items[0].action.user_id, org.id);
}

#[tokio::test]
async fn feed_without_target_is_rejected() {
    let db = common::setup_db().await;
    let result = FeedService::new(db, ActivityConfig::default())
        .list_feed(&FeedOptions::default())
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn date_filter_selects_one_day() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let repo = common::create_repo(&db, &alice, false).await;
    let action = record(&db, &alice, &repo, OpType::CreateRepo, String::new()).await;

    let day = chrono::DateTime::from_timestamp(action.created_unix, 0)
        .unwrap()
        .format("%Y-%m-%d")
        .to_string();

    let service = FeedService::new(db.clone(), ActivityConfig::default());
    let with_date = |date: &str| FeedOptions {
        requested_user: Some(alice.clone()),
        date: Some(date.to_string()),
        page: 1,
        ..Default::default()
    };

    assert_eq!(service.list_feed(&with_date(&day)).await.unwrap().total, 1);
    assert_eq!(service.list_feed(&with_date("2000-01-01")).await.unwrap().total, 0);
    // Unparseable dates apply no filter at all.
    assert_eq!(service.list_feed(&with_date("last tuesday")).await.unwrap().total, 1);
}

#[tokio::test]
async fn hydrate_falls_back_to_ghost_and_flags_missing_repos() {
    let db = common::setup_db().await;
    let alice = common::create_user(&db, "alice").await;
    let repo = common::create_repo(&db, &alice, false).await;
    let issue = common::create_issue(&db, &repo, &alice, 5, "Typo").await;

    let row = |id: i32, act_user_id: i32, repo_id: i32| ActionModel {
        id,
        user_id: act_user_id,
        op_type: OpType::CreateIssue,
        act_user_id,
        repo_id,
        comment_id: None,
        ref_name: None,
        is_private: false,
        content: issue_content(issue.index, &issue.title),
        is_deleted: false,
        created_unix: 0,
    };

    let (items, failed) = hydrate(&db, vec![row(1, 9999, repo.id), row(2, alice.id, 4242)], 50)
        .await
        .unwrap();

    assert!(items[0].act_user.is_ghost());
    assert_eq!(items[0].issue.as_ref().map(|i| i.id), Some(issue.id));
    assert_eq!(items[1].act_user.id, alice.id);
    assert_eq!(failed, vec![1]);
}
