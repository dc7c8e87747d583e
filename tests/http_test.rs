mod common;

use forge_activity::config::activity::ActivityConfig;
use forge_activity::models::OpType;
use forge_activity::services::notification::NotificationService;
use forge_activity::services::notification_fanout::NotificationFanout;
use forge_activity::services::watcher_fanout::{NewAction, WatcherFanout};
use forge_activity::websocket::hub::NotificationHub;
use serde_json::Value;

#[tokio::test]
async fn anonymous_user_feed_lists_public_activity() {
    let app = common::spawn_app().await;
    let alice = common::create_user(&app.db, "alice").await;
    let public_repo = common::create_repo(&app.db, &alice, false).await;
    let private_repo = common::create_repo(&app.db, &alice, true).await;

    for repo in [&public_repo, &private_repo] {
        WatcherFanout::new(app.db.clone())
            .notify_watchers(NewAction {
                act_user_id: alice.id,
                op_type: OpType::CreateRepo,
                repo_id: repo.id,
                comment_id: None,
                ref_name: None,
                is_private: repo.is_private,
                content: String::new(),
            })
            .await
            .unwrap();
    }

    let resp = app
        .client
        .get(app.url(&format!("/users/{}/activities", alice.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["success"].as_bool().unwrap());
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["repo_id"], public_repo.id);
    assert_eq!(body["data"]["items"][0]["op_type"], "create_repo");

    let resp = app
        .client
        .get(app.url(&format!("/users/{}/activities", alice.id)))
        .bearer_auth(common::token_for(alice.id))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn unknown_user_feed_is_not_found() {
    let app = common::spawn_app().await;
    let resp = app
        .client
        .get(app.url("/users/4242/activities"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let app = common::spawn_app().await;
    let alice = common::create_user(&app.db, "alice").await;
    let resp = app
        .client
        .get(app.url(&format!("/users/{}/activities", alice.id)))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn heatmap_endpoint_returns_buckets() {
    let app = common::spawn_app().await;
    let alice = common::create_user(&app.db, "alice").await;

    let resp = app
        .client
        .get(app.url(&format!("/users/{}/heatmap", alice.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total_contributions"], 0);
    assert!(body["data"]["buckets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn notifications_require_a_token() {
    let app = common::spawn_app().await;
    let resp = app
        .client
        .get(app.url("/notifications"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn notification_inbox_round_trip() {
    let app = common::spawn_app().await;
    let alice = common::create_user(&app.db, "alice").await;
    let bob = common::create_user(&app.db, "bob").await;
    let repo = common::create_repo(&app.db, &alice, false).await;
    common::watch_repo(&app.db, bob.id, repo.id).await;
    for index in 1..=2 {
        let issue = common::create_issue(&app.db, &repo, &alice, index, "Bug").await;
        NotificationFanout::new(app.db.clone(), ActivityConfig::default())
            .upsert_issue_notifications(issue.id, None, alice.id, None)
            .await
            .unwrap();
    }
    let token = common::token_for(bob.id);

    let resp = app
        .client
        .get(app.url("/notifications/unread-count"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["count"], 2);

    let resp = app
        .client
        .get(app.url("/notifications?status=unread"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 2);
    let first_id = body["data"]["items"][0]["id"].as_i64().unwrap();

    let resp = app
        .client
        .patch(app.url(&format!("/notifications/{}", first_id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "status": "pinned" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "pinned");

    // Someone else's notification.
    let resp = app
        .client
        .patch(app.url(&format!("/notifications/{}", first_id)))
        .bearer_auth(common::token_for(alice.id))
        .json(&serde_json::json!({ "status": "read" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(app.url("/notifications"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "from": "unread", "to": "read" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["updated"], 1);

    let resp = app
        .client
        .get(app.url("/notifications?status=bogus"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn push_event_records_activity_and_heatmap() {
    let app = common::spawn_app().await;
    let alice = common::create_user(&app.db, "alice").await;
    let repo = common::create_repo(&app.db, &alice, false).await;
    let now = chrono::Utc::now().timestamp();

    let resp = app
        .client
        .post(app.url(&format!("/repos/{}/events/push", repo.id)))
        .bearer_auth(common::token_for(alice.id))
        .json(&serde_json::json!({
            "ref_name": "refs/heads/main",
            "commits": [
                { "sha": "abc", "message": "Fix", "author_name": "alice", "timestamp": now - 60 },
                { "sha": "def", "message": "Tidy", "author_name": "alice", "timestamp": now - 30 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["op_type"], "commit_repo");
    assert_eq!(body["data"]["ref_name"], "refs/heads/main");

    let resp = app
        .client
        .get(app.url(&format!("/users/{}/activities", alice.id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 1);

    let resp = app
        .client
        .get(app.url(&format!("/users/{}/heatmap", alice.id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total_contributions"], 2);
}

#[tokio::test]
async fn push_event_checks_caller_and_ref() {
    let app = common::spawn_app().await;
    let alice = common::create_user(&app.db, "alice").await;
    let bob = common::create_user(&app.db, "bob").await;
    let repo = common::create_repo(&app.db, &alice, true).await;
    let push = serde_json::json!({ "ref_name": "refs/heads/main", "commits": [] });
    let url = app.url(&format!("/repos/{}/events/push", repo.id));

    let resp = app.client.post(&url).json(&push).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .post(&url)
        .bearer_auth(common::token_for(bob.id))
        .json(&push)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .post(&url)
        .bearer_auth(common::token_for(alice.id))
        .json(&serde_json::json!({ "ref_name": "main", "commits": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = app
        .client
        .post(app.url("/repos/4242/events/ref"))
        .bearer_auth(common::token_for(alice.id))
        .json(&serde_json::json!({ "ref_name": "refs/tags/v1.0" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn issue_comment_event_notifies_watchers() {
    let app = common::spawn_app().await;
    let alice = common::create_user(&app.db, "alice").await;
    let bob = common::create_user(&app.db, "bob").await;
    let repo = common::create_repo(&app.db, &alice, false).await;
    common::watch_repo(&app.db, bob.id, repo.id).await;
    let issue = common::create_issue(&app.db, &repo, &alice, 3, "Timeouts").await;
    let comment = common::create_comment(&app.db, &issue, &alice, "Seen on CI").await;
    let token = common::token_for(alice.id);
    let url = app.url(&format!("/issues/{}/events", issue.id));

    let resp = app
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&serde_json::json!({ "kind": "commented", "comment_id": comment.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["op_type"], "comment_issue");
    assert_eq!(body["data"]["content"], "3|Seen on CI");

    // Reviews only apply to pull requests.
    let resp = app
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&serde_json::json!({ "kind": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = app
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&serde_json::json!({ "kind": "commented" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let common::TestApp { db, worker, .. } = app;
    worker.shutdown().await;
    let unread = NotificationService::new(db, NotificationHub::new())
        .unread_count(bob.id)
        .await
        .unwrap();
    assert_eq!(unread, 1);
}
