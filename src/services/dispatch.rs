//! In-process queue that moves issue notification work off the request path.

use crate::{
    config::activity::ActivityConfig,
    services::{notification::NotificationService, notification_fanout::NotificationFanout},
    websocket::hub::NotificationHub,
};
use sea_orm::DatabaseConnection;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueNotificationJob {
    pub issue_id: i32,
    pub comment_id: Option<i32>,
    pub notifier_id: i32,
    /// Targets a single user (mention, assignment) instead of all watchers.
    pub receiver_id: Option<i32>,
}

/// Producer handle. Cheap to clone; pushing never blocks or fails the caller.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<IssueNotificationJob>,
}

/// Owns the consumer task.
pub struct DispatchWorker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl NotificationQueue {
    /// Spawns the consumer loop. Fails when the configured capacity is zero.
    pub fn start(
        db: DatabaseConnection,
        config: ActivityConfig,
        hub: NotificationHub,
    ) -> anyhow::Result<(Self, DispatchWorker)> {
        if config.notify_queue_capacity == 0 {
            return Err(anyhow::anyhow!(
                "NOTIFY_QUEUE_CAPACITY must be greater than zero"
            ));
        }

        let (tx, rx) = mpsc::channel(config.notify_queue_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);

        let fanout = NotificationFanout::new(db.clone(), config);
        let notifications = NotificationService::new(db, hub);
        let handle = tokio::spawn(run(rx, stop_rx, fanout, notifications));

        tracing::info!("Notification dispatch worker started");
        Ok((
            Self { tx },
            DispatchWorker {
                stop: stop_tx,
                handle,
            },
        ))
    }

    pub fn push(&self, job: IssueNotificationJob) {
        if let Err(e) = self.tx.try_send(job) {
            let (reason, job) = match e {
                mpsc::error::TrySendError::Full(job) => ("queue full", job),
                mpsc::error::TrySendError::Closed(job) => ("queue closed", job),
            };
            tracing::error!(
                "Dropping notification job for issue {}: {}",
                job.issue_id,
                reason
            );
        }
    }
}

impl DispatchWorker {
    /// Stops accepting jobs, finishes the queued ones and waits for the loop.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Notification dispatch worker panicked: {}", e);
        }
    }
}

async fn run(
    mut rx: mpsc::Receiver<IssueNotificationJob>,
    mut stop: watch::Receiver<bool>,
    fanout: NotificationFanout,
    notifications: NotificationService,
) {
    loop {
        tokio::select! {
            biased;
            job = rx.recv() => match job {
                Some(job) => handle(&fanout, &notifications, job).await,
                None => break,
            },
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    rx.close();
                    while let Some(job) = rx.recv().await {
                        handle(&fanout, &notifications, job).await;
                    }
                    break;
                }
            }
        }
    }
    tracing::info!("Notification dispatch worker stopped");
}

async fn handle(
    fanout: &NotificationFanout,
    notifications: &NotificationService,
    job: IssueNotificationJob,
) {
    let notified = match fanout
        .upsert_issue_notifications(job.issue_id, job.comment_id, job.notifier_id, job.receiver_id)
        .await
    {
        Ok(notified) => notified,
        Err(e) => {
            tracing::error!(
                "Notification fan-out for issue {} failed: {}",
                job.issue_id,
                e
            );
            return;
        }
    };

    for user_id in notified {
        if let Err(e) = notifications.push_unread_count(user_id).await {
            tracing::warn!("Failed to push unread count to user {}: {}", user_id, e);
        }
    }
}
