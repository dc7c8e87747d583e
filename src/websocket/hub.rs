use dashmap::DashMap;
use serde_json::json;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;

pub type WsSender = mpsc::UnboundedSender<String>;

/// Open notification sockets per user.
#[derive(Clone)]
pub struct NotificationHub {
    connections: Arc<DashMap<i32, Vec<(u64, WsSender)>>>,
    next_conn_id: Arc<AtomicU64>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self, user_id: i32) -> (u64, mpsc::UnboundedReceiver<String>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .entry(user_id)
            .or_default()
            .push((conn_id, tx));
        (conn_id, rx)
    }

    pub fn unsubscribe(&self, user_id: i32, conn_id: u64) {
        let now_empty = match self.connections.get_mut(&user_id) {
            Some(mut senders) => {
                senders.retain(|(id, _)| *id != conn_id);
                senders.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.connections.remove_if(&user_id, |_, senders| senders.is_empty());
        }
    }

    pub fn is_connected(&self, user_id: i32) -> bool {
        self.connections.contains_key(&user_id)
    }

    /// Delivers `message` to every socket of `user_id`, dropping closed ones.
    pub fn send_to_user(&self, user_id: i32, message: &str) {
        let now_empty = match self.connections.get_mut(&user_id) {
            Some(mut senders) => {
                senders.retain(|(_, sender)| sender.send(message.to_string()).is_ok());
                senders.is_empty()
            }
            None => return,
        };
        if now_empty {
            self.connections.remove_if(&user_id, |_, senders| senders.is_empty());
        }
    }

    pub fn send_unread_count(&self, user_id: i32, count: u64) {
        if !self.is_connected(user_id) {
            return;
        }
        let payload = json!({
            "type": "notification_count",
            "count": count,
        });
        self.send_to_user(user_id, &payload.to_string());
    }
}
