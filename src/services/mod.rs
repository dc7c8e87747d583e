pub mod access;
pub mod action;
pub mod cache;
pub mod dispatch;
pub mod feed;
pub mod heatmap;
pub mod notification;
pub mod notification_fanout;
pub mod notifier;
pub mod visibility;
pub mod watcher_fanout;
