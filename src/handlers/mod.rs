pub mod activity;
pub mod event;
pub mod heatmap;
pub mod notification;
