pub mod activity;
pub mod database;
pub mod jwt;
pub mod redis;
