use anyhow::Result;
use chrono::{FixedOffset, Offset, Utc};
use std::env;

/// Settings shared by the feed, heatmap and notification services.
#[derive(Debug, Clone)]
pub struct ActivityConfig {
    /// Timezone used to interpret the `date` filter of a feed request.
    pub display_offset: FixedOffset,
    pub feed_page_size: u64,
    pub feed_max_page_size: u64,
    /// Pages at or beyond this number load matching ids before full rows.
    pub feed_id_first_page_threshold: u64,
    /// Upper bound on the number of values in one `IN (...)` list.
    pub max_in_size: usize,
    pub notify_queue_capacity: usize,
    pub work_in_progress_prefixes: Vec<String>,
    /// Actions older than this many days are purged. 0 keeps them forever.
    pub action_retention_days: i64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            display_offset: utc(),
            feed_page_size: 20,
            feed_max_page_size: 50,
            feed_id_first_page_threshold: 10,
            max_in_size: 50,
            notify_queue_capacity: 1024,
            work_in_progress_prefixes: vec!["WIP:".to_string(), "[WIP]".to_string()],
            action_retention_days: 0,
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// A century; longer periods would overflow date arithmetic downstream.
const MAX_RETENTION_DAYS: i64 = 36_500;

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl ActivityConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let display_offset = match env::var("ACTIVITY_TIMEZONE") {
            Ok(raw) => raw.trim().parse::<FixedOffset>().map_err(|e| {
                anyhow::anyhow!("ACTIVITY_TIMEZONE must look like +08:00, got '{}': {}", raw, e)
            })?,
            Err(_) => defaults.display_offset,
        };

        let work_in_progress_prefixes = match env::var("WIP_PREFIXES") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => defaults.work_in_progress_prefixes,
        };

        let config = Self {
            display_offset,
            feed_page_size: parse_env("FEED_PAGE_SIZE", defaults.feed_page_size),
            feed_max_page_size: parse_env("FEED_MAX_PAGE_SIZE", defaults.feed_max_page_size),
            feed_id_first_page_threshold: parse_env(
                "FEED_ID_FIRST_PAGE",
                defaults.feed_id_first_page_threshold,
            ),
            max_in_size: parse_env("DB_MAX_IN_SIZE", defaults.max_in_size),
            notify_queue_capacity: parse_env(
                "NOTIFY_QUEUE_CAPACITY",
                defaults.notify_queue_capacity,
            ),
            work_in_progress_prefixes,
            action_retention_days: parse_env(
                "ACTION_RETENTION_DAYS",
                defaults.action_retention_days,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_in_size == 0 {
            return Err(anyhow::anyhow!("DB_MAX_IN_SIZE must be greater than zero"));
        }
        if self.feed_max_page_size == 0 {
            return Err(anyhow::anyhow!("FEED_MAX_PAGE_SIZE must be greater than zero"));
        }
        if self.action_retention_days > MAX_RETENTION_DAYS {
            return Err(anyhow::anyhow!(
                "ACTION_RETENTION_DAYS must be at most {}, got {}",
                MAX_RETENTION_DAYS,
                self.action_retention_days
            ));
        }
        Ok(())
    }

    /// Age past which actions are purged; `None` keeps them forever.
    pub fn retention(&self) -> Option<chrono::Duration> {
        if self.action_retention_days <= 0 {
            return None;
        }
        chrono::Duration::try_days(self.action_retention_days.min(MAX_RETENTION_DAYS))
    }

    /// Resolves a requested page size against the configured default and cap.
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(0) | None => self.feed_page_size.min(self.feed_max_page_size),
            Some(n) => n.min(self.feed_max_page_size),
        }
    }

    /// Whether a pull request title marks it as work in progress.
    pub fn is_work_in_progress(&self, title: &str) -> bool {
        let title = title.trim_start().to_uppercase();
        self.work_in_progress_prefixes
            .iter()
            .any(|prefix| title.starts_with(&prefix.to_uppercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_defaults_and_caps() {
        let config = ActivityConfig::default();
        assert_eq!(config.page_size(None), 20);
        assert_eq!(config.page_size(Some(0)), 20);
        assert_eq!(config.page_size(Some(5)), 5);
        assert_eq!(config.page_size(Some(500)), 50);
    }

    #[test]
    fn wip_detection_ignores_case() {
        let config = ActivityConfig::default();
        assert!(config.is_work_in_progress("WIP: new parser"));
        assert!(config.is_work_in_progress("wip: new parser"));
        assert!(config.is_work_in_progress("[wip] new parser"));
        assert!(!config.is_work_in_progress("Parser: WIP cleanup"));
    }

    #[test]
    fn retention_is_bounded() {
        let mut config = ActivityConfig::default();
        assert!(config.retention().is_none());

        config.action_retention_days = 30;
        assert!(config.validate().is_ok());
        assert_eq!(config.retention(), Some(chrono::Duration::days(30)));

        config.action_retention_days = i64::MAX;
        assert!(config.validate().is_err());
        assert!(config.retention().is_some());
    }

    #[test]
    fn default_offset_is_utc() {
        assert_eq!(ActivityConfig::default().display_offset.local_minus_utc(), 0);
    }
}
