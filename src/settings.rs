//! Process-wide reconciler settings.
//!
//! # Environment
//!
//! - `RECONCILER_POLL_INTERVAL_SECS`: seconds between polling rounds. Unset
//!   or zero means the driver does not poll on a fixed interval.
//! - `RECONCILER_ALWAYS_QUEUE`: trigger builds even when the runner queue is
//!   busy (`1`/`true`/`yes`).
//! - `RECONCILER_STAGES`: comma-separated stage names, in order.
//! - `RECONCILER_CACHE_PATH`: path of the persistent cache.
//! - `RECONCILER_CANCEL_WINDOW_SECS`: age beyond which running builds are
//!   left alone by auto-cancellation.
//!
//! Repository settings fetched from the review host override `stages` and
//! `always_queue` for the runs of that repository.

use std::path::PathBuf;
use std::time::Duration;

use crate::effects::RepoSettings;
use crate::types::Stage;

/// Default stages, in order.
const DEFAULT_STAGES: [&str; 3] = ["build", "test", "deploy"];

/// Cache retention when no poll interval is configured (2000 seconds).
const FALLBACK_CACHE_TTL_SECS: u64 = 2000;

/// Default auto-cancel recency window (4 hours).
const DEFAULT_CANCEL_WINDOW_SECS: u64 = 4 * 3600;

const DEFAULT_CACHE_PATH: &str = ".reconciler-cache";

/// Settings shared by every run of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Interval between polling rounds, if the driver polls.
    pub poll_interval: Option<Duration>,

    /// Trigger builds even when the runner queue is not empty.
    pub always_queue: bool,

    /// Declared stages, in order.
    pub stages: Vec<Stage>,

    /// Path of the persistent cache store.
    pub cache_path: PathBuf,

    /// Running builds older than this are never auto-cancelled.
    pub cancel_window: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            poll_interval: None,
            always_queue: false,
            stages: DEFAULT_STAGES.iter().map(|name| Stage::new(*name)).collect(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            cancel_window: Duration::from_secs(DEFAULT_CANCEL_WINDOW_SECS),
        }
    }
}

impl Settings {
    /// Creates `Settings` from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates `Settings` from an arbitrary key lookup.
    ///
    /// Unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();

        let poll_interval = lookup("RECONCILER_POLL_INTERVAL_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let always_queue = lookup("RECONCILER_ALWAYS_QUEUE")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.always_queue);

        let stages = lookup("RECONCILER_STAGES")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(Stage::new)
                    .collect::<Vec<_>>()
            })
            .filter(|stages| !stages.is_empty())
            .unwrap_or(defaults.stages);

        let cache_path = lookup("RECONCILER_CACHE_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_path);

        let cancel_window = lookup("RECONCILER_CANCEL_WINDOW_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cancel_window);

        Settings {
            poll_interval,
            always_queue,
            stages,
            cache_path,
            cancel_window,
        }
    }

    /// How long a cache entry survives without being revalidated.
    ///
    /// Two polling rounds, or 2000 seconds when no interval is configured.
    pub fn cache_ttl(&self) -> Duration {
        match self.poll_interval {
            Some(interval) if !interval.is_zero() => interval * 2,
            _ => Duration::from_secs(FALLBACK_CACHE_TTL_SECS),
        }
    }

    /// Returns these settings with repository overrides applied.
    pub fn with_repo(&self, repo: &RepoSettings) -> Settings {
        let mut settings = self.clone();
        if let Some(stages) = repo.stages.as_ref().filter(|stages| !stages.is_empty()) {
            settings.stages = stages.clone();
        }
        if let Some(always_queue) = repo.always_queue {
            settings.always_queue = always_queue;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["build", "test", "deploy"]
        );
        assert_eq!(settings.cancel_window, Duration::from_secs(4 * 3600));
    }

    #[test]
    fn reads_every_variable() {
        let settings = Settings::from_lookup(lookup(&[
            ("RECONCILER_POLL_INTERVAL_SECS", "30"),
            ("RECONCILER_ALWAYS_QUEUE", "true"),
            ("RECONCILER_STAGES", "build, deploy"),
            ("RECONCILER_CACHE_PATH", "/var/cache/reconciler"),
            ("RECONCILER_CANCEL_WINDOW_SECS", "60"),
        ]));
        assert_eq!(settings.poll_interval, Some(Duration::from_secs(30)));
        assert!(settings.always_queue);
        assert_eq!(settings.stages, vec![Stage::new("build"), Stage::new("deploy")]);
        assert_eq!(settings.cache_path, PathBuf::from("/var/cache/reconciler"));
        assert_eq!(settings.cancel_window, Duration::from_secs(60));
    }

    #[test]
    fn invalid_values_fall_back() {
        let settings = Settings::from_lookup(lookup(&[
            ("RECONCILER_POLL_INTERVAL_SECS", "soon"),
            ("RECONCILER_STAGES", " , "),
        ]));
        assert_eq!(settings.poll_interval, None);
        assert_eq!(settings.stages.len(), 3);
    }

    #[test]
    fn cache_ttl_is_two_rounds() {
        let settings = Settings {
            poll_interval: Some(Duration::from_secs(300)),
            ..Settings::default()
        };
        assert_eq!(settings.cache_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn cache_ttl_fallback() {
        assert_eq!(Settings::default().cache_ttl(), Duration::from_secs(2000));
        let zero = Settings::from_lookup(lookup(&[("RECONCILER_POLL_INTERVAL_SECS", "0")]));
        assert_eq!(zero.cache_ttl(), Duration::from_secs(2000));
    }

    #[test]
    fn repo_settings_override() {
        let repo = RepoSettings {
            stages: Some(vec![Stage {
                name: "deploy".into(),
                external: vec!["deploy/prod".into()],
            }]),
            always_queue: Some(true),
        };
        let settings = Settings::default().with_repo(&repo);
        assert_eq!(settings.stages.len(), 1);
        assert!(settings.always_queue);

        let unchanged = Settings::default().with_repo(&RepoSettings::default());
        assert_eq!(unchanged, Settings::default());
    }
}
