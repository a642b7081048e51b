//! Server configuration read from the environment.
//!
//! | variable                        | default                   |
//! |---------------------------------|---------------------------|
//! | `NETFORGE_DB_PATH`              | `netforge.db`             |
//! | `NETFORGE_PORT`                 | `3000`                    |
//! | `NETFORGE_TRAINING_URL`         | `http://127.0.0.1:3500`   |
//! | `NETFORGE_POLL_INTERVAL_MS`     | `1000`                    |
//! | `NETFORGE_POLL_TIMEOUT_SECS`    | `1800`                    |
//! | `NETFORGE_REQUEST_TIMEOUT_SECS` | `30`                      |
//! | `NETFORGE_JOB_RETENTION_SECS`   | `3600`                    |
//! | `NETFORGE_INITIAL_SPATIAL_SIZE` | `128`                     |
//! | `NETFORGE_OUTPUT_CLASSES`       | `10`                      |

use std::str::FromStr;
use std::time::Duration;

use netforge_core::ShapeConfig;

use crate::jobs::PollSettings;
use crate::training::DEFAULT_REQUEST_TIMEOUT;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: String,
    pub port: u16,
    /// Base URL of the training and inference service, without trailing slash.
    pub training_url: String,
    pub poll: PollSettings,
    /// Upper bound for any single call to the training service.
    pub request_timeout: Duration,
    /// How long an ended training job stays queryable.
    pub job_retention: Duration,
    pub shape: ShapeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            db_path: "netforge.db".to_string(),
            port: 3000,
            training_url: "http://127.0.0.1:3500".to_string(),
            poll: PollSettings::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            job_retention: Duration::from_secs(60 * 60),
            shape: ShapeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unparsable values fall
    /// back to the default with a warning.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ServerConfig::default();
        let interval_ms = parse_or(
            &get,
            "NETFORGE_POLL_INTERVAL_MS",
            defaults.poll.interval.as_millis() as u64,
        );
        let timeout_secs = parse_or(&get, "NETFORGE_POLL_TIMEOUT_SECS", defaults.poll.timeout.as_secs());
        let request_secs = parse_or(
            &get,
            "NETFORGE_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        );
        let retention_secs = parse_or(
            &get,
            "NETFORGE_JOB_RETENTION_SECS",
            defaults.job_retention.as_secs(),
        );

        ServerConfig {
            db_path: get("NETFORGE_DB_PATH").unwrap_or(defaults.db_path),
            port: parse_or(&get, "NETFORGE_PORT", defaults.port),
            training_url: get("NETFORGE_TRAINING_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.training_url),
            poll: PollSettings {
                interval: Duration::from_millis(interval_ms.max(1)),
                timeout: Duration::from_secs(timeout_secs),
            },
            request_timeout: Duration::from_secs(request_secs.max(1)),
            job_retention: Duration::from_secs(retention_secs),
            shape: ShapeConfig {
                initial_spatial_size: parse_or(
                    &get,
                    "NETFORGE_INITIAL_SPATIAL_SIZE",
                    defaults.shape.initial_spatial_size,
                ),
                output_classes: parse_or(&get, "NETFORGE_OUTPUT_CLASSES", defaults.shape.output_classes),
                ..defaults.shape
            },
        }
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring invalid {}={:?}, using default", key, raw);
            default
        }),
        None => default,
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
    fn test_defaults_without_env() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, "netforge.db");
        assert_eq!(config.poll.timeout, Duration::from_secs(1800));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.job_retention, Duration::from_secs(3600));
        assert_eq!(config.shape, ShapeConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("NETFORGE_PORT", "8080"),
            ("NETFORGE_TRAINING_URL", "http://trainer:9000/"),
            ("NETFORGE_POLL_INTERVAL_MS", "250"),
            ("NETFORGE_INITIAL_SPATIAL_SIZE", "224"),
            ("NETFORGE_REQUEST_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.port, 8080);
        assert_eq!(config.training_url, "http://trainer:9000");
        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert_eq!(config.shape.initial_spatial_size, 224);
        assert_eq!(config.shape.input_channels, 3);
    }

    #[test]
    fn test_invalid_value_falls_back() {
        let config = ServerConfig::from_lookup(lookup(&[("NETFORGE_PORT", "eighty")]));
        assert_eq!(config.port, 3000);
    }
}
