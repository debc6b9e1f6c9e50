use std::env;
use std::time::Duration;

use crate::device::Timeouts;

/// Config holds the settings that come from the environment rather than flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub output_dir: String,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub commit_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secs = |key: &str, default: u64| {
            get(key, &default.to_string())
                .parse()
                .unwrap_or_else(|_| {
                    tracing::warn!("Ignoring invalid {}, using {}s", key, default);
                    default
                })
        };

        Self {
            output_dir: get("IOSXR_OUTPUT_DIR", "."),
            connect_timeout_secs: secs("IOSXR_CONNECT_TIMEOUT", 30),
            command_timeout_secs: secs("IOSXR_COMMAND_TIMEOUT", 60),
            commit_timeout_secs: secs("IOSXR_COMMIT_TIMEOUT", 120),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            command: Duration::from_secs(self.command_timeout_secs),
            commit: Duration::from_secs(self.commit_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = from_map(&[]);
        assert_eq!(cfg.output_dir, ".");
        assert_eq!(cfg.timeouts(), Timeouts::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let cfg = from_map(&[
            ("IOSXR_OUTPUT_DIR", "/var/tmp/xr"),
            ("IOSXR_COMMIT_TIMEOUT", "300"),
            ("IOSXR_CONNECT_TIMEOUT", "soon"),
        ]);
        assert_eq!(cfg.output_dir, "/var/tmp/xr");
        assert_eq!(cfg.commit_timeout_secs, 300);
        assert_eq!(cfg.connect_timeout_secs, 30);
    }
}
