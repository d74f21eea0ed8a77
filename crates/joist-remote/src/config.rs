use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Configuration of the remote debug endpoint.
///
/// Every field has a default, so a missing or partial file behaves like the
/// built-in configuration. Unknown keys are rejected to catch typos.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugServerConfig {
    /// Address the endpoint listens on for the debugger client.
    pub bind: SocketAddr,

    /// Escape line breaks in marshaled property values so they cannot split
    /// wire messages.
    pub escape_line_breaks: bool,

    /// Optional tracing filter directives (e.g. `"joist_debug=debug"`).
    pub log_filter: Option<String>,
}

impl Default for DebugServerConfig {
    fn default() -> Self {
        Self {
            bind: ([127, 0, 0, 1], 4711).into(),
            escape_line_breaks: true,
            log_filter: None,
        }
    }
}

impl DebugServerConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_are_local_and_escaping() {
        let config = DebugServerConfig::default();
        assert_eq!(config.bind.to_string(), "127.0.0.1:4711");
        assert!(config.escape_line_breaks);
        assert_eq!(config.log_filter, None);
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let config: DebugServerConfig = toml::from_str("bind = \"0.0.0.0:9000\"").unwrap();
        assert_eq!(config.bind.to_string(), "0.0.0.0:9000");
        assert!(config.escape_line_breaks);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = toml::from_str::<DebugServerConfig>("escpe_line_breaks = false").unwrap_err();
        assert!(err.to_string().contains("escpe_line_breaks"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joist-debug.toml");
        std::fs::write(&path, "escape_line_breaks = false\nlog_filter = \"debug\"\n").unwrap();

        let config = DebugServerConfig::load_from_path(&path).unwrap();
        assert!(!config.escape_line_breaks);
        assert_eq!(config.log_filter.as_deref(), Some("debug"));

        let missing = DebugServerConfig::load_from_path(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
