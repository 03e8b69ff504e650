use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_BROKER_URL: &str = "ws://127.0.0.1:9001";
const DEFAULT_TOPIC_PREFIX: &str = "mesh/rt";
const DEFAULT_STATE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_PORT: u16 = 4500;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TomlConfig ───────────────────────────────────────────────────────────────

/// On-disk layout of meshd.toml. Every field is optional — anything absent
/// falls back to the CLI/env value or the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct TomlConfig {
    broker: BrokerTable,
    state: StateTable,
    server: ServerTable,
    log: LogTable,
}

/// `[broker]` — event broker connection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct BrokerTable {
    /// WebSocket URL of the event broker.
    url: Option<String>,
    /// Root announcement channel; per-runtime channels live under it.
    topic_prefix: Option<String>,
}

/// `[state]` — remote state-snapshot service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct StateTable {
    url: Option<String>,
}

/// `[server]` — the daemon's own REST surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ServerTable {
    port: Option<u16>,
    bind_address: Option<String>,
}

/// `[log]` — logging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LogTable {
    level: Option<String>,
    format: Option<String>,
    file: Option<PathBuf>,
}

// ─── Overrides ────────────────────────────────────────────────────────────────

/// Values taken from the CLI/environment. Anything set here wins over the
/// config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub broker_url: Option<String>,
    pub topic_prefix: Option<String>,
    pub state_url: Option<String>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
}

// ─── MeshdConfig ──────────────────────────────────────────────────────────────

/// Resolved daemon configuration. Precedence: CLI/env > meshd.toml > defaults.
#[derive(Debug, Clone)]
pub struct MeshdConfig {
    pub broker_url: String,
    pub topic_prefix: String,
    pub state_url: String,
    pub port: u16,
    pub bind_address: String,
    pub log_level: String,
    pub log_format: String,
    pub log_file: Option<PathBuf>,
}

impl MeshdConfig {
    pub fn new(overrides: ConfigOverrides, config_path: Option<&Path>) -> Self {
        let file = config_path.and_then(load_toml).unwrap_or_default();

        Self {
            broker_url: overrides
                .broker_url
                .or(file.broker.url)
                .unwrap_or_else(|| DEFAULT_BROKER_URL.to_string()),
            topic_prefix: overrides
                .topic_prefix
                .or(file.broker.topic_prefix)
                .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string()),
            state_url: overrides
                .state_url
                .or(file.state.url)
                .unwrap_or_else(|| DEFAULT_STATE_URL.to_string()),
            port: overrides.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            bind_address: overrides
                .bind_address
                .or(file.server.bind_address)
                .unwrap_or_else(default_bind_address),
            log_level: overrides
                .log_level
                .or(file.log.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_format: overrides
                .log_format
                .or(file.log.format)
                .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string()),
            log_file: overrides.log_file.or(file.log.file),
        }
    }

    /// The broker channel carrying events scoped to one runtime.
    pub fn runtime_channel(&self, runtime_id: &str) -> String {
        format!("{}/{}", self.topic_prefix, runtime_id)
    }
}

impl Default for MeshdConfig {
    fn default() -> Self {
        Self::new(ConfigOverrides::default(), None)
    }
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(config) => Some(config),
        Err(e) => {
            error!(path = %path.display(), "could not parse config file: {e}");
            None
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = MeshdConfig::default();
        assert_eq!(config.broker_url, DEFAULT_BROKER_URL);
        assert_eq!(config.topic_prefix, DEFAULT_TOPIC_PREFIX);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert!(config.log_file.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[broker]\nurl = \"ws://broker:9001\"\ntopic_prefix = \"arena/r\"\n\n[server]\nport = 9999"
        )
        .unwrap();

        let config = MeshdConfig::new(ConfigOverrides::default(), Some(file.path()));
        assert_eq!(config.broker_url, "ws://broker:9001");
        assert_eq!(config.topic_prefix, "arena/r");
        assert_eq!(config.port, 9999);
        // Untouched sections keep their defaults.
        assert_eq!(config.state_url, DEFAULT_STATE_URL);
    }

    #[test]
    fn cli_overrides_beat_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9999").unwrap();

        let overrides = ConfigOverrides {
            port: Some(4501),
            ..Default::default()
        };
        let config = MeshdConfig::new(overrides, Some(file.path()));
        assert_eq!(config.port, 4501);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let config = MeshdConfig::new(
            ConfigOverrides::default(),
            Some(Path::new("/nonexistent/meshd.toml")),
        );
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn runtime_channel_is_prefix_slash_id() {
        let config = MeshdConfig::default();
        assert_eq!(config.runtime_channel("R1"), "mesh/rt/R1");
    }
}
