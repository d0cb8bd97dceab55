use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::commands::GroupFallback;
use crate::gateway::ReconnectPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Client configuration, loaded from chatlink.toml.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub client: ClientSection,
    pub reconnect: ReconnectSection,
    pub commands: CommandsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub token: String,
    pub api_url: String,
    /// Gateway URL. When unset it is taken from the API root document.
    pub ws_url: Option<String>,
    /// Authenticate as a bot (`x-bot-token`) rather than a user session.
    pub bot: bool,
    pub max_messages: usize,
    pub heartbeat_secs: u64,
    /// Fetch every server's member list over HTTP after `ready`.
    pub fetch_members_on_ready: bool,
    /// Upper bound on a single REST call.
    pub request_timeout_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: "https://api.revolt.chat".into(),
            ws_url: None,
            bot: true,
            max_messages: crate::cache::DEFAULT_MAX_MESSAGES,
            heartbeat_secs: 15,
            fetch_members_on_ready: true,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectSection {
    pub enabled: bool,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// Unbounded when unset.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_backoff_secs: 1,
            max_backoff_secs: 30,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandsSection {
    pub prefixes: Vec<String>,
    pub case_insensitive: bool,
    pub group_fallback: GroupFallback,
    pub help_command: bool,
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self {
            prefixes: vec!["!".into()],
            case_insensitive: false,
            group_fallback: GroupFallback::default(),
            help_command: true,
        }
    }
}

impl ClientConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
            Self::from_toml(path, &contents)?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_toml(path: &str, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("CHATLINK_TOKEN") {
            self.client.token = v;
        }
        if let Some(v) = var("CHATLINK_API_URL") {
            self.client.api_url = v;
        }
        if let Some(v) = var("CHATLINK_WS_URL") {
            self.client.ws_url = Some(v);
        }
        if let Some(v) = var("CHATLINK_MAX_MESSAGES")
            && let Ok(max) = v.parse()
        {
            self.client.max_messages = max;
        }
        if let Some(v) = var("CHATLINK_REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            self.client.request_timeout_secs = secs;
        }
        if let Some(v) = var("CHATLINK_PREFIXES") {
            let prefixes: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !prefixes.is_empty() {
                self.commands.prefixes = prefixes;
            }
        }
        if let Some(v) = var("CHATLINK_CASE_INSENSITIVE")
            && let Ok(flag) = v.parse()
        {
            self.commands.case_insensitive = flag;
        }
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.client.heartbeat_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_secs.max(1))
    }

    /// Convert into the connection manager's backoff policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.reconnect.enabled,
            initial: Duration::from_secs(self.reconnect.initial_backoff_secs),
            max: Duration::from_secs(self.reconnect.max_backoff_secs),
            max_attempts: self.reconnect.max_attempts,
            ..ReconnectPolicy::default()
        }
    }
}
