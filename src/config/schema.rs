use crate::detector::PersistOrder;
use crate::directory::ModuleVersion;
use crate::error::ConfigError;
use crate::notify::{DEFAULT_MAX_CONVERSATION_PAGES, StrategyName};
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".onboard-relay";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`).
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Channel that receives messages no individual path could deliver.
    #[serde(default)]
    pub fallback_channel: Option<String>,
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    #[serde(default = "default_conversation_page_size")]
    pub conversation_page_size: u32,
    #[serde(default = "default_max_conversation_pages")]
    pub max_conversation_pages: usize,
    /// Delivery strategy order.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyName>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            fallback_channel: None,
            api_base: default_slack_api_base(),
            conversation_page_size: default_conversation_page_size(),
            max_conversation_pages: default_max_conversation_pages(),
            strategies: default_strategies(),
        }
    }
}

fn default_slack_api_base() -> String {
    crate::transport::slack::DEFAULT_API_BASE.to_string()
}

fn default_conversation_page_size() -> u32 {
    200
}

fn default_max_conversation_pages() -> usize {
    DEFAULT_MAX_CONVERSATION_PAGES
}

fn default_strategies() -> Vec<StrategyName> {
    StrategyName::DEFAULT_ORDER.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Optional; without it only public repositories are listed.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_true")]
    pub include_forks: bool,
    #[serde(default)]
    pub include_archived: bool,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_github_api_base(),
            per_page: default_per_page(),
            include_forks: true,
            include_archived: false,
        }
    }
}

fn default_github_api_base() -> String {
    crate::sources::github::DEFAULT_API_BASE.to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Total attempts for a rate-limited call, first one included.
    #[serde(default = "default_rate_limit_attempts")]
    pub rate_limit_attempts: u32,
    /// Fixed wait between rate-limited attempts.
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            rate_limit_attempts: default_rate_limit_attempts(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
        }
    }
}

fn default_rate_limit_attempts() -> u32 {
    5
}

fn default_rate_limit_backoff_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Directory holding baseline and audit files. `~` is expanded.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default)]
    pub persist_order: PersistOrder,
    #[serde(default = "default_true")]
    pub audit: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            persist_order: PersistOrder::default(),
            audit: true,
        }
    }
}

fn default_state_dir() -> String {
    format!("~/{APP_DIR}/state")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Admin CLI executable.
    #[serde(default = "default_directory_program")]
    pub program: String,
    #[serde(default)]
    pub module_version: ModuleVersion,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub admin_user: Option<String>,
    #[serde(default = "default_directory_domain")]
    pub domain: String,
    #[serde(default)]
    pub default_group: Option<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            program: default_directory_program(),
            module_version: ModuleVersion::default(),
            server: None,
            admin_user: None,
            domain: default_directory_domain(),
            default_group: None,
        }
    }
}

fn default_directory_program() -> String {
    "sso-admin".to_string()
}

fn default_directory_domain() -> String {
    "vsphere.local".to_string()
}

impl Config {
    /// Load `~/.onboard-relay/config.toml`, writing a default one on first use.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let app_dir = home.join(APP_DIR);
        let config_path = app_dir.join("config.toml");

        if !app_dir.exists() {
            fs::create_dir_all(&app_dir).context("Failed to create .onboard-relay directory")?;
        }

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Load an explicit config file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&contents).context("Failed to parse config file")?;
        config.config_path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Environment overrides through an injectable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .find(|value| !value.trim().is_empty())
        };

        if let Some(token) = first(&["ONBOARD_RELAY_SLACK_TOKEN", "SLACK_BOT_TOKEN"]) {
            self.slack.bot_token = Some(token);
        }
        if let Some(channel) = first(&["ONBOARD_RELAY_FALLBACK_CHANNEL"]) {
            self.slack.fallback_channel = Some(channel);
        }
        if let Some(token) = first(&["ONBOARD_RELAY_GITHUB_TOKEN", "GITHUB_TOKEN"]) {
            self.github.token = Some(token);
        }
        if let Some(dir) = first(&["ONBOARD_RELAY_STATE_DIR"]) {
            self.detector.state_dir = dir;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reliability.rate_limit_attempts == 0 {
            return Err(ConfigError::Validation(
                "reliability.rate_limit_attempts must be at least 1".into(),
            ));
        }
        if self.slack.strategies.is_empty() {
            return Err(ConfigError::Validation(
                "slack.strategies must name at least one strategy".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.slack.strategies.iter().find(|s| !seen.insert(**s)) {
            return Err(ConfigError::Validation(format!(
                "slack.strategies lists `{dup}` more than once"
            )));
        }
        Ok(())
    }

    pub fn require_slack_token(&self) -> Result<&str, ConfigError> {
        self.slack
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: "slack.bot_token",
                hint: "set it in config.toml, SLACK_BOT_TOKEN, or --slack-token",
            })
    }

    /// Expanded state directory.
    pub fn state_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.detector.state_dir).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.reliability.rate_limit_attempts, 5);
        assert_eq!(config.reliability.rate_limit_backoff_ms, 30_000);
        assert_eq!(config.slack.strategies, StrategyName::DEFAULT_ORDER.to_vec());
        assert_eq!(config.detector.persist_order, PersistOrder::BeforeNotify);
        assert_eq!(config.directory.module_version, ModuleVersion::V2);
        assert!(config.github.token.is_none());
    }

    #[test]
    fn sections_deserialize() {
        let toml = r#"
[slack]
bot_token = "xoxb-1"
fallback_channel = "C-onboarding"
strategies = ["open-or-find", "broadcast"]

[detector]
state_dir = "/var/lib/relay"
persist_order = "after_notify"
audit = false

[directory]
module_version = "v1"
server = "vc01"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.slack.fallback_channel.as_deref(), Some("C-onboarding"));
        assert_eq!(
            config.slack.strategies,
            vec![StrategyName::OpenOrFind, StrategyName::Broadcast]
        );
        assert_eq!(config.detector.persist_order, PersistOrder::AfterNotify);
        assert!(!config.detector.audit);
        assert_eq!(config.state_dir(), PathBuf::from("/var/lib/relay"));
        assert_eq!(config.directory.module_version, ModuleVersion::V1);
    }

    #[test]
    fn env_overrides_prefer_specific_keys() {
        let env = HashMap::from([
            ("ONBOARD_RELAY_SLACK_TOKEN", "xoxb-specific"),
            ("SLACK_BOT_TOKEN", "xoxb-generic"),
            ("GITHUB_TOKEN", "ghp_generic"),
            ("ONBOARD_RELAY_FALLBACK_CHANNEL", "   "),
        ]);
        let mut config = Config::default();
        config.apply_overrides_from(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.slack.bot_token.as_deref(), Some("xoxb-specific"));
        assert_eq!(config.github.token.as_deref(), Some("ghp_generic"));
        assert!(config.slack.fallback_channel.is_none());
    }

    #[test]
    fn missing_slack_token_is_config_error() {
        let err = Config::default().require_slack_token().unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "slack.bot_token", .. }));
    }

    #[test]
    fn validation_rejects_bad_reliability_and_strategies() {
        let mut config = Config::default();
        config.reliability.rate_limit_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.slack.strategies = vec![StrategyName::Direct, StrategyName::Direct];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("`direct` more than once"));
    }

    #[test]
    fn save_and_load_round_trip_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let mut config = Config {
            config_path: path.clone(),
            ..Config::default()
        };
        config.slack.fallback_channel = Some("C1".into());
        config.save().unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.config_path, path);
        assert_eq!(loaded.slack.fallback_channel.as_deref(), Some("C1"));
    }

    #[test]
    fn load_from_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(Config::load_from(&tmp.path().join("absent.toml")).is_err());
    }
}
