//! Configuration loader and validator for the chain watch bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub chain: Chain,
    #[serde(default)]
    pub webhook: Webhook,
    #[serde(default)]
    pub jobs: Jobs,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Offset applied when rendering chain timestamps for humans.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub schedule: Schedule,
}

/// In-process timers. Zero disables a timer and leaves triggering to an
/// external scheduler hitting the HTTP endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    #[serde(default)]
    pub new_projects_secs: u64,
    #[serde(default)]
    pub countdown_secs: u64,
}

/// Chain node endpoint and table layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chain {
    pub endpoint: String,
    pub contract: String,
    #[serde(default = "default_projects_table")]
    pub projects_table: String,
    #[serde(default = "default_projects_limit")]
    pub projects_limit: u32,
    #[serde(default = "default_likes_table")]
    pub likes_table: String,
    #[serde(default = "default_likes_limit")]
    pub likes_limit: u32,
    pub balance_tokens: BalanceTokens,
}

/// The two token contracts queried for a creator's balance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceTokens {
    pub primary: Token,
    pub secondary: Token,
    /// Rendered in place of the primary balance when the account holds none.
    pub primary_zero: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub code: String,
    pub symbol: String,
}

/// Chat webhook settings. The URL itself lives in the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Webhook {
    #[serde(default = "default_url_env")]
    pub url_env: String,
    #[serde(default)]
    pub at_all: bool,
}

impl Default for Webhook {
    fn default() -> Self {
        Self {
            url_env: default_url_env(),
            at_all: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jobs {
    #[serde(default)]
    pub new_projects: NewProjects,
    #[serde(default)]
    pub countdown: Countdown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewProjects {
    #[serde(default = "default_seed_watermark")]
    pub seed_watermark: i64,
    #[serde(default = "default_watermark_key")]
    pub watermark_key: String,
    #[serde(default = "default_store")]
    pub store: StoreKind,
    #[serde(default = "default_true")]
    pub with_balances: bool,
}

impl Default for NewProjects {
    fn default() -> Self {
        Self {
            seed_watermark: default_seed_watermark(),
            watermark_key: default_watermark_key(),
            store: default_store(),
            with_balances: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Countdown {
    #[serde(default)]
    pub account: String,
    #[serde(default = "default_thresholds")]
    pub thresholds_minutes: Vec<i64>,
}

impl Default for Countdown {
    fn default() -> Self {
        Self {
            account: String::new(),
            thresholds_minutes: default_thresholds(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".into()
}
fn default_utc_offset_hours() -> i32 {
    8
}
fn default_projects_table() -> String {
    "projects".into()
}
fn default_projects_limit() -> u32 {
    20
}
fn default_likes_limit() -> u32 {
    100
}
fn default_likes_table() -> String {
    "likes".into()
}
fn default_url_env() -> String {
    "WEBHOOK_URL".into()
}
fn default_seed_watermark() -> i64 {
    112
}
fn default_watermark_key() -> String {
    "last_project_id".into()
}
fn default_store() -> StoreKind {
    StoreKind::Sqlite
}
fn default_true() -> bool {
    true
}
fn default_thresholds() -> Vec<i64> {
    vec![10, 3]
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// Database URL for the watermark store; `DATABASE_URL` wins when set.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/watchbot.db", self.app.data_dir))
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.app
            .listen_addr
            .parse()
            .map_err(|_| ConfigError::Invalid("app.listen_addr must be host:port"))
    }

    /// Display offset as a chrono `FixedOffset`. Range is checked by `validate`.
    pub fn display_offset(&self) -> Result<chrono::FixedOffset, ConfigError> {
        chrono::FixedOffset::east_opt(self.app.utc_offset_hours * 3600)
            .ok_or(ConfigError::Invalid("app.utc_offset_hours out of range"))
    }

    /// Webhook URL taken from the environment variable named in the config.
    /// Missing or blank means "do not send".
    pub fn webhook_url(&self) -> Option<String> {
        std::env::var(&self.webhook.url_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    cfg.listen_addr()?;
    if !(-12..=14).contains(&cfg.app.utc_offset_hours) {
        return Err(ConfigError::Invalid("app.utc_offset_hours must be within -12..=14"));
    }

    if cfg.chain.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("chain.endpoint must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.chain.endpoint).is_err() {
        return Err(ConfigError::Invalid("chain.endpoint must be a valid URL"));
    }
    if cfg.chain.contract.trim().is_empty() {
        return Err(ConfigError::Invalid("chain.contract must be non-empty"));
    }
    if cfg.chain.projects_table.trim().is_empty() {
        return Err(ConfigError::Invalid("chain.projects_table must be non-empty"));
    }
    if cfg.chain.projects_limit == 0 {
        return Err(ConfigError::Invalid("chain.projects_limit must be > 0"));
    }
    if cfg.chain.likes_table.trim().is_empty() {
        return Err(ConfigError::Invalid("chain.likes_table must be non-empty"));
    }
    if cfg.chain.likes_limit == 0 {
        return Err(ConfigError::Invalid("chain.likes_limit must be > 0"));
    }
    let tokens = &cfg.chain.balance_tokens;
    if tokens.primary.code.trim().is_empty() || tokens.primary.symbol.trim().is_empty() {
        return Err(ConfigError::Invalid("chain.balance_tokens.primary must have code and symbol"));
    }
    if tokens.secondary.code.trim().is_empty() || tokens.secondary.symbol.trim().is_empty() {
        return Err(ConfigError::Invalid("chain.balance_tokens.secondary must have code and symbol"));
    }

    if cfg.webhook.url_env.trim().is_empty() {
        return Err(ConfigError::Invalid("webhook.url_env must be non-empty"));
    }

    if cfg.jobs.new_projects.watermark_key.trim().is_empty() {
        return Err(ConfigError::Invalid("jobs.new_projects.watermark_key must be non-empty"));
    }
    if cfg.jobs.countdown.account.trim().is_empty() {
        return Err(ConfigError::Invalid("jobs.countdown.account must be non-empty"));
    }
    if cfg.jobs.countdown.thresholds_minutes.is_empty() {
        return Err(ConfigError::Invalid("jobs.countdown.thresholds_minutes must be non-empty"));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the bot.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  listen_addr: "0.0.0.0:8080"
  utc_offset_hours: 8
  schedule:
    new_projects_secs: 0
    countdown_secs: 60

chain:
  endpoint: "https://chain.example.com/"
  contract: "nftlaunchpad"
  projects_table: "projects"
  projects_limit: 20
  likes_table: "likes"
  likes_limit: 100
  balance_tokens:
    primary:
      code: "eosio.token"
      symbol: "EOS"
    secondary:
      code: "nft.token"
      symbol: "NFT"
    primary_zero: "0.0000 EOS"

webhook:
  url_env: "WEBHOOK_URL"
  at_all: false

jobs:
  new_projects:
    seed_watermark: 112
    watermark_key: "last_project_id"
    store: sqlite
    with_balances: true
  countdown:
    account: "watcher12345"
    thresholds_minutes: [10, 3]
"#
}
