use crate::error::{AppError, Result};
use crate::sync::balance::DEFAULT_BALANCE_TOLERANCE;
use chrono::{Duration, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use url::Url;

const CONFIG_DIR_PREFIX: &str = "till-sync";

const PRIVATBANK_API_URL: &str = "https://acp.privatbank.ua";
const POSTER_API_URL: &str = "https://joinposter.com/api";
const TELEGRAM_API_URL: &str = "https://api.telegram.org";

// PrivatBank rejects statement pages larger than this.
const PRIVATBANK_MAX_PAGE_LIMIT: u32 = 500;

const REDACTED: &str = "***";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub privatbank: PrivatBankConfig,
    pub poster: PosterConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PrivatBankConfig {
    pub token: String,
    pub iban: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

impl Default for PrivatBankConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            iban: String::new(),
            base_url: None,
            page_limit: default_page_limit(),
        }
    }
}

impl PrivatBankConfig {
    pub fn api_base_url(&self) -> String {
        base_url_or(self.base_url.as_deref(), PRIVATBANK_API_URL)
    }

    /// IBAN shortened for log output
    pub fn masked_iban(&self) -> String {
        let prefix: String = self.iban.chars().take(6).collect();
        format!("{prefix}...")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PosterConfig {
    pub token: String,
    pub account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Descriptions containing any of these (case-insensitive) are not reconciled
    #[serde(default = "default_poster_exclude_keywords")]
    pub exclude_keywords: Vec<String>,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            account_id: 0,
            base_url: None,
            exclude_keywords: default_poster_exclude_keywords(),
        }
    }
}

impl PosterConfig {
    pub fn api_base_url(&self) -> String {
        base_url_or(self.base_url.as_deref(), POSTER_API_URL)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl TelegramConfig {
    pub fn api_base_url(&self) -> String {
        base_url_or(self.base_url.as_deref(), TELEGRAM_API_URL)
    }
}

/// Telegram accepts either a numeric chat id (negative for groups) or a `@channel` name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Name(String),
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Id(id) => write!(f, "{id}"),
            ChatId::Name(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of whole days before today included in each run
    pub lookback_days: u32,
    pub time_window_minutes: u32,
    pub balance_tolerance: Decimal,
    /// Offset of the local time both feeds report in
    pub utc_offset_minutes: i32,
    pub expenses_only: bool,
    pub http_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: 1,
            time_window_minutes: 15,
            balance_tolerance: DEFAULT_BALANCE_TOLERANCE,
            utc_offset_minutes: 120,
            expenses_only: true,
            http_timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    pub fn time_tolerance(&self) -> Duration {
        Duration::minutes(i64::from(self.time_window_minutes))
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}

fn default_page_limit() -> u32 {
    100
}

fn default_poster_exclude_keywords() -> Vec<String> {
    vec!["комісія".to_string()]
}

fn base_url_or(base_url: Option<&str>, default: &str) -> String {
    base_url.unwrap_or(default).trim_end_matches('/').to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;

        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {:?}. Please create one.",
                config_path
            )));
        }

        let contents = fs::read_to_string(&config_path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.privatbank.token.is_empty() || self.privatbank.iban.is_empty() {
            return Err(AppError::Config(
                "PrivatBank token and iban must be set in config file".to_string(),
            ));
        }
        if self.privatbank.page_limit == 0 || self.privatbank.page_limit > PRIVATBANK_MAX_PAGE_LIMIT
        {
            return Err(AppError::Config(format!(
                "PrivatBank page_limit must be between 1 and {}",
                PRIVATBANK_MAX_PAGE_LIMIT
            )));
        }

        if self.poster.token.is_empty() || self.poster.account_id <= 0 {
            return Err(AppError::Config(
                "Poster token and account_id must be set in config file".to_string(),
            ));
        }

        if let Some(telegram) = &self.telegram {
            let chat_missing = matches!(&telegram.chat_id, ChatId::Name(name) if name.is_empty());
            if telegram.token.is_empty() || chat_missing {
                return Err(AppError::Config(
                    "Telegram token and chat_id must both be set when [telegram] is present"
                        .to_string(),
                ));
            }
        }

        let overrides = [
            self.privatbank.base_url.as_deref(),
            self.poster.base_url.as_deref(),
            self.telegram.as_ref().and_then(|t| t.base_url.as_deref()),
        ];
        for base_url in overrides.into_iter().flatten() {
            Url::parse(base_url).map_err(|e| {
                AppError::Config(format!("Invalid base_url {:?}: {}", base_url, e))
            })?;
        }

        if self.sync.balance_tolerance.is_sign_negative() {
            return Err(AppError::Config(
                "balance_tolerance must not be negative".to_string(),
            ));
        }
        self.sync.utc_offset()?;

        Ok(())
    }

    /// Copy of the config with every credential replaced, safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.privatbank.token = REDACTED.to_string();
        config.privatbank.iban = self.privatbank.masked_iban();
        config.poster.token = REDACTED.to_string();
        if let Some(telegram) = config.telegram.as_mut() {
            telegram.token = REDACTED.to_string();
        }
        config
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;

    pub(crate) const MINIMAL_CONFIG: &str = r#"
[privatbank]
token = "privat-token"
iban = "UA213223130000026007233566001"

[poster]
token = "poster-token"
account_id = 3
"#;

    pub(crate) fn mock_config() -> Config {
        Config::from_toml(MINIMAL_CONFIG).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::{MINIMAL_CONFIG, mock_config};
    use super::*;
    use rust_decimal::prelude::dec;

    #[test]
    fn test_config_serialization() {
        let mut config = mock_config();
        config.telegram = Some(TelegramConfig {
            token: "bot-token".to_string(),
            chat_id: ChatId::Id(-100123),
            base_url: None,
        });

        let serialized = toml::to_string(&config).unwrap();
        let deserialized = Config::from_toml(&serialized).unwrap();

        assert_eq!(config.privatbank.iban, deserialized.privatbank.iban);
        assert_eq!(config.poster.account_id, deserialized.poster.account_id);
        assert_eq!(
            deserialized.telegram.unwrap().chat_id,
            ChatId::Id(-100123)
        );
        assert_eq!(config.sync, deserialized.sync);
    }

    #[test]
    fn test_defaults_applied() {
        let config = mock_config();

        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.sync.time_tolerance(), Duration::minutes(15));
        assert_eq!(config.sync.balance_tolerance, dec!(0.01));
        assert_eq!(config.privatbank.page_limit, 100);
        assert_eq!(config.poster.exclude_keywords, vec!["комісія".to_string()]);
        assert!(config.telegram.is_none());
        assert_eq!(config.privatbank.api_base_url(), "https://acp.privatbank.ua");
        assert_eq!(config.poster.api_base_url(), "https://joinposter.com/api");
    }

    #[test]
    fn test_sync_overrides() {
        let contents = format!(
            "{MINIMAL_CONFIG}\n[sync]\nlookback_days = 3\ntime_window_minutes = 5\nbalance_tolerance = \"1.50\"\nutc_offset_minutes = 180\n"
        );
        let config = Config::from_toml(&contents).unwrap();

        assert_eq!(config.sync.lookback_days, 3);
        assert_eq!(config.sync.time_tolerance(), Duration::minutes(5));
        assert_eq!(config.sync.balance_tolerance, dec!(1.50));
        assert_eq!(
            config.sync.utc_offset().unwrap(),
            FixedOffset::east_opt(3 * 3600).unwrap()
        );
        assert!(config.sync.expenses_only);
    }

    #[test]
    fn test_chat_id_accepts_name() {
        let contents = format!(
            "{MINIMAL_CONFIG}\n[telegram]\ntoken = \"bot\"\nchat_id = \"@till_reports\"\n"
        );
        let config = Config::from_toml(&contents).unwrap();
        let telegram = config.telegram.unwrap();

        assert_eq!(telegram.chat_id, ChatId::Name("@till_reports".to_string()));
        assert_eq!(telegram.chat_id.to_string(), "@till_reports");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let contents = r#"
[privatbank]
token = ""
iban = "UA21"

[poster]
token = "poster-token"
account_id = 3
"#;
        let err = Config::from_toml(contents).unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "got {err:?}");
    }

    #[test]
    fn test_missing_poster_account_rejected() {
        let contents = r#"
[privatbank]
token = "t"
iban = "UA21"

[poster]
token = "poster-token"
account_id = 0
"#;
        assert!(matches!(
            Config::from_toml(contents),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let contents = MINIMAL_CONFIG.replace(
            "account_id = 3",
            "account_id = 3\nbase_url = \"not a url\"",
        );
        assert!(matches!(
            Config::from_toml(&contents),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_negative_balance_tolerance_rejected() {
        let contents = format!("{MINIMAL_CONFIG}\n[sync]\nbalance_tolerance = \"-0.01\"\n");
        assert!(matches!(
            Config::from_toml(&contents),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let mut config = mock_config();
        config.poster.base_url = Some("http://localhost:8080/api/".to_string());
        assert_eq!(config.poster.api_base_url(), "http://localhost:8080/api");
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = mock_config();
        config.telegram = Some(TelegramConfig {
            token: "bot-token".to_string(),
            chat_id: ChatId::Id(1),
            base_url: None,
        });

        let redacted = config.redacted();

        assert_eq!(redacted.privatbank.token, REDACTED);
        assert_eq!(redacted.privatbank.iban, "UA2132...");
        assert_eq!(redacted.poster.token, REDACTED);
        assert_eq!(redacted.telegram.unwrap().token, REDACTED);
        assert_eq!(redacted.sync, config.sync);
    }
}
