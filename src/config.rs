//! Configuration types.
//!
//! Every knob is an explicit field built once at startup by `from_env()` and
//! passed to the component that needs it.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use tracing::info;

use crate::error::ConfigError;
use crate::phone::normalize_phone;

/// Default delay between two recipients of a campaign.
pub const DEFAULT_CAMPAIGN_THROTTLE_MS: u64 = 300;

/// Default delay between two segments of one long message.
pub const DEFAULT_SEGMENT_THROTTLE_MS: u64 = 1000;

/// Default Twilio Messages endpoint; `%s` is the account SID.
pub const DEFAULT_TWILIO_URL: &str = "https://api.twilio.com/2010-04-01/Accounts/%s/Messages.json";

/// HTTP server and storage locations.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Record store database file.
    pub db_path: PathBuf,
    /// Subscriber / representative database file.
    pub audience_db_path: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("CONT_PORT", 8080),
            db_path: std::env::var("TEXTER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/texter.db")),
            audience_db_path: std::env::var("TEXTER_AUDIENCE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/audience.db")),
        }
    }
}

/// Campaign worker pacing and sender identity.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Delay between consecutive recipients.
    pub throttle: Duration,
    /// Normalized number every outbound message is sent from.
    pub from_number: String,
}

impl CampaignConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let from = std::env::var("TW_FROM")
            .map_err(|_| ConfigError::MissingEnvVar("TW_FROM".to_string()))?;
        Ok(Self {
            throttle: Duration::from_millis(env_parse(
                "CM_TICKINTERVAL",
                DEFAULT_CAMPAIGN_THROTTLE_MS,
            )),
            from_number: sender_number(&from)?,
        })
    }
}

/// Normalize the sender and insist on a ten-digit US number.
fn sender_number(raw: &str) -> Result<String, ConfigError> {
    let number = normalize_phone(raw);
    if number.len() == 10 && number.chars().all(|c| c.is_ascii_digit()) {
        Ok(number)
    } else {
        Err(ConfigError::InvalidValue {
            key: "TW_FROM".to_string(),
            message: format!("{raw:?} is not a ten-digit phone number"),
        })
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(DEFAULT_CAMPAIGN_THROTTLE_MS),
            from_number: String::new(),
        }
    }
}

/// Twilio REST credentials and segment pacing.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Fully expanded Messages endpoint for this account.
    pub messages_url: String,
    /// Optional messaging service used instead of a bare `From` number.
    pub messaging_service_sid: Option<String>,
    /// Delay between segments of one long message.
    pub segment_throttle: Duration,
}

impl TwilioConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let account_sid = std::env::var("TW_ACCT")
            .map_err(|_| ConfigError::MissingEnvVar("TW_ACCT".to_string()))?;
        let auth_token = std::env::var("TW_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TW_TOKEN".to_string()))?;
        let url_template =
            std::env::var("TW_URL").unwrap_or_else(|_| DEFAULT_TWILIO_URL.to_string());

        Ok(Self {
            messages_url: expand_account_url(&url_template, &account_sid),
            account_sid,
            auth_token: SecretString::from(auth_token),
            messaging_service_sid: std::env::var("TW_MSGSID").ok().filter(|s| !s.is_empty()),
            segment_throttle: Duration::from_millis(env_parse(
                "SEGMENT_TICKINTERVAL",
                DEFAULT_SEGMENT_THROTTLE_MS,
            )),
        })
    }
}

/// External campaign system endpoint.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer secret; empty means the client runs insecure.
    pub secret: SecretString,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("RRN_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("RRN_API_URL".to_string()))?;
        Ok(Self {
            base_url: api_base_url(&base_url)?,
            secret: SecretString::from(std::env::var("RRN_API_SECRET").unwrap_or_default()),
        })
    }
}

/// Check the campaign system URL parses as a base for request paths.
fn api_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "RRN_API_URL".to_string(),
        message,
    };
    let url = reqwest::Url::parse(raw.trim()).map_err(|e| invalid(format!("{raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(invalid(format!("{raw:?} cannot be a base URL")));
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

/// Substitute the account SID into the first `%s` / `%v` verb of a URL template.
fn expand_account_url(template: &str, account_sid: &str) -> String {
    if template.contains("%s") {
        template.replacen("%s", account_sid, 1)
    } else {
        template.replacen("%v", account_sid, 1)
    }
}

/// Read a numeric environment variable, falling back to `default` when it is
/// missing or unparsable.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            info!(key, value = %raw, default = %default, "Unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}
