use concierge_core::{call_control::DEFAULT_TWILIO_API_BASE, registry, silence};
use reqwest::Url;
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_REALTIME_URL: &str =
    "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01";
pub const DEFAULT_OAUTH_TOKEN_URL: &str =
    "https://oauthserver.eclinicalworks.com/oauth/oauth2/token";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Client credentials for the OAuth authorization-code exchange.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub token_url: String,
    pub redirect_uri: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: SecretString,
    pub realtime_url: String,
    pub voice: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: SecretString,
    pub twilio_api_base: String,
    pub media_stream_url: Url,
    pub silence_timeout: Duration,
    pub registry_ttl: Duration,
    pub prompts_path: PathBuf,
    pub oauth: OAuthConfig,
    pub log_level: Level,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn seconds(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:5050");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = SecretString::from(required("OPENAI_API_KEY")?);
        let twilio_account_sid = required("TWILIO_ACCOUNT_SID")?;
        let twilio_auth_token = SecretString::from(required("TWILIO_AUTH_TOKEN")?);

        let realtime_url = or_default("REALTIME_URL", DEFAULT_REALTIME_URL);
        let voice = or_default("REALTIME_VOICE", "alloy");
        let twilio_api_base = or_default("TWILIO_API_BASE", DEFAULT_TWILIO_API_BASE);
        let media_stream_url =
            Url::parse(&or_default("MEDIA_STREAM_URL", "wss://localhost:5050/media-stream"))
                .map_err(|e| {
                    ConfigError::InvalidValue("MEDIA_STREAM_URL".to_string(), e.to_string())
                })?;

        let silence_timeout = seconds("SILENCE_TIMEOUT_SECS", silence::DEFAULT_SILENCE_THRESHOLD)?;
        let registry_ttl = seconds("CALL_REGISTRY_TTL_SECS", registry::DEFAULT_TTL)?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let oauth = OAuthConfig {
            client_id: std::env::var("OAUTH_CLIENT_ID").ok(),
            client_secret: std::env::var("OAUTH_CLIENT_SECRET")
                .ok()
                .map(SecretString::from),
            token_url: or_default("OAUTH_TOKEN_URL", DEFAULT_OAUTH_TOKEN_URL),
            redirect_uri: or_default(
                "OAUTH_REDIRECT_URI",
                "https://localhost:5050/oauth/callback",
            ),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            realtime_url,
            voice,
            twilio_account_sid,
            twilio_auth_token,
            twilio_api_base,
            media_stream_url,
            silence_timeout,
            registry_ttl,
            prompts_path,
            oauth,
            log_level,
        })
    }
}
