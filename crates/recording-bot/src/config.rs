//! Recording Bot configuration.
//!
//! Configuration is loaded from environment variables plus the first
//! command-line argument (the target session name). Sensitive fields are
//! redacted in Debug output.

use crate::hosted::profile::DEFAULT_TIMESLICE_MS;
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default bind host for the serving surface.
pub const DEFAULT_HTTP_BIND_HOST: &str = "127.0.0.1";

/// Default port for the serving surface.
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Default recordings root (the working directory).
pub const DEFAULT_RECORDINGS_DIR: &str = ".";

/// Accepted capture timeslice range in milliseconds.
pub const MIN_TIMESLICE_MS: u64 = 10;
pub const MAX_TIMESLICE_MS: u64 = 10_000;

/// Default lifetime of a minted access token.
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3600;

/// Default identity prefix for minted access tokens.
pub const DEFAULT_IDENTITY_PREFIX: &str = "recording-bot";

/// Where the access token for joining the session comes from.
#[derive(Clone)]
pub enum CredentialSource {
    /// A token minted elsewhere and passed in verbatim.
    Precomputed(SecretString),
    /// Account and API key material used to mint a token at startup.
    ApiKey {
        account_sid: String,
        api_key_sid: String,
        api_key_secret: SecretString,
    },
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Precomputed(_) => f
                .debug_tuple("Precomputed")
                .field(&"[REDACTED]")
                .finish(),
            CredentialSource::ApiKey {
                account_sid,
                api_key_sid,
                ..
            } => f
                .debug_struct("ApiKey")
                .field("account_sid", account_sid)
                .field("api_key_sid", api_key_sid)
                .field("api_key_secret", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Recording Bot configuration.
#[derive(Clone)]
pub struct Config {
    /// Session to join. `None` joins whatever session the credentials allow.
    pub session_name: Option<String>,

    /// Serving surface bind host (default: "127.0.0.1").
    pub http_bind_host: String,

    /// Serving surface port (default: 3000). Port 0 picks a free port.
    pub http_port: u16,

    /// Root directory recordings are written under (default: ".").
    pub recordings_dir: PathBuf,

    /// Capture timeslice in milliseconds (default: 100).
    pub timeslice_ms: u64,

    /// Access credentials for the session.
    pub credentials: CredentialSource,

    /// Identity embedded in minted access tokens.
    pub identity: String,

    /// Lifetime of minted access tokens in seconds (default: 3600).
    pub token_ttl_seconds: u64,

    /// Emit JSON formatted logs.
    pub log_json: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("session_name", &self.session_name)
            .field("http_bind_host", &self.http_bind_host)
            .field("http_port", &self.http_port)
            .field("recordings_dir", &self.recordings_dir)
            .field("timeslice_ms", &self.timeslice_ms)
            .field("credentials", &self.credentials)
            .field("identity", &self.identity)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("log_json", &self.log_json)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables and process arguments.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect(), env::args().nth(1))
    }

    /// Load configuration from a `HashMap` and an optional session name
    /// (for testing).
    pub fn from_vars(
        vars: &HashMap<String, String>,
        session_name: Option<String>,
    ) -> Result<Self, ConfigError> {
        let session_name = session_name.filter(|name| !name.trim().is_empty());

        let http_bind_host = vars
            .get("RB_HTTP_BIND_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_BIND_HOST.to_string());

        let http_port = match vars.get("RB_HTTP_PORT") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("RB_HTTP_PORT must be a port number, got {raw}"))
            })?,
            None => DEFAULT_HTTP_PORT,
        };

        let recordings_dir = PathBuf::from(
            vars.get("RB_RECORDINGS_DIR")
                .map_or(DEFAULT_RECORDINGS_DIR, String::as_str),
        );

        let timeslice_ms = match vars.get("RB_TIMESLICE_MS") {
            Some(raw) => {
                let value: u64 = raw.parse().map_err(|_| {
                    ConfigError::InvalidValue(format!(
                        "RB_TIMESLICE_MS must be an integer, got {raw}"
                    ))
                })?;
                let (min, max) = (MIN_TIMESLICE_MS, MAX_TIMESLICE_MS);
                if !(min..=max).contains(&value) {
                    return Err(ConfigError::InvalidValue(format!(
                        "RB_TIMESLICE_MS must be between {min} and {max}, got {value}"
                    )));
                }
                value
            }
            None => DEFAULT_TIMESLICE_MS,
        };

        let credentials = credential_source(vars)?;

        let identity = vars.get("RB_IDENTITY").cloned().unwrap_or_else(|| {
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_IDENTITY_PREFIX}-{short_suffix}")
        });

        let token_ttl_seconds = match vars.get("RB_TOKEN_TTL_SECONDS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "RB_TOKEN_TTL_SECONDS must be a positive integer, got {raw}"
                    )))
                }
            },
            None => DEFAULT_TOKEN_TTL_SECONDS,
        };

        let log_json = vars
            .get("RB_LOG_JSON")
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

        Ok(Config {
            session_name,
            http_bind_host,
            http_port,
            recordings_dir,
            timeslice_ms,
            credentials,
            identity,
            token_ttl_seconds,
            log_json,
        })
    }

    /// Address the serving surface binds to.
    #[must_use]
    pub fn http_bind_address(&self) -> String {
        format!("{}:{}", self.http_bind_host, self.http_port)
    }

    /// Capture timeslice as a `Duration`.
    #[must_use]
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }
}

/// A precomputed token wins; otherwise all three API key variables are
/// required.
fn credential_source(vars: &HashMap<String, String>) -> Result<CredentialSource, ConfigError> {
    if let Some(token) = vars.get("RB_ACCESS_TOKEN").filter(|t| !t.is_empty()) {
        return Ok(CredentialSource::Precomputed(SecretString::from(token.clone())));
    }

    let require = |name: &str| {
        vars.get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    };

    if !vars.contains_key("RB_ACCOUNT_SID") {
        return Err(ConfigError::MissingEnvVar(
            "RB_ACCESS_TOKEN or RB_ACCOUNT_SID".to_string(),
        ));
    }

    Ok(CredentialSource::ApiKey {
        account_sid: require("RB_ACCOUNT_SID")?,
        api_key_sid: require("RB_API_KEY_SID")?,
        api_key_secret: SecretString::from(require("RB_API_KEY_SECRET")?),
    })
}
