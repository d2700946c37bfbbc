//! Access token resolution.
//!
//! The session library is joined with a signed access token. Operators either
//! pass a token minted elsewhere, or account and API key material from which
//! a short-lived HS256 token is minted at startup.

use crate::config::{Config, CredentialSource};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

/// Content type marking the token as a video access token.
pub const ACCESS_TOKEN_CONTENT_TYPE: &str = "twilio-fpa;v=1";

#[derive(Debug, Error)]
pub enum CredentialsError {
    /// Token signing failed.
    #[error("Failed to sign access token: {0}")]
    Signing(String),

    /// Minting inputs were unusable.
    #[error("Invalid credentials: {0}")]
    Invalid(String),
}

/// Video grant: which room the token may join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    pub identity: String,
    pub video: VideoGrant,
}

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub grants: Grants,
}

/// Inputs for minting an access token.
pub struct MintRequest<'a> {
    pub account_sid: &'a str,
    pub api_key_sid: &'a str,
    pub api_key_secret: &'a SecretString,
    pub identity: &'a str,
    pub room: Option<&'a str>,
    pub ttl_seconds: u64,
    pub issued_at: i64,
}

/// Resolve the token used to join the configured session.
///
/// # Errors
///
/// Returns `CredentialsError` if a token has to be minted and signing fails.
pub fn resolve_access_token(config: &Config) -> Result<SecretString, CredentialsError> {
    match &config.credentials {
        CredentialSource::Precomputed(token) => Ok(token.clone()),
        CredentialSource::ApiKey {
            account_sid,
            api_key_sid,
            api_key_secret,
        } => mint_access_token(&MintRequest {
            account_sid,
            api_key_sid,
            api_key_secret,
            identity: &config.identity,
            room: config.session_name.as_deref(),
            ttl_seconds: config.token_ttl_seconds,
            issued_at: chrono::Utc::now().timestamp(),
        }),
    }
}

/// Mint an HS256 access token signed with the API key secret.
///
/// # Errors
///
/// Returns `CredentialsError::Invalid` for an empty secret or a TTL that does
/// not fit a timestamp, and `CredentialsError::Signing` if encoding fails.
#[instrument(skip_all, fields(api_key_sid = %request.api_key_sid))]
pub fn mint_access_token(request: &MintRequest<'_>) -> Result<SecretString, CredentialsError> {
    let secret = request.api_key_secret.expose_secret();
    if secret.is_empty() {
        return Err(CredentialsError::Invalid(
            "API key secret is empty".to_string(),
        ));
    }

    let ttl = i64::try_from(request.ttl_seconds)
        .map_err(|_| CredentialsError::Invalid("token TTL too large".to_string()))?;

    let claims = AccessTokenClaims {
        jti: format!("{}-{}", request.api_key_sid, request.issued_at),
        iss: request.api_key_sid.to_string(),
        sub: request.account_sid.to_string(),
        iat: request.issued_at,
        exp: request.issued_at.saturating_add(ttl),
        grants: Grants {
            identity: request.identity.to_string(),
            video: VideoGrant {
                room: request.room.map(str::to_string),
            },
        },
    };

    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());
    header.cty = Some(ACCESS_TOKEN_CONTENT_TYPE.to_string());

    let token = encode(&header, &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| CredentialsError::Signing(e.to_string()))?;

    Ok(SecretString::from(token))
}
