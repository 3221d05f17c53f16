//! Signed bearer token issuance and validation
//!
//! Tokens are HS256 JWTs carrying `{sub, role, iat, exp}`. Nothing is stored
//! server-side: a token is valid iff its signature matches under the process
//! secret and its embedded expiry has not passed. The signature is checked
//! before the header or claims are decoded, so any edit to a well-shaped
//! token reads as tampering.

use crate::{config::AppConfig, error::AppError, models::user::Role};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{crypto, encode, Algorithm, DecodingKey, EncodingKey, Header};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use super::middleware::AuthContext;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// Role at issuance time
    pub role: Role,

    /// Issued at (seconds since epoch)
    pub iat: i64,

    /// Expiration (seconds since epoch)
    pub exp: i64,
}

/// Why a presented token was not accepted
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    TamperedOrWrongKey,

    #[error("token has expired")]
    Expired,

    #[error("token issued in the future")]
    NotYetValid,
}

/// Token codec bound to the process-wide signing secret
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    leeway: Duration,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            config.security.jwt_secret.expose_secret().as_bytes(),
            config.security.token_ttl_secs,
            config.security.clock_skew_leeway_secs,
        )
    }

    pub fn new(secret: &[u8], ttl_secs: u64, leeway_secs: u64) -> Result<Self, AppError> {
        // HS256 needs at least 32 bytes of key material
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: seconds(ttl_secs, "token TTL")?,
            leeway: seconds(leeway_secs, "clock skew leeway")?,
        })
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a token for `username` valid from `now` until `now + TTL`
    pub fn issue(&self, username: &str, role: Role, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            sub: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            AppError::Internal(format!("Failed to encode token: {}", e))
        })
    }

    /// Validate a token against the clock reading `now`
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AuthContext, TokenRejection> {
        // (a) shape: three non-empty base64url segments
        let (signing_input, signature) = split_token(token)?;

        // (b) signature over `header.payload`, before anything is decoded
        let verified = crypto::verify(
            signature,
            signing_input.as_bytes(),
            &self.decoding_key,
            Algorithm::HS256,
        )
        .map_err(|e| {
            tracing::debug!("Token signature check failed: {:?}", e);
            TokenRejection::TamperedOrWrongKey
        })?;
        if !verified {
            return Err(TokenRejection::TamperedOrWrongKey);
        }

        // (c) a correctly signed token must still carry the four claims
        let claims = decode_claims(signing_input)?;

        // (d) expiry, exact at second granularity
        let now = now.timestamp();
        if now > claims.exp {
            return Err(TokenRejection::Expired);
        }

        // (e) issued-at from a clock running ahead, beyond the tolerated skew
        if claims.iat > now + self.leeway.num_seconds() {
            return Err(TokenRejection::NotYetValid);
        }

        Ok(AuthContext {
            username: claims.sub,
            role: claims.role,
        })
    }
}

fn seconds(secs: u64, what: &str) -> Result<Duration, AppError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| AppError::Config(format!("{} out of range: {} seconds", what, secs)))
}

/// Split into `(header.payload, signature)`
fn split_token(token: &str) -> Result<(&str, &str), TokenRejection> {
    let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenRejection::Malformed)?;
    let (header, payload) = signing_input
        .split_once('.')
        .ok_or(TokenRejection::Malformed)?;

    if [header, payload, signature].iter().all(|s| is_base64url(s)) {
        Ok((signing_input, signature))
    } else {
        Err(TokenRejection::Malformed)
    }
}

fn is_base64url(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Decode header and claims of `header.payload`; the signature is not looked at
fn decode_claims(signing_input: &str) -> Result<Claims, TokenRejection> {
    let (header, payload) = signing_input
        .split_once('.')
        .ok_or(TokenRejection::Malformed)?;

    let header: Header = decode_segment(header)?;
    if header.alg != Algorithm::HS256 {
        return Err(TokenRejection::Malformed);
    }

    decode_segment(payload)
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenRejection> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenRejection::Malformed)?;

    serde_json::from_slice(&bytes).map_err(|_| TokenRejection::Malformed)
}
