//! Token authority: issues and validates signed, self-contained session
//! tokens. Once issued, the authority holds no per-token state, so removal
//! from the session cache cannot cryptographically invalidate a token; it
//! stays valid until natural expiry.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::store::CompleteUser;

use super::claims::Claims;

/// Signing inputs. Deployments rotate the secret and tune the lifetime
/// through configuration; nothing here is compiled in.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: Vec<u8>,
    pub ttl: Duration,
    pub issuer: String,
}

impl From<&Config> for TokenConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            secret: cfg.token_secret.clone(),
            ttl: cfg.token_ttl,
            issuer: cfg.issuer.clone(),
        }
    }
}

pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    issuer: String,
    validation: Validation,
}

impl TokenAuthority {
    pub fn new(cfg: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&cfg.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(&cfg.secret),
            decoding: DecodingKey::from_secret(&cfg.secret),
            ttl: cfg.ttl,
            issuer: cfg.issuer.clone(),
            validation,
        }
    }

    /// Sign a token carrying the identity resolved at login time. Returns
    /// the compact token string together with the claims it embeds.
    pub fn issue(&self, user: &CompleteUser) -> AppResult<(String, Claims)> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims::for_user(user, now, expires_at, &self.issuer);
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::internal("token_encode", &e.to_string()))?;
        debug!(target: "clinica::identity", "token.issue sub={} jti={} ttl_secs={}", claims.sub, claims.jti, self.ttl.as_secs());
        Ok((token, claims))
    }

    /// Verify signature, expiry and issuer. Every rejection is reported as
    /// the same `InvalidToken` kind so callers cannot distinguish an expired
    /// token from a tampered one.
    pub fn validate(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(target: "clinica::identity", "token.validate rejected: {}", e);
                AppError::invalid_token("invalid_token", "token rejected")
            })
    }
}
