use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::CompleteUser;

/// Identity payload embedded in every signed token: who the bearer is, the
/// role and permissions resolved at issue time, and the standard issued-at /
/// expiry / issuer fields the authority verifies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User record id.
    pub sub: i64,
    pub usuario: String,
    pub rol: String,
    #[serde(default)]
    pub permisos: Vec<String>,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    pub iss: String,
    /// Per-token unique id.
    pub jti: String,
}

impl Claims {
    pub fn for_user(user: &CompleteUser, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>, issuer: &str) -> Self {
        Self {
            sub: user.id,
            usuario: user.usuario.clone(),
            rol: user.rol.nombre.clone(),
            permisos: user.rol.permisos.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: issuer.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}
