//! Composite authentication flows: credential check, identity resolution,
//! token issuance and session tracking, end to end.

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::store::{CompleteUser, SharedStore};

use super::authorizer::is_admin;
use super::claims::Claims;
use super::session::{Session, SessionCache};
use super::token::TokenAuthority;

/// A successful login: the resolved identity plus the signed session token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub identity: CompleteUser,
    pub token: String,
}

pub trait AuthProvider: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> AppResult<AuthSession>;
    /// As `authenticate`, but additionally requires the administrator role;
    /// valid non-admin credentials fail with `InsufficientPermissions`.
    fn authenticate_admin(&self, username: &str, password: &str) -> AppResult<AuthSession>;
    /// Re-validate a bearer token and surface its session. The cache is
    /// consulted only after the authority accepts the token.
    fn verify_session(&self, token: &str) -> AppResult<(Claims, Session)>;
    /// Drop the cached session. The token itself stays valid until expiry.
    fn logout(&self, token: &str) -> bool;
}

pub struct LocalAuthProvider {
    store: SharedStore,
    tokens: TokenAuthority,
    sessions: SessionCache,
}

impl LocalAuthProvider {
    pub fn new(store: SharedStore, tokens: TokenAuthority) -> Self {
        Self { store, tokens, sessions: SessionCache::new() }
    }

    pub fn sessions(&self) -> &SessionCache { &self.sessions }

    fn login(&self, username: &str, password: &str, require_admin: bool) -> AppResult<AuthSession> {
        // Unknown user and wrong password are deliberately indistinguishable
        // to the caller.
        let user = self.store.get_user_by_username(username).map_err(|_| invalid_credentials())?;
        if !crate::security::verify_password(password, &user.password_hash)? {
            debug!(target: "clinica::identity", "auth.login rejected user={}", username);
            return Err(invalid_credentials());
        }
        let identity = self.store.get_complete_user(user.id)?;
        if require_admin && !is_admin(&identity) {
            debug!(target: "clinica::identity", "auth.login non-admin user={} rol={}", username, identity.rol.nombre);
            return Err(AppError::insufficient_permissions(
                "admin_required",
                "administrator role required",
            ));
        }
        let (token, claims) = self.tokens.issue(&identity)?;
        self.sessions.track(&token, &claims);
        debug!(target: "clinica::identity", "auth.login user={} rol={}", username, identity.rol.nombre);
        Ok(AuthSession { identity, token })
    }
}

impl AuthProvider for LocalAuthProvider {
    fn authenticate(&self, username: &str, password: &str) -> AppResult<AuthSession> {
        self.login(username, password, false)
    }

    fn authenticate_admin(&self, username: &str, password: &str) -> AppResult<AuthSession> {
        self.login(username, password, true)
    }

    fn verify_session(&self, token: &str) -> AppResult<(Claims, Session)> {
        let claims = self.tokens.validate(token)?;
        let session = self.sessions.get(token, &claims);
        Ok((claims, session))
    }

    fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token)
    }
}

fn invalid_credentials() -> AppError {
    AppError::invalid_credentials("invalid_credentials", "unknown user or wrong password")
}
