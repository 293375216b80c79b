//! Process-local session cache. Secondary and non-authoritative by design:
//! authorization always re-validates the token first, and an entry missing
//! here (say, after a restart) is reconstructed from the token's claims
//! rather than treated as a rejection.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use super::claims::Claims;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: i64,
    pub usuario: String,
    pub rol: String,
    pub permisos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub active: bool,
}

impl Session {
    fn from_claims(claims: &Claims, now: DateTime<Utc>) -> Self {
        Self {
            user_id: claims.sub,
            usuario: claims.usuario.clone(),
            rol: claims.rol.clone(),
            permisos: claims.permisos.clone(),
            created_at: now,
            last_activity: now,
            active: true,
        }
    }
}

/// Telemetry snapshot over the cached sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active: usize,
    pub by_role: HashMap<String, usize>,
    pub created_last_hour: usize,
}

/// Mapping from token string to session metadata. Injected wherever it is
/// needed; there is no process-wide instance.
#[derive(Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<String, Session>>,
}

impl SessionCache {
    pub fn new() -> Self { Self::default() }

    /// Insert or refresh the entry for a token, stamping last-activity.
    pub fn track(&self, token: &str, claims: &Claims) {
        self.track_at(token, claims, Utc::now());
    }

    fn track_at(&self, token: &str, claims: &Claims, now: DateTime<Utc>) {
        let mut entries = self.entries.write();
        match entries.get_mut(token) {
            Some(session) => {
                session.last_activity = now;
                session.active = true;
            }
            None => {
                entries.insert(token.to_string(), Session::from_claims(claims, now));
            }
        }
        debug!(target: "clinica::identity", "session.track user={} total={}", claims.usuario, entries.len());
    }

    /// Cached entry for a cryptographically valid token, refreshing
    /// last-activity. On a miss the entry is reconstructed from the claims
    /// and re-inserted: cache absence is never itself a rejection reason.
    pub fn get(&self, token: &str, claims: &Claims) -> Session {
        let now = Utc::now();
        let mut entries = self.entries.write();
        match entries.get_mut(token) {
            Some(session) if session.active => {
                session.last_activity = now;
                session.clone()
            }
            _ => {
                debug!(target: "clinica::identity", "session.get reconstructing user={}", claims.usuario);
                let session = Session::from_claims(claims, now);
                entries.insert(token.to_string(), session.clone());
                session
            }
        }
    }

    /// Telemetry lookup; no reconstruction, no activity stamp.
    pub fn peek(&self, token: &str) -> Option<Session> {
        self.entries.read().get(token).filter(|s| s.active).cloned()
    }

    /// Mark inactive and drop the entry. Returns whether one existed. Does
    /// not affect the token's validity at the authority.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.entries.write().remove(token);
        if let Some(session) = &removed {
            debug!(target: "clinica::identity", "session.revoke user={}", session.usuario);
        }
        removed.is_some()
    }

    /// Sweep entries idle longer than the threshold. Maintenance operation;
    /// nothing on the request path calls this.
    pub fn purge_expired(&self, idle: Duration) -> usize {
        let idle = chrono::Duration::seconds(idle.as_secs() as i64);
        let cutoff = Utc::now() - idle;
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, session| session.last_activity > cutoff);
        let swept = before - entries.len();
        if swept > 0 {
            debug!(target: "clinica::identity", "session.purge swept={} remaining={}", swept, entries.len());
        }
        swept
    }

    pub fn statistics(&self) -> SessionStats {
        let entries = self.entries.read();
        let hour_ago = Utc::now() - chrono::Duration::hours(1);
        let mut by_role: HashMap<String, usize> = HashMap::new();
        let mut active = 0usize;
        let mut created_last_hour = 0usize;
        for session in entries.values() {
            if !session.active {
                continue;
            }
            active += 1;
            *by_role.entry(session.rol.clone()).or_insert(0) += 1;
            if session.created_at > hour_ago {
                created_last_hour += 1;
            }
        }
        SessionStats { active, by_role, created_last_hour }
    }
}
