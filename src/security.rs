//! Credential hashing/verification and first-run provisioning.
//!
//! Secrets are stored as Argon2 PHC strings with a fresh random salt; the
//! plaintext never reaches the persisted document. Verification is a boolean
//! outcome: a wrong password is not an error, only a malformed stored hash is.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::ADMIN_ROLE;
use crate::store::Store;

/// Default first-run credentials; rotate immediately after first login.
pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AppError::internal("salt_error", &e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::internal("salt_error", &e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal("hash_error", &e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Compare a plaintext secret against a stored PHC hash. A mismatch is
/// `Ok(false)`; a stored value that is not a parseable PHC string fails.
pub fn verify_password(password: &str, stored: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| AppError::validation("malformed_hash", &format!("stored hash is not a valid PHC string: {}", e)))?;
    let argon2 = Argon2::default();
    Ok(argon2.verify_password(password.as_bytes(), &parsed).is_ok())
}

fn fields(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    v.as_object().cloned().unwrap_or_default()
}

/// Provision the reserved administrator on first run, through the standard
/// creation path (role, then employee, profile and user). Idempotent: returns
/// `Ok(false)` when a user already holds the administrator role.
pub fn ensure_default_admin(store: &Store) -> AppResult<bool> {
    store.ensure_loaded()?;

    let rol_id = match store
        .get_all("roles")?
        .iter()
        .find(|r| {
            r.get("nombre")
                .and_then(|n| n.as_str())
                .map(|n| n.eq_ignore_ascii_case(ADMIN_ROLE))
                .unwrap_or(false)
        })
        .and_then(|r| r.get("id").and_then(|v| v.as_i64()))
    {
        Some(id) => id,
        None => {
            let rol = store.create_role(fields(json!({
                "nombre": ADMIN_ROLE,
                "permisos": ["manage_users", "manage_tasks", "manage_supplies", "view_statistics"],
            })))?;
            rol.id
        }
    };

    let has_admin_user = store
        .get_all("usuarios")?
        .iter()
        .any(|u| u.get("rolId").and_then(|v| v.as_i64()) == Some(rol_id));
    if has_admin_user {
        return Ok(false);
    }

    let empleado = store.create_employee(fields(json!({
        "nombre": "Administrador",
        "cargo": "Administrador",
    })))?;
    let perfil = store.create_profile(fields(json!({
        "tipo": "empleado",
        "empleadoId": empleado.id,
    })))?;
    store.create_user(fields(json!({
        "usuario": DEFAULT_ADMIN_USER,
        "password": DEFAULT_ADMIN_PASSWORD,
        "rolId": rol_id,
        "perfilId": perfil.id,
    })))?;

    info!(target: "clinica::security", "default administrator provisioned");
    warn!(target: "clinica::security", "default administrator password in effect, rotate it after first login");
    Ok(true)
}
