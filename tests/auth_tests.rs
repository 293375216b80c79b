//! Authentication and authorization integration tests: login round-trips,
//! the admin gate, token validation and the session cache's two-tier role.

use anyhow::Result;
use serde_json::{json, Map, Value};
use tempfile::tempdir;

use clinica::error::AppError;
use clinica::identity::{
    AuthProvider, Claims, LocalAuthProvider, TokenAuthority, TokenConfig,
};
use clinica::security;
use clinica::store::SharedStore;

fn fields(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

fn token_config() -> TokenConfig {
    TokenConfig {
        secret: b"integration-test-secret".to_vec(),
        ttl: std::time::Duration::from_secs(60 * 60),
        issuer: "clinica".to_string(),
    }
}

/// Store with an admin ("ana"/"admin123") and a medic ("eva"/"s3cr3t!").
fn seeded_store(dir: &std::path::Path) -> Result<SharedStore> {
    let store = SharedStore::new(dir.join("clinica.json"));
    store.initialize()?;
    let admin_rol = store.create_role(fields(json!({"nombre": "admin", "permisos": ["manage_users"]})))?;
    let medico_rol = store.create_role(fields(json!({"nombre": "medico", "permisos": ["manage_tasks"]})))?;

    let emp_ana = store.create_employee(fields(json!({"nombre": "Ana", "cargo": "Directora"})))?;
    let perfil_ana = store.create_profile(fields(json!({"tipo": "empleado", "empleadoId": emp_ana.id})))?;
    store.create_user(fields(json!({
        "usuario": "ana", "password": "admin123",
        "rolId": admin_rol.id, "perfilId": perfil_ana.id,
    })))?;

    let emp_eva = store.create_employee(fields(json!({"nombre": "Eva", "cargo": "Doctora"})))?;
    let perfil_eva = store.create_profile(fields(json!({"tipo": "empleado", "empleadoId": emp_eva.id})))?;
    store.create_user(fields(json!({
        "usuario": "eva", "password": "s3cr3t!",
        "rolId": medico_rol.id, "perfilId": perfil_eva.id,
    })))?;
    Ok(store)
}

fn provider(store: &SharedStore) -> LocalAuthProvider {
    LocalAuthProvider::new(store.clone(), TokenAuthority::new(&token_config()))
}

#[test]
fn password_hash_round_trip() -> Result<()> {
    let phc = security::hash_password("s3cr3t!")?;
    assert!(security::verify_password("s3cr3t!", &phc)?);
    assert!(!security::verify_password("wrong", &phc)?);
    Ok(())
}

#[test]
fn malformed_stored_hash_is_a_validation_error() {
    let err = security::verify_password("x", "not-a-phc-string").unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }), "got {:?}", err);
}

#[test]
fn admin_login_succeeds_and_claims_carry_the_role() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);

    let session = auth.authenticate_admin("ana", "admin123")?;
    assert_eq!(session.identity.rol.nombre, "admin");
    assert_eq!(session.identity.usuario, "ana");

    let (claims, cached) = auth.verify_session(&session.token)?;
    assert_eq!(claims.rol, "admin");
    assert_eq!(claims.usuario, "ana");
    assert_eq!(claims.permisos, vec!["manage_users".to_string()]);
    assert!(cached.active);
    Ok(())
}

#[test]
fn non_admin_credentials_fail_the_admin_gate() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);

    // The same credentials pass the plain gate.
    assert!(auth.authenticate("eva", "s3cr3t!").is_ok());
    let err = auth.authenticate_admin("eva", "s3cr3t!").unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermissions { .. }), "got {:?}", err);
    Ok(())
}

#[test]
fn unknown_user_and_wrong_password_are_indistinguishable() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);

    let wrong = auth.authenticate("ana", "nope").unwrap_err();
    let unknown = auth.authenticate("nobody", "nope").unwrap_err();
    assert!(matches!(wrong, AppError::InvalidCredentials { .. }));
    assert!(matches!(unknown, AppError::InvalidCredentials { .. }));
    assert_eq!(wrong.code_str(), unknown.code_str());
    Ok(())
}

#[test]
fn token_round_trip_preserves_claims() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);

    let session = auth.authenticate("eva", "s3cr3t!")?;
    let (claims, _) = auth.verify_session(&session.token)?;
    assert_eq!(claims.usuario, "eva");
    assert_eq!(claims.rol, "medico");
    assert_eq!(claims.permisos, vec!["manage_tasks".to_string()]);
    assert_eq!(claims.iss, "clinica");
    assert!(claims.exp > claims.iat);
    Ok(())
}

#[test]
fn tampered_token_is_rejected() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);

    let session = auth.authenticate("eva", "s3cr3t!")?;
    let mut bytes = session.token.clone().into_bytes();
    let i = bytes.len() / 2;
    bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(bytes)?;

    let err = auth.verify_session(&tampered).unwrap_err();
    assert!(matches!(err, AppError::InvalidToken { .. }), "got {:?}", err);
    Ok(())
}

#[test]
fn expired_and_foreign_issuer_tokens_are_rejected_uniformly() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);
    let cfg = token_config();

    let base = Claims {
        sub: 1,
        usuario: "ana".to_string(),
        rol: "admin".to_string(),
        permisos: vec![],
        iat: 1_000,
        exp: 2_000, // long past
        iss: cfg.issuer.clone(),
        jti: "expired".to_string(),
    };
    let key = jsonwebtoken::EncodingKey::from_secret(&cfg.secret);
    let expired = jsonwebtoken::encode(&jsonwebtoken::Header::default(), &base, &key)?;
    let err = auth.verify_session(&expired).unwrap_err();
    assert!(matches!(err, AppError::InvalidToken { .. }));

    let foreign = Claims {
        exp: i64::MAX,
        iss: "otra-clinica".to_string(),
        jti: "foreign".to_string(),
        ..base
    };
    let foreign_token = jsonwebtoken::encode(&jsonwebtoken::Header::default(), &foreign, &key)?;
    let err2 = auth.verify_session(&foreign_token).unwrap_err();
    assert!(matches!(err2, AppError::InvalidToken { .. }));
    assert_eq!(err.code_str(), err2.code_str(), "rejections must not leak the reason");
    Ok(())
}

#[test]
fn session_is_reconstructed_after_a_cache_restart() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);
    let session = auth.authenticate("eva", "s3cr3t!")?;

    // A second provider over the same secret models a process restart: the
    // cache starts empty but the token is still cryptographically valid.
    let restarted = provider(&store);
    assert!(restarted.sessions().peek(&session.token).is_none());
    let (_, rebuilt) = restarted.verify_session(&session.token)?;
    assert!(rebuilt.active);
    assert_eq!(rebuilt.usuario, "eva");
    assert!(restarted.sessions().peek(&session.token).is_some());
    Ok(())
}

#[test]
fn logout_revokes_the_cache_entry_but_not_the_token() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);
    let session = auth.authenticate("eva", "s3cr3t!")?;

    assert!(auth.logout(&session.token));
    assert!(!auth.logout(&session.token), "second logout finds no entry");
    assert!(auth.sessions().peek(&session.token).is_none());

    // Stateless tokens cannot be cryptographically invalidated: validation
    // still succeeds and the session entry is rebuilt.
    let (_, rebuilt) = auth.verify_session(&session.token)?;
    assert!(rebuilt.active);
    Ok(())
}

#[test]
fn session_statistics_reflect_logins() -> Result<()> {
    let tmp = tempdir()?;
    let store = seeded_store(tmp.path())?;
    let auth = provider(&store);
    auth.authenticate("ana", "admin123")?;
    auth.authenticate("eva", "s3cr3t!")?;

    let stats = auth.sessions().statistics();
    assert_eq!(stats.active, 2);
    assert_eq!(stats.by_role.get("admin"), Some(&1));
    assert_eq!(stats.by_role.get("medico"), Some(&1));
    assert_eq!(stats.created_last_hour, 2);
    Ok(())
}

#[test]
fn default_admin_bootstrap_is_idempotent_and_logs_in() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path().join("clinica.json"));
    store.initialize()?;

    assert!(security::ensure_default_admin(&store)?);
    assert!(!security::ensure_default_admin(&store)?, "second run provisions nothing");

    let auth = provider(&store);
    let session = auth.authenticate_admin(
        security::DEFAULT_ADMIN_USER,
        security::DEFAULT_ADMIN_PASSWORD,
    )?;
    assert_eq!(session.identity.rol.nombre, "admin");

    // Rotating the default secret goes through the normal update path.
    store.update("usuarios", session.identity.id, fields(json!({"password": "rotated!"})))?;
    assert!(auth.authenticate_admin(security::DEFAULT_ADMIN_USER, "rotated!").is_ok());
    assert!(matches!(
        auth.authenticate_admin(security::DEFAULT_ADMIN_USER, security::DEFAULT_ADMIN_PASSWORD).unwrap_err(),
        AppError::InvalidCredentials { .. }
    ));
    Ok(())
}
