//! Role and permission predicates. Plain string-set membership over the
//! resolved identity; there is no hierarchy or inheritance among roles.

use crate::store::CompleteUser;

use super::claims::Claims;

/// Reserved administrator role name.
pub const ADMIN_ROLE: &str = "admin";

/// Anything that carries a resolved role and permission set: the claims of
/// a validated token, or the complete user composed from the store.
pub trait Identity {
    fn role_name(&self) -> &str;
    fn permissions(&self) -> &[String];
}

impl Identity for Claims {
    fn role_name(&self) -> &str { &self.rol }
    fn permissions(&self) -> &[String] { &self.permisos }
}

impl Identity for CompleteUser {
    fn role_name(&self) -> &str { &self.rol.nombre }
    fn permissions(&self) -> &[String] { &self.rol.permisos }
}

pub fn is_admin<I: Identity + ?Sized>(identity: &I) -> bool {
    identity.role_name().eq_ignore_ascii_case(ADMIN_ROLE)
}

pub fn has_permission<I: Identity + ?Sized>(identity: &I, permission: &str) -> bool {
    identity.permissions().iter().any(|p| p == permission)
}
