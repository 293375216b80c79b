//! Authentication and authorization for clinica: signed session tokens,
//! the process-local session cache and the role/permission policy.
//! Keep the public surface thin and split implementation across sub-modules.

mod claims;
mod token;
mod session;
mod provider;
mod authorizer;
mod request_context;

pub use claims::Claims;
pub use token::{TokenAuthority, TokenConfig};
pub use session::{Session, SessionCache, SessionStats};
pub use provider::{AuthProvider, AuthSession, LocalAuthProvider};
pub use authorizer::{has_permission, is_admin, Identity, ADMIN_ROLE};
pub use request_context::{token_from_parts, RequestContext, TOKEN_COOKIE};
