use crate::constants::{ENV_USER_ID, ENV_USER_ROLE};
use crate::types::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// The single fact the pipeline needs from authentication: who is the caller
/// and what is their role. Session issuance and the identity-provider
/// handshake live behind this seam and are not re-implemented here.
pub trait IdentityOracle: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;
}

/// Identity sourced from environment variables. Good enough for the CLI; a
/// hosting application supplies its own oracle.
pub struct EnvIdentity;

impl IdentityOracle for EnvIdentity {
    fn current_user(&self) -> Option<CurrentUser> {
        let id = std::env::var(ENV_USER_ID).ok()?;
        if id.is_empty() {
            return None;
        }
        let role = match std::env::var(ENV_USER_ROLE).ok().as_deref() {
            Some("admin") => UserRole::Admin,
            _ => UserRole::User,
        };
        Some(CurrentUser {
            id: UserId(id),
            role,
        })
    }
}

/// Fixed identity, used by tests and by embedders that already resolved the
/// caller elsewhere.
pub struct StaticIdentity(pub Option<CurrentUser>);

impl IdentityOracle for StaticIdentity {
    fn current_user(&self) -> Option<CurrentUser> {
        self.0.clone()
    }
}
