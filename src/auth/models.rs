use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// Roles for RBAC in AcsoGuard.
///
/// The order of variants matters: it defines the privilege hierarchy.
/// `Receptionist` is the least privileged, `SuperAdmin` is the most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Front-desk staff: checks visitors in and out.
    Receptionist = 0,
    /// Site security staff: bans, incidents, emergencies.
    Security = 1,
    /// Tenant owner: manages sites, staff and the subscription.
    Admin = 2,
    /// Platform operator, not bound to a tenant.
    SuperAdmin = 3,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Receptionist => write!(f, "receptionist"),
            Role::Security => write!(f, "security"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl Role {
    /// Parse a role from a string (case-insensitive).
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "receptionist" => Some(Role::Receptionist),
            "security" => Some(Role::Security),
            "admin" => Some(Role::Admin),
            "super_admin" | "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Returns `true` if `self` has at least the required role.
    pub fn has_access(&self, required: Role) -> bool {
        *self >= required
    }

    /// Staff accounts are bound to a single site.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Receptionist | Role::Security)
    }
}

/// The caller of a request, resolved from the bearer token and the user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// The tenant (admin account id) this user belongs to.
    pub tenant_id: String,
    /// Assigned site for staff roles.
    pub site_id: Option<String>,
}

impl AuthenticatedUser {
    /// Fail with 403 unless the user holds at least `required`.
    pub fn require(&self, required: Role) -> Result<(), AppError> {
        if self.role.has_access(required) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "This action requires the {} role",
                required
            )))
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}
