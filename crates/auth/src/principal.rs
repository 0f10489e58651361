use serde::{Deserialize, Serialize};

use society_core::{SocietyId, UserId};

use crate::{JwtClaims, Permission, Role};

/// A user's membership in a society: the roles held there and what they grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocietyMembership {
    pub society_id: SocietyId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl SocietyMembership {
    /// Membership whose permissions are derived from `roles`.
    pub fn from_roles(society_id: SocietyId, roles: Vec<Role>) -> Self {
        let mut permissions: Vec<Permission> = Vec::new();
        for perm in roles.iter().flat_map(Role::permissions) {
            if !permissions.contains(&perm) {
                permissions.push(perm);
            }
        }
        Self {
            society_id,
            roles,
            permissions,
        }
    }
}

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub active_society_id: SocietyId,
    pub membership: SocietyMembership,
}

impl Principal {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            active_society_id: claims.society_id,
            membership: SocietyMembership::from_roles(claims.society_id, claims.roles.clone()),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.membership.roles.contains(&role)
    }
}
