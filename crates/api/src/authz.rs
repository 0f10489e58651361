//! API-side authorization guard.
//!
//! Runs before any command is dispatched or read model is queried, keeping
//! the domain crates auth-agnostic.

use society_auth::{AuthzError, Permission, Principal, SocietyMembership, authorize};

use crate::context::{PrincipalContext, SocietyContext};

/// Check that the caller holds `permission` in the request's society.
pub fn require(
    society: &SocietyContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), AuthzError> {
    let principal = Principal {
        user_id: principal.user_id(),
        active_society_id: society.society_id(),
        membership: SocietyMembership::from_roles(society.society_id(), principal.roles().to_vec()),
    };

    authorize(&principal, &Permission::new(permission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use society_auth::Role;
    use society_auth::permissions::{CHAT_USE, LEDGER_WRITE};
    use society_core::{SocietyId, UserId};

    fn ctx(roles: Vec<Role>) -> (SocietyContext, PrincipalContext) {
        (SocietyContext::new(SocietyId::new()), PrincipalContext::new(UserId::new(), roles))
    }

    #[test]
    fn residents_chat_but_do_not_post_journals() {
        let (society, principal) = ctx(vec![Role::Resident]);
        assert!(require(&society, &principal, CHAT_USE).is_ok());
        assert!(matches!(
            require(&society, &principal, LEDGER_WRITE),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn super_admin_holds_everything() {
        let (society, principal) = ctx(vec![Role::SuperAdmin]);
        assert!(require(&society, &principal, LEDGER_WRITE).is_ok());
    }
}
