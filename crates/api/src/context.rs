use society_auth::Role;
use society_core::{SocietyId, UserId};

/// Society context for a request, taken from the bearer token.
///
/// Immutable and present on every authenticated route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SocietyContext {
    society_id: SocietyId,
}

impl SocietyContext {
    pub fn new(society_id: SocietyId) -> Self {
        Self { society_id }
    }

    pub fn society_id(&self) -> SocietyId {
        self.society_id
    }
}

/// Authenticated identity and the roles it holds in the active society.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
