use serde::{Deserialize, Serialize};

use crate::permissions::{CHAT_USE, LEDGER_READ, LEDGER_WRITE, Permission};

/// Dashboard roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    SocietyAdmin,
    Resident,
    Guard,
    Vendor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::SocietyAdmin => "society_admin",
            Role::Resident => "resident",
            Role::Guard => "guard",
            Role::Vendor => "vendor",
        }
    }

    /// Permissions granted by this role inside its society.
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            Role::SuperAdmin => vec![Permission::wildcard()],
            Role::SocietyAdmin => vec![
                Permission::new(LEDGER_READ),
                Permission::new(LEDGER_WRITE),
                Permission::new(CHAT_USE),
            ],
            Role::Resident | Role::Guard | Role::Vendor => vec![Permission::new(CHAT_USE)],
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
