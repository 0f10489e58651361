use std::borrow::Cow;

use serde::{Deserialize, Serialize};

pub const LEDGER_READ: &str = "ledger.read";
pub const LEDGER_WRITE: &str = "ledger.write";
pub const CHAT_USE: &str = "chat.use";

/// Permission identifier.
///
/// Opaque strings (e.g. "ledger.write"); `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn wildcard() -> Self {
        Self::new("*")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
