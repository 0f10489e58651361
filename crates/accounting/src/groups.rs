//! Ledger aggregation: accounts grouped by nature with group totals.

use serde::Serialize;

use society_core::Money;

use crate::account::{AccountNature, LedgerAccount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerGroup {
    pub nature: AccountNature,
    /// Sorted by account code.
    pub accounts: Vec<LedgerAccount>,
    /// Sum of the accounts' natural balances.
    pub total: Money,
}

/// One group per nature, in `AccountNature::ALL` order. Empty groups are kept.
pub fn group_accounts(accounts: impl IntoIterator<Item = LedgerAccount>) -> Vec<LedgerGroup> {
    let mut groups: Vec<LedgerGroup> = AccountNature::ALL
        .iter()
        .map(|&nature| LedgerGroup {
            nature,
            accounts: Vec::new(),
            total: Money::ZERO,
        })
        .collect();

    for account in accounts {
        let slot = AccountNature::ALL
            .iter()
            .position(|n| *n == account.nature)
            .unwrap_or_default();
        groups[slot].total += account.natural_balance();
        groups[slot].accounts.push(account);
    }

    for group in &mut groups {
        group.accounts.sort_by(|a, b| a.code.cmp(&b.code));
    }

    groups
}
