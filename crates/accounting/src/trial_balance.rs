//! Trial balance: every account's balance in its debit or credit column.

use std::collections::HashMap;
use std::io;

use chrono::NaiveDate;
use serde::Serialize;

use society_core::{DomainResult, Money};

use crate::account::{AccountNature, LedgerAccount, Side};
use crate::groups::{LedgerGroup, group_accounts};
use crate::journal::{BALANCE_TOLERANCE, JournalEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalanceRow {
    pub code: String,
    pub name: String,
    pub nature: AccountNature,
    pub debit: Money,
    pub credit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalance {
    pub as_of: Option<NaiveDate>,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Money,
    pub total_credit: Money,
    /// `total_debit - total_credit`.
    pub difference: Money,
    pub balanced: bool,
}

impl TrialBalance {
    /// Flatten ledger groups into rows.
    ///
    /// Asset/Expense accounts land in the debit column, Liability/Income in
    /// the credit column, each with its natural balance. A column total
    /// that overflows is clamped and the balance is reported as off.
    pub fn from_groups(groups: &[LedgerGroup]) -> Self {
        let mut rows = Vec::new();
        let mut total_debit = Money::ZERO;
        let mut total_credit = Money::ZERO;
        let mut in_range = true;

        for group in groups {
            for account in &group.accounts {
                let amount = account.natural_balance();
                let (debit, credit) = match account.nature.normal_side() {
                    Side::Debit => (amount, Money::ZERO),
                    Side::Credit => (Money::ZERO, amount),
                };
                in_range &= total_debit.checked_add(debit).is_some()
                    && total_credit.checked_add(credit).is_some();
                total_debit += debit;
                total_credit += credit;
                rows.push(TrialBalanceRow {
                    code: account.code.clone(),
                    name: account.name.clone(),
                    nature: account.nature,
                    debit,
                    credit,
                });
            }
        }

        let difference = total_debit.checked_sub(total_credit);
        Self {
            as_of: None,
            rows,
            total_debit,
            total_credit,
            difference: difference.unwrap_or(total_debit - total_credit),
            balanced: in_range && difference.is_some_and(|d| d.abs() < BALANCE_TOLERANCE),
        }
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = LedgerAccount>) -> Self {
        Self::from_groups(&group_accounts(accounts))
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Export as CSV: one row per account plus a trailing `TOTAL` row.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(["code", "name", "nature", "debit", "credit"])?;
        for row in &self.rows {
            let debit = row.debit.to_string();
            let credit = row.credit.to_string();
            out.write_record([
                row.code.as_str(),
                row.name.as_str(),
                row.nature.as_str(),
                debit.as_str(),
                credit.as_str(),
            ])?;
        }
        let total_debit = self.total_debit.to_string();
        let total_credit = self.total_credit.to_string();
        out.write_record(["TOTAL", "", "", total_debit.as_str(), total_credit.as_str()])?;
        out.flush()?;
        Ok(())
    }
}

/// Balances as they stood at the end of `as_of`.
///
/// Starts every account from zero and re-posts entries dated on or before
/// `as_of`. Lines for codes not in `accounts` are skipped.
pub fn balances_as_of(
    accounts: &[LedgerAccount],
    entries: &[JournalEntry],
    as_of: NaiveDate,
) -> DomainResult<Vec<LedgerAccount>> {
    let mut by_code: HashMap<&str, LedgerAccount> = accounts
        .iter()
        .map(|a| {
            let mut fresh = a.clone();
            fresh.balance = Money::ZERO;
            (a.code.as_str(), fresh)
        })
        .collect();

    for entry in entries.iter().filter(|e| e.entry_date <= as_of) {
        for line in &entry.lines {
            if let (Some(account), Some((side, amount))) =
                (by_code.get_mut(line.account_code.as_str()), line.posting())
            {
                account.post(side, amount)?;
            }
        }
    }

    Ok(by_code.into_values().collect())
}
