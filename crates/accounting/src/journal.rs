//! Journal entries and the balance check run before posting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use society_core::{Money, UserId};

use crate::account::Side;

/// Debit and credit totals must differ by less than this to balance.
///
/// Amounts are whole minor units, so this means "exactly equal".
pub const BALANCE_TOLERANCE: Money = Money::from_minor(1);

/// One line of a journal entry. Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_code: String,
    #[serde(default)]
    pub debit: Money,
    #[serde(default)]
    pub credit: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl JournalLine {
    pub fn debit(account_code: impl Into<String>, amount: Money) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: Money::ZERO,
            memo: None,
        }
    }

    pub fn credit(account_code: impl Into<String>, amount: Money) -> Self {
        Self {
            account_code: account_code.into(),
            debit: Money::ZERO,
            credit: amount,
            memo: None,
        }
    }

    /// The side this line posts to, if it is well formed.
    pub fn posting(&self) -> Option<(Side, Money)> {
        match (self.debit.is_positive(), self.credit.is_positive()) {
            (true, false) if self.credit.is_zero() => Some((Side::Debit, self.debit)),
            (false, true) if self.debit.is_zero() => Some((Side::Credit, self.credit)),
            _ => None,
        }
    }
}

/// Running totals of a (possibly draft) entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JournalTotals {
    pub debit: Money,
    pub credit: Money,
    /// `debit - credit`.
    pub difference: Money,
    pub balanced: bool,
}

impl JournalTotals {
    /// Totals for display. When a column overflows the figures are clamped
    /// and `balanced` is false; use [`JournalTotals::checked`] to detect it.
    pub fn of(lines: &[JournalLine]) -> Self {
        Self::checked(lines).unwrap_or_else(|| {
            let debit: Money = lines.iter().map(|l| l.debit).sum();
            let credit: Money = lines.iter().map(|l| l.credit).sum();
            Self {
                debit,
                credit,
                difference: debit - credit,
                balanced: false,
            }
        })
    }

    /// `None` if either column, or their difference, leaves the `Money` range.
    pub fn checked(lines: &[JournalLine]) -> Option<Self> {
        let debit = checked_sum(lines.iter().map(|l| l.debit))?;
        let credit = checked_sum(lines.iter().map(|l| l.credit))?;
        let difference = debit.checked_sub(credit)?;
        Some(Self {
            debit,
            credit,
            difference,
            balanced: difference.abs() < BALANCE_TOLERANCE,
        })
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = Money>) -> Option<Money> {
    amounts.try_fold(Money::ZERO, Money::checked_add)
}

/// A reason an entry cannot be posted. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalIssue {
    #[error("journal entry needs at least two lines (got {count})")]
    TooFewLines { count: usize },

    #[error("line {line}: account code is blank")]
    BlankAccount { line: usize },

    #[error("line {line}: amounts must not be negative")]
    NegativeAmount { line: usize },

    #[error("line {line}: enter either a debit or a credit, not both")]
    BothSides { line: usize },

    #[error("line {line}: no amount entered")]
    NoAmount { line: usize },

    #[error("debits ({debit}) must equal credits ({credit})")]
    Unbalanced { debit: Money, credit: Money },

    #[error("journal entry moves no money")]
    ZeroTotal,

    #[error("journal totals are too large to record")]
    AmountOutOfRange,
}

impl JournalIssue {
    pub fn is_imbalance(&self) -> bool {
        matches!(self, JournalIssue::Unbalanced { .. })
    }
}

/// Collect every problem with a set of lines; empty means postable.
pub fn validate_lines(lines: &[JournalLine]) -> Vec<JournalIssue> {
    let mut issues = Vec::new();

    if lines.len() < 2 {
        issues.push(JournalIssue::TooFewLines { count: lines.len() });
    }

    for (idx, line) in lines.iter().enumerate() {
        let n = idx + 1;
        if line.account_code.trim().is_empty() {
            issues.push(JournalIssue::BlankAccount { line: n });
        }
        if line.debit.is_negative() || line.credit.is_negative() {
            issues.push(JournalIssue::NegativeAmount { line: n });
        } else if line.debit.is_positive() && line.credit.is_positive() {
            issues.push(JournalIssue::BothSides { line: n });
        } else if line.debit.is_zero() && line.credit.is_zero() {
            issues.push(JournalIssue::NoAmount { line: n });
        }
    }

    let Some(totals) = JournalTotals::checked(lines) else {
        issues.push(JournalIssue::AmountOutOfRange);
        return issues;
    };
    if !totals.balanced {
        issues.push(JournalIssue::Unbalanced {
            debit: totals.debit,
            credit: totals.credit,
        });
    } else if totals.debit.is_zero() && !lines.is_empty() {
        issues.push(JournalIssue::ZeroTotal);
    }

    issues
}

/// A dated, multi-line record of debits and credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub entry_id: Uuid,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub narration: String,
    pub lines: Vec<JournalLine>,
    pub posted_by: UserId,
    pub posted_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn totals(&self) -> JournalTotals {
        JournalTotals::of(&self.lines)
    }
}
