use core::str::FromStr;

use serde::{Deserialize, Serialize};

use society_core::{DomainError, DomainResult, Money};

const MAX_CODE_LEN: usize = 20;

/// Side of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// Nature of a ledger account (determines its normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountNature {
    Asset,
    Liability,
    Income,
    Expense,
}

impl AccountNature {
    /// Display order used by ledger groups and the trial balance.
    pub const ALL: [AccountNature; 4] = [
        AccountNature::Asset,
        AccountNature::Liability,
        AccountNature::Income,
        AccountNature::Expense,
    ];

    pub fn normal_side(self) -> Side {
        match self {
            AccountNature::Asset | AccountNature::Expense => Side::Debit,
            AccountNature::Liability | AccountNature::Income => Side::Credit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountNature::Asset => "asset",
            AccountNature::Liability => "liability",
            AccountNature::Income => "income",
            AccountNature::Expense => "expense",
        }
    }
}

impl core::fmt::Display for AccountNature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountNature {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asset" => Ok(AccountNature::Asset),
            "liability" => Ok(AccountNature::Liability),
            "income" => Ok(AccountNature::Income),
            "expense" => Ok(AccountNature::Expense),
            _ => Err(DomainError::validation(
                "nature must be one of: asset, liability, income, expense",
            )),
        }
    }
}

/// A named bucket holding a running balance.
///
/// `balance` is debit-positive: debits add, credits subtract, whatever the
/// nature. Use [`LedgerAccount::natural_balance`] for the figure a report shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub code: String,
    pub name: String,
    pub nature: AccountNature,
    pub balance: Money,
}

impl LedgerAccount {
    pub fn new(code: &str, name: &str, nature: AccountNature) -> DomainResult<Self> {
        validate_account_code(code)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }
        Ok(Self {
            code: code.trim().to_string(),
            name: name.to_string(),
            nature,
            balance: Money::ZERO,
        })
    }

    /// Balance measured in the account's normal direction.
    pub fn natural_balance(&self) -> Money {
        match self.nature.normal_side() {
            Side::Debit => self.balance,
            Side::Credit => -self.balance,
        }
    }

    /// Move the balance by one posting. Fails, leaving the balance as it
    /// was, if the result would leave the `Money` range.
    pub fn post(&mut self, side: Side, amount: Money) -> DomainResult<()> {
        let next = match side {
            Side::Debit => self.balance.checked_add(amount),
            Side::Credit => self.balance.checked_sub(amount),
        };
        self.balance = next.ok_or_else(|| {
            DomainError::invariant(format!("balance of account {} out of range", self.code))
        })?;
        Ok(())
    }
}

pub fn validate_account_code(code: &str) -> DomainResult<()> {
    let code = code.trim();
    if code.is_empty() {
        return Err(DomainError::validation("account code must not be empty"));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(DomainError::validation(format!(
            "account code must be at most {MAX_CODE_LEN} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(DomainError::validation(
            "account code may only contain letters, digits, '-' and '.'",
        ));
    }
    Ok(())
}
