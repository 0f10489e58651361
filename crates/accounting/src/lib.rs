//! Accounting module (double-entry society ledger, event-sourced).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod groups;
pub mod journal;
pub mod ledger;
pub mod trial_balance;

pub use account::{AccountNature, LedgerAccount, Side};
pub use groups::{LedgerGroup, group_accounts};
pub use journal::{BALANCE_TOLERANCE, JournalEntry, JournalIssue, JournalLine, JournalTotals, validate_lines};
pub use ledger::{
    AccountOpened, JournalEntryPosted, Ledger, LedgerCommand, LedgerEvent, LedgerId, OpenAccount,
    PostJournalEntry, LEDGER_AGGREGATE_TYPE, MAX_LEDGER_TURNOVER,
};
pub use trial_balance::{TrialBalance, TrialBalanceRow, balances_as_of};
