use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use society_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, SocietyId};
use society_events::Event;

use crate::account::{AccountNature, LedgerAccount};
use crate::journal::{JournalEntry, JournalIssue, JournalTotals, validate_lines};

/// Aggregate type tag used for ledger streams in the event store.
pub const LEDGER_AGGREGATE_TYPE: &str = "accounting.ledger";

/// Ceiling on the debits ever posted to one ledger.
///
/// Every account balance and every trial-balance column is bounded by twice
/// this figure, so projections built from the ledger stay in `Money` range.
pub const MAX_LEDGER_TURNOVER: Money = Money::from_minor(i64::MAX / 2);

/// Ledger identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(pub AggregateId);

impl LedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn of_society(society_id: SocietyId) -> Self {
        Self(AggregateId::ledger_of(society_id))
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: a society's chart of accounts + journal.
///
/// The ledger does NOT hold balances. It remembers which account codes exist,
/// which entry ids were posted and the running debit turnover; balances come
/// from projecting `JournalEntryPosted` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    id: LedgerId,
    society_id: Option<SocietyId>,
    version: u64,
    accounts: BTreeMap<String, AccountNature>,
    posted: HashSet<Uuid>,
    turnover: Money,
}

impl Ledger {
    /// Empty aggregate for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            society_id: None,
            version: 0,
            accounts: BTreeMap::new(),
            posted: HashSet::new(),
            turnover: Money::ZERO,
        }
    }

    pub fn society_id(&self) -> Option<SocietyId> {
        self.society_id
    }

    pub fn has_account(&self, code: &str) -> bool {
        self.accounts.contains_key(code)
    }

    /// Sum of the debit side of every posted entry.
    pub fn turnover(&self) -> Money {
        self.turnover
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub society_id: SocietyId,
    pub code: String,
    pub name: String,
    pub nature: AccountNature,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostJournalEntry {
    pub society_id: SocietyId,
    pub entry: JournalEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    OpenAccount(OpenAccount),
    PostJournalEntry(PostJournalEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    pub society_id: SocietyId,
    pub code: String,
    pub name: String,
    pub nature: AccountNature,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryPosted {
    pub society_id: SocietyId,
    pub entry: JournalEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    AccountOpened(AccountOpened),
    JournalEntryPosted(JournalEntryPosted),
}

impl LedgerEvent {
    pub fn society_id(&self) -> SocietyId {
        match self {
            LedgerEvent::AccountOpened(e) => e.society_id,
            LedgerEvent::JournalEntryPosted(e) => e.society_id,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::AccountOpened(_) => "accounting.ledger.account_opened",
            LedgerEvent::JournalEntryPosted(_) => "accounting.ledger.journal_entry_posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::AccountOpened(e) => e.occurred_at,
            LedgerEvent::JournalEntryPosted(e) => e.entry.posted_at,
        }
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        if self.society_id.is_none() {
            self.society_id = Some(event.society_id());
        }

        match event {
            LedgerEvent::AccountOpened(e) => {
                self.accounts.insert(e.code.clone(), e.nature);
            }
            LedgerEvent::JournalEntryPosted(e) => {
                self.posted.insert(e.entry.entry_id);
                self.turnover += e.entry.totals().debit;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::OpenAccount(cmd) => self.handle_open(cmd),
            LedgerCommand::PostJournalEntry(cmd) => self.handle_post(cmd),
        }
    }
}

impl Ledger {
    fn ensure_society(&self, society_id: SocietyId) -> Result<(), DomainError> {
        match self.society_id {
            Some(owner) if owner != society_id => Err(DomainError::invariant("society mismatch")),
            _ => Ok(()),
        }
    }

    fn handle_open(&self, cmd: &OpenAccount) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_society(cmd.society_id)?;

        let account = LedgerAccount::new(&cmd.code, &cmd.name, cmd.nature)?;
        if self.accounts.contains_key(&account.code) {
            return Err(DomainError::conflict(format!(
                "account {} already exists",
                account.code
            )));
        }

        Ok(vec![LedgerEvent::AccountOpened(AccountOpened {
            society_id: cmd.society_id,
            code: account.code,
            name: account.name,
            nature: account.nature,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_post(&self, cmd: &PostJournalEntry) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_society(cmd.society_id)?;
        let entry = &cmd.entry;

        let issues = validate_lines(&entry.lines);
        if let Some(shape) = issues.iter().find(|i| !i.is_imbalance()) {
            let rest = issues.iter().filter(|i| !i.is_imbalance()).count() - 1;
            let msg = if rest == 0 {
                shape.to_string()
            } else {
                format!("{shape} (and {rest} more)")
            };
            return Err(DomainError::validation(msg));
        }
        if let Some(JournalIssue::Unbalanced { debit, credit }) = issues.first() {
            return Err(DomainError::invariant(format!(
                "debits must equal credits (debit {debit}, credit {credit})"
            )));
        }

        for line in &entry.lines {
            if !self.accounts.contains_key(line.account_code.trim()) {
                return Err(DomainError::validation(format!(
                    "unknown account {}",
                    line.account_code
                )));
            }
        }

        if self.posted.contains(&entry.entry_id) {
            return Err(DomainError::conflict(format!(
                "journal entry {} was already posted",
                entry.entry_id
            )));
        }

        let within_limit = JournalTotals::checked(&entry.lines)
            .and_then(|t| self.turnover.checked_add(t.debit))
            .is_some_and(|next| next <= MAX_LEDGER_TURNOVER);
        if !within_limit {
            return Err(DomainError::validation(format!(
                "posting would take the ledger past its {MAX_LEDGER_TURNOVER} turnover limit"
            )));
        }

        let mut entry = entry.clone();
        for line in &mut entry.lines {
            line.account_code = line.account_code.trim().to_string();
        }
        entry.narration = entry.narration.trim().to_string();

        Ok(vec![LedgerEvent::JournalEntryPosted(JournalEntryPosted {
            society_id: cmd.society_id,
            entry,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use society_core::{Money, UserId};

    use crate::journal::JournalLine;

    fn open(society_id: SocietyId, code: &str, nature: AccountNature) -> LedgerCommand {
        LedgerCommand::OpenAccount(OpenAccount {
            society_id,
            code: code.to_string(),
            name: format!("Account {code}"),
            nature,
            occurred_at: Utc::now(),
        })
    }

    fn entry(lines: Vec<JournalLine>) -> JournalEntry {
        JournalEntry {
            entry_id: Uuid::now_v7(),
            entry_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            reference: Some("MAINT-APR".to_string()),
            narration: "April maintenance".to_string(),
            lines,
            posted_by: UserId::new(),
            posted_at: Utc::now(),
        }
    }

    fn post(society_id: SocietyId, entry: JournalEntry) -> LedgerCommand {
        LedgerCommand::PostJournalEntry(PostJournalEntry { society_id, entry })
    }

    /// Ledger with a bank (asset) and maintenance income account.
    fn seeded(society_id: SocietyId) -> Ledger {
        let mut ledger = Ledger::empty(LedgerId::of_society(society_id));
        for cmd in [
            open(society_id, "1000", AccountNature::Asset),
            open(society_id, "4000", AccountNature::Income),
        ] {
            for ev in ledger.handle(&cmd).unwrap() {
                ledger.apply(&ev);
            }
        }
        ledger
    }

    #[test]
    fn open_account_emits_event_and_rejects_duplicates() {
        let society = SocietyId::new();
        let ledger = seeded(society);
        assert_eq!(ledger.version(), 2);
        assert!(ledger.has_account("1000"));

        let err = ledger.handle(&open(society, "1000", AccountNature::Asset)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn balanced_entry_is_posted() {
        let society = SocietyId::new();
        let ledger = seeded(society);
        let lines = vec![
            JournalLine::debit("1000", Money::from_minor(300_000)),
            JournalLine::credit("4000", Money::from_minor(300_000)),
        ];

        let events = ledger.handle(&post(society, entry(lines.clone()))).unwrap();
        match &events[..] {
            [LedgerEvent::JournalEntryPosted(e)] => {
                assert_eq!(e.society_id, society);
                assert_eq!(e.entry.lines, lines);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn unbalanced_entry_is_an_invariant_violation() {
        let society = SocietyId::new();
        let ledger = seeded(society);
        let lines = vec![
            JournalLine::debit("1000", Money::from_minor(100)),
            JournalLine::credit("4000", Money::from_minor(90)),
        ];

        let err = ledger.handle(&post(society, entry(lines))).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("debits must equal credits") => {}
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn malformed_lines_are_validation_errors() {
        let society = SocietyId::new();
        let ledger = seeded(society);
        let lines = vec![JournalLine::debit("1000", Money::from_minor(100))];

        let err = ledger.handle(&post(society, entry(lines))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn unknown_accounts_are_rejected() {
        let society = SocietyId::new();
        let ledger = seeded(society);
        let lines = vec![
            JournalLine::debit("1000", Money::from_minor(100)),
            JournalLine::credit("9999", Money::from_minor(100)),
        ];

        let err = ledger.handle(&post(society, entry(lines))).unwrap_err();
        assert_eq!(err, DomainError::validation("unknown account 9999"));
    }

    #[test]
    fn reposting_the_same_entry_id_conflicts() {
        let society = SocietyId::new();
        let mut ledger = seeded(society);
        let e = entry(vec![
            JournalLine::debit("1000", Money::from_minor(100)),
            JournalLine::credit("4000", Money::from_minor(100)),
        ]);

        for ev in ledger.handle(&post(society, e.clone())).unwrap() {
            ledger.apply(&ev);
        }
        let err = ledger.handle(&post(society, e)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn totals_that_overflow_are_rejected() {
        let society = SocietyId::new();
        let ledger = seeded(society);
        // Debits exceed credits by 999.99 once summed exactly.
        let lines = vec![
            JournalLine::debit("1000", Money::from_minor(i64::MAX)),
            JournalLine::debit("1000", Money::from_minor(100_000)),
            JournalLine::credit("4000", Money::from_minor(i64::MAX)),
            JournalLine::credit("4000", Money::from_minor(1)),
        ];

        let err = ledger.handle(&post(society, entry(lines))).unwrap_err();
        assert_eq!(err, DomainError::validation("journal totals are too large to record"));
    }

    #[test]
    fn turnover_is_capped() {
        let society = SocietyId::new();
        let mut ledger = seeded(society);
        let big = MAX_LEDGER_TURNOVER.minor() - 10;

        let first = entry(vec![
            JournalLine::debit("1000", Money::from_minor(big)),
            JournalLine::credit("4000", Money::from_minor(big)),
        ]);
        for ev in ledger.handle(&post(society, first)).unwrap() {
            ledger.apply(&ev);
        }
        assert_eq!(ledger.turnover(), Money::from_minor(big));

        let over = entry(vec![
            JournalLine::debit("1000", Money::from_minor(11)),
            JournalLine::credit("4000", Money::from_minor(11)),
        ]);
        let err = ledger.handle(&post(society, over)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let fits = entry(vec![
            JournalLine::debit("1000", Money::from_minor(10)),
            JournalLine::credit("4000", Money::from_minor(10)),
        ]);
        assert!(ledger.handle(&post(society, fits)).is_ok());
    }

    #[test]
    fn other_society_cannot_use_the_ledger() {
        let ledger = seeded(SocietyId::new());
        let err = ledger
            .handle(&open(SocietyId::new(), "2000", AccountNature::Liability))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Balanced entries always post, and everything posted nets to zero.
        #[test]
        fn posted_entries_net_to_zero(
            amounts in prop::collection::vec(1i64..1_000_000i64, 1..10)
        ) {
            let society = SocietyId::new();
            let mut ledger = seeded(society);
            let mut net: i128 = 0;

            for amount in amounts {
                let lines = vec![
                    JournalLine::debit("1000", Money::from_minor(amount)),
                    JournalLine::credit("4000", Money::from_minor(amount)),
                ];
                let events = ledger.handle(&post(society, entry(lines))).unwrap();
                for ev in &events {
                    ledger.apply(ev);
                    if let LedgerEvent::JournalEntryPosted(p) = ev {
                        for line in &p.entry.lines {
                            net += i128::from(line.debit.minor()) - i128::from(line.credit.minor());
                        }
                    }
                }
            }

            prop_assert_eq!(net, 0);
        }

        /// Any debit/credit mismatch of at least one minor unit is refused.
        #[test]
        fn mismatched_entries_never_post(
            debit in 1i64..1_000_000i64,
            skew in prop::sample::select(vec![-500i64, -1, 1, 7, 10_000]),
        ) {
            let society = SocietyId::new();
            let ledger = seeded(society);
            let credit = (debit + skew).max(1);
            prop_assume!(credit != debit);

            let lines = vec![
                JournalLine::debit("1000", Money::from_minor(debit)),
                JournalLine::credit("4000", Money::from_minor(credit)),
            ];
            let err = ledger.handle(&post(society, entry(lines))).unwrap_err();
            prop_assert!(matches!(err, DomainError::InvariantViolation(_)), "unexpected error kind");
        }
    }
}
