use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use society_accounting::{JournalEntry, LEDGER_AGGREGATE_TYPE, LedgerAccount, LedgerEvent};
use society_core::{AggregateId, Money, SocietyId};
use society_events::EventEnvelope;

use crate::read_model::SocietyStore;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    society_id: SocietyId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum LedgerProjectionError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error("society isolation violation: {0}")]
    SocietyIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("journal entry references unknown account {0}")]
    UnknownAccount(String),

    #[error("posting moves account {0} out of range")]
    BalanceOutOfRange(String),
}

/// Projection: ledger stream → account balances + journal register.
///
/// Balances are debit-positive. Envelopes at or below the stream cursor are
/// skipped, so redelivery is harmless.
#[derive(Debug)]
pub struct LedgerProjection<A, J>
where
    A: SocietyStore<String, LedgerAccount>,
    J: SocietyStore<Uuid, JournalEntry>,
{
    accounts: A,
    journal: J,
    // Held for the whole cursor-check + write sequence.
    cursors: Mutex<HashMap<CursorKey, u64>>,
}

impl<A, J> LedgerProjection<A, J>
where
    A: SocietyStore<String, LedgerAccount>,
    J: SocietyStore<Uuid, JournalEntry>,
{
    pub fn new(accounts: A, journal: J) -> Self {
        Self {
            accounts,
            journal,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    fn lock_cursors(&self) -> MutexGuard<'_, HashMap<CursorKey, u64>> {
        self.cursors.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn account(&self, society_id: SocietyId, code: &str) -> Option<LedgerAccount> {
        self.accounts.get(society_id, &code.to_string())
    }

    /// All accounts of a society, sorted by code.
    pub fn accounts(&self, society_id: SocietyId) -> Vec<LedgerAccount> {
        let mut accounts = self.accounts.list(society_id);
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        accounts
    }

    /// Posted entries, oldest first by entry date then posting time.
    pub fn journal(&self, society_id: SocietyId) -> Vec<JournalEntry> {
        let mut entries = self.journal.list(society_id);
        entries.sort_by(|a, b| {
            (a.entry_date, a.posted_at, a.entry_id).cmp(&(b.entry_date, b.posted_at, b.entry_id))
        });
        entries
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), LedgerProjectionError> {
        if envelope.aggregate_type() != LEDGER_AGGREGATE_TYPE {
            return Ok(());
        }

        let society_id = envelope.society_id();
        let key = CursorKey {
            society_id,
            aggregate_id: envelope.aggregate_id(),
        };
        let seq = envelope.sequence_number();

        let mut cursors = self.lock_cursors();
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq == 0 {
            return Err(LedgerProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(LedgerProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: LedgerEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| LedgerProjectionError::Deserialize(e.to_string()))?;

        if ev.society_id() != society_id {
            return Err(LedgerProjectionError::SocietyIsolation(
                "event society_id does not match envelope society_id".to_string(),
            ));
        }

        match ev {
            LedgerEvent::AccountOpened(e) => {
                let account = LedgerAccount {
                    code: e.code.clone(),
                    name: e.name,
                    nature: e.nature,
                    balance: Money::ZERO,
                };
                self.accounts.upsert(society_id, e.code, account);
            }
            LedgerEvent::JournalEntryPosted(e) => {
                let mut touched: HashMap<String, LedgerAccount> = HashMap::new();
                for line in &e.entry.lines {
                    let code = &line.account_code;
                    if !touched.contains_key(code) {
                        let account = self
                            .accounts
                            .get(society_id, code)
                            .ok_or_else(|| LedgerProjectionError::UnknownAccount(code.clone()))?;
                        touched.insert(code.clone(), account);
                    }
                }

                for line in &e.entry.lines {
                    if let (Some(account), Some((side, amount))) =
                        (touched.get_mut(&line.account_code), line.posting())
                    {
                        account.post(side, amount).map_err(|_| {
                            LedgerProjectionError::BalanceOutOfRange(line.account_code.clone())
                        })?;
                    }
                }

                self.accounts.upsert_all(society_id, touched.into_iter().collect());
                self.journal.upsert(society_id, e.entry.entry_id, e.entry);
            }
        }

        cursors.insert(key, seq);
        Ok(())
    }

    /// Clear the affected societies and replay `envelopes` in stream order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), LedgerProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        let mut societies: Vec<SocietyId> = envs.iter().map(|e| e.society_id()).collect();
        societies.sort();
        societies.dedup();
        {
            let mut cursors = self.lock_cursors();
            for society_id in societies {
                self.accounts.clear_society(society_id);
                self.journal.clear_society(society_id);
                cursors.retain(|k, _| k.society_id != society_id);
            }
        }

        envs.sort_by_key(|e| (e.society_id(), e.aggregate_id(), e.sequence_number()));
        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{NaiveDate, Utc};
    use society_accounting::{AccountNature, AccountOpened, JournalEntryPosted, JournalLine};
    use society_core::UserId;

    use crate::read_model::InMemorySocietyStore;

    type Projection = LedgerProjection<
        Arc<InMemorySocietyStore<String, LedgerAccount>>,
        Arc<InMemorySocietyStore<Uuid, JournalEntry>>,
    >;

    fn projection() -> Projection {
        LedgerProjection::new(
            Arc::new(InMemorySocietyStore::new()),
            Arc::new(InMemorySocietyStore::new()),
        )
    }

    fn envelope(society_id: SocietyId, seq: u64, ev: &LedgerEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            society_id,
            AggregateId::ledger_of(society_id),
            LEDGER_AGGREGATE_TYPE,
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn opened(society_id: SocietyId, code: &str, nature: AccountNature) -> LedgerEvent {
        LedgerEvent::AccountOpened(AccountOpened {
            society_id,
            code: code.to_string(),
            name: code.to_string(),
            nature,
            occurred_at: Utc::now(),
        })
    }

    fn posted(society_id: SocietyId, minor: i64) -> LedgerEvent {
        LedgerEvent::JournalEntryPosted(JournalEntryPosted {
            society_id,
            entry: JournalEntry {
                entry_id: Uuid::now_v7(),
                entry_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                reference: None,
                narration: "maintenance".to_string(),
                lines: vec![
                    JournalLine::debit("1000", Money::from_minor(minor)),
                    JournalLine::credit("4000", Money::from_minor(minor)),
                ],
                posted_by: UserId::new(),
                posted_at: Utc::now(),
            },
        })
    }

    fn seeded_events(society: SocietyId) -> Vec<LedgerEvent> {
        vec![
            opened(society, "1000", AccountNature::Asset),
            opened(society, "4000", AccountNature::Income),
            posted(society, 12_500),
        ]
    }

    #[test]
    fn balances_follow_posted_entries() {
        let p = projection();
        let society = SocietyId::new();
        for (i, ev) in seeded_events(society).iter().enumerate() {
            p.apply_envelope(&envelope(society, i as u64 + 1, ev)).unwrap();
        }

        assert_eq!(p.account(society, "1000").unwrap().balance, Money::from_minor(12_500));
        assert_eq!(p.account(society, "4000").unwrap().balance, Money::from_minor(-12_500));
        assert_eq!(p.journal(society).len(), 1);
    }

    #[test]
    fn redelivered_envelopes_are_ignored() {
        let p = projection();
        let society = SocietyId::new();
        let envs: Vec<_> = seeded_events(society)
            .iter()
            .enumerate()
            .map(|(i, ev)| envelope(society, i as u64 + 1, ev))
            .collect();

        for env in envs.iter().chain(envs.iter()) {
            p.apply_envelope(env).unwrap();
        }
        assert_eq!(p.account(society, "1000").unwrap().balance, Money::from_minor(12_500));
    }

    #[test]
    fn gaps_are_rejected() {
        let p = projection();
        let society = SocietyId::new();
        let err = p
            .apply_envelope(&envelope(society, 2, &opened(society, "1000", AccountNature::Asset)))
            .unwrap_err();
        assert!(matches!(err, LedgerProjectionError::NonMonotonicSequence { last: 0, found: 2 }));
    }

    #[test]
    fn out_of_range_posting_changes_nothing() {
        let p = projection();
        let society = SocietyId::new();
        let mut events = seeded_events(society);
        events.push(posted(society, i64::MAX));
        for (i, ev) in events.iter().take(3).enumerate() {
            p.apply_envelope(&envelope(society, i as u64 + 1, ev)).unwrap();
        }

        let err = p.apply_envelope(&envelope(society, 4, &events[3])).unwrap_err();
        assert!(matches!(err, LedgerProjectionError::BalanceOutOfRange(code) if code == "1000"));
        assert_eq!(p.account(society, "1000").unwrap().balance, Money::from_minor(12_500));
        assert_eq!(p.journal(society).len(), 1);
    }

    #[test]
    fn mismatched_society_is_rejected() {
        let p = projection();
        let err = p
            .apply_envelope(&envelope(
                SocietyId::new(),
                1,
                &opened(SocietyId::new(), "1000", AccountNature::Asset),
            ))
            .unwrap_err();
        assert!(matches!(err, LedgerProjectionError::SocietyIsolation(_)));
    }

    #[test]
    fn rebuild_replays_to_the_same_state() {
        let p = projection();
        let society = SocietyId::new();
        let envs: Vec<_> = seeded_events(society)
            .iter()
            .enumerate()
            .map(|(i, ev)| envelope(society, i as u64 + 1, ev))
            .collect();
        for env in &envs {
            p.apply_envelope(env).unwrap();
        }
        let before = p.accounts(society);

        p.rebuild_from_scratch(envs.into_iter().rev()).unwrap();
        assert_eq!(p.accounts(society), before);
    }
}
