use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use uuid::Uuid;

use society_accounting::{
    JournalEntry, LEDGER_AGGREGATE_TYPE, Ledger, LedgerAccount, LedgerCommand, LedgerGroup,
    LedgerId, TrialBalance, balances_as_of, group_accounts,
};
use society_community::{ChatMessage, Conversation};
use society_core::{AggregateId, ConversationId, DomainResult, SocietyId, UserId};
use society_events::{EventBus, EventEnvelope, InMemoryEventBus};
use society_infra::{
    chat_store::{ChatStore, ChatStoreError, InMemoryChatStore},
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent},
    projections::{LedgerProjection, LedgerProjectionError},
    read_model::InMemorySocietyStore,
};

/// Realtime message broadcast via SSE.
///
/// `audience` narrows delivery to specific users; `None` reaches the whole
/// society.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub society_id: SocietyId,
    pub audience: Option<Vec<UserId>>,
    pub topic: String,
    pub payload: JsonValue,
}

impl RealtimeMessage {
    fn visible_to(&self, society_id: SocietyId, user_id: UserId) -> bool {
        self.society_id == society_id
            && self
                .audience
                .as_ref()
                .is_none_or(|users| users.contains(&user_id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    Projection(#[from] LedgerProjectionError),
}

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;
type LedgerReadModel = LedgerProjection<
    Arc<InMemorySocietyStore<String, LedgerAccount>>,
    Arc<InMemorySocietyStore<Uuid, JournalEntry>>,
>;

pub struct AppServices {
    dispatcher: Dispatcher,
    ledger_projection: LedgerReadModel,
    // One writer per society ledger: held from dispatch until the read model
    // has absorbed the committed events.
    ledger_writers: Mutex<HashMap<SocietyId, Arc<Mutex<()>>>>,
    chat: InMemoryChatStore,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

pub fn build_services(realtime_capacity: usize) -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let ledger_projection = LedgerProjection::new(
        Arc::new(InMemorySocietyStore::new()),
        Arc::new(InMemorySocietyStore::new()),
    );

    // Realtime channel (SSE): lossy broadcast, filtered per subscriber.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(realtime_capacity);

    // Background subscriber: bus -> realtime notifications. Ends when the
    // bus (and with it every sender) is dropped.
    {
        let sub = bus.subscribe();
        let realtime_tx = realtime_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("realtime-forwarder".to_string())
            .spawn(move || {
                while let Ok(env) = sub.recv() {
                    let at = env.aggregate_type();
                    let _ = realtime_tx.send(RealtimeMessage {
                        society_id: env.society_id(),
                        audience: None,
                        topic: format!("{at}.projection_updated"),
                        payload: serde_json::json!({
                            "kind": "projection_update",
                            "aggregate_type": at,
                            "aggregate_id": env.aggregate_id().to_string(),
                            "sequence_number": env.sequence_number(),
                        }),
                    });
                }
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to start realtime forwarder");
        }
    }

    AppServices {
        dispatcher: CommandDispatcher::new(store, bus),
        ledger_projection,
        ledger_writers: Mutex::new(HashMap::new()),
        chat: InMemoryChatStore::new(),
        realtime_tx,
    }
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    fn ledger_writer(&self, society_id: SocietyId) -> Arc<Mutex<()>> {
        let mut writers = self
            .ledger_writers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(writers.entry(society_id).or_default())
    }

    /// Run a command against the society's ledger stream and fold the
    /// committed events into the read model before returning.
    ///
    /// Writers to one society are serialized, so the read model sees the
    /// stream in sequence order.
    pub fn dispatch_ledger(
        &self,
        society_id: SocietyId,
        command: LedgerCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let writer = self.ledger_writer(society_id);
        let _turn = writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let committed = self.dispatcher.dispatch::<Ledger>(
            society_id,
            AggregateId::ledger_of(society_id),
            LEDGER_AGGREGATE_TYPE,
            command,
            |_s, aggregate_id| Ledger::empty(LedgerId::new(aggregate_id)),
        )?;

        let behind = committed
            .iter()
            .find_map(|stored| self.ledger_projection.apply_envelope(&stored.to_envelope()).err());
        if let Some(e) = behind {
            tracing::warn!(society_id = %society_id, error = %e, "ledger read model behind, catching up");
            self.catch_up_ledger(society_id)?;
        }

        Ok(committed)
    }

    /// Apply whatever the read model is missing from the society's stream.
    fn catch_up_ledger(&self, society_id: SocietyId) -> Result<(), DispatchError> {
        let stream = self
            .dispatcher
            .store()
            .load_stream(society_id, AggregateId::ledger_of(society_id))?;
        for stored in &stream {
            self.ledger_projection
                .apply_envelope(&stored.to_envelope())
                .map_err(|e| DispatchError::ReadModel(e.to_string()))?;
        }
        Ok(())
    }

    /// Replay the society's stored ledger events into a fresh read model.
    ///
    /// Returns the number of events replayed.
    pub fn rebuild_ledger(&self, society_id: SocietyId) -> Result<usize, RebuildError> {
        let writer = self.ledger_writer(society_id);
        let _turn = writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let envelopes: Vec<_> = self
            .dispatcher
            .store()
            .load_society(society_id)?
            .iter()
            .filter(|e| e.aggregate_type == LEDGER_AGGREGATE_TYPE)
            .map(StoredEvent::to_envelope)
            .collect();
        let replayed = envelopes.len();

        self.ledger_projection.rebuild_from_scratch(envelopes)?;
        tracing::info!(society_id = %society_id, events = replayed, "ledger read model rebuilt");
        Ok(replayed)
    }

    pub fn ledger_accounts(&self, society_id: SocietyId) -> Vec<LedgerAccount> {
        self.ledger_projection.accounts(society_id)
    }

    pub fn ledger_account(&self, society_id: SocietyId, code: &str) -> Option<LedgerAccount> {
        self.ledger_projection.account(society_id, code)
    }

    pub fn ledger_groups(&self, society_id: SocietyId) -> Vec<LedgerGroup> {
        group_accounts(self.ledger_accounts(society_id))
    }

    pub fn ledger_journal(&self, society_id: SocietyId) -> Vec<JournalEntry> {
        self.ledger_projection.journal(society_id)
    }

    /// Current trial balance, or the one as of the end of `as_of`.
    pub fn trial_balance(
        &self,
        society_id: SocietyId,
        as_of: Option<NaiveDate>,
    ) -> DomainResult<TrialBalance> {
        let accounts = self.ledger_accounts(society_id);
        Ok(match as_of {
            Some(date) => {
                let journal = self.ledger_journal(society_id);
                TrialBalance::from_accounts(balances_as_of(&accounts, &journal, date)?)
                    .with_as_of(date)
            }
            None => TrialBalance::from_accounts(accounts),
        })
    }

    pub fn open_conversation(
        &self,
        society_id: SocietyId,
        user: UserId,
        other: UserId,
    ) -> Result<(Conversation, bool), ChatStoreError> {
        self.chat.open_direct(society_id, user, other, Utc::now())
    }

    pub fn conversations_for(
        &self,
        society_id: SocietyId,
        user: UserId,
    ) -> Result<Vec<Conversation>, ChatStoreError> {
        self.chat.conversations_for(society_id, user)
    }

    pub fn conversation_messages(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> Result<Vec<ChatMessage>, ChatStoreError> {
        self.chat.messages(society_id, conversation_id, reader)
    }

    /// Store a message and notify both participants.
    pub fn post_message(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
        sender: UserId,
        body: &str,
    ) -> Result<ChatMessage, ChatStoreError> {
        let message = self
            .chat
            .post_message(society_id, conversation_id, sender, body, Utc::now())?;
        let conversation = self.chat.get(society_id, conversation_id)?;

        let _ = self.realtime_tx.send(RealtimeMessage {
            society_id,
            audience: Some(conversation.key.participants().to_vec()),
            topic: "chat.message_posted".to_string(),
            payload: serde_json::json!({
                "kind": "chat_message",
                "conversation_id": conversation_id.to_string(),
                "message_id": message.id.to_string(),
                "sender_id": sender.to_string(),
            }),
        });

        Ok(message)
    }
}

/// Build an SSE stream for one user in one society (used by `/stream`).
pub fn society_sse_stream(
    services: Arc<AppServices>,
    society_id: SocietyId,
    user_id: UserId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.visible_to(society_id, user_id) => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use society_accounting::{AccountNature, JournalLine, OpenAccount, PostJournalEntry};
    use society_core::Money;

    fn open(society_id: SocietyId, code: &str, nature: AccountNature) -> LedgerCommand {
        LedgerCommand::OpenAccount(OpenAccount {
            society_id,
            code: code.to_string(),
            name: code.to_string(),
            nature,
            occurred_at: Utc::now(),
        })
    }

    fn post(society_id: SocietyId, date: NaiveDate, minor: i64) -> LedgerCommand {
        LedgerCommand::PostJournalEntry(PostJournalEntry {
            society_id,
            entry: JournalEntry {
                entry_id: Uuid::now_v7(),
                entry_date: date,
                reference: None,
                narration: "dues".to_string(),
                lines: vec![
                    JournalLine::debit("1000", Money::from_minor(minor)),
                    JournalLine::credit("4000", Money::from_minor(minor)),
                ],
                posted_by: UserId::new(),
                posted_at: Utc::now(),
            },
        })
    }

    #[test]
    fn reads_see_dispatched_commands_immediately() {
        let services = build_services(16);
        let society = SocietyId::new();
        services.dispatch_ledger(society, open(society, "1000", AccountNature::Asset)).unwrap();
        services.dispatch_ledger(society, open(society, "4000", AccountNature::Income)).unwrap();

        let d1 = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 4, 15).unwrap();
        services.dispatch_ledger(society, post(society, d1, 10_000)).unwrap();
        services.dispatch_ledger(society, post(society, d2, 2_500)).unwrap();

        let tb = services.trial_balance(society, None).unwrap();
        assert_eq!(tb.total_debit, Money::from_minor(12_500));
        assert!(tb.balanced);

        let earlier = services.trial_balance(society, Some(d1)).unwrap();
        assert_eq!(earlier.total_credit, Money::from_minor(10_000));
        assert!(services.trial_balance(SocietyId::new(), None).unwrap().rows.is_empty());

        assert_eq!(services.rebuild_ledger(society).unwrap(), 4);
        assert_eq!(services.trial_balance(society, None).unwrap(), tb);
    }

    #[test]
    fn concurrent_posts_keep_the_read_model_complete() {
        let services = Arc::new(build_services(16));
        let society = SocietyId::new();
        services.dispatch_ledger(society, open(society, "1000", AccountNature::Asset)).unwrap();
        services.dispatch_ledger(society, open(society, "4000", AccountNature::Income)).unwrap();

        let (threads, per_thread) = (8, 50);
        let d = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let services = Arc::clone(&services);
                std::thread::spawn(move || {
                    (0..per_thread)
                        .filter(|_| services.dispatch_ledger(society, post(society, d, 100)).is_ok())
                        .count()
                })
            })
            .collect();
        let committed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(committed, threads * per_thread);
        assert_eq!(services.ledger_journal(society).len(), committed);
        let bank = services.ledger_account(society, "1000").unwrap();
        assert_eq!(bank.balance, Money::from_minor(100 * committed as i64));
        assert!(services.trial_balance(society, None).unwrap().balanced);
    }

    #[test]
    fn read_model_catches_up_on_events_it_missed() {
        let services = build_services(16);
        let society = SocietyId::new();
        services.dispatch_ledger(society, open(society, "1000", AccountNature::Asset)).unwrap();
        services.dispatch_ledger(society, open(society, "4000", AccountNature::Income)).unwrap();

        // Committed straight through the dispatcher: the read model never sees it.
        let d = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        services
            .dispatcher
            .dispatch::<Ledger>(
                society,
                AggregateId::ledger_of(society),
                LEDGER_AGGREGATE_TYPE,
                post(society, d, 700),
                |_s, aggregate_id| Ledger::empty(LedgerId::new(aggregate_id)),
            )
            .unwrap();
        assert!(services.ledger_journal(society).is_empty());

        services.dispatch_ledger(society, post(society, d, 300)).unwrap();
        assert_eq!(services.ledger_journal(society).len(), 2);
        assert_eq!(
            services.ledger_account(society, "1000").unwrap().balance,
            Money::from_minor(1_000)
        );
    }

    #[test]
    fn audience_limits_realtime_delivery() {
        let society = SocietyId::new();
        let (a, b) = (UserId::new(), UserId::new());
        let msg = RealtimeMessage {
            society_id: society,
            audience: Some(vec![a]),
            topic: "chat.message_posted".to_string(),
            payload: JsonValue::Null,
        };
        assert!(msg.visible_to(society, a));
        assert!(!msg.visible_to(society, b));
        assert!(!msg.visible_to(SocietyId::new(), a));
    }
}
