//! Conversation and message storage for direct chat.
//!
//! Chat state is plain CRUD rather than an event stream. The in-memory store
//! keeps everything behind one lock so a message insert and the inbox
//! timestamp bump land together.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use society_community::{ChatMessage, Conversation, ConversationKey};
use society_core::{ConversationId, DomainError, SocietyId, UserId};

#[derive(Debug, Error)]
pub enum ChatStoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("chat store lock poisoned")]
    Poisoned,
}

pub trait ChatStore: Send + Sync {
    /// Find or create the single thread between `a` and `b`.
    ///
    /// The flag is `true` when the conversation was created by this call.
    fn open_direct(
        &self,
        society_id: SocietyId,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> Result<(Conversation, bool), ChatStoreError>;

    /// `user`'s conversations, most recently active first.
    fn conversations_for(
        &self,
        society_id: SocietyId,
        user: UserId,
    ) -> Result<Vec<Conversation>, ChatStoreError>;

    fn get(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ChatStoreError>;

    fn post_message(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
        sender: UserId,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, ChatStoreError>;

    /// Messages oldest first. `reader` must be a participant.
    fn messages(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> Result<Vec<ChatMessage>, ChatStoreError>;
}

impl<S> ChatStore for Arc<S>
where
    S: ChatStore + ?Sized,
{
    fn open_direct(
        &self,
        society_id: SocietyId,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> Result<(Conversation, bool), ChatStoreError> {
        (**self).open_direct(society_id, a, b, now)
    }

    fn conversations_for(
        &self,
        society_id: SocietyId,
        user: UserId,
    ) -> Result<Vec<Conversation>, ChatStoreError> {
        (**self).conversations_for(society_id, user)
    }

    fn get(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ChatStoreError> {
        (**self).get(society_id, conversation_id)
    }

    fn post_message(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
        sender: UserId,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, ChatStoreError> {
        (**self).post_message(society_id, conversation_id, sender, body, now)
    }

    fn messages(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> Result<Vec<ChatMessage>, ChatStoreError> {
        (**self).messages(society_id, conversation_id, reader)
    }
}

#[derive(Debug, Default)]
struct ChatState {
    by_key: HashMap<(SocietyId, ConversationKey), ConversationId>,
    conversations: HashMap<(SocietyId, ConversationId), Conversation>,
    messages: HashMap<ConversationId, Vec<ChatMessage>>,
}

impl ChatState {
    fn conversation(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
    ) -> Result<&Conversation, DomainError> {
        self.conversations
            .get(&(society_id, conversation_id))
            .ok_or(DomainError::NotFound)
    }
}

/// In-memory chat store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    state: RwLock<ChatState>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStore for InMemoryChatStore {
    fn open_direct(
        &self,
        society_id: SocietyId,
        a: UserId,
        b: UserId,
        now: DateTime<Utc>,
    ) -> Result<(Conversation, bool), ChatStoreError> {
        let key = ConversationKey::direct(a, b)?;
        let mut state = self.state.write().map_err(|_| ChatStoreError::Poisoned)?;

        if let Some(id) = state.by_key.get(&(society_id, key)).copied() {
            let existing = state.conversation(society_id, id)?.clone();
            return Ok((existing, false));
        }

        let conversation = Conversation::direct(society_id, key, now);
        state.by_key.insert((society_id, key), conversation.id);
        state
            .conversations
            .insert((society_id, conversation.id), conversation.clone());

        tracing::debug!(
            society_id = %society_id,
            conversation_id = %conversation.id,
            "conversation opened"
        );
        Ok((conversation, true))
    }

    fn conversations_for(
        &self,
        society_id: SocietyId,
        user: UserId,
    ) -> Result<Vec<Conversation>, ChatStoreError> {
        let state = self.state.read().map_err(|_| ChatStoreError::Poisoned)?;
        let mut out: Vec<Conversation> = state
            .conversations
            .iter()
            .filter(|((s, _), c)| *s == society_id && c.is_participant(user))
            .map(|(_, c)| c.clone())
            .collect();
        out.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        Ok(out)
    }

    fn get(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ChatStoreError> {
        let state = self.state.read().map_err(|_| ChatStoreError::Poisoned)?;
        Ok(state.conversation(society_id, conversation_id)?.clone())
    }

    fn post_message(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
        sender: UserId,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, ChatStoreError> {
        let mut state = self.state.write().map_err(|_| ChatStoreError::Poisoned)?;

        let message = {
            let conversation = state.conversation(society_id, conversation_id)?;
            ChatMessage::compose(conversation, sender, body, now)?
        };

        if let Some(conversation) = state.conversations.get_mut(&(society_id, conversation_id)) {
            conversation.last_message_at = Some(message.sent_at);
        }
        state
            .messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());

        Ok(message)
    }

    fn messages(
        &self,
        society_id: SocietyId,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> Result<Vec<ChatMessage>, ChatStoreError> {
        let state = self.state.read().map_err(|_| ChatStoreError::Poisoned)?;
        state
            .conversation(society_id, conversation_id)?
            .ensure_participant(reader)?;

        Ok(state
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}
