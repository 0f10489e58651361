use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use society_core::{
    ConversationId, DomainError, DomainResult, Entity, MessageId, SocietyId, UserId, ValueObject,
};

pub const MAX_MESSAGE_CHARS: usize = 4000;

/// The two participants of a direct conversation, stored in sorted order.
///
/// Sorting makes `(a, b)` and `(b, a)` the same key, so a pair of users has
/// exactly one thread.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    low: UserId,
    high: UserId,
}

impl ValueObject for ConversationKey {}

impl ConversationKey {
    pub fn direct(a: UserId, b: UserId) -> DomainResult<Self> {
        if a == b {
            return Err(DomainError::validation("cannot open a conversation with yourself"));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    pub fn participants(&self) -> [UserId; 2] {
        [self.low, self.high]
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub society_id: SocietyId,
    pub key: ConversationKey,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Entity for Conversation {
    type Id = ConversationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Conversation {
    pub fn direct(society_id: SocietyId, key: ConversationKey, now: DateTime<Utc>) -> Self {
        Self {
            id: ConversationId::new(),
            society_id,
            key,
            created_at: now,
            last_message_at: None,
        }
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.key.contains(user)
    }

    pub fn other_participant(&self, user: UserId) -> Option<UserId> {
        match self.key.participants() {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }

    pub fn ensure_participant(&self, user: UserId) -> DomainResult<()> {
        if self.is_participant(user) {
            Ok(())
        } else {
            Err(DomainError::Unauthorized)
        }
    }

    /// Most recent activity, used to order a user's inbox.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message from `sender`, who must take part in `conversation`.
    pub fn compose(
        conversation: &Conversation,
        sender: UserId,
        body: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        conversation.ensure_participant(sender)?;

        let body = body.trim();
        if body.is_empty() {
            return Err(DomainError::validation("message must not be empty"));
        }
        if body.chars().count() > MAX_MESSAGE_CHARS {
            return Err(DomainError::validation(format!(
                "message must be at most {MAX_MESSAGE_CHARS} characters"
            )));
        }

        Ok(Self {
            id: MessageId::new(),
            conversation_id: conversation.id,
            sender_id: sender,
            body: body.to_string(),
            sent_at: now,
        })
    }
}
