use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use society_accounting::{AccountNature, JournalIssue, JournalLine, JournalTotals};
use society_community::{ChatMessage, Conversation};
use society_core::{Money, UserId};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub code: String,
    pub name: String,
    /// One of `asset`, `liability`, `income`, `expense`.
    pub nature: String,
}

#[derive(Debug, Deserialize)]
pub struct JournalLineRequest {
    pub account_code: String,
    #[serde(default)]
    pub debit: Option<Money>,
    #[serde(default)]
    pub credit: Option<Money>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostJournalEntryRequest {
    /// Client-chosen id; retrying with the same id is rejected as a duplicate.
    #[serde(default)]
    pub entry_id: Option<Uuid>,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub narration: String,
    pub lines: Vec<JournalLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewJournalRequest {
    pub lines: Vec<JournalLineRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    /// `YYYY-MM-DD`.
    pub as_of: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub participant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JournalPreviewResponse {
    pub totals: JournalTotals,
    pub issues: Vec<JournalIssue>,
    /// Codes that are not open in this society's ledger.
    pub unknown_accounts: Vec<String>,
    pub postable: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub participants: [UserId; 2],
    pub other_participant: Option<UserId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_message_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub fn conversation_to_response(c: &Conversation, viewer: UserId) -> ConversationResponse {
    ConversationResponse {
        id: c.id.to_string(),
        participants: c.key.participants(),
        other_participant: c.other_participant(viewer),
        created_at: c.created_at,
        last_message_at: c.last_message_at,
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: UserId,
    pub body: String,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}

pub fn message_to_response(m: ChatMessage) -> MessageResponse {
    MessageResponse {
        id: m.id.to_string(),
        conversation_id: m.conversation_id.to_string(),
        sender_id: m.sender_id,
        body: m.body,
        sent_at: m.sent_at,
    }
}

// -------------------------
// Mapping helpers
// -------------------------

pub fn parse_account_nature(s: &str) -> Result<AccountNature, axum::response::Response> {
    s.parse::<AccountNature>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_account_nature",
            "nature must be one of: asset, liability, income, expense",
        )
    })
}

/// Missing amounts are zero; the validator reports lines with neither side.
pub fn to_journal_lines(lines: Vec<JournalLineRequest>) -> Vec<JournalLine> {
    lines
        .into_iter()
        .map(|l| JournalLine {
            account_code: l.account_code,
            debit: l.debit.unwrap_or(Money::ZERO),
            credit: l.credit.unwrap_or(Money::ZERO),
            memo: l.memo.filter(|m| !m.trim().is_empty()),
        })
        .collect()
}

pub fn parse_as_of(query: &AsOfQuery) -> Result<Option<NaiveDate>, axum::response::Response> {
    match query.as_of.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(Some).map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_date",
                "as_of must be a date formatted as YYYY-MM-DD",
            )
        }),
    }
}
