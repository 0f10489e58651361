use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use society_accounting::{
    JournalEntry, JournalTotals, LedgerAccount, LedgerCommand, OpenAccount, PostJournalEntry,
    validate_lines,
};
use society_auth::permissions::{LEDGER_READ, LEDGER_WRITE};
use society_infra::command_dispatcher::DispatchError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, SocietyContext};

pub fn router() -> Router {
    Router::new()
        .route("/accounts", post(open_account).get(list_accounts))
        .route("/accounts/:code", get(get_account))
        .route("/groups", get(list_groups))
        .route("/journal/preview", post(preview_journal_entry))
        .route("/journal", post(post_journal_entry).get(list_journal))
        .route("/trial-balance", get(trial_balance))
        .route("/trial-balance.csv", get(trial_balance_csv))
        .route("/rebuild", post(rebuild_read_model))
}

pub async fn open_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OpenAccountRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_WRITE) {
        return errors::forbidden(e);
    }

    let nature = match dto::parse_account_nature(&body.nature) {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    let account = match LedgerAccount::new(&body.code, &body.name, nature) {
        Ok(a) => a,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let cmd = LedgerCommand::OpenAccount(OpenAccount {
        society_id: society.society_id(),
        code: account.code.clone(),
        name: account.name.clone(),
        nature,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch_ledger(society.society_id(), cmd) {
        return errors::dispatch_error_to_response(e);
    }

    tracing::info!(
        society_id = %society.society_id(),
        code = %account.code,
        nature = %nature,
        "ledger account opened"
    );
    (StatusCode::CREATED, Json(account)).into_response()
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_READ) {
        return errors::forbidden(e);
    }

    let items = services.ledger_accounts(society.society_id());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_READ) {
        return errors::forbidden(e);
    }

    match services.ledger_account(society.society_id(), code.trim()) {
        Some(account) => (StatusCode::OK, Json(account)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
    }
}

pub async fn list_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_READ) {
        return errors::forbidden(e);
    }

    let groups = services.ledger_groups(society.society_id());
    (StatusCode::OK, Json(serde_json::json!({ "groups": groups }))).into_response()
}

/// Totals and every issue for a draft entry, without posting it.
pub async fn preview_journal_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PreviewJournalRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_READ) {
        return errors::forbidden(e);
    }

    let lines = dto::to_journal_lines(body.lines);
    let issues = validate_lines(&lines);

    let mut unknown_accounts: Vec<String> = Vec::new();
    for line in &lines {
        let code = line.account_code.trim();
        if code.is_empty() || unknown_accounts.iter().any(|c| c == code) {
            continue;
        }
        if services.ledger_account(society.society_id(), code).is_none() {
            unknown_accounts.push(code.to_string());
        }
    }

    let postable = issues.is_empty() && unknown_accounts.is_empty();
    let preview = dto::JournalPreviewResponse {
        totals: JournalTotals::of(&lines),
        issues,
        unknown_accounts,
        postable,
    };
    (StatusCode::OK, Json(preview)).into_response()
}

pub async fn post_journal_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PostJournalEntryRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_WRITE) {
        return errors::forbidden(e);
    }

    let now = Utc::now();
    let entry = JournalEntry {
        entry_id: body.entry_id.unwrap_or_else(uuid::Uuid::now_v7),
        entry_date: body.entry_date.unwrap_or_else(|| now.date_naive()),
        reference: body.reference.filter(|r| !r.trim().is_empty()),
        narration: body.narration,
        lines: dto::to_journal_lines(body.lines),
        posted_by: principal.user_id(),
        posted_at: now,
    };
    let entry_id = entry.entry_id;
    let totals = entry.totals();

    let cmd = LedgerCommand::PostJournalEntry(PostJournalEntry {
        society_id: society.society_id(),
        entry,
    });

    let committed = match services.dispatch_ledger(society.society_id(), cmd) {
        Ok(c) => c,
        Err(e) => {
            if matches!(e, DispatchError::Validation(_) | DispatchError::InvariantViolation(_)) {
                tracing::warn!(
                    society_id = %society.society_id(),
                    entry_id = %entry_id,
                    debit = %totals.debit,
                    credit = %totals.credit,
                    "journal entry rejected"
                );
            }
            return errors::dispatch_error_to_response(e);
        }
    };

    let sequence_number = committed.last().map(|e| e.sequence_number).unwrap_or(0);
    tracing::info!(
        society_id = %society.society_id(),
        entry_id = %entry_id,
        amount = %totals.debit,
        "journal entry posted"
    );

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "entry_id": entry_id.to_string(),
            "sequence_number": sequence_number,
            "totals": totals,
        })),
    )
        .into_response()
}

pub async fn list_journal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_READ) {
        return errors::forbidden(e);
    }

    let items = services.ledger_journal(society.society_id());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn trial_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::AsOfQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_READ) {
        return errors::forbidden(e);
    }

    let as_of = match dto::parse_as_of(&query) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let tb = match services.trial_balance(society.society_id(), as_of) {
        Ok(tb) => tb,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if !tb.balanced {
        tracing::warn!(
            society_id = %society.society_id(),
            difference = %tb.difference,
            "trial balance does not balance"
        );
    }
    (StatusCode::OK, Json(tb)).into_response()
}

pub async fn trial_balance_csv(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::AsOfQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_READ) {
        return errors::forbidden(e);
    }

    let as_of = match dto::parse_as_of(&query) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let tb = match services.trial_balance(society.society_id(), as_of) {
        Ok(tb) => tb,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let mut body = Vec::new();
    if let Err(e) = tb.write_csv(&mut body) {
        tracing::error!(error = %e, "trial balance csv export failed");
        return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "export_error", e.to_string());
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"trial-balance.csv\""),
        ],
        body,
    )
        .into_response()
}

/// Rebuild the society's ledger read model from its event stream.
pub async fn rebuild_read_model(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, LEDGER_WRITE) {
        return errors::forbidden(e);
    }

    match services.rebuild_ledger(society.society_id()) {
        Ok(replayed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "events_replayed": replayed })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(society_id = %society.society_id(), error = %e, "ledger rebuild failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "rebuild_error", e.to_string())
        }
    }
}
