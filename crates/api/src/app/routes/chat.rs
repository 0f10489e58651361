use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use society_auth::permissions::CHAT_USE;
use society_core::{ConversationId, UserId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, SocietyContext};

pub fn router() -> Router {
    Router::new()
        .route("/conversations", get(list_conversations).post(open_conversation))
        .route(
            "/conversations/:id/messages",
            get(list_messages).post(post_message),
        )
}

fn parse_conversation_id(raw: &str) -> Result<ConversationId, axum::response::Response> {
    raw.parse::<ConversationId>()
        .map_err(errors::domain_error_to_response)
}

/// Find or create the direct thread with `participant_id`.
///
/// 201 when the conversation is new, 200 when it already existed.
pub async fn open_conversation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OpenConversationRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, CHAT_USE) {
        return errors::forbidden(e);
    }

    let other = match body.participant_id.parse::<UserId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.open_conversation(society.society_id(), principal.user_id(), other) {
        Ok((conversation, created)) => {
            let status = if created { StatusCode::CREATED } else { StatusCode::OK };
            (
                status,
                Json(dto::conversation_to_response(&conversation, principal.user_id())),
            )
                .into_response()
        }
        Err(e) => errors::chat_error_to_response(e),
    }
}

pub async fn list_conversations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, CHAT_USE) {
        return errors::forbidden(e);
    }

    match services.conversations_for(society.society_id(), principal.user_id()) {
        Ok(conversations) => {
            let items = conversations
                .iter()
                .map(|c| dto::conversation_to_response(c, principal.user_id()))
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::chat_error_to_response(e),
    }
}

pub async fn list_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, CHAT_USE) {
        return errors::forbidden(e);
    }
    let conversation_id = match parse_conversation_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.conversation_messages(society.society_id(), conversation_id, principal.user_id()) {
        Ok(messages) => {
            let items = messages
                .into_iter()
                .map(dto::message_to_response)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::chat_error_to_response(e),
    }
}

pub async fn post_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PostMessageRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&society, &principal, CHAT_USE) {
        return errors::forbidden(e);
    }
    let conversation_id = match parse_conversation_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.post_message(
        society.society_id(),
        conversation_id,
        principal.user_id(),
        &body.body,
    ) {
        Ok(message) => {
            tracing::debug!(
                society_id = %society.society_id(),
                conversation_id = %conversation_id,
                "chat message posted"
            );
            (StatusCode::CREATED, Json(dto::message_to_response(message))).into_response()
        }
        Err(e) => errors::chat_error_to_response(e),
    }
}
