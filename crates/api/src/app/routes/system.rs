use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, sse::Event as SseEvent},
};

use society_auth::{Permission, SocietyMembership};

use crate::app::services::{self, AppServices};
use crate::context::{PrincipalContext, SocietyContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let membership = SocietyMembership::from_roles(society.society_id(), principal.roles().to_vec());

    Json(serde_json::json!({
        "society_id": society.society_id().to_string(),
        "user_id": principal.user_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": membership
            .permissions
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>(),
    }))
}

pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(society): Extension<SocietyContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    services::society_sse_stream(services, society.society_id(), principal.user_id())
}
