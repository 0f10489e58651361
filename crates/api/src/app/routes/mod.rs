use axum::{Router, routing::get};

pub mod chat;
pub mod ledger;
pub mod system;

/// Router for all authenticated (society-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/ledger", ledger::router())
        .nest("/chat", chat::router())
}
