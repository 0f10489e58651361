//! Projection implementations (read model builders).
//!
//! Projections consume committed envelopes and build query-optimized read
//! models. They are rebuildable from the event stream, partitioned by society,
//! and idempotent under at-least-once delivery.

pub mod ledger;

pub use ledger::{LedgerProjection, LedgerProjectionError};
