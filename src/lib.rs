//! Stockledger
//!
//! Inventory-ledger and batch-costing engine for a trading/logistics back
//! office. For every (product, warehouse, batch) key the engine tracks how
//! much stock exists, what it is worth (moving weighted-average), and how it
//! moved (append-only ledger), with FIFO/FEFO allocation planning over
//! batches and transit-aware stock projections.
//!
//! The crate exposes a function-call surface only; transport, auth and
//! document workflows belong to the embedding application.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod queries;
pub mod services;

pub mod prelude {
    pub use crate::config::{init_tracing, load_config, AppConfig};
    pub use crate::db::{establish_connection_from_app_config, run_migrations, DbPool};
    pub use crate::entities::movement_type::{MovementClass, MovementCode, MovementDirection};
    pub use crate::errors::ServiceError;
    pub use crate::events::{process_events, Event, EventSender};
    pub use crate::queries::stock_queries::*;
    pub use crate::services::allocation::{AllocationLine, BatchAllocation};
    pub use crate::services::batches::UpsertBatch;
    pub use crate::services::inventory::{MovementOutcome, PostAllocation, PostMovement};
    pub use crate::services::Services;
}
