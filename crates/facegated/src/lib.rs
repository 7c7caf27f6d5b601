//! facegated — HTTP front for liveness sessions and face comparison.

pub mod api;
pub mod config;
pub mod cors;
pub mod error;
pub mod state;

pub use api::{create_router, run_server};
pub use config::{BackendKind, Config};
pub use state::AppState;
