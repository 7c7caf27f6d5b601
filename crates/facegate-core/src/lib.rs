//! facegate-core — Orchestration for remote liveness checks and face comparison.
//!
//! Liveness detection and face matching run in an external detection service;
//! this crate sequences the calls, keeps every image access scoped to the
//! requesting identity, and aggregates the upstream answers into stable types.

pub mod access;
pub mod backend;
pub mod comparator;
pub mod error;
pub mod memory;
pub mod origin;
pub mod poller;
pub mod session;
pub mod types;

pub use access::{AccessGate, OwnerScopedGate};
pub use backend::{DetectionService, ImageStore};
pub use comparator::FaceComparator;
pub use error::{FacegateError, Result};
pub use origin::{AllowedOrigins, OriginValidator};
pub use poller::{ResultPoller, WaitPolicy};
pub use session::{SessionManager, SessionSettings};
pub use types::{
    BoundingBox, ComparisonResult, FaceComparison, FaceMatch, ImageCategory, ImageKey, ImageRef,
    LivenessSession, OutputLocation, OwnerId, SessionId, SessionStatus,
};
