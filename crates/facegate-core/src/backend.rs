//! Narrow interfaces to the external collaborators.
//!
//! Implementations are constructed once at startup and shared as
//! `Arc<dyn ...>` handles by every component for the life of the process.

use crate::error::Result;
use crate::types::{FaceComparison, ImageKey, LivenessSession, OutputLocation, SessionId};
use async_trait::async_trait;

/// Biometric detection service: runs liveness challenges and face matching.
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Open a liveness session whose captured frames land under `output`.
    async fn create_session(&self, output: &OutputLocation) -> Result<SessionId>;

    /// Read the current session record. Must not mutate upstream state.
    async fn session_results(&self, session_id: &SessionId) -> Result<LivenessSession>;

    /// Compare the largest face in `source` against every face in `target`,
    /// returning all matches at or above `threshold` (0–100).
    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        threshold: f32,
    ) -> Result<FaceComparison>;

    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;
}

/// Object store holding profile and liveness images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch the full object body. Missing objects are `ImageNotFound(key)`.
    async fn get_object(&self, key: &ImageKey) -> Result<Vec<u8>>;
}
