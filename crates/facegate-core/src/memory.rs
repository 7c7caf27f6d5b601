//! In-process backends for tests and local development.
//!
//! `MemoryDetectionService` plays the role of the external detection service:
//! sessions only move forward when a test (or operator) calls [`advance`].
//!
//! [`advance`]: MemoryDetectionService::advance

use crate::backend::{DetectionService, ImageStore};
use crate::error::{FacegateError, Result};
use crate::types::{
    FaceComparison, ImageKey, ImageRef, LivenessSession, OutputLocation, SessionId, SessionStatus,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct DetectionState {
    sessions: HashMap<SessionId, LivenessSession>,
    outputs: HashMap<SessionId, OutputLocation>,
    comparison: FaceComparison,
    thresholds: Vec<f32>,
    unavailable: bool,
}

/// Scripted detection service.
#[derive(Default)]
pub struct MemoryDetectionService {
    state: Mutex<DetectionState>,
}

impl MemoryDetectionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer returned by every subsequent `compare_faces` call.
    pub fn set_comparison(&self, comparison: FaceComparison) {
        lock(&self.state).comparison = comparison;
    }

    /// Make every call fail as an upstream outage until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Move a session forward, as the end-user completing the challenge would.
    /// A reference frame is recorded under the session's output prefix once the
    /// session succeeds.
    pub fn advance(&self, session_id: &SessionId, status: SessionStatus, confidence: Option<f32>) {
        let mut state = lock(&self.state);
        let reference = state.outputs.get(session_id).map(|output| ImageRef {
            bucket: output.bucket.clone(),
            key: format!("{}{}/reference.jpg", output.key_prefix, session_id),
            bounding_box: None,
        });
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.status = status;
            session.confidence = confidence;
            if status == SessionStatus::Succeeded {
                session.reference_image = reference;
            }
        }
    }

    /// Output location the session was created with.
    pub fn output_for(&self, session_id: &SessionId) -> Option<OutputLocation> {
        lock(&self.state).outputs.get(session_id).cloned()
    }

    /// Thresholds passed to `compare_faces`, in call order.
    pub fn recorded_thresholds(&self) -> Vec<f32> {
        lock(&self.state).thresholds.clone()
    }

    fn check_available(state: &DetectionState) -> Result<()> {
        if state.unavailable {
            return Err(FacegateError::Upstream("detection service unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DetectionService for MemoryDetectionService {
    async fn create_session(&self, output: &OutputLocation) -> Result<SessionId> {
        let mut state = lock(&self.state);
        Self::check_available(&state)?;
        let session_id = SessionId::new(uuid::Uuid::new_v4().to_string())?;
        state.sessions.insert(
            session_id.clone(),
            LivenessSession {
                session_id: session_id.clone(),
                status: SessionStatus::Created,
                confidence: None,
                reference_image: None,
                audit_images: Vec::new(),
            },
        );
        state.outputs.insert(session_id.clone(), output.clone());
        Ok(session_id)
    }

    async fn session_results(&self, session_id: &SessionId) -> Result<LivenessSession> {
        let state = lock(&self.state);
        Self::check_available(&state)?;
        state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| FacegateError::SessionNotFound(session_id.to_string()))
    }

    async fn compare_faces(
        &self,
        _source: &[u8],
        _target: &[u8],
        threshold: f32,
    ) -> Result<FaceComparison> {
        let mut state = lock(&self.state);
        Self::check_available(&state)?;
        state.thresholds.push(threshold);
        let mut comparison = state.comparison.clone();
        comparison.matches.retain(|m| m.similarity >= threshold);
        Ok(comparison)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
struct StoreState {
    objects: HashMap<String, Vec<u8>>,
    stalled: HashSet<String>,
}

/// Key/value image store.
#[derive(Default)]
pub struct MemoryImageStore {
    state: Mutex<StoreState>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>) {
        lock(&self.state).objects.insert(key.into(), bytes);
    }

    /// Reads of `key` never complete, simulating a hung store connection.
    pub fn stall(&self, key: impl Into<String>) {
        lock(&self.state).stalled.insert(key.into());
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn get_object(&self, key: &ImageKey) -> Result<Vec<u8>> {
        let found = {
            let state = lock(&self.state);
            if state.stalled.contains(key.as_str()) {
                None
            } else {
                Some(state.objects.get(key.as_str()).cloned())
            }
        };
        match found {
            None => std::future::pending().await,
            Some(bytes) => bytes.ok_or_else(|| FacegateError::ImageNotFound(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> OutputLocation {
        OutputLocation {
            bucket: "bucket".into(),
            key_prefix: "livenessImages/user-42/".into(),
            audit_images_limit: 0,
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let detection = MemoryDetectionService::new();
        let id = detection.create_session(&output()).await.unwrap();

        let created = detection.session_results(&id).await.unwrap();
        assert_eq!(created.status, SessionStatus::Created);

        detection.advance(&id, SessionStatus::Succeeded, Some(97.5));
        let done = detection.session_results(&id).await.unwrap();
        assert_eq!(done.status, SessionStatus::Succeeded);
        let reference = done.reference_image.unwrap();
        assert!(reference.key.starts_with("livenessImages/user-42/"));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let detection = MemoryDetectionService::new();
        let err = detection
            .session_results(&SessionId::new("nope").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, FacegateError::SessionNotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_store_missing_key() {
        let store = MemoryImageStore::new();
        let key = ImageKey::parse("profileImages/user-42/x.jpg").unwrap();
        let err = store.get_object(&key).await.unwrap_err();
        assert!(matches!(err, FacegateError::ImageNotFound(_)));
    }
}
