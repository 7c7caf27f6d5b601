//! Liveness result retrieval.
//!
//! `get_results` is a side-effect-free passthrough read and is the primary
//! contract. `wait_for_terminal` layers a bounded poll loop on top of it for
//! callers that prefer to block; it never retries a failed read.

use crate::access::AccessGate;
use crate::backend::DetectionService;
use crate::error::{FacegateError, Result};
use crate::types::{LivenessSession, OwnerId, SessionId};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

const MAX_CONFIDENCE: f32 = 100.0;

/// Bounded polling schedule for [`ResultPoller::wait_for_terminal`].
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Interval growth factor applied after each non-terminal poll.
    pub multiplier: f64,
    /// Total number of reads, including the first.
    pub max_attempts: u32,
    /// Add up to 10% random delay to each sleep.
    pub jitter: bool,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            multiplier: 1.5,
            max_attempts: 60,
            jitter: true,
        }
    }
}

impl WaitPolicy {
    /// Grow `current` by the multiplier, capped at `max_interval`. A product
    /// that is not a representable duration saturates to the cap.
    fn next_interval(&self, current: Duration) -> Duration {
        let grown = current.as_secs_f64() * self.multiplier.max(1.0);
        Duration::try_from_secs_f64(grown)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }

    fn sleep_for(&self, interval: Duration) -> Duration {
        if !self.jitter {
            return interval;
        }
        let spread = interval.as_millis() as u64 / 10;
        if spread == 0 {
            return interval;
        }
        interval + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

/// Reads liveness session state from the detection service.
pub struct ResultPoller {
    detection: Arc<dyn DetectionService>,
    gate: Arc<dyn AccessGate>,
}

impl ResultPoller {
    pub fn new(detection: Arc<dyn DetectionService>, gate: Arc<dyn AccessGate>) -> Self {
        Self { detection, gate }
    }

    /// Current status and outcome of `session_id`.
    ///
    /// Confidence is only reported once the session is terminal.
    pub async fn get_results(&self, session_id: &SessionId) -> Result<LivenessSession> {
        let mut session = self
            .detection
            .session_results(session_id)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, session_id = %session_id, "session results read failed");
                e
            })?;

        if session.status.is_terminal() {
            session.confidence = session.confidence.map(|c| c.clamp(0.0, MAX_CONFIDENCE));
        } else {
            session.confidence = None;
        }

        tracing::debug!(
            session_id = %session_id,
            status = %session.status,
            audit_images = session.audit_images.len(),
            "session results read"
        );
        Ok(session)
    }

    /// [`get_results`](Self::get_results) on behalf of `owner`.
    ///
    /// Every frame pointer in the record must lie under the owner's prefix;
    /// a session that wrote frames for someone else reads as not found.
    pub async fn get_owned_results(
        &self,
        owner: &OwnerId,
        session_id: &SessionId,
    ) -> Result<LivenessSession> {
        let session = self.get_results(session_id).await?;
        let foreign = session
            .reference_image
            .iter()
            .chain(&session.audit_images)
            .find(|image| !self.gate.authorize(owner.as_str(), &image.key));
        if let Some(image) = foreign {
            tracing::warn!(
                owner = %owner,
                session_id = %session_id,
                key = %image.key,
                "session frames belong to another owner"
            );
            return Err(FacegateError::SessionNotFound(session_id.to_string()));
        }
        Ok(session)
    }

    /// Poll until the session reaches a terminal status or the policy's
    /// attempt budget is spent. Read failures are returned immediately.
    pub async fn wait_for_terminal(
        &self,
        session_id: &SessionId,
        policy: &WaitPolicy,
    ) -> Result<LivenessSession> {
        let attempts = policy.max_attempts.max(1);
        let mut interval = policy.initial_interval;
        let mut last_status;

        let mut attempt = 1;
        loop {
            let session = self.get_results(session_id).await?;
            if session.status.is_terminal() {
                tracing::info!(
                    session_id = %session_id,
                    status = %session.status,
                    attempt,
                    "session reached terminal status"
                );
                return Ok(session);
            }
            last_status = session.status;

            if attempt >= attempts {
                break;
            }
            tokio::time::sleep(policy.sleep_for(interval)).await;
            interval = policy.next_interval(interval);
            attempt += 1;
        }

        tracing::warn!(
            session_id = %session_id,
            attempts,
            last_status = %last_status,
            "session did not reach a terminal status"
        );
        Err(FacegateError::PollTimeout {
            session_id: session_id.to_string(),
            attempts,
            last_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::OwnerScopedGate;
    use crate::memory::MemoryDetectionService;
    use crate::types::{OutputLocation, SessionStatus};
    use crate::DetectionService as _;

    fn owner_scoped(detection: Arc<MemoryDetectionService>) -> ResultPoller {
        ResultPoller::new(detection, Arc::new(OwnerScopedGate))
    }

    fn quick_policy(max_attempts: u32) -> WaitPolicy {
        WaitPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            multiplier: 2.0,
            max_attempts,
            jitter: false,
        }
    }

    async fn new_session(detection: &MemoryDetectionService) -> SessionId {
        session_for(detection, "user-42").await
    }

    async fn session_for(detection: &MemoryDetectionService, owner: &str) -> SessionId {
        detection
            .create_session(&OutputLocation {
                bucket: "b".into(),
                key_prefix: format!("livenessImages/{owner}/"),
                audit_images_limit: 0,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_results_is_idempotent() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = new_session(&detection).await;
        detection.advance(&id, SessionStatus::Succeeded, Some(99.1));
        let poller = owner_scoped(detection);

        let first = serde_json::to_vec(&poller.get_results(&id).await.unwrap()).unwrap();
        let second = serde_json::to_vec(&poller.get_results(&id).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_confidence_hidden_before_terminal() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = new_session(&detection).await;
        // The upstream may report a provisional score mid-challenge.
        detection.advance(&id, SessionStatus::InProgress, Some(40.0));
        let poller = owner_scoped(detection.clone());

        let session = poller.get_results(&id).await.unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.confidence, None);

        detection.advance(&id, SessionStatus::Failed, Some(12.0));
        let session = poller.get_results(&id).await.unwrap();
        assert_eq!(session.confidence, Some(12.0));
    }

    #[tokio::test]
    async fn test_confidence_clamped() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = new_session(&detection).await;
        detection.advance(&id, SessionStatus::Succeeded, Some(140.0));
        let poller = owner_scoped(detection);

        let session = poller.get_results(&id).await.unwrap();
        assert_eq!(session.confidence, Some(100.0));
    }

    #[tokio::test]
    async fn test_unknown_session_not_found() {
        let poller = owner_scoped(Arc::new(MemoryDetectionService::new()));
        let err = poller
            .get_results(&SessionId::new("missing").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upstream_outage_surfaces() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = new_session(&detection).await;
        detection.set_unavailable(true);
        let poller = owner_scoped(detection);

        let err = poller.get_results(&id).await.unwrap_err();
        assert!(matches!(err, FacegateError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_wait_returns_terminal_session() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = new_session(&detection).await;
        detection.advance(&id, SessionStatus::Expired, None);
        let poller = owner_scoped(detection);

        let session = poller.wait_for_terminal(&id, &quick_policy(3)).await.unwrap();
        assert_eq!(session.status, SessionStatus::Expired);
    }

    #[tokio::test]
    async fn test_wait_times_out_with_last_status() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = new_session(&detection).await;
        let poller = owner_scoped(detection);

        let err = poller.wait_for_terminal(&id, &quick_policy(3)).await.unwrap_err();
        assert_eq!(
            err,
            FacegateError::PollTimeout {
                session_id: id.to_string(),
                attempts: 3,
                last_status: SessionStatus::Created,
            }
        );
    }

    #[tokio::test]
    async fn test_wait_does_not_retry_errors() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = new_session(&detection).await;
        detection.set_unavailable(true);
        let poller = owner_scoped(detection);

        let err = poller.wait_for_terminal(&id, &quick_policy(50)).await.unwrap_err();
        assert!(matches!(err, FacegateError::Upstream(_)));
    }

    #[test]
    fn test_interval_growth_is_capped() {
        let policy = quick_policy(5);
        let next = policy.next_interval(Duration::from_millis(1));
        assert_eq!(next, Duration::from_millis(2));
        assert_eq!(policy.next_interval(next), Duration::from_millis(2));
    }

    #[test]
    fn test_interval_growth_saturates_on_overflow() {
        let policy = WaitPolicy {
            multiplier: f64::INFINITY,
            ..quick_policy(5)
        };
        assert_eq!(
            policy.next_interval(Duration::from_millis(1)),
            Duration::from_millis(2)
        );

        let policy = WaitPolicy {
            multiplier: f64::MAX,
            max_interval: Duration::MAX,
            ..quick_policy(5)
        };
        assert_eq!(policy.next_interval(Duration::from_secs(10)), Duration::MAX);
    }

    #[tokio::test]
    async fn test_owned_results_for_own_session() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = new_session(&detection).await;
        detection.advance(&id, SessionStatus::Succeeded, Some(97.0));
        let poller = owner_scoped(detection);

        let owner = OwnerId::new("user-42").unwrap();
        let session = poller.get_owned_results(&owner, &id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Succeeded);
        assert!(session.reference_image.is_some());
    }

    #[tokio::test]
    async fn test_owned_results_hides_foreign_session() {
        let detection = Arc::new(MemoryDetectionService::new());
        let id = session_for(&detection, "user-99").await;
        detection.advance(&id, SessionStatus::Succeeded, Some(97.0));
        let poller = owner_scoped(detection);

        let owner = OwnerId::new("user-42").unwrap();
        let err = poller.get_owned_results(&owner, &id).await.unwrap_err();
        assert_eq!(err, FacegateError::SessionNotFound(id.to_string()));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = WaitPolicy {
            jitter: true,
            ..WaitPolicy::default()
        };
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let slept = policy.sleep_for(base);
            assert!(slept >= base && slept <= base + Duration::from_millis(100));
        }
    }
}
