use crate::config::{Config, ConfigError};
use axum::http::{HeaderMap, HeaderName};
use facegate_core::{
    AccessGate, DetectionService, FaceComparator, ImageStore, OriginValidator, OwnerId,
    OwnerScopedGate, ResultPoller, SessionManager, SessionSettings,
};
use std::sync::Arc;

/// Long-lived components, built once at startup and shared by every request.
pub struct Services {
    pub sessions: SessionManager,
    pub poller: ResultPoller,
    pub comparator: FaceComparator,
    pub origins: OriginValidator,
    pub identity_header: HeaderName,
    pub backend: &'static str,
}

/// Clone-safe handle to the shared services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Services>,
}

impl AppState {
    pub fn new(
        config: &Config,
        detection: Arc<dyn DetectionService>,
        store: Arc<dyn ImageStore>,
    ) -> Result<Self, ConfigError> {
        let backend = detection.name();
        let gate: Arc<dyn AccessGate> = Arc::new(OwnerScopedGate);
        let services = Services {
            sessions: SessionManager::new(
                detection.clone(),
                SessionSettings {
                    bucket: config.bucket_name().to_string(),
                    audit_images_limit: config.audit_images,
                },
            ),
            poller: ResultPoller::new(detection.clone(), gate.clone()),
            comparator: FaceComparator::new(gate, store, detection),
            origins: OriginValidator::new(config.origins()?),
            identity_header: config.identity_header_name()?,
            backend,
        };
        Ok(Self {
            inner: Arc::new(services),
        })
    }

    pub fn services(&self) -> &Services {
        &self.inner
    }

    /// Identity placed on the request by the fronting authenticator, if any.
    pub fn identity(&self, headers: &HeaderMap) -> Option<OwnerId> {
        let raw = headers.get(&self.inner.identity_header)?.to_str().ok()?;
        OwnerId::new(raw.trim()).ok()
    }
}
