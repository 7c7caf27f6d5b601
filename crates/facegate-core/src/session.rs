use crate::backend::DetectionService;
use crate::error::Result;
use crate::types::{ImageCategory, OutputLocation, OwnerId, SessionId};
use std::sync::Arc;

/// Maximum number of audit frames the detection service will retain.
pub const MAX_AUDIT_IMAGES: u8 = 4;

/// Where liveness frames are written.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub bucket: String,
    pub audit_images_limit: u8,
}

/// Opens liveness sessions. Holds no per-session state.
pub struct SessionManager {
    detection: Arc<dyn DetectionService>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(detection: Arc<dyn DetectionService>, mut settings: SessionSettings) -> Self {
        if settings.audit_images_limit > MAX_AUDIT_IMAGES {
            tracing::warn!(
                requested = settings.audit_images_limit,
                max = MAX_AUDIT_IMAGES,
                "audit image limit clamped"
            );
            settings.audit_images_limit = MAX_AUDIT_IMAGES;
        }
        Self {
            detection,
            settings,
        }
    }

    /// Output location for frames captured on behalf of `owner`.
    pub fn output_location(&self, owner: &OwnerId) -> OutputLocation {
        OutputLocation {
            bucket: self.settings.bucket.clone(),
            key_prefix: ImageCategory::Liveness.owner_prefix(owner),
            audit_images_limit: self.settings.audit_images_limit,
        }
    }

    /// Create a session whose reference and audit frames land under the
    /// owner's liveness prefix. `SessionId` cannot be empty, so success always
    /// carries a usable identifier.
    pub async fn create_session(&self, owner: &OwnerId) -> Result<SessionId> {
        let output = self.output_location(owner);
        let session_id = self.detection.create_session(&output).await.map_err(|e| {
            tracing::error!(error = %e, owner = %owner, "create session failed");
            e
        })?;

        tracing::info!(
            session_id = %session_id,
            prefix = %output.key_prefix,
            "liveness session created"
        );
        Ok(session_id)
    }
}
