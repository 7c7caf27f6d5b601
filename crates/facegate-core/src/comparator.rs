//! Owner-scoped face comparison.
//!
//! Both images are fetched concurrently with a fail-fast join, then handed to
//! the detection service with the lowest possible threshold so that every
//! candidate comes back. Accept/reject policy stays with the caller.

use crate::access::AccessGate;
use crate::backend::{DetectionService, ImageStore};
use crate::error::{FacegateError, Result};
use crate::types::{ComparisonResult, FaceComparison, ImageKey, OwnerId};
use image::ImageFormat;
use std::sync::Arc;

/// Threshold sent upstream: return all candidate matches.
pub const MATCH_ALL_THRESHOLD: f32 = 0.0;

const MAX_SIMILARITY: f32 = 100.0;

pub struct FaceComparator {
    gate: Arc<dyn AccessGate>,
    store: Arc<dyn ImageStore>,
    detection: Arc<dyn DetectionService>,
}

impl FaceComparator {
    pub fn new(
        gate: Arc<dyn AccessGate>,
        store: Arc<dyn ImageStore>,
        detection: Arc<dyn DetectionService>,
    ) -> Self {
        Self {
            gate,
            store,
            detection,
        }
    }

    /// Compare the face in `source_key` against the faces in `target_key`.
    ///
    /// Both keys must belong to `identity`. Zero faces on either side is a
    /// successful "no match" with similarity 0.
    pub async fn compare(
        &self,
        identity: &OwnerId,
        source_key: &str,
        target_key: &str,
    ) -> Result<ComparisonResult> {
        let source = ImageKey::parse(source_key)?;
        let target = ImageKey::parse(target_key)?;
        self.gate.require(identity, &source)?;
        self.gate.require(identity, &target)?;

        tracing::info!(source = %source, target = %target, "comparing images");

        let (source_bytes, target_bytes) =
            tokio::try_join!(self.fetch(&source), self.fetch(&target)).map_err(|e| {
                tracing::warn!(error = %e, "image fetch failed");
                e
            })?;

        let comparison = self
            .detection
            .compare_faces(&source_bytes, &target_bytes, MATCH_ALL_THRESHOLD)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "compare faces failed");
                e
            })?;

        let result = summarize(&comparison);
        tracing::info!(
            similarity = result.similarity,
            matches = result.face_match_count,
            source_has_face = result.source_has_face,
            target_faces = result.target_face_count,
            "comparison complete"
        );
        Ok(result)
    }

    async fn fetch(&self, key: &ImageKey) -> Result<Vec<u8>> {
        let bytes = self.store.get_object(key).await?;
        if bytes.is_empty() {
            return Err(FacegateError::ImageNotFound(key.to_string()));
        }
        match image::guess_format(&bytes) {
            Ok(ImageFormat::Jpeg | ImageFormat::Png) => Ok(bytes),
            Ok(other) => Err(FacegateError::Validation(format!(
                "{key}: unsupported image format {other:?} (need JPEG or PNG)"
            ))),
            Err(_) => Err(FacegateError::Validation(format!(
                "{key}: unrecognized image data"
            ))),
        }
    }
}

/// Reduce the upstream answer to the caller-facing summary.
///
/// The best match is the highest-similarity candidate, whatever order the
/// service returned them in. Matched and unmatched target faces are disjoint
/// sets upstream, so their sum counts each detected target face once.
pub fn summarize(comparison: &FaceComparison) -> ComparisonResult {
    let similarity = comparison
        .matches
        .iter()
        .map(|m| m.similarity)
        .filter(|s| s.is_finite())
        .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))))
        .unwrap_or(0.0)
        .clamp(0.0, MAX_SIMILARITY);

    ComparisonResult {
        similarity,
        face_match_count: comparison.matches.len(),
        source_has_face: comparison.source_face_confidence.is_some_and(|c| c > 0.0),
        target_face_count: comparison.matches.len() + comparison.unmatched_faces,
    }
}
