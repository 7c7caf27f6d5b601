use crate::error::{FacegateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verified identity of the caller, as supplied by the fronting authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Accepts any non-empty identity that cannot escape its own key segment.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.contains('/') {
            return Err(FacegateError::Validation(format!(
                "invalid identity: {raw:?}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage category; each maps to a top-level key prefix in the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageCategory {
    Profile,
    Liveness,
}

impl ImageCategory {
    pub fn prefix(self) -> &'static str {
        match self {
            ImageCategory::Profile => "profileImages",
            ImageCategory::Liveness => "livenessImages",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "profileImages" => Some(ImageCategory::Profile),
            "livenessImages" => Some(ImageCategory::Liveness),
            _ => None,
        }
    }

    /// `{category}/{owner}/`, the only place an owner may read or write.
    pub fn owner_prefix(self, owner: &OwnerId) -> String {
        format!("{}/{}/", self.prefix(), owner)
    }
}

/// Owner-scoped object key: `{category}/{owner}/{name...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    raw: String,
    owner_start: usize,
    owner_end: usize,
}

impl ImageKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |why: &str| FacegateError::Validation(format!("invalid image key {raw:?}: {why}"));

        let mut parts = raw.splitn(3, '/');
        let category_part = parts.next().unwrap_or_default();
        let owner_part = parts.next().ok_or_else(|| invalid("missing owner segment"))?;
        let name_part = parts.next().ok_or_else(|| invalid("missing object name"))?;

        if ImageCategory::from_prefix(category_part).is_none() {
            return Err(invalid("unknown category"));
        }
        if owner_part.is_empty() {
            return Err(invalid("empty owner segment"));
        }
        if name_part.is_empty() {
            return Err(invalid("empty object name"));
        }
        if name_part.split('/').any(|segment| segment == "..") {
            return Err(invalid("parent segments are not allowed"));
        }

        Ok(Self {
            raw: raw.to_string(),
            owner_start: category_part.len() + 1,
            owner_end: category_part.len() + 1 + owner_part.len(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The owner segment embedded in the key.
    pub fn owner(&self) -> &str {
        &self.raw[self.owner_start..self.owner_end]
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Opaque liveness session identifier issued by the detection service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(FacegateError::missing_fields(&["sessionId"]));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness session lifecycle. Transitions are driven by the detection
/// service only: CREATED → IN_PROGRESS → SUCCEEDED | FAILED | EXPIRED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Created,
    InProgress,
    Succeeded,
    Failed,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Succeeded | SessionStatus::Failed | SessionStatus::Expired
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Created => "CREATED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Succeeded => "SUCCEEDED",
            SessionStatus::Failed => "FAILED",
            SessionStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Face position within an image, as ratios of the image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Pointer to a captured frame in the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Snapshot of a liveness session as last reported by the detection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessSession {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// Liveness confidence in [0, 100]; only meaningful once terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<ImageRef>,
    pub audit_images: Vec<ImageRef>,
}

/// Where the detection service writes captured frames for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    pub bucket: String,
    pub key_prefix: String,
    /// Number of supplementary audit frames to keep (0..=4).
    pub audit_images_limit: u8,
}

/// One candidate match returned by the detection service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatch {
    /// Similarity in [0, 100].
    pub similarity: f32,
    pub bounding_box: Option<BoundingBox>,
}

/// Raw answer of the detection service for a source/target comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceComparison {
    pub matches: Vec<FaceMatch>,
    /// Detector confidence for the largest face in the source image, if any.
    pub source_face_confidence: Option<f32>,
    /// Faces found in the target image that did not match the source face.
    pub unmatched_faces: usize,
}

/// Per-request summary handed back to the caller, who owns the accept/reject
/// decision. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub similarity: f32,
    pub face_match_count: usize,
    pub source_has_face: bool,
    pub target_face_count: usize,
}
