//! Amazon Rekognition as the detection service.

use crate::error::AwsBackendError;
use async_trait::async_trait;
use aws_sdk_rekognition::operation::compare_faces::CompareFacesError;
use aws_sdk_rekognition::operation::get_face_liveness_session_results::GetFaceLivenessSessionResultsError;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{
    AuditImage, BoundingBox as AwsBoundingBox, CompareFacesMatch, ComparedFace,
    ComparedSourceImageFace, CreateFaceLivenessSessionRequestSettings, Image,
    LivenessOutputConfig, LivenessSessionStatus,
};
use aws_sdk_rekognition::Client;
use facegate_core::{
    BoundingBox, DetectionService, FaceComparison, FaceMatch, FacegateError, ImageRef,
    LivenessSession, OutputLocation, Result, SessionId, SessionStatus,
};

pub struct RekognitionDetection {
    client: Client,
}

impl RekognitionDetection {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DetectionService for RekognitionDetection {
    async fn create_session(&self, output: &OutputLocation) -> Result<SessionId> {
        let output_config = LivenessOutputConfig::builder()
            .s3_bucket(output.bucket.as_str())
            .s3_key_prefix(output.key_prefix.as_str())
            .build()
            .map_err(|e| AwsBackendError::Build("CreateFaceLivenessSession", e.to_string()))?;

        let settings = CreateFaceLivenessSessionRequestSettings::builder()
            .output_config(output_config)
            .audit_images_limit(i32::from(output.audit_images_limit))
            .build();

        let response = self
            .client
            .create_face_liveness_session()
            .settings(settings)
            .send()
            .await
            .map_err(|e| AwsBackendError::service("CreateFaceLivenessSession", e))?;

        SessionId::new(response.session_id()).map_err(|_| {
            AwsBackendError::MissingField("CreateFaceLivenessSession", "SessionId").into()
        })
    }

    async fn session_results(&self, session_id: &SessionId) -> Result<LivenessSession> {
        let response = match self
            .client
            .get_face_liveness_session_results()
            .session_id(session_id.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                if err.as_service_error().is_some_and(is_missing_session) {
                    return Err(FacegateError::SessionNotFound(session_id.to_string()));
                }
                return Err(AwsBackendError::service("GetFaceLivenessSessionResults", err).into());
            }
        };

        Ok(LivenessSession {
            session_id: session_id.clone(),
            status: map_status(response.status())?,
            confidence: response.confidence(),
            reference_image: response.reference_image().and_then(image_ref),
            audit_images: response.audit_images().iter().filter_map(image_ref).collect(),
        })
    }

    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        threshold: f32,
    ) -> Result<FaceComparison> {
        let result = self
            .client
            .compare_faces()
            .source_image(Image::builder().bytes(Blob::new(source.to_vec())).build())
            .target_image(Image::builder().bytes(Blob::new(target.to_vec())).build())
            .similarity_threshold(threshold)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                if let Some(outcome) = err.as_service_error().and_then(compare_error_outcome) {
                    return outcome;
                }
                return Err(AwsBackendError::service("CompareFaces", err).into());
            }
        };

        Ok(comparison_from_parts(
            response.face_matches(),
            response.source_image_face(),
            response.unmatched_faces(),
        ))
    }

    fn name(&self) -> &'static str {
        "rekognition"
    }
}

fn is_missing_session(err: &GetFaceLivenessSessionResultsError) -> bool {
    err.is_session_not_found_exception()
}

/// Service errors that carry a definite answer rather than an outage.
///
/// Rekognition rejects a source image without a detectable face as an
/// invalid parameter; that is a "no match", not a failure.
fn compare_error_outcome(err: &CompareFacesError) -> Option<Result<FaceComparison>> {
    if err.is_invalid_parameter_exception() {
        tracing::info!("no face detected in source image");
        return Some(Ok(FaceComparison::default()));
    }
    if err.is_invalid_image_format_exception() {
        return Some(Err(FacegateError::Validation(
            "image format not accepted by the detection service".into(),
        )));
    }
    None
}

fn map_status(status: &LivenessSessionStatus) -> Result<SessionStatus> {
    match status {
        LivenessSessionStatus::Created => Ok(SessionStatus::Created),
        LivenessSessionStatus::InProgress => Ok(SessionStatus::InProgress),
        LivenessSessionStatus::Succeeded => Ok(SessionStatus::Succeeded),
        LivenessSessionStatus::Failed => Ok(SessionStatus::Failed),
        LivenessSessionStatus::Expired => Ok(SessionStatus::Expired),
        other => Err(AwsBackendError::UnknownStatus(other.as_str().to_string()).into()),
    }
}

fn bounding_box(aws: &AwsBoundingBox) -> BoundingBox {
    BoundingBox {
        left: aws.left().unwrap_or_default(),
        top: aws.top().unwrap_or_default(),
        width: aws.width().unwrap_or_default(),
        height: aws.height().unwrap_or_default(),
    }
}

/// Store pointer for a captured frame. Frames returned inline (no S3 object)
/// are dropped: image bytes are never echoed to clients.
fn image_ref(image: &AuditImage) -> Option<ImageRef> {
    let object = image.s3_object()?;
    Some(ImageRef {
        bucket: object.bucket()?.to_string(),
        key: object.name()?.to_string(),
        bounding_box: image.bounding_box().map(bounding_box),
    })
}

fn comparison_from_parts(
    matches: &[CompareFacesMatch],
    source_face: Option<&ComparedSourceImageFace>,
    unmatched: &[ComparedFace],
) -> FaceComparison {
    FaceComparison {
        matches: matches
            .iter()
            .map(|m| FaceMatch {
                similarity: m.similarity().unwrap_or_default(),
                bounding_box: m.face().and_then(|f| f.bounding_box()).map(bounding_box),
            })
            .collect(),
        source_face_confidence: source_face.and_then(|f| f.confidence()),
        unmatched_faces: unmatched.len(),
    }
}
