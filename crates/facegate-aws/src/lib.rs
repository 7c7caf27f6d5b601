//! facegate-aws — Production collaborators backed by AWS.
//!
//! Rekognition runs the liveness challenge and face comparison; S3 holds the
//! profile and liveness images. Both clients are built once from the shared
//! SDK configuration and handed to the core as trait objects.

pub mod error;
pub mod rekognition;
pub mod s3;

pub use error::AwsBackendError;
pub use rekognition::RekognitionDetection;
pub use s3::S3ImageStore;

/// Both AWS collaborators, sharing one credential/region configuration.
pub struct AwsBackend {
    pub detection: RekognitionDetection,
    pub store: S3ImageStore,
}

impl AwsBackend {
    /// Resolve region and credentials from the environment and build the
    /// clients. `bucket` is the object store holding all images.
    pub async fn connect(bucket: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let bucket = bucket.into();
        tracing::info!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            bucket = %bucket,
            "AWS clients configured"
        );
        Self {
            detection: RekognitionDetection::new(aws_sdk_rekognition::Client::new(&sdk_config)),
            store: S3ImageStore::new(aws_sdk_s3::Client::new(&sdk_config), bucket),
        }
    }
}
