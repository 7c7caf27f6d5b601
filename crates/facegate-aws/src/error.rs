use facegate_core::FacegateError;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsBackendError {
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
    #[error("invalid {0} request: {1}")]
    Build(&'static str, String),
    #[error("unrecognized liveness session status: {0}")]
    UnknownStatus(String),
    #[error("{0} response is missing {1}")]
    MissingField(&'static str, &'static str),
    #[error("reading object body: {0}")]
    Body(String),
}

impl AwsBackendError {
    /// Capture the full SDK error chain; the top-level message alone is
    /// usually just "service error".
    pub fn service<E: StdError + 'static>(operation: &'static str, err: E) -> Self {
        AwsBackendError::Service {
            operation,
            message: aws_sdk_rekognition::error::DisplayErrorContext(err).to_string(),
        }
    }
}

impl From<AwsBackendError> for FacegateError {
    fn from(err: AwsBackendError) -> Self {
        tracing::error!(error = %err, "AWS backend call failed");
        FacegateError::Upstream(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_upstream() {
        let err: FacegateError = AwsBackendError::MissingField("GetObject", "Body").into();
        assert_eq!(
            err,
            FacegateError::Upstream("GetObject response is missing Body".into())
        );
    }

    #[test]
    fn test_service_message_includes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = AwsBackendError::service("CompareFaces", io);
        assert!(err.to_string().starts_with("CompareFaces failed: "));
        assert!(err.to_string().contains("socket timed out"));
    }
}
