use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use facegate_core::FacegateError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Client-facing failure. Only validation messages are passed through;
/// everything else gets a fixed message so upstream detail stays in the logs.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "verified identity is required")
    }

    /// Map a core failure raised while trying to `action` (e.g. "compare faces").
    pub fn from_core(action: &'static str, err: FacegateError) -> Self {
        match &err {
            FacegateError::Validation(message) => {
                tracing::info!(action, error = %err, "rejected invalid request");
                Self::new(StatusCode::BAD_REQUEST, message.clone())
            }
            FacegateError::Authorization { .. } => {
                tracing::warn!(action, error = %err, "forbidden");
                Self::new(StatusCode::FORBIDDEN, "access to the requested image is not allowed")
            }
            FacegateError::SessionNotFound(_) => {
                tracing::warn!(action, error = %err, "not found");
                Self::new(StatusCode::NOT_FOUND, "liveness session not found")
            }
            FacegateError::ImageNotFound(_) => {
                tracing::warn!(action, error = %err, "not found");
                Self::new(StatusCode::NOT_FOUND, "image not found")
            }
            FacegateError::Upstream(_) | FacegateError::PollTimeout { .. } => {
                tracing::error!(action, error = %err, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to {action}"))
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_not_leaked() {
        let err = ApiError::from_core(
            "compare faces",
            FacegateError::Upstream("AccessDeniedException: arn:aws:iam::123:role/x".into()),
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Failed to compare faces");
    }

    #[test]
    fn test_not_found_is_404() {
        let err = ApiError::from_core(
            "compare faces",
            FacegateError::ImageNotFound("profileImages/u/x.jpg".into()),
        );
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(!err.message().contains("profileImages"));
    }

    #[test]
    fn test_validation_passes_message() {
        let err = ApiError::from_core(
            "compare faces",
            FacegateError::missing_fields(&["profileImageKey", "livenessImageKey"]),
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "profileImageKey and livenessImageKey are required");
    }

    #[test]
    fn test_authorization_is_403() {
        let err = ApiError::from_core(
            "compare faces",
            FacegateError::Authorization {
                identity: "a".into(),
                key: "profileImages/b/x.jpg".into(),
            },
        );
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
