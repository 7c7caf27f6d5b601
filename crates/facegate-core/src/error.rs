use crate::types::SessionStatus;
use thiserror::Error;

/// Failure taxonomy shared by every orchestration component.
///
/// Upstream and not-found messages carry diagnostic detail for logs only;
/// the HTTP layer decides what a client gets to see.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FacegateError {
    #[error("{0}")]
    Validation(String),
    #[error("identity {identity} does not own {key}")]
    Authorization { identity: String, key: String },
    #[error("liveness session not found: {0}")]
    SessionNotFound(String),
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("upstream service error: {0}")]
    Upstream(String),
    #[error("session {session_id} still {last_status} after {attempts} polls")]
    PollTimeout {
        session_id: String,
        attempts: u32,
        last_status: SessionStatus,
    },
}

pub type Result<T> = std::result::Result<T, FacegateError>;

impl FacegateError {
    /// Validation failure naming every missing request field.
    ///
    /// `["a"]` reads "a is required", `["a", "b"]` reads "a and b are required".
    pub fn missing_fields(fields: &[&str]) -> Self {
        let message = match fields {
            [] => "request is missing required fields".to_string(),
            [only] => format!("{only} is required"),
            [init @ .., last] => format!("{} and {last} are required", init.join(", ")),
        };
        FacegateError::Validation(message)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FacegateError::SessionNotFound(_) | FacegateError::ImageNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_single() {
        let err = FacegateError::missing_fields(&["sessionId"]);
        assert_eq!(err.to_string(), "sessionId is required");
    }

    #[test]
    fn test_missing_fields_pair() {
        let err = FacegateError::missing_fields(&["profileImageKey", "livenessImageKey"]);
        assert_eq!(
            err.to_string(),
            "profileImageKey and livenessImageKey are required"
        );
    }

    #[test]
    fn test_missing_fields_three() {
        let err = FacegateError::missing_fields(&["a", "b", "c"]);
        assert_eq!(err.to_string(), "a, b and c are required");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(FacegateError::ImageNotFound("k".into()).is_not_found());
        assert!(FacegateError::SessionNotFound("s".into()).is_not_found());
        assert!(!FacegateError::Upstream("boom".into()).is_not_found());
    }
}
