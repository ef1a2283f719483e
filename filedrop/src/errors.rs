use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data, e.g. an unusable file name or a malformed body
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Upload exceeded the configured size cap
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } | Error::PayloadTooLarge { message } => message.clone(),
            Error::NotFound { .. } => self.to_string(),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Log the error at a level matching its severity.
    ///
    /// Called by both framework bindings right before the error becomes a response.
    pub fn log(&self) {
        match self {
            Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::PayloadTooLarge { .. } => {
                tracing::warn!("Upload rejected: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.log();
        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let bad = Error::BadRequest {
            message: "nope".to_string(),
        };
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);

        let missing = Error::NotFound {
            resource: "File".to_string(),
            id: "a.txt".to_string(),
        };
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let too_large = Error::PayloadTooLarge {
            message: "too big".to_string(),
        };
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let other = Error::Other(anyhow::anyhow!("disk on fire"));
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_user_message_hides_internal_details() {
        let internal = Error::Internal {
            operation: "write /srv/uploads/secret".to_string(),
        };
        assert_eq!(internal.user_message(), "Internal server error");

        let other = Error::Other(anyhow::anyhow!("permission denied: /srv/uploads"));
        assert_eq!(other.user_message(), "Internal server error");
    }

    #[test]
    fn test_not_found_message() {
        let missing = Error::NotFound {
            resource: "File".to_string(),
            id: "report.csv".to_string(),
        };
        assert_eq!(missing.user_message(), "File not found: report.csv");
    }
}
