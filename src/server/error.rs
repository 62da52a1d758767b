//! HTTP error responses and the mapping from `ListingError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

use crate::error::ListingError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned to HTTP clients: a status and a generic message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// A client error whose cause is logged before it is returned
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(status = %status, reason = %message, "Rejected request");
        Self::new(status, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

// The cause is logged here; clients only see the generic message.
impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::Validation(msg) => Self::rejected(StatusCode::BAD_REQUEST, msg),
            ListingError::NotFound(id) => {
                error!(id, "Item not found");
                Self::not_found("item not found")
            }
            ListingError::Conflict(ref category) => {
                error!(category = %category, error = %err, "Category insert raced");
                Self::conflict("category was created concurrently, retry the request")
            }
            ListingError::Storage { .. } => {
                error!(error = %err, "Image storage failed");
                Self::internal("failed to store or read image")
            }
            ListingError::Persistence { .. } | ListingError::Task(_) => {
                error!(error = %err, "Database operation failed");
                Self::internal("failed to access item database")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceStep;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        logs.contents()
    }

    #[test]
    fn test_validation_cause_is_logged() {
        let logs = capture_logs(|| {
            let api = ApiError::from(ListingError::Validation("name must not be empty".into()));
            assert_eq!(api.status, StatusCode::BAD_REQUEST);
        });

        assert!(logs.contains("WARN"));
        assert!(logs.contains("name must not be empty"));
    }

    #[test]
    fn test_rejected_logs_status_and_reason() {
        let logs = capture_logs(|| {
            let api = ApiError::rejected(StatusCode::PAYLOAD_TOO_LARGE, "body too large");
            assert_eq!(api.status, StatusCode::PAYLOAD_TOO_LARGE);
            assert_eq!(api.message, "body too large");
        });

        assert!(logs.contains("413"));
        assert!(logs.contains("body too large"));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ListingError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ListingError::NotFound(1), StatusCode::NOT_FOUND),
            (ListingError::Conflict("toys".into()), StatusCode::CONFLICT),
            (
                ListingError::storage("/x", std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ListingError::persistence(
                    PersistenceStep::Commit,
                    rusqlite::Error::QueryReturnedNoRows,
                ),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = ListingError::storage("/secret/path", std::io::Error::other("disk full"));
        let api = ApiError::from(err);
        assert!(!api.message.contains("/secret/path"));
    }
}
