//! Errors that carry their own HTTP status.

use http::StatusCode;
use thiserror::Error;

use crate::response::{IntoResponse, Response};

/// An error with an explicit status code and a client-facing message.
///
/// Return it from a handler (`Result<T, HttpError>`) or raise it with
/// [`HttpError::raise`]; either way the client receives `code` with
/// `message` as a plain-text body.
///
/// ```rust
/// use hitch::HttpError;
/// use http::StatusCode;
///
/// let err = HttpError::from_status(StatusCode::NOT_FOUND);
/// assert_eq!(err.message(), "Not Found");
/// ```
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HttpError {
    code: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// An error whose message is the canonical reason phrase of `code`.
    pub fn from_status(code: StatusCode) -> Self {
        Self::new(code, code.canonical_reason().unwrap_or_default())
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Aborts the current request with this error.
    ///
    /// The panic is recovered at the route boundary and answered with
    /// `code` and `message`; it never reaches hyper. It still passes through
    /// the process panic hook first, and the default hook prints it to
    /// stderr; see [`quiet_panic_hook`](crate::quiet_panic_hook).
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }
}

impl From<StatusCode> for HttpError {
    fn from(code: StatusCode) -> Self {
        Self::from_status(code)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        Response::builder().status(self.code).text(self.message)
    }
}

/// Aborts the current request with a generic error.
///
/// The client receives `500 Internal Server Error` with the error's
/// `Display` output as the body. Use [`HttpError::raise`] to pick the status.
///
/// Concrete error types must come through here rather than `panic_any`:
/// the boxing is what lets recovery find the message. Like every raise, this
/// is reported by the panic hook before it is recovered.
pub fn raise<E>(err: E) -> !
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let err: Box<dyn std::error::Error + Send + Sync> = err.into();
    std::panic::panic_any(err)
}
