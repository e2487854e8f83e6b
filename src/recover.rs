//! Panic recovery at the route boundary.
//!
//! Every route invocation runs inside [`recover`], which catches a panic
//! from any filter or the handler and answers the request with a response
//! derived from the panic payload. Classification is ordered; the first
//! match wins:
//!
//! | Payload | Status | Body |
//! |---|---|---|
//! | [`HttpError`] (bare or boxed as `dyn Error`) | its code | its message, plain text |
//! | [`StatusCode`] | that code | canonical reason, plain text |
//! | `Box<dyn Error + Send (+ Sync)>`, `io::Error` | 500 | `err.to_string()`, plain text |
//! | `&'static str`, `String` | 200 | the string as a JSON string |
//! | anything else | 500 | `Internal Server Error` |
//!
//! A string payload is a deliberate early return, not a failure.
//!
//! Raising goes through the process panic hook like any other panic, so the
//! default hook prints a line to stderr for every raise. Call
//! [`quiet_panic_hook`] once at startup to silence it for declared errors.

use std::any::Any;
use std::error::Error as StdError;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use http::{Method, StatusCode};
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::filter::FilterChain;
use crate::http_error::HttpError;
use crate::response::{IntoResponse, Response};

/// Body sent for payloads that match no other rule.
pub const FALLBACK_MESSAGE: &str = "Internal Server Error";

/// A panic payload sorted into one of the recognised shapes.
///
/// # Runtime faults answer 200
///
/// Rust's own runtime faults panic with string payloads: an index out of
/// bounds, `unwrap()` on `None`, `expect("...")`, integer overflow in debug
/// builds. They land in [`Text`](Self::Text) and the client receives
/// `200 OK` with the fault message as a JSON string. Report failures with
/// [`HttpError::raise`] or [`raise`](crate::raise) instead of letting
/// them unwind.
///
/// # Generic errors must be boxed
///
/// Only `Box<dyn Error + Send (+ Sync)>` and `io::Error` are recognised as
/// generic errors. A concrete error type passed straight to `panic_any`,
/// such as `panic_any(std::fmt::Error)`, cannot be seen through `Any` and
/// falls back to [`Unknown`](Self::Unknown), losing its message. Raise
/// concrete errors with [`raise`](crate::raise), which boxes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recovered {
    /// An error that names its own status.
    Declared(HttpError),
    /// An error without a status; answered with 500.
    Fault(String),
    /// A plain string; answered with 200 and the string as JSON.
    Text(String),
    /// Anything else.
    Unknown,
}

impl Recovered {
    /// Sorts a payload as returned by `catch_unwind`.
    ///
    /// Never panics, even if the payload's `Display` impl does.
    pub fn classify(payload: &(dyn Any + Send)) -> Self {
        if let Some(err) = payload.downcast_ref::<HttpError>() {
            return Self::Declared(err.clone());
        }
        if let Some(code) = payload.downcast_ref::<StatusCode>() {
            return Self::Declared(HttpError::from_status(*code));
        }
        if let Some(err) = payload.downcast_ref::<Box<dyn StdError + Send + Sync>>() {
            return Self::from_error(&**err);
        }
        if let Some(err) = payload.downcast_ref::<Box<dyn StdError + Send>>() {
            return Self::from_error(&**err);
        }
        if let Some(err) = payload.downcast_ref::<std::io::Error>() {
            return Self::from_error(err);
        }
        if let Some(s) = payload.downcast_ref::<&'static str>() {
            return Self::Text((*s).to_owned());
        }
        if let Some(s) = payload.downcast_ref::<String>() {
            return Self::Text(s.clone());
        }
        Self::Unknown
    }

    fn from_error(err: &(dyn StdError + 'static)) -> Self {
        if let Some(http) = err.downcast_ref::<HttpError>() {
            return Self::Declared(http.clone());
        }
        let message = std::panic::catch_unwind(AssertUnwindSafe(|| err.to_string()));
        match message {
            Ok(message) => Self::Fault(message),
            Err(_) => Self::Unknown,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Declared(err) => err.code(),
            Self::Text(_) => StatusCode::OK,
            Self::Fault(_) | Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self, method: &Method, path: &str) {
        match self {
            Self::Declared(err) => {
                warn!(%method, path, status = err.code().as_u16(), "request aborted: {err}");
            }
            Self::Fault(message) => {
                error!(%method, path, "handler failed: {message}");
            }
            Self::Text(_) => {
                debug!(%method, path, "handler returned early with a plain value");
            }
            Self::Unknown => {
                error!(%method, path, "handler panicked with an unrecognised payload");
            }
        }
    }
}

/// Installs a panic hook that stays quiet for [`HttpError`] and
/// [`StatusCode`] payloads, bare or boxed by [`raise`](crate::raise).
///
/// Every other panic is passed on to the hook that was installed before, so
/// strings, generic errors and genuine bugs are still reported. Call it once,
/// before starting the container.
pub fn quiet_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if !is_declared(info.payload()) {
            previous(info);
        }
    }));
}

fn is_declared(payload: &(dyn Any + Send)) -> bool {
    payload.is::<HttpError>()
        || payload.is::<StatusCode>()
        || payload
            .downcast_ref::<Box<dyn StdError + Send + Sync>>()
            .is_some_and(|err| err.is::<HttpError>())
}

impl IntoResponse for Recovered {
    fn into_response(self) -> Response {
        match self {
            Self::Declared(err) => err.into_response(),
            Self::Fault(message) => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text(message),
            Self::Text(s) => {
                Response::json(serde_json::Value::String(s).to_string().into_bytes())
            }
            Self::Unknown => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text(FALLBACK_MESSAGE),
        }
    }
}

/// Runs `chain` to completion, converting a panic anywhere inside it into
/// a response.
///
/// The chain is started inside the guarded future, so a filter that panics
/// before returning its future is caught too. Always yields exactly one
/// response.
pub(crate) async fn recover(chain: FilterChain, ctx: Context) -> Response {
    let method = ctx.method().clone();
    let uri = ctx.uri().clone();
    let run = AssertUnwindSafe(async move { chain.next(ctx).await });

    match run.catch_unwind().await {
        Ok(res) => res,
        Err(payload) => {
            let recovered = Recovered::classify(&*payload);
            recovered.log(&method, uri.path());
            recovered.into_response()
        }
    }
}
