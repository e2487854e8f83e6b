//! Unified error type.

use std::net::SocketAddr;

use thiserror::Error;

/// The error type returned by hitch's fallible operations.
///
/// Application-level failures (404, 422, a panicking handler) are expressed
/// as HTTP [`Response`](crate::Response) values, not as `Error`s. This type
/// surfaces infrastructure failures: reading configuration, registering
/// routes, binding to a port.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value could not be parsed.
    #[error("invalid config value for `{key}`: {value:?}")]
    Config { key: &'static str, value: String },

    /// A route path was rejected by the router, usually because it conflicts
    /// with one registered earlier.
    #[error("invalid route `{method} {path}`: {source}")]
    Route {
        method: http::Method,
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
