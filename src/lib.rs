//! # hitch
//!
//! Containers, routes, filters and per-request contexts on top of hyper and
//! matchit, with a panic boundary around every route.
//!
//! ## The contract
//!
//! hyper owns connections. matchit owns routing. hitch owns the part in
//! between: running a route's filter chain and handler, and making sure the
//! client gets exactly one response for every request, even when the code
//! inside the chain panics.
//!
//! A panic is recovered at the route boundary and translated by payload type:
//!
//! - [`HttpError`] → its status and message
//! - [`StatusCode`](http::StatusCode) → that status and its reason phrase
//! - any boxed error → `500` with the error's message
//! - a string → `200` with the string as a JSON value
//! - anything else → `500 Internal Server Error`
//!
//! See [`Recovered`] for the details.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use hitch::{Container, ContainerConfig, Context, HttpError, Response};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hitch::Error> {
//!     Container::new(ContainerConfig::from_env()?)
//!         .get("/users/:id", get_user)
//!         .delete("/users/:id", delete_user)
//!         .serve()
//!         .await
//! }
//!
//! async fn get_user(ctx: Context) -> Response {
//!     match ctx.param("id") {
//!         Some("42") => Response::json(br#"{"id":"42"}"#.to_vec()),
//!         _ => HttpError::from_status(StatusCode::NOT_FOUND).raise(),
//!     }
//! }
//!
//! async fn delete_user(_ctx: Context) -> StatusCode {
//!     StatusCode::NO_CONTENT
//! }
//! ```

mod config;
mod container;
mod context;
mod error;
mod filter;
mod handler;
mod http_error;
mod recover;
mod response;
mod router;
mod server;

pub use config::ContainerConfig;
pub use container::{App, Container, Running};
pub use context::Context;
pub use error::Error;
pub use filter::{filter_fn, BoxFuture, Filter, FilterChain, FnFilter};
pub use handler::Handler;
pub use http_error::{raise, HttpError};
pub use recover::{quiet_panic_hook, Recovered, FALLBACK_MESSAGE};
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::Route;
