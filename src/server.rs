//! Accept loop, request dispatch and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! On a shutdown signal the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion, for at most
//!    the configured drain deadline.
//! 3. Aborts whatever is still running at the deadline.
//! 4. Returns, which lets [`Container::serve`](crate::Container::serve) or
//!    [`Running::stop`](crate::Running::stop) complete.

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::ALLOW;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::http_error::HttpError;
use crate::recover::recover;
use crate::response::{IntoResponse, Response};
use crate::router::{Lookup, Router};

/// Serves `router` on `listener` until `shutdown` resolves, then drains.
///
/// Open connections are asked to finish their current request and close, so
/// idle keep-alive clients cannot hold the drain open. A handler that never
/// finishes can, so the drain gives up after `drain_limit` and aborts the
/// remaining connection tasks.
pub(crate) async fn run(
    listener: TcpListener,
    router: Arc<Router>,
    shutdown: impl Future<Output = ()>,
    drain_limit: Option<Duration>,
) {
    let local = listener.local_addr().ok();
    info!(addr = ?local, "hitch listening");

    // JoinSet tracks every spawned connection task so we can wait for
    // them all to finish during graceful shutdown.
    let mut tasks = tokio::task::JoinSet::new();
    let draining = CancellationToken::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Check shutdown first so a stop request immediately stops
            // accepting, even if more connections are queued.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let draining = draining.clone();
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection.
                    let svc = service_fn(move |req: http::Request<Incoming>| {
                        let router = Arc::clone(&router);
                        async move {
                            Ok::<_, Infallible>(dispatch(&router, req, Some(remote_addr)).await)
                        }
                    });

                    // `auto::Builder` handles both HTTP/1.1 and HTTP/2.
                    let builder = ConnBuilder::new(TokioExecutor::new());
                    let conn = builder.serve_connection(io, svc);
                    tokio::pin!(conn);

                    let res = tokio::select! {
                        res = conn.as_mut() => res,
                        () = draining.cancelled() => {
                            conn.as_mut().graceful_shutdown();
                            conn.as_mut().await
                        }
                    };
                    if let Err(e) = res {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    draining.cancel();
    let drain = async {
        while tasks.join_next().await.is_some() {}
    };
    let drained = match drain_limit {
        Some(limit) => tokio::time::timeout(limit, drain).await.is_ok(),
        None => {
            drain.await;
            true
        }
    };
    if !drained {
        warn!(in_flight = tasks.len(), ?drain_limit, "drain deadline passed, aborting connections");
        tasks.shutdown().await;
    }

    info!(addr = ?local, "hitch stopped");
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces exactly one response.
///
/// Every failure is answered here (404, 405, 400, or a recovered panic), so
/// hyper never sees an error and never sees a panic.
pub(crate) async fn dispatch<B>(
    router: &Router,
    req: http::Request<B>,
    remote_addr: Option<SocketAddr>,
) -> http::Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();

    let response = match router.lookup(&parts.method, parts.uri.path()) {
        Lookup::Found(chain, params) => match body.collect().await {
            Ok(collected) => {
                let ctx = Context::new(parts, collected.to_bytes(), params, remote_addr);
                recover(chain, ctx).await
            }
            Err(e) => {
                warn!(method = %parts.method, path = parts.uri.path(), "failed to read request body: {e}");
                HttpError::from_status(StatusCode::BAD_REQUEST).into_response()
            }
        },
        Lookup::MethodNotAllowed(allowed) => {
            let allow = allowed.iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header(ALLOW.as_str(), &allow)
                .text(StatusCode::METHOD_NOT_ALLOWED.canonical_reason().unwrap_or_default())
        }
        Lookup::NotFound => HttpError::from_status(StatusCode::NOT_FOUND).into_response(),
    };

    response.into_inner()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. If a handler cannot be installed
/// that arm never resolves and the failure is logged.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
