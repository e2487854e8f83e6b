//! The container: routes, filters and a listener, started as one unit.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use http_body_util::Full;
use hyper::body::Body;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::ContainerConfig;
use crate::error::Error;
use crate::filter::{Filter, SharedFilter};
use crate::handler::Handler;
use crate::router::{Route, Router};
use crate::server;

/// Collects routes and filters, then serves them.
///
/// Registration methods return `self` so calls chain. Routes are compiled
/// when the container is built, so an invalid or conflicting path surfaces
/// as an [`Error::Route`] from [`start`](Self::start), [`serve`](Self::serve)
/// or [`build`](Self::build).
///
/// Every route runs behind a panic boundary: a filter or handler that
/// panics is answered according to the rules in [`Recovered`](crate::Recovered)
/// and the connection keeps serving.
pub struct Container {
    config: ContainerConfig,
    routes: Vec<Route>,
    filters: Vec<SharedFilter>,
}

impl Container {
    pub fn new(config: ContainerConfig) -> Self {
        Self { config, routes: Vec::new(), filters: Vec::new() }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Adds a filter that runs ahead of every route, before the route's own
    /// filters. Applies to routes registered before and after this call.
    pub fn filter(mut self, filter: impl Filter) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Register a handler for a method + path pair.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(method, path, handler))
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Compiles the routing table without binding a socket.
    pub fn build(self) -> Result<App, Error> {
        let router = Router::build(self.routes, &self.filters)?;
        Ok(App { router: Arc::new(router) })
    }

    /// Binds and serves in a background task.
    ///
    /// Returns once the listener is bound. Call [`Running::stop`] to shut
    /// down; dropping the handle shuts down as well.
    pub async fn start(self) -> Result<Running, Error> {
        let drain_limit = self.config.shutdown_timeout;
        let (listener, app) = self.bind().await?;
        let addr = listener.local_addr()?;
        let token = CancellationToken::new();
        let stopped = token.clone();
        let task = tokio::spawn(async move {
            server::run(listener, app.router, stopped.cancelled_owned(), drain_limit).await;
        });
        Ok(Running { addr, token, task: Some(task) })
    }

    /// Binds and serves until SIGTERM or Ctrl-C, then drains in-flight
    /// requests (up to [`ContainerConfig::shutdown_timeout`]) and returns.
    pub async fn serve(self) -> Result<(), Error> {
        let drain_limit = self.config.shutdown_timeout;
        let (listener, app) = self.bind().await?;
        server::run(listener, app.router, server::shutdown_signal(), drain_limit).await;
        Ok(())
    }

    async fn bind(self) -> Result<(TcpListener, App), Error> {
        let addr = self.config.addr();
        let app = self.build()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        Ok((listener, app))
    }
}

/// Handle to a container started with [`Container::start`].
pub struct Running {
    addr: SocketAddr,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Running {
    /// The bound address, with the real port when port `0` was configured.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting, waits for in-flight requests, then returns.
    ///
    /// The wait is bounded by [`ContainerConfig::shutdown_timeout`].
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("server task failed: {e}");
            }
        }
    }

    /// Like [`stop`](Self::stop), but gives in-flight requests at most
    /// `limit` to finish. Whatever is still running then is aborted and its
    /// connection closed without a response.
    pub async fn stop_timeout(mut self, limit: Duration) {
        self.token.cancel();
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(limit, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("server task failed: {e}"),
            Err(_) => {
                warn!(addr = %self.addr, ?limit, "stop deadline passed, aborting in-flight requests");
                // Dropping the server future drops its JoinSet, which aborts
                // every connection task.
                task.abort();
                if let Err(e) = task.await {
                    if e.is_panic() {
                        error!("server task failed: {e}");
                    }
                }
            }
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// A compiled container that dispatches requests in-process.
///
/// This is what the server calls for every request. It is also handy in
/// tests, where it runs the full routing, filter and recovery path without
/// a socket.
#[derive(Clone)]
pub struct App {
    router: Arc<Router>,
}

impl App {
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        server::dispatch(&self.router, req, None).await
    }
}
