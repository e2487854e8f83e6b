//! Filters: request-processing steps that run ahead of a route handler.
//!
//! A route's filters form a chain. Each filter receives the [`Context`] and
//! the rest of the chain; it either calls [`FilterChain::next`] to continue
//! or returns its own response to short-circuit. Container-wide filters run
//! before route filters, in registration order.
//!
//! ```rust
//! use hitch::{filter_fn, Context, FilterChain, Response};
//! use http::StatusCode;
//!
//! let auth = filter_fn(|ctx: Context, chain: FilterChain| async move {
//!     if ctx.header("authorization").is_none() {
//!         return Response::status(StatusCode::UNAUTHORIZED);
//!     }
//!     chain.next(ctx).await
//! });
//! # let _ = auth;
//! ```
//!
//! A filter that panics is recovered exactly like a panicking handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::response::{IntoResponse, Response};

/// A boxed, `Send` future resolving to a [`Response`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A unit of request processing that runs before a handler.
///
/// `invoke` returns a `'static` future, so clone anything it needs out of
/// `&self` before moving into the `async` block.
pub trait Filter: Send + Sync + 'static {
    fn invoke(&self, ctx: Context, chain: FilterChain) -> BoxFuture;
}

pub(crate) type SharedFilter = Arc<dyn Filter>;

/// The remainder of a route's filter chain, ending at its handler.
///
/// The handler is stored as the last stage, so running the chain is a walk
/// over one slice.
pub struct FilterChain {
    stages: Arc<[SharedFilter]>,
    index: usize,
}

impl FilterChain {
    pub(crate) fn new(stages: Arc<[SharedFilter]>) -> Self {
        Self { stages, index: 0 }
    }

    /// Runs the next filter, or the handler once every filter has run.
    pub fn next(mut self, ctx: Context) -> BoxFuture {
        match self.stages.get(self.index).cloned() {
            Some(stage) => {
                self.index += 1;
                stage.invoke(ctx, self)
            }
            // Only reachable if a handler stage calls `next`, which none do.
            None => {
                error!(path = ctx.path(), "filter chain ran past its handler");
                Box::pin(async { Response::status(StatusCode::INTERNAL_SERVER_ERROR) })
            }
        }
    }
}

/// Adapts an async closure into a [`Filter`].
pub fn filter_fn<F, Fut, R>(f: F) -> FnFilter<F>
where
    F: Fn(Context, FilterChain) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    FnFilter(f)
}

/// A [`Filter`] built by [`filter_fn`].
pub struct FnFilter<F>(F);

impl<F, Fut, R> Filter for FnFilter<F>
where
    F: Fn(Context, FilterChain) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn invoke(&self, ctx: Context, chain: FilterChain) -> BoxFuture {
        let fut = (self.0)(ctx, chain);
        Box::pin(async move { fut.await.into_response() })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::Method;

    use super::*;
    use crate::context::test_context;
    use crate::handler::terminal;

    struct Record(Arc<Mutex<Vec<&'static str>>>, &'static str);

    impl Filter for Record {
        fn invoke(&self, ctx: Context, chain: FilterChain) -> BoxFuture {
            self.0.lock().unwrap().push(self.1);
            chain.next(ctx)
        }
    }

    fn chain(mut stages: Vec<SharedFilter>) -> FilterChain {
        stages.push(terminal(|_ctx: Context| async { "handled" }));
        FilterChain::new(stages.into())
    }

    #[tokio::test]
    async fn filters_run_in_order_then_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = chain(vec![
            Arc::new(Record(Arc::clone(&seen), "first")) as SharedFilter,
            Arc::new(Record(Arc::clone(&seen), "second")) as SharedFilter,
        ]);

        let res = chain.next(test_context(Method::GET, "/")).await;

        assert_eq!(res.body(), b"handled");
        assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
    }

    #[tokio::test]
    async fn filter_can_short_circuit() {
        let deny = filter_fn(|_ctx: Context, _chain: FilterChain| async {
            Response::status(StatusCode::FORBIDDEN)
        });
        let res = chain(vec![Arc::new(deny) as SharedFilter])
            .next(test_context(Method::GET, "/"))
            .await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn filter_sees_annotations_from_earlier_filters() {
        let tag = filter_fn(|mut ctx: Context, chain: FilterChain| async move {
            ctx.extensions_mut().insert("tagged");
            chain.next(ctx).await
        });
        let check = filter_fn(|ctx: Context, _chain: FilterChain| async move {
            ctx.extensions().get::<&'static str>().copied().unwrap_or("missing")
        });
        let res = chain(vec![Arc::new(tag) as SharedFilter, Arc::new(check) as SharedFilter])
            .next(test_context(Method::GET, "/"))
            .await;
        assert_eq!(res.body(), b"tagged");
    }
}
