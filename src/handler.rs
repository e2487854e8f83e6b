//! Route handlers.
//!
//! A handler is the last stage of a route's filter chain. The router stores
//! it as one more [`Filter`] that answers the request and never calls
//! [`FilterChain::next`], so a route is nothing more than a slice of filters.

use std::future::Future;
use std::sync::Arc;

use crate::context::Context;
use crate::filter::{BoxFuture, Filter, FilterChain, SharedFilter};
use crate::response::IntoResponse;

/// Answers a request.
///
/// Implemented for every `async fn(Context) -> impl IntoResponse` and for
/// closures of the same shape. Implement it by hand for handlers that carry
/// state:
///
/// ```rust
/// use hitch::{BoxFuture, Context, Handler, IntoResponse};
///
/// struct Greeting(&'static str);
///
/// impl Handler for Greeting {
///     fn handle(&self, _ctx: Context) -> BoxFuture {
///         let text = self.0;
///         Box::pin(async move { text.into_response() })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: Context) -> BoxFuture;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn handle(&self, ctx: Context) -> BoxFuture {
        let fut = (self)(ctx);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Puts a handler at the end of a filter chain.
struct HandlerFilter<H>(H);

impl<H: Handler> Filter for HandlerFilter<H> {
    fn invoke(&self, ctx: Context, _chain: FilterChain) -> BoxFuture {
        self.0.handle(ctx)
    }
}

/// Erases `handler` into the final stage of a chain.
pub(crate) fn terminal(handler: impl Handler) -> SharedFilter {
    Arc::new(HandlerFilter(handler))
}
