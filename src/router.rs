//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup via [`matchit`]. Routes
//! are declared with [`Route`] (or the shortcuts on
//! [`Container`](crate::Container)) and compiled into a [`Router`] once,
//! when the container starts.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::filter::{Filter, FilterChain, SharedFilter};
use crate::handler::{terminal, Handler};

/// Internal name for a bare `*` segment; exposed to handlers as `"*"`.
const WILDCARD: &str = "__wildcard";

// ── Route ─────────────────────────────────────────────────────────────────────

/// A method + path + handler, plus the filters that run ahead of it.
///
/// Paths accept matchit's `{name}` / `{*rest}` syntax as well as `:name`
/// segments and a trailing `*` or `*name`:
///
/// ```rust
/// use hitch::{filter_fn, Context, FilterChain, Route};
///
/// async fn show(ctx: Context) -> String {
///     format!("user {}", ctx.param("id").unwrap_or("?"))
/// }
///
/// let route = Route::get("/users/:id", show)
///     .filter(filter_fn(|ctx: Context, chain: FilterChain| chain.next(ctx)));
/// # let _ = route;
/// ```
pub struct Route {
    method: Method,
    path: String,
    handler: SharedFilter,
    filters: Vec<SharedFilter>,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler: terminal(handler),
            filters: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, path, handler)
    }

    pub fn put(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PUT, path, handler)
    }

    pub fn patch(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PATCH, path, handler)
    }

    pub fn delete(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::DELETE, path, handler)
    }

    /// Appends a filter. Route filters run after container-wide filters.
    pub fn filter(mut self, filter: impl Filter) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Outcome of routing one request.
pub(crate) enum Lookup {
    Found(FilterChain, HashMap<String, String>),
    /// The path exists, but not for this method. Holds the methods that do
    /// match, sorted.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// The compiled routing table.
#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<[SharedFilter]>>>,
}

impl Router {
    /// Compiles `routes` into one stage list each: `shared`, then the
    /// route's own filters, then its handler.
    pub(crate) fn build(routes: Vec<Route>, shared: &[SharedFilter]) -> Result<Self, Error> {
        let mut router = Self::default();
        for route in routes {
            let stages: Arc<[SharedFilter]> = shared.iter()
                .cloned()
                .chain(route.filters)
                .chain(std::iter::once(route.handler))
                .collect();

            router.routes
                .entry(route.method.clone())
                .or_default()
                .insert(to_matchit(&route.path), stages)
                .map_err(|source| Error::Route {
                    method: route.method,
                    path: route.path,
                    source,
                })?;
        }
        Ok(router)
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup {
        if let Some(matched) = self.routes.get(method).and_then(|tree| tree.at(path).ok()) {
            let stages = Arc::clone(matched.value);
            let params = matched.params.iter()
                .map(|(k, v)| {
                    let k = if k == WILDCARD { "*" } else { k };
                    (k.to_owned(), v.to_owned())
                })
                .collect();
            let chain = FilterChain::new(stages);
            return Lookup::Found(chain, params);
        }

        let mut allowed: Vec<Method> = self.routes.iter()
            .filter(|(m, tree)| *m != method && tree.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();
        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Lookup::MethodNotAllowed(allowed)
    }
}

/// Rewrites `:name`, `*` and `*name` segments into matchit syntax.
/// Paths already in matchit syntax pass through unchanged.
fn to_matchit(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if segment == "*" {
                format!("{{*{WILDCARD}}}")
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                segment.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
