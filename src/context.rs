//! Per-request context handed to filters and handlers.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};

/// An incoming HTTP request plus whatever filters have attached to it.
///
/// The body is fully collected before the filter chain starts, so
/// [`body`](Context::body) is a cheap slice. Filters pass data downstream
/// through [`extensions_mut`](Context::extensions_mut):
///
/// ```rust
/// # use hitch::Context;
/// #[derive(Clone)]
/// struct UserId(u64);
///
/// fn annotate(ctx: &mut Context) {
///     ctx.extensions_mut().insert(UserId(7));
/// }
///
/// fn read(ctx: &Context) -> Option<u64> {
///     ctx.extensions().get::<UserId>().map(|id| id.0)
/// }
/// ```
pub struct Context {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
    extensions: Extensions,
}

impl Context {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params,
            remote_addr,
            extensions: parts.extensions,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Peer address, or `None` when the request did not arrive over a socket.
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Header value as a string. `None` if missing or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}` (or `/users/:id`), `ctx.param("id")` on
    /// `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }
}

#[cfg(test)]
pub(crate) fn test_context(method: Method, uri: &str) -> Context {
    let (parts, ()) = http::Request::builder()
        .method(method)
        .uri(uri)
        .header("x-request-id", "abc")
        .body(())
        .unwrap()
        .into_parts();
    Context::new(parts, Bytes::new(), HashMap::new(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_request_parts() {
        let ctx = test_context(Method::POST, "/users?active=1");
        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/users");
        assert_eq!(ctx.query(), Some("active=1"));
        assert_eq!(ctx.header("X-Request-Id"), Some("abc"));
        assert_eq!(ctx.remote_addr(), None);
        assert_eq!(ctx.param("id"), None);
    }

    #[test]
    fn extensions_carry_typed_values() {
        let mut ctx = test_context(Method::GET, "/");
        ctx.extensions_mut().insert(42u32);
        assert_eq!(ctx.extensions().get::<u32>(), Some(&42));
    }
}
