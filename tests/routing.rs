//! Routing, filters and bodies through the in-process dispatcher.

use bytes::Bytes;
use hitch::{
    filter_fn, App, Container, ContainerConfig, Context, FilterChain, HttpError, Json, Response,
    Route,
};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::Serialize;

fn app(container: Container) -> App {
    container.build().expect("routes compile")
}

async fn send(app: &App, method: Method, uri: &str, body: &'static str) -> (StatusCode, http::HeaderMap, String) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap();
    let res = app.handle(req).await;
    let status = res.status();
    let headers = res.headers().clone();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

#[derive(Serialize)]
struct User {
    id: String,
    name: &'static str,
}

async fn get_user(ctx: Context) -> Json<User> {
    Json(User { id: ctx.param("id").unwrap_or_default().to_owned(), name: "alice" })
}

async fn echo(ctx: Context) -> Response {
    Response::text(String::from_utf8_lossy(ctx.body()).into_owned())
}

async fn lookup(ctx: Context) -> Result<&'static str, HttpError> {
    match ctx.param("id") {
        Some("1") => Ok("found"),
        _ => Err(HttpError::from_status(StatusCode::NOT_FOUND)),
    }
}

#[tokio::test]
async fn routes_by_method_and_path() {
    let app = app(
        Container::new(ContainerConfig::default())
            .get("/users/:id", get_user)
            .post("/echo", echo),
    );

    let (status, headers, body) = send(&app, Method::GET, "/users/42", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(body, r#"{"id":"42","name":"alice"}"#);

    let (status, _, body) = send(&app, Method::POST, "/echo", "ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ping");
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = app(Container::new(ContainerConfig::default()).get("/", echo));
    let (status, _, body) = send(&app, Method::GET, "/missing", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");
}

#[tokio::test]
async fn wrong_method_is_405_with_allow() {
    let app = app(
        Container::new(ContainerConfig::default())
            .put("/items/:id", echo)
            .delete("/items/:id", echo),
    );
    let (status, headers, body) = send(&app, Method::GET, "/items/1", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers["allow"], "DELETE, PUT");
    assert_eq!(body, "Method Not Allowed");
}

#[tokio::test]
async fn returned_http_error_matches_raised_one() {
    let app = app(Container::new(ContainerConfig::default()).get("/things/{id}", lookup));

    let (status, _, body) = send(&app, Method::GET, "/things/1", "").await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "found"));

    let (status, _, body) = send(&app, Method::GET, "/things/2", "").await;
    assert_eq!((status, body.as_str()), (StatusCode::NOT_FOUND, "Not Found"));
}

#[tokio::test]
async fn container_filters_run_before_route_filters() {
    let outer = filter_fn(|mut ctx: Context, chain: FilterChain| async move {
        ctx.extensions_mut().insert(vec!["container"]);
        chain.next(ctx).await
    });
    let inner = filter_fn(|mut ctx: Context, chain: FilterChain| async move {
        if let Some(trail) = ctx.extensions_mut().get_mut::<Vec<&'static str>>() {
            trail.push("route");
        }
        chain.next(ctx).await
    });
    let handler = |ctx: Context| async move {
        ctx.extensions()
            .get::<Vec<&'static str>>()
            .map(|trail| trail.join(">"))
            .unwrap_or_default()
    };

    let app = app(
        Container::new(ContainerConfig::default())
            .route(Route::get("/", handler).filter(inner))
            .filter(outer),
    );

    let (_, _, body) = send(&app, Method::GET, "/", "").await;
    assert_eq!(body, "container>route");
}

#[tokio::test]
async fn panic_in_one_route_leaves_others_untouched() {
    async fn boom(_ctx: Context) -> &'static str {
        panic!("early exit")
    }

    let app = app(
        Container::new(ContainerConfig::default())
            .get("/boom", boom)
            .post("/echo", echo),
    );

    let (aborted, echoed) = tokio::join!(
        send(&app, Method::GET, "/boom", ""),
        send(&app, Method::POST, "/echo", "still here"),
    );
    assert_eq!((aborted.0, aborted.2.as_str()), (StatusCode::OK, "\"early exit\""));
    assert_eq!((echoed.0, echoed.2.as_str()), (StatusCode::OK, "still here"));
}

#[tokio::test]
async fn unrecognised_panic_payload_is_a_generic_500() {
    async fn odd(_ctx: Context) -> &'static str {
        std::panic::panic_any(12.5f64)
    }

    let app = app(Container::new(ContainerConfig::default()).get("/", odd));
    let (status, _, body) = send(&app, Method::GET, "/", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, hitch::FALLBACK_MESSAGE);
}

#[tokio::test]
async fn conflicting_routes_fail_to_build() {
    let err = Container::new(ContainerConfig::default())
        .get("/a/:id", echo)
        .get("/a/{other}", echo)
        .build()
        .err()
        .expect("conflict");
    assert!(matches!(err, hitch::Error::Route { .. }));
}
