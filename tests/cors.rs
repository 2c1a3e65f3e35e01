use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures_util::FutureExt;
use hyper::Method;

use cors_gate::{
    headers::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        ACCESS_CONTROL_ALLOW_HEADERS,
        ACCESS_CONTROL_ALLOW_METHODS,
        ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_EXPOSE_HEADERS,
        ACCESS_CONTROL_MAX_AGE,
        ACCESS_CONTROL_REQUEST_HEADERS,
        ACCESS_CONTROL_REQUEST_METHOD,
        HeaderValue,
        CONTENT_LENGTH,
        CONTENT_TYPE,
        ORIGIN,
        VARY,
    },
    http::{Request, Response, StatusCode},
    Cors,
    CorsResult,
    HttpBody,
    HttpRequest,
    MissReason,
    Next,
};

fn engine() -> Cors {
    Cors::builder()
        .allow(|rules| rules
            .with_origins(["http://localhost:3000", "example.com"])
            .resource_with("/api/*", |r| r
                .with_methods([Method::GET, Method::POST])
                .with_headers(["x-domain-token"])))
        .build()
        .unwrap()
}

fn ok_handler() -> Next {
    Arc::new(|_req| async {
        Ok(Response::new(HttpBody::full("Hello, World!")))
    }.boxed())
}

fn tracking_handler(called: Arc<AtomicBool>) -> Next {
    Arc::new(move |_req| {
        called.store(true, Ordering::SeqCst);
        async { Ok(Response::new(HttpBody::empty())) }.boxed()
    })
}

fn get(path: &str, origin: Option<&str>) -> HttpRequest {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(origin) = origin {
        builder = builder.header(ORIGIN, origin);
    }
    builder.body(HttpBody::empty()).unwrap()
}

fn preflight(path: &str, origin: &str, method: &str, headers: Option<&str>) -> HttpRequest {
    let mut builder = Request::builder()
        .method(Method::OPTIONS)
        .uri(path)
        .header(ORIGIN, origin)
        .header(ACCESS_CONTROL_REQUEST_METHOD, method);
    if let Some(headers) = headers {
        builder = builder.header(ACCESS_CONTROL_REQUEST_HEADERS, headers);
    }
    builder.body(HttpBody::empty()).unwrap()
}

fn result(response: &cors_gate::HttpResponse) -> CorsResult {
    *response.extensions().get::<CorsResult>().unwrap()
}

#[tokio::test]
async fn it_passes_through_requests_without_origin() {
    let called = Arc::new(AtomicBool::new(false));
    let next = tracking_handler(called.clone());

    let response = engine()
        .process(get("/api/users", None), &next)
        .await
        .unwrap();

    assert!(called.load(Ordering::SeqCst));
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(response.headers().get(VARY).unwrap(), "Origin");
    assert_eq!(result(&response).miss_reason(), Some(MissReason::NoOriginMatch));
}

#[tokio::test]
async fn it_allows_cross_origin_get() {
    let next = ok_handler();

    let response = engine()
        .process(get("/api/users", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "http://localhost:3000");
    assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "GET, POST");
    assert_eq!(headers.get(ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(), "");
    assert_eq!(headers.get(ACCESS_CONTROL_MAX_AGE).unwrap(), "7200");
    assert_eq!(headers.get(VARY).unwrap(), "Origin");
    assert!(result(&response).is_hit());
    assert!(!result(&response).is_preflight());
}

#[tokio::test]
async fn it_matches_bare_hostname_for_both_schemes() {
    let next = ok_handler();
    let cors = engine();

    for origin in ["http://example.com", "https://example.com"] {
        let response = cors
            .process(get("/api/users", Some(origin)), &next)
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            origin
        );
    }
}

#[tokio::test]
async fn it_falls_back_to_x_origin_header() {
    let next = ok_handler();
    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/users")
        .header("X-Origin", "http://localhost:3000")
        .body(HttpBody::empty())
        .unwrap();

    let response = engine().process(req, &next).await.unwrap();

    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn it_ignores_unmatched_origin() {
    let next = ok_handler();

    let response = engine()
        .process(get("/api/users", Some("http://evil.test")), &next)
        .await
        .unwrap();

    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    // the path is CORS-configured, so caches still have to key on Origin
    assert_eq!(response.headers().get(VARY).unwrap(), "Origin");
    assert_eq!(result(&response).miss_reason(), Some(MissReason::NoOriginMatch));
}

#[tokio::test]
async fn it_ignores_unconfigured_path() {
    let next = ok_handler();

    let response = engine()
        .process(get("/private", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert!(response.headers().get(VARY).is_none());
    assert_eq!(result(&response).miss_reason(), Some(MissReason::NoPathMatch));
}

#[tokio::test]
async fn it_answers_wildcard_for_public_group() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_any_origin()
            .resource("/public/*"))
        .build()
        .unwrap();
    let next = ok_handler();

    let response = cors
        .process(get("/public/feed", Some("http://anyone.test")), &next)
        .await
        .unwrap();

    assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    assert_eq!(response.headers().get(VARY).unwrap(), "Origin");
}

#[tokio::test]
async fn it_answers_null_for_file_origin() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origins(["file://"])
            .resource("/api/*"))
        .build()
        .unwrap();
    let next = ok_handler();

    let response = cors
        .process(get("/api/users", Some("null")), &next)
        .await
        .unwrap();

    assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "null");
}

#[tokio::test]
async fn it_adds_credentials_header_for_exact_origin() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origins(["http://localhost:3000"])
            .resource_with("/api/*", |r| r.with_credentials(true)))
        .build()
        .unwrap();
    let next = ok_handler();

    let response = cors
        .process(get("/api/users", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn it_merges_vary_with_downstream_value() {
    let next: Next = Arc::new(|_req| async {
        let mut response = Response::new(HttpBody::empty());
        response.headers_mut().insert(VARY, HeaderValue::from_static("Accept-Encoding"));
        Ok(response)
    }.boxed());

    let response = engine()
        .process(get("/api/users", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert_eq!(response.headers().get(VARY).unwrap(), "Accept-Encoding, Origin");
}

#[tokio::test]
async fn it_does_not_duplicate_downstream_vary_origin() {
    let next: Next = Arc::new(|_req| async {
        let mut response = Response::new(HttpBody::empty());
        response.headers_mut().insert(VARY, HeaderValue::from_static("origin"));
        Ok(response)
    }.boxed());

    let response = engine()
        .process(get("/api/users", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert_eq!(response.headers().get(VARY).unwrap(), "origin");
}

#[tokio::test]
async fn it_uses_configured_vary_list() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origins(["http://localhost:3000"])
            .resource_with("/api/*", |r| r.with_vary(["Origin", "Host"])))
        .build()
        .unwrap();
    let next = ok_handler();

    let response = cors
        .process(get("/api/users", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert_eq!(response.headers().get(VARY).unwrap(), "Origin, Host");
}

#[tokio::test]
async fn it_keeps_downstream_cors_headers() {
    let next: Next = Arc::new(|_req| async {
        let mut response = Response::new(HttpBody::empty());
        response.headers_mut().insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("http://upstream.test"),
        );
        Ok(response)
    }.boxed());

    let response = engine()
        .process(get("/api/users", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://upstream.test"
    );
    assert!(response
        .headers()
        .get("x-cors-original-access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn it_records_shadowed_headers_in_debug_mode() {
    let cors = Cors::builder()
        .with_debug(true)
        .allow(|rules| rules
            .with_origins(["http://localhost:3000"])
            .resource("/api/*"))
        .build()
        .unwrap();
    let next: Next = Arc::new(|_req| async {
        let mut response = Response::new(HttpBody::empty());
        response.headers_mut().insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("http://upstream.test"),
        );
        Ok(response)
    }.boxed());

    let response = cors
        .process(get("/api/users", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://upstream.test"
    );
    assert_eq!(
        response
            .headers()
            .get("x-cors-original-access-control-allow-origin")
            .unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn it_approves_preflight() {
    let called = Arc::new(AtomicBool::new(false));
    let next = tracking_handler(called.clone());

    let response = engine()
        .process(
            preflight("/api/users", "http://localhost:3000", "POST", Some("X-Domain-Token")),
            &next,
        )
        .await
        .unwrap();

    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "http://localhost:3000");
    assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "GET, POST");
    assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(), "X-Domain-Token");
    assert_eq!(headers.get(ACCESS_CONTROL_MAX_AGE).unwrap(), "7200");
    assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
    assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "0");
    assert!(result(&response).is_hit());
    assert!(result(&response).is_preflight());
}

#[tokio::test]
async fn it_denies_preflight_for_unallowed_method() {
    let called = Arc::new(AtomicBool::new(false));
    let next = tracking_handler(called.clone());

    let response = engine()
        .process(
            preflight("/api/users", "http://localhost:3000", "DELETE", None),
            &next,
        )
        .await
        .unwrap();

    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(result(&response).miss_reason(), Some(MissReason::MethodNotAllowed));
}

#[tokio::test]
async fn it_denies_preflight_for_unallowed_header() {
    let next = ok_handler();

    let response = engine()
        .process(
            preflight("/api/users", "http://localhost:3000", "GET", Some("X-Fooey")),
            &next,
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(result(&response).miss_reason(), Some(MissReason::HeaderNotAllowed));
}

#[tokio::test]
async fn it_allows_simple_headers_in_preflight_by_default() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origins(["http://localhost:3000"])
            .resource("/api/*"))
        .build()
        .unwrap();
    let next = ok_handler();

    let response = cors
        .process(
            preflight("/api/users", "http://localhost:3000", "GET", Some("Content-Type")),
            &next,
        )
        .await
        .unwrap();

    assert!(result(&response).is_hit());
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
        "Content-Type"
    );
}

#[tokio::test]
async fn it_allows_any_header_in_preflight_when_configured() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origins(["http://localhost:3000"])
            .resource_with("/api/*", |r| r.with_any_header()))
        .build()
        .unwrap();
    let next = ok_handler();

    let response = cors
        .process(
            preflight("/api/users", "http://localhost:3000", "GET", Some("X-Fooey")),
            &next,
        )
        .await
        .unwrap();

    assert!(result(&response).is_hit());
}

#[tokio::test]
async fn it_rejects_preflight_with_malformed_path() {
    let called = Arc::new(AtomicBool::new(false));
    let next = tracking_handler(called.clone());

    let response = engine()
        .process(
            preflight("/api/%zz", "http://localhost:3000", "GET", None),
            &next,
        )
        .await
        .unwrap();

    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.extensions().get::<CorsResult>().is_none());
}

#[tokio::test]
async fn it_forwards_actual_request_with_malformed_path() {
    let called = Arc::new(AtomicBool::new(false));
    let next = tracking_handler(called.clone());

    let response = engine()
        .process(get("/api/%zz", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert!(called.load(Ordering::SeqCst));
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(result(&response).miss_reason(), Some(MissReason::NoPathMatch));
}

#[tokio::test]
async fn it_matches_percent_encoded_path() {
    let next = ok_handler();
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origins(["http://localhost:3000"])
            .resource("/api/a b"))
        .build()
        .unwrap();

    let response = cors
        .process(get("/api/a%20b", Some("http://localhost:3000")), &next)
        .await
        .unwrap();

    assert!(result(&response).is_hit());
}

#[tokio::test]
async fn it_treats_options_without_request_method_as_actual() {
    let called = Arc::new(AtomicBool::new(false));
    let next = tracking_handler(called.clone());
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/users")
        .header(ORIGIN, "http://localhost:3000")
        .body(HttpBody::empty())
        .unwrap();

    let response = engine().process(req, &next).await.unwrap();

    assert!(called.load(Ordering::SeqCst));
    assert!(!result(&response).is_preflight());
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn it_uses_first_group_matching_origin() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origins(["http://first.test"])
            .resource("/one"))
        .allow(|rules| rules
            .with_origins(["http://first.test", "http://second.test"])
            .resource("/two"))
        .build()
        .unwrap();
    let next = ok_handler();

    // the first group claims this origin, and it has no rule for /two
    let response = cors
        .process(get("/two", Some("http://first.test")), &next)
        .await
        .unwrap();
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(result(&response).miss_reason(), Some(MissReason::NoPathMatch));

    let response = cors
        .process(get("/two", Some("http://second.test")), &next)
        .await
        .unwrap();
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://second.test"
    );
}

#[tokio::test]
async fn it_matches_origin_by_pattern() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origin_pattern(r"^http://192\.168\.0\.\d{1,3}(:\d+)?$")
            .resource("/api/*"))
        .build()
        .unwrap();
    let next = ok_handler();

    let response = cors
        .process(get("/api/users", Some("http://192.168.0.5:3000")), &next)
        .await
        .unwrap();
    assert!(result(&response).is_hit());

    let response = cors
        .process(get("/api/users", Some("http://10.0.0.5:3000")), &next)
        .await
        .unwrap();
    assert_eq!(result(&response).miss_reason(), Some(MissReason::NoOriginMatch));
}

#[tokio::test]
async fn it_matches_origin_by_predicate() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origin_predicate(|origin, _req| origin.ends_with(".example.com"))
            .resource("/api/*"))
        .build()
        .unwrap();
    let next = ok_handler();

    let response = cors
        .process(get("/api/users", Some("https://api.example.com")), &next)
        .await
        .unwrap();
    assert!(result(&response).is_hit());

    let response = cors
        .process(get("/api/users", Some("https://bad.test")), &next)
        .await
        .unwrap();
    assert!(!result(&response).is_hit());
}

#[tokio::test]
async fn it_respects_resource_predicate() {
    let cors = Cors::builder()
        .allow(|rules| rules
            .with_origins(["http://localhost:3000"])
            .resource_with("/api/*", |r| r
                .with_predicate(|req| req.headers().contains_key("x-inner"))))
        .build()
        .unwrap();
    let next = ok_handler();

    let approved = Request::builder()
        .method(Method::GET)
        .uri("/api/users")
        .header(ORIGIN, "http://localhost:3000")
        .header("x-inner", "1")
        .body(HttpBody::empty())
        .unwrap();

    let response = cors.process(approved, &next).await.unwrap();
    assert!(result(&response).is_hit());

    let response = cors
        .process(get("/api/users", Some("http://localhost:3000")), &next)
        .await
        .unwrap();
    assert_eq!(result(&response).miss_reason(), Some(MissReason::NoPathMatch));
}

#[tokio::test]
async fn it_is_repeatable_across_requests() {
    let cors = engine();
    let next = ok_handler();

    for _ in 0..3 {
        let response = cors
            .process(get("/api/users", Some("http://localhost:3000")), &next)
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(response.headers().get(VARY).unwrap(), "Origin");
    }
}
