//! Shows a cached response go from fresh, to stale-but-revalidatable, to unusable.
use http::{Request, Response, StatusCode};
use reqcore::cache::{CacheStrategy, CachedResponse, Factory};

fn cached_response(max_age_secs: i64) -> CachedResponse {
    let now = 1_700_000_000_000_i64;
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CACHE_CONTROL, format!("max-age={max_age_secs}"))
        .header(http::header::ETAG, "\"v1\"")
        .body(())
        .unwrap();
    CachedResponse {
        response,
        sent_request_at_millis: now - 1_000,
        received_response_at_millis: now,
        had_tls_handshake: false,
    }
}

fn request() -> Request<()> {
    Request::builder().uri("http://example.com/widgets").body(()).unwrap()
}

fn main() {
    let now = 1_700_000_030_000_i64; // 30s after the response was received

    let fresh = cached_response(60);
    match Factory::new(now, &request(), Some(&fresh)).get() {
        CacheStrategy::CacheOnly { .. } => println!("max-age=60 at +30s: served from cache"),
        other => println!("unexpected: {other:?}"),
    }

    let stale = cached_response(10);
    match Factory::new(now, &request(), Some(&stale)).get() {
        CacheStrategy::Conditional { .. } => println!("max-age=10 at +30s: conditional GET with If-None-Match"),
        other => println!("unexpected: {other:?}"),
    }
}
