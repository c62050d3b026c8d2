//! Decides whether a request may be served from cache, must be conditionally revalidated, or
//! must bypass the cache entirely — a pure function over `(now, request, cached response)`
//! faithful to RFC 7234.

mod age;
mod control;

pub use control::{CacheControl, CacheControlBuilder};

use http::{
    header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED},
    HeaderValue, Request, Response, StatusCode,
};

/// A response held in the local cache, with the bookkeeping timestamps the freshness and age
/// computations need. Corresponds to the source's "cached response" plus the metadata an HTTP
/// cache implementation would store alongside the bytes.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// The stored response (status, headers; body is the caller's concern, not this crate's).
    pub response: Response<()>,
    /// When the request that produced this response was sent, in epoch milliseconds.
    pub sent_request_at_millis: i64,
    /// When the response was received, in epoch milliseconds.
    pub received_response_at_millis: i64,
    /// Whether this response was originally received over a TLS connection. An HTTPS request
    /// cannot be satisfied by a cached response recorded without one (rule 2 of
    /// `get_candidate`).
    pub had_tls_handshake: bool,
}

/// The outcome of [`Factory::get`] / [`Factory::get_candidate`], modeled as a 4-way variant
/// (rather than two independently-nullable fields) so the `only-if-cached`-denied case can't be
/// forgotten at a call site.
#[derive(Debug, Clone)]
pub enum CacheStrategy {
    /// Serve nothing from cache; perform `request` as given.
    NetworkOnly { request: Request<()> },
    /// Serve `response` directly; no network round-trip needed.
    CacheOnly { response: CachedResponse },
    /// Perform `request` (carrying a conditional header) and fall back to `response` if the
    /// origin replies `304 Not Modified`.
    Conditional { request: Request<()>, response: CachedResponse },
    /// Neither the cache nor the network may be used: `only-if-cached` was requested and the
    /// candidate required the network. The caller must synthesize a `504`.
    Neither,
}

impl CacheStrategy {
    /// Whether this strategy requires a network round-trip (`NetworkOnly` or `Conditional`).
    pub fn requires_network(&self) -> bool {
        matches!(self, CacheStrategy::NetworkOnly { .. } | CacheStrategy::Conditional { .. })
    }
}

/// Builds a [`CacheStrategy`] for one `(now, request, cached response)` triple. Stateless:
/// construct, call [`Factory::get`], discard.
pub struct Factory<'a> {
    now_millis: i64,
    request: &'a Request<()>,
    cached: Option<&'a CachedResponse>,
    /// Supplemental flag (§0): true when the caller has explicitly asked for a forced reload,
    /// which overrides an `immutable` response's fast-path freshness (RFC 8246).
    forced_reload: bool,
}

impl<'a> Factory<'a> {
    /// Creates a factory for `request` against `cached`, evaluated at `now_millis`.
    pub fn new(now_millis: i64, request: &'a Request<()>, cached: Option<&'a CachedResponse>) -> Self {
        Self { now_millis, request, cached, forced_reload: false }
    }

    /// Marks this evaluation as a forced reload, so an `immutable` cached response is still
    /// subjected to the normal freshness check instead of being served unconditionally.
    pub fn forced_reload(mut self, forced_reload: bool) -> Self {
        self.forced_reload = forced_reload;
        self
    }

    /// The full decision: [`Factory::get_candidate`], with `only-if-cached` + "network required"
    /// collapsed to [`CacheStrategy::Neither`].
    pub fn get(self) -> CacheStrategy {
        let request_cc = CacheControl::from_headers(self.request.headers());
        let candidate = self.get_candidate(&request_cc);
        if candidate.requires_network() && request_cc.only_if_cached {
            tracing::debug!("only-if-cached set but candidate requires network; denying");
            return CacheStrategy::Neither;
        }
        candidate
    }

    fn get_candidate(&self, request_cc: &CacheControl) -> CacheStrategy {
        let Some(cached) = self.cached else {
            tracing::trace!("no cached response; network only");
            return CacheStrategy::NetworkOnly { request: self.request.clone() };
        };

        if is_https(self.request) && !cached.had_tls_handshake {
            tracing::trace!("https request but cached response has no handshake record; network only");
            return CacheStrategy::NetworkOnly { request: self.request.clone() };
        }

        let response_cc = CacheControl::from_headers(cached.response.headers());
        if !is_cacheable(cached.response.status(), cached.response.headers(), &response_cc, request_cc.no_store) {
            tracing::trace!("cached response is not storable; network only");
            return CacheStrategy::NetworkOnly { request: self.request.clone() };
        }

        if request_cc.no_cache
            || self.request.headers().contains_key(IF_MODIFIED_SINCE)
            || self.request.headers().contains_key(IF_NONE_MATCH)
        {
            tracing::trace!("request forces revalidation; network only");
            return CacheStrategy::NetworkOnly { request: self.request.clone() };
        }

        if response_cc.immutable && !self.forced_reload {
            tracing::trace!("response marked immutable; serving from cache without freshness check");
            return CacheStrategy::CacheOnly { response: cached.clone() };
        }

        let served_millis = age::served_millis(cached.response.headers(), cached.received_response_at_millis);
        let age_millis = age::age_millis(
            cached.response.headers(),
            cached.sent_request_at_millis,
            cached.received_response_at_millis,
            self.now_millis,
        );
        let request_has_query = self.request.uri().query().is_some();
        let (mut fresh_millis, heuristic) =
            age::freshness_millis(cached.response.headers(), &response_cc, served_millis, request_has_query);
        if let Some(requested_max_age) = request_cc.max_age {
            fresh_millis = fresh_millis.min(requested_max_age.saturating_mul(1000));
        }

        let min_fresh_millis = request_cc.min_fresh.unwrap_or(0).saturating_mul(1000);
        let max_stale_millis = if !response_cc.must_revalidate {
            request_cc.max_stale.unwrap_or(0).saturating_mul(1000)
        } else {
            0
        };

        if !response_cc.no_cache && age_millis + min_fresh_millis < fresh_millis + max_stale_millis {
            let mut response = cached.clone();
            if age_millis + min_fresh_millis >= fresh_millis {
                add_warning(&mut response.response, "110 HttpURLConnection \"Response is stale\"");
            }
            if age_millis > 86_400_000 && heuristic {
                add_warning(&mut response.response, "113 HttpURLConnection \"Heuristic expiration\"");
            }
            tracing::trace!(age_millis, fresh_millis, "response is fresh enough; cache only");
            return CacheStrategy::CacheOnly { response };
        }

        match conditional_header(&cached.response) {
            Some((name, value)) => {
                let mut request = self.request.clone();
                request.headers_mut().insert(name, value);
                tracing::trace!("stale but revalidatable; conditional GET");
                CacheStrategy::Conditional { request, response: cached.clone() }
            }
            None => {
                tracing::trace!("stale with no validator; network only");
                CacheStrategy::NetworkOnly { request: self.request.clone() }
            }
        }
    }
}

fn is_https(request: &Request<()>) -> bool {
    request.uri().scheme_str() == Some("https")
}

/// Storability table from §4.3: which statuses may be cached, and the `no-store` override that
/// forbids caching regardless of status.
fn is_cacheable(status: StatusCode, headers: &http::HeaderMap, cache_control: &CacheControl, request_no_store: bool) -> bool {
    if cache_control.no_store || request_no_store {
        return false;
    }
    match status.as_u16() {
        200 | 203 | 204 | 300 | 301 | 404 | 405 | 410 | 414 | 501 | 308 => true,
        302 | 307 => {
            headers.contains_key(http::header::EXPIRES)
                || cache_control.max_age.is_some()
                || cache_control.is_public
                || cache_control.is_private
        }
        _ => false,
    }
}

/// Picks the conditional-request header and value, in priority order ETag → Last-Modified →
/// Date. Returns `None` if the cached response carries no validator at all.
fn conditional_header(response: &Response<()>) -> Option<(http::HeaderName, HeaderValue)> {
    if let Some(etag) = response.headers().get(ETAG) {
        return Some((IF_NONE_MATCH, etag.clone()));
    }
    if let Some(last_modified) = response.headers().get(LAST_MODIFIED) {
        return Some((IF_MODIFIED_SINCE, last_modified.clone()));
    }
    if let Some(date) = response.headers().get(http::header::DATE) {
        return Some((IF_MODIFIED_SINCE, date.clone()));
    }
    None
}

fn add_warning(response: &mut Response<()>, text: &'static str) {
    tracing::debug!(warning = text, "annotating cached response");
    response
        .headers_mut()
        .append(http::header::WARNING, HeaderValue::from_static(text));
}
