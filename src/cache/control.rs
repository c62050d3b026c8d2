//! Parses and builds `Cache-Control` header directives.
//!
//! The same [`CacheControl`] type is used for both request and response headers — RFC 7234
//! directives overlap heavily between the two, and the strategy resolver reads whichever side is
//! relevant at each step.

use http::{HeaderMap, HeaderValue};

/// Parsed `Cache-Control` directives from one message (request or response).
///
/// Integer fields use `None` for "directive absent", matching the spec's sentinel convention
/// without the magic `-1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControl {
    /// `no-cache`: may be stored, but must be revalidated with the origin before use.
    pub no_cache: bool,
    /// `no-store`: must not be stored at all.
    pub no_store: bool,
    /// `max-age=N`, in seconds.
    pub max_age: Option<i64>,
    /// `s-maxage=N`, in seconds. Parsed but never consulted by the strategy resolver — this is
    /// a private cache.
    pub s_maxage: Option<i64>,
    /// `min-fresh=N`, in seconds (request only).
    pub min_fresh: Option<i64>,
    /// `max-stale` or `max-stale=N`, in seconds (request only). A bare `max-stale` with no value
    /// is treated as "any staleness acceptable" (`Some(i64::MAX)`).
    pub max_stale: Option<i64>,
    /// `public`.
    pub is_public: bool,
    /// `private`.
    pub is_private: bool,
    /// `must-revalidate`.
    pub must_revalidate: bool,
    /// `only-if-cached` (request only): fail rather than go to the network.
    pub only_if_cached: bool,
    /// `immutable` (RFC 8246): the response never changes during its freshness lifetime.
    pub immutable: bool,
}

impl CacheControl {
    /// Parses every `Cache-Control` header value present in `headers` (there may be more than
    /// one; RFC 7230 §3.2.2 treats repeated headers as a single comma-joined list).
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cc = CacheControl::default();
        for value in headers.get_all(http::header::CACHE_CONTROL) {
            let Ok(text) = value.to_str() else { continue };
            for directive in text.split(',') {
                cc.apply_directive(directive.trim());
            }
        }
        cc
    }

    fn apply_directive(&mut self, directive: &str) {
        let (name, value) = match directive.split_once('=') {
            Some((n, v)) => (n.trim(), Some(v.trim().trim_matches('"'))),
            None => (directive.trim(), None),
        };
        match name.to_ascii_lowercase().as_str() {
            "no-cache" => self.no_cache = true,
            "no-store" => self.no_store = true,
            "public" => self.is_public = true,
            "private" => self.is_private = true,
            "must-revalidate" => self.must_revalidate = true,
            "only-if-cached" => self.only_if_cached = true,
            "immutable" => self.immutable = true,
            "max-age" => self.max_age = value.and_then(|v| v.parse().ok()),
            "s-maxage" => self.s_maxage = value.and_then(|v| v.parse().ok()),
            "min-fresh" => self.min_fresh = value.and_then(|v| v.parse().ok()),
            "max-stale" => self.max_stale = Some(value.and_then(|v| v.parse().ok()).unwrap_or(i64::MAX)),
            _ => {}
        }
    }

    /// Starts building an outgoing `Cache-Control` header.
    pub fn builder() -> CacheControlBuilder {
        CacheControlBuilder::default()
    }

    /// A canned `Cache-Control: no-cache` value, forcing conditional revalidation.
    pub fn force_network() -> HeaderValue {
        CacheControl::builder().no_cache().build()
    }

    /// A canned `Cache-Control: only-if-cached, max-stale=2147483647` value, forcing a cache hit
    /// or a synthesized 504 rather than any network traffic.
    pub fn force_cache() -> HeaderValue {
        CacheControl::builder().only_if_cached().max_stale(i64::MAX as u64).build()
    }
}

/// Builds an outgoing `Cache-Control` header value directive by directive.
#[derive(Debug, Default)]
pub struct CacheControlBuilder {
    directives: Vec<String>,
}

impl CacheControlBuilder {
    /// Appends `no-cache`.
    pub fn no_cache(mut self) -> Self {
        self.directives.push("no-cache".to_string());
        self
    }

    /// Appends `no-store`.
    pub fn no_store(mut self) -> Self {
        self.directives.push("no-store".to_string());
        self
    }

    /// Appends `only-if-cached`.
    pub fn only_if_cached(mut self) -> Self {
        self.directives.push("only-if-cached".to_string());
        self
    }

    /// Appends `max-age=<seconds>`.
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.directives.push(format!("max-age={seconds}"));
        self
    }

    /// Appends `max-stale=<seconds>`.
    pub fn max_stale(mut self, seconds: u64) -> Self {
        self.directives.push(format!("max-stale={seconds}"));
        self
    }

    /// Appends `min-fresh=<seconds>`.
    pub fn min_fresh(mut self, seconds: u64) -> Self {
        self.directives.push(format!("min-fresh={seconds}"));
        self
    }

    /// Joins the accumulated directives into a header value.
    ///
    /// # Panics
    /// Panics if no directives were added — an empty `Cache-Control` header is never meaningful
    /// to send.
    pub fn build(self) -> HeaderValue {
        assert!(!self.directives.is_empty(), "CacheControlBuilder::build() called with no directives");
        HeaderValue::from_str(&self.directives.join(", ")).expect("directives are all ASCII token/digit text")
    }
}
