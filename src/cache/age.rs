//! Age and freshness-lifetime arithmetic (RFC 2616 §13.2.3, RFC 7234 §4.2).
//!
//! All timestamps in this module are milliseconds since the Unix epoch, matching the spec's
//! `*Millis` naming throughout.

use http::HeaderMap;

/// Parses an HTTP-date header (`Date`, `Expires`, `Last-Modified`) into epoch milliseconds.
/// Returns `None` if the header is absent or fails to parse under any of RFC 1123/850/asctime.
pub(super) fn http_date_millis(headers: &HeaderMap, name: http::header::HeaderName) -> Option<i64> {
    let value = headers.get(name)?.to_str().ok()?;
    let time = httpdate::parse_http_date(value).ok()?;
    let millis = time.duration_since(std::time::UNIX_EPOCH).ok()?.as_millis();
    i64::try_from(millis).ok()
}

/// The `Age` header's value, in milliseconds, if present and parseable.
fn age_header_millis(headers: &HeaderMap) -> Option<i64> {
    let value = headers.get(http::header::AGE)?.to_str().ok()?;
    let seconds: i64 = value.parse().ok()?;
    Some(seconds.saturating_mul(1000))
}

/// `served_millis`: when the response was considered "sent" by the origin — the `Date` header,
/// or (absent that) the time it was received.
pub(super) fn served_millis(headers: &HeaderMap, received_response_at_millis: i64) -> i64 {
    http_date_millis(headers, http::header::DATE).unwrap_or(received_response_at_millis)
}

/// `age_millis` per RFC 2616 §13.2.3: how long ago the response was (or claims to have been)
/// generated by the origin, plus the time it has spent resident in this cache.
pub(super) fn age_millis(
    headers: &HeaderMap,
    sent_request_at_millis: i64,
    received_response_at_millis: i64,
    now_millis: i64,
) -> i64 {
    let date_millis = http_date_millis(headers, http::header::DATE);
    let apparent_received_age = date_millis
        .map(|date| (received_response_at_millis - date).max(0))
        .unwrap_or(0);
    let received_age = age_header_millis(headers)
        .map(|age| apparent_received_age.max(age))
        .unwrap_or(apparent_received_age);
    let response_duration = received_response_at_millis - sent_request_at_millis;
    let resident_duration = (now_millis - received_response_at_millis).max(0);
    received_age + response_duration + resident_duration
}

/// `fresh_millis` and whether it was derived heuristically (case 3 of the freshness-lifetime
/// order): `max-age`, then `Expires`, then 10% of `served - Last-Modified` when the request URL
/// carries no query string, else `0`.
pub(super) fn freshness_millis(
    headers: &HeaderMap,
    cache_control: &super::CacheControl,
    served_millis: i64,
    request_has_query: bool,
) -> (i64, bool) {
    if let Some(max_age) = cache_control.max_age {
        return (max_age.saturating_mul(1000), false);
    }
    if let Some(expires) = http_date_millis(headers, http::header::EXPIRES) {
        return ((expires - served_millis).max(0), false);
    }
    if !request_has_query {
        if let Some(last_modified) = http_date_millis(headers, http::header::LAST_MODIFIED) {
            let delta = served_millis - last_modified;
            return (delta.max(0) / 10, true);
        }
    }
    (0, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn with_header(name: http::header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn served_millis_falls_back_to_received_time() {
        let headers = HeaderMap::new();
        assert_eq!(served_millis(&headers, 1_000), 1_000);
    }

    #[test]
    fn age_millis_accounts_for_all_four_terms() {
        // Date header equal to received time: apparent_received_age = 0.
        let headers = with_header(http::header::DATE, &httpdate::fmt_http_date(
            std::time::UNIX_EPOCH + std::time::Duration::from_millis(30_000),
        ));
        // sent 1s before received, resident 5s since received.
        let age = age_millis(&headers, 29_000, 30_000, 35_000);
        assert_eq!(age, 0 /* received_age */ + 1_000 /* response_duration */ + 5_000 /* resident */);
    }

    #[test]
    fn heuristic_freshness_is_ten_percent_of_served_minus_last_modified() {
        let headers = with_header(
            http::header::LAST_MODIFIED,
            &httpdate::fmt_http_date(std::time::UNIX_EPOCH),
        );
        let cc = super::super::CacheControl::default();
        let (fresh, heuristic) = freshness_millis(&headers, &cc, 100_000, false);
        assert!(heuristic);
        assert_eq!(fresh, 10_000);
    }

    #[test]
    fn heuristic_freshness_skipped_when_request_has_query() {
        let headers = with_header(
            http::header::LAST_MODIFIED,
            &httpdate::fmt_http_date(std::time::UNIX_EPOCH),
        );
        let cc = super::super::CacheControl::default();
        let (fresh, heuristic) = freshness_millis(&headers, &cc, 100_000, true);
        assert!(!heuristic);
        assert_eq!(fresh, 0);
    }

    #[test]
    fn heuristic_freshness_is_still_flagged_when_last_modified_is_at_or_after_served() {
        // Last-Modified at (or after) served_millis clamps the lifetime to zero, but the
        // heuristic rule still fired — callers rely on this flag to add the 113 warning for
        // very old cache entries regardless of how small the computed lifetime turned out.
        let headers = with_header(
            http::header::LAST_MODIFIED,
            &httpdate::fmt_http_date(std::time::UNIX_EPOCH + std::time::Duration::from_millis(100_000)),
        );
        let cc = super::super::CacheControl::default();
        let (fresh, heuristic) = freshness_millis(&headers, &cc, 100_000, false);
        assert!(heuristic);
        assert_eq!(fresh, 0);
    }

    #[test]
    fn max_age_wins_over_expires() {
        let mut headers = with_header(
            http::header::EXPIRES,
            &httpdate::fmt_http_date(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1000)),
        );
        headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static("max-age=5"));
        let cc = super::super::CacheControl::from_headers(&headers);
        let (fresh, heuristic) = freshness_millis(&headers, &cc, 0, false);
        assert!(!heuristic);
        assert_eq!(fresh, 5_000);
    }
}
