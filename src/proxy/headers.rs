//! Header and URI rewriting for forwarded requests.
//!
//! # Responsibilities
//! - Point the request URI at the selected backend
//! - Add X-Forwarded-Host and X-Forwarded-For
//! - Strip hop-by-hop headers in both directions

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::uri::{PathAndQuery, Uri};
use std::net::IpAddr;
use url::Url;

pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
///
/// `TE: trailers` is the only TE value passed along.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(&HOP_BY_HOP) {
        headers.remove(name);
    }

    let te_is_trailers = headers
        .get(header::TE)
        .and_then(|te| te.to_str().ok())
        .is_some_and(|te| te.trim().eq_ignore_ascii_case("trailers"));
    if !te_is_trailers {
        headers.remove(header::TE);
    }
}

/// The host the caller addressed: the Host header, else the URI authority.
pub fn original_host(parts: &Parts) -> Option<HeaderValue> {
    parts.headers.get(header::HOST).cloned().or_else(|| {
        parts
            .uri
            .authority()
            .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
    })
}

/// `host[:port]` of a backend address, as sent in the Host header.
pub fn backend_authority(backend: &Url) -> Option<String> {
    let host = backend.host_str()?;
    Some(match backend.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Build the outbound URI: the backend's scheme and authority, the backend
/// path joined with the inbound path, and both query strings.
pub fn backend_uri(backend: &Url, inbound: &Uri) -> Result<Uri, axum::http::Error> {
    let authority = backend_authority(backend).unwrap_or_default();
    let path = join_paths(backend.path(), inbound.path());
    let query = match (backend.query().filter(|q| !q.is_empty()), inbound.query()) {
        (Some(a), Some(b)) if !b.is_empty() => Some(format!("{a}&{b}")),
        (Some(a), _) => Some(a.to_string()),
        (None, Some(b)) if !b.is_empty() => Some(b.to_string()),
        _ => None,
    };
    let path_and_query: PathAndQuery = match query {
        Some(query) => format!("{path}?{query}").parse()?,
        None => path.parse()?,
    };

    Uri::builder()
        .scheme(backend.scheme())
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
}

/// Join two paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Append the client address to X-Forwarded-For.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{prior}, {client}"),
        _ => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
