use std::net::IpAddr;

use axum::http::HeaderMap;

static FORWARDED_FOR: &str = "x-forwarded-for";

/// Rate limit key for a request: the client IP as text.
///
/// `X-Forwarded-For` is only honoured when the server sits behind a proxy
/// that sets it; otherwise any client could pick its own bucket.
pub fn client_key(headers: &HeaderMap, peer: IpAddr, trust_forwarded_for: bool) -> String {
    let forwarded = if trust_forwarded_for {
        forwarded_ip(headers)
    } else {
        None
    };
    normalize(forwarded.unwrap_or(peer)).to_string()
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|part| part.trim().parse().ok())
}

// ::ffff:a.b.c.d and a.b.c.d are the same client
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}
