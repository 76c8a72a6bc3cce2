// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response headers for a JSON API that hands out account tokens.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Headers set on every response.
const HEADERS: [(&str, &str); 5] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    (
        "Content-Security-Policy",
        "default-src 'none'; frame-ancestors 'none'",
    ),
    ("Referrer-Policy", "no-referrer"),
    // Credential listings and token exchanges must never be cached
    ("Cache-Control", "no-store"),
];

/// Add the security headers to all responses.
///
/// HSTS is left to whatever terminates TLS; the server itself usually
/// runs on plain-HTTP localhost.
pub async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }

    response
}
