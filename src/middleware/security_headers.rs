//! Security headers middleware
//!
//! Adds security headers to all responses to protect against common web vulnerabilities.

use axum::{body::Body, http::Request, middleware::Next, response::Response};

/// Middleware that adds security headers to all responses
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    // Strict-Transport-Security (HSTS)
    // Forces browsers to use HTTPS for all future requests to this domain
    headers.insert(
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains".parse().unwrap(),
    );

    // Prevents browsers from MIME-sniffing a response away from the declared content-type
    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());

    // Protects against clickjacking by restricting embedding to the same origin
    headers.insert("X-Frame-Options", "SAMEORIGIN".parse().unwrap());

    // Legacy XSS filter, still honored by older browsers
    headers.insert("X-XSS-Protection", "1; mode=block".parse().unwrap());

    // Controls how much referrer information is included with requests
    headers.insert(
        "Referrer-Policy",
        "strict-origin-when-cross-origin".parse().unwrap(),
    );

    // Restricts which browser features can be used
    headers.insert(
        "Permissions-Policy",
        "accelerometer=(), camera=(), geolocation=(), gyroscope=(), magnetometer=(), microphone=(), payment=(), usb=()"
            .parse()
            .unwrap(),
    );

    // Content-Security-Policy
    // Relatively permissive policy suitable for the bundled admin UI:
    // inline scripts and styles are needed by the SPA build, and
    // img-src allows https: because login QR codes are served from the
    // WeChat gateway's domain
    headers.insert(
        "Content-Security-Policy",
        "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; style-src 'self' 'unsafe-inline'; img-src 'self' data: blob: https:; font-src 'self' data:; connect-src 'self'; frame-ancestors 'self'; base-uri 'self'; form-action 'self'"
            .parse()
            .unwrap(),
    );

    response
}

/// Middleware for API routes that adds cache control headers
pub async fn api_cache_control_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    // Prevent caching of API responses
    headers.insert(
        "Cache-Control",
        "no-store, no-cache, must-revalidate, private".parse().unwrap(),
    );
    headers.insert("Pragma", "no-cache".parse().unwrap());
    headers.insert("Expires", "0".parse().unwrap());

    response
}
