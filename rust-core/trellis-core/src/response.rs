//! HTTP response produced by the dispatcher.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::StatusCode;
use std::collections::HashMap;

/// Content type of every rendered page
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Status codes with a dedicated status line; anything else is served as 500
pub const KNOWN_STATUSES: [u16; 7] = [400, 401, 403, 404, 500, 501, 503];

/// Normalize `code` to one of [`KNOWN_STATUSES`]
#[must_use]
pub fn normalize_status(code: u16) -> u16 {
    if KNOWN_STATUSES.contains(&code) {
        code
    } else {
        500
    }
}

/// Status line for an error code, e.g. `HTTP/1.1 404 Not Found`
#[must_use]
pub fn status_line(code: u16) -> &'static str {
    match normalize_status(code) {
        400 => "HTTP/1.1 400 Bad Request",
        401 => "HTTP/1.1 401 Unauthorized",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        501 => "HTTP/1.1 501 Not Implemented",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    }
}

/// Status, headers and HTML body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Extra response headers
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self::html(String::new())
    }
}

impl Response {
    /// A 200 HTML response
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: HTML_CONTENT_TYPE.to_string(),
            headers: HashMap::new(),
        }
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_ascii_lowercase(), value.to_string());
        }
    }

    /// A header previously set on the response
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(&self.content_type);
        }
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Convert to a hyper response
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = hyper::Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        if let Ok(value) = self.content_type.parse::<hyper::header::HeaderValue>() {
            headers.insert(hyper::header::CONTENT_TYPE, value);
        }
        for (key, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                key.parse::<hyper::header::HeaderName>(),
                value.parse::<hyper::header::HeaderValue>(),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}
