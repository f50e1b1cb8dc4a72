//! # HTTP Request
//!
//! Read-only wrapper over the inbound request: method, URI, query string,
//! headers and body.
//!
//! ## Parameters
//!
//! - The query string is always parsed and exposed through [`RequestContext::get`]
//! - POST bodies feed [`RequestContext::post`], PUT bodies feed [`RequestContext::put`]
//! - Form bodies support bracket nesting (`user[name]=x`, `tags[]=a`)
//! - JSON bodies are parsed when the content type says so
//!
//! Parameter paths split on `.`, `|`, `:`, `-` and `/`, so `user.name`
//! and `user-name` both reach `user[name]`.

use crate::config::lookup;
use crate::error::{Error, Result};
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::{HeaderMap, Request};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

/// HTTP methods the framework distinguishes
///
/// Any other method is treated as GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// HTTP GET (and every unrecognized method)
    #[default]
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
}

impl Method {
    /// Parse a method name, falling back to GET
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("POST") {
            Self::Post
        } else if name.eq_ignore_ascii_case("PUT") {
            Self::Put
        } else {
            Self::Get
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

impl From<&hyper::Method> for Method {
    fn from(method: &hyper::Method) -> Self {
        Self::parse(method.as_str())
    }
}

/// The inbound request, parsed once and read-only afterwards
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    query_string: Option<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    remote_addr: Option<SocketAddr>,
    secure: bool,
    query_params: Value,
    post_params: Value,
    put_params: Value,
}

impl RequestContext {
    /// Create a request manually (for tests and embedding)
    ///
    /// `target` may carry a query string (`/search?q=x`).
    pub fn new(
        method: Method,
        target: &str,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let (path, query_string) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };

        let mut headers = HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self::assemble(method, path, query_string, headers, body)
    }

    /// Create from a hyper request, refusing bodies over `max_body_size`
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` when the declared or received body is over the limit.
    pub async fn from_hyper_with_limit(
        req: Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = Method::from(req.method());
        let path = req.uri().path().to_string();
        let query_string = req.uri().query().map(String::from);
        let headers = req.headers().clone();

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if let Some(content_len) = declared {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let collected = BodyExt::collect(req.into_body()).await?;
        let bytes = collected.to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }
        let body = (!bytes.is_empty()).then_some(bytes);

        Ok(Self::assemble(method, path, query_string, headers, body))
    }

    fn assemble(
        method: Method,
        path: String,
        query_string: Option<String>,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        let query_params = parse_form(query_string.as_deref().unwrap_or(""));
        let mut request = Self {
            method,
            path,
            query_string,
            headers,
            body,
            remote_addr: None,
            secure: false,
            query_params,
            post_params: Value::Object(Map::new()),
            put_params: Value::Object(Map::new()),
        };
        match method {
            Method::Post => request.post_params = request.parse_body(),
            Method::Put => request.put_params = request.parse_body(),
            Method::Get => {}
        }
        request
    }

    /// Record the peer address of the connection
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Mark the request as received over TLS
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// The request method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Whether this is a GET request
    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }

    /// Whether this is a POST request
    #[must_use]
    pub fn is_post(&self) -> bool {
        self.method == Method::Post
    }

    /// Whether this is a PUT request
    #[must_use]
    pub fn is_put(&self) -> bool {
        self.method == Method::Put
    }

    /// Whether the client flagged the request as `XMLHttpRequest`
    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    /// Request path without the query string or trailing slashes
    #[must_use]
    pub fn uri(&self) -> &str {
        self.path.trim_end_matches('/')
    }

    /// Raw query string
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Host the request was addressed to
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.headers.get(HOST).and_then(|v| v.to_str().ok())
    }

    /// Whether the request came in over TLS
    #[must_use]
    pub const fn secure(&self) -> bool {
        self.secure
    }

    /// `http(s)://host/`
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        let host = self.host().filter(|h| !h.is_empty())?;
        let scheme = if self.secure { "https" } else { "http" };
        Some(format!("{scheme}://{host}/"))
    }

    /// Base URL followed by the request path
    #[must_use]
    pub fn url(&self) -> Option<String> {
        let base = self.base_url()?;
        let uri = self.uri();
        if uri.is_empty() {
            return None;
        }
        Some(format!("{}{uri}", base.trim_end_matches('/')))
    }

    /// URL with the query string, for GET requests only
    #[must_use]
    pub fn full_url(&self) -> Option<String> {
        if !self.is_get() {
            return None;
        }
        let url = self.url()?;
        match self.query().filter(|q| !q.is_empty()) {
            Some(query) => Some(format!("{}?{query}", url.trim_end_matches('/'))),
            None => Some(url),
        }
    }

    /// Peer IP address; forwarded headers are never consulted
    #[must_use]
    pub fn ip(&self) -> Option<String> {
        self.remote_addr.map(|addr| addr.ip().to_string())
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get all headers as a `HashMap`
    #[must_use]
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_string(), val.to_string()))
            })
            .collect()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Query parameter at `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.query_params, &param_path(path))
    }

    /// POST body parameter at `path`
    #[must_use]
    pub fn post(&self, path: &str) -> Option<&Value> {
        lookup(&self.post_params, &param_path(path))
    }

    /// PUT body parameter at `path`
    #[must_use]
    pub fn put(&self, path: &str) -> Option<&Value> {
        lookup(&self.put_params, &param_path(path))
    }

    /// Every query parameter
    #[must_use]
    pub const fn get_all(&self) -> &Value {
        &self.query_params
    }

    /// Every POST body parameter
    #[must_use]
    pub const fn post_all(&self) -> &Value {
        &self.post_params
    }

    /// Every PUT body parameter
    #[must_use]
    pub const fn put_all(&self) -> &Value {
        &self.put_params
    }

    fn parse_body(&self) -> Value {
        let Some(text) = self.body_str() else {
            return Value::Object(Map::new());
        };
        let is_json = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if is_json {
            if let Ok(value) = serde_json::from_str::<Value>(text) {
                return value;
            }
        }
        parse_form(text)
    }
}

/// Deepest bracket nesting accepted in a form key
pub const MAX_FORM_DEPTH: usize = 64;

fn param_path(path: &str) -> Vec<&str> {
    path.split(['.', '|', ':', '-', '/']).collect()
}

/// Parse an `application/x-www-form-urlencoded` string into a nested mapping
///
/// `a[b]=1` nests, `a[]=1` appends, a repeated plain key keeps the last value.
fn parse_form(input: &str) -> Value {
    let mut root = Value::Object(Map::new());
    for pair in input.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = url_decode(raw_key);
        let value = Value::String(url_decode(raw_value));

        let Some((base, keys)) = split_form_key(&key) else {
            continue;
        };
        if base.is_empty() {
            continue;
        }
        let mut path = Vec::with_capacity(keys.len() + 1);
        path.push(base);
        path.extend(keys);
        insert_form_value(&mut root, &path, value);
    }
    root
}

/// `user[address][city]` -> (`user`, [`address`, `city`])
///
/// Keys nested deeper than [`MAX_FORM_DEPTH`] yield `None` and the pair is dropped.
fn split_form_key(key: &str) -> Option<(&str, Vec<&str>)> {
    let Some(open) = key.find('[') else {
        return Some((key, Vec::new()));
    };
    let base = &key[..open];
    let mut keys = Vec::new();
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            break;
        };
        if keys.len() == MAX_FORM_DEPTH {
            return None;
        }
        keys.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    Some((base, keys))
}

fn insert_form_value(slot: &mut Value, path: &[&str], value: Value) {
    let Some((head, tail)) = path.split_first() else {
        *slot = value;
        return;
    };

    if head.is_empty() {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            items.push(Value::Null);
            if let Some(last) = items.last_mut() {
                insert_form_value(last, tail, value);
            }
        }
        return;
    }

    if let Value::Array(items) = slot {
        let map = items
            .drain(..)
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *slot = Value::Object(map);
    }
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        insert_form_value(child, tail, value);
    }
}

/// Percent-decoding with `+` as space; invalid escapes are kept verbatim
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit() =>
            {
                out.push((hex_value(bytes[i + 1]) << 4) | hex_value(bytes[i + 2]));
                i += 2;
            }
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}
