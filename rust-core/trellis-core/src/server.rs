//! # HTTP Server
//!
//! HTTP/1 server built on Hyper and Tokio, fronting a shared [`Framework`].
//! Implements graceful shutdown with signal handling.
//!
//! ## Key Features
//!
//! - One task per connection, keep-alive supported
//! - Request bodies collected up to a size limit
//! - The synchronous dispatcher runs on the blocking pool
//! - Every request runs in a `request` span carrying its id

use crate::app::Framework;
use crate::error::{Error, Result};
use crate::request::{Method, RequestContext};
use crate::response::Response as PageResponse;
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};

/// Header carrying the request id in both directions
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// HTTP front end for a [`Framework`]
#[derive(Debug, Clone)]
pub struct Server {
    config: ServerConfig,
    framework: Arc<Framework>,
}

impl Server {
    /// Create a server with the default configuration
    pub fn new(framework: Arc<Framework>) -> Self {
        Self {
            config: ServerConfig::default(),
            framework,
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind the server to an address
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` when the address cannot be bound, or
    /// `Error::Io` when accepting a connection fails.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024).map_err(bind_error)?;

        info!("Server listening on http://{}", addr);

        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);

                    let framework = self.framework.clone();
                    let active = active.clone();

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req| {
                            let framework = framework.clone();
                            handle_request(req, framework, remote_addr, max_body_size)
                        });
                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let timeout = self.config.shutdown_timeout;
        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            info!(
                open = active.load(Ordering::Relaxed),
                "Shutdown timeout reached with connections still open"
            );
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: Method,
        target: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> PageResponse {
        let request_id = headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(REQUEST_ID_HEADER))
            .map_or_else(generate_request_id, |(_, value)| value.clone());

        if let Some(actual) = body.as_ref().map(Bytes::len) {
            if actual > self.config.max_body_size {
                let err = Error::PayloadTooLarge {
                    limit: self.config.max_body_size,
                    actual,
                };
                return self
                    .framework
                    .error_response(&err)
                    .with_header(REQUEST_ID_HEADER, &request_id);
            }
        }

        let request = RequestContext::new(method, target, headers, body);
        dispatch(self.framework.clone(), request, request_id).await
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", err);
        std::future::pending::<()>().await;
    }
}

/// Run the dispatcher for one request on the blocking pool
async fn dispatch(
    framework: Arc<Framework>,
    request: RequestContext,
    request_id: String,
) -> PageResponse {
    let span = info_span!(
        "request",
        id = %request_id,
        method = %request.method(),
        path = %request.uri()
    );

    let response = {
        let framework = framework.clone();
        let worker_span = span.clone();
        tokio::task::spawn_blocking(move || worker_span.in_scope(|| framework.handle(request)))
            .instrument(span)
            .await
    };

    let response = response.unwrap_or_else(|err| {
        error!(id = %request_id, error = %err, "Dispatcher task failed");
        PageResponse::html(framework.error_page(500)).with_status(500)
    });
    response.with_header(REQUEST_ID_HEADER, &request_id)
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    framework: Arc<Framework>,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let version = req.version();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or_else(generate_request_id, str::to_string);

    let response = match RequestContext::from_hyper_with_limit(req, max_body_size).await {
        Ok(request) => {
            let request = request.with_remote_addr(remote_addr);
            dispatch(framework, request, request_id).await
        }
        Err(err) => {
            if !matches!(err, Error::PayloadTooLarge { .. }) {
                error!("Failed to read request: {}", err);
            }
            framework
                .error_response(&err)
                .with_header(REQUEST_ID_HEADER, &request_id)
        }
    };

    info!(
        "    {} - \"{} {} {:?}\" {}",
        remote_addr, method, path, version, response.status
    );
    Ok(response.into_hyper())
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// A process-unique request id
pub fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
