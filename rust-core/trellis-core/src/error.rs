//! # Error Handling
//!
//! Centralized error types for Trellis core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Every variant is fatal for the request that raised it. The dispatcher
//! turns the error into an error page using [`Error::status_code`].

use thiserror::Error;

/// Result type alias for Trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Trellis runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No controller resolves for the request path
    #[error("No controller found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// The controller exists but has no such method
    #[error("Controller {controller} has no method {method}")]
    MethodNotFound {
        /// Derived controller name (e.g. `Home_Controller`)
        controller: String,
        /// Requested method name
        method: String,
    },

    /// A layout or page template could not be resolved
    #[error("Could not find {kind} file located at {path}")]
    TemplateNotFound {
        /// What was being looked up (`layout`, `template`, ...)
        kind: &'static str,
        /// The logical path that failed to resolve
        path: String,
    },

    /// Duplicate or unnamed block registration
    #[error("View conflict: {reason}")]
    ViewConflict {
        /// Human readable description of the conflict
        reason: String,
    },

    /// A registry has no entry for the requested name
    #[error("Could not find {kind} {name}")]
    ClassNotFound {
        /// Registry kind (`block`, `controller`)
        kind: &'static str,
        /// The requested name
        name: String,
    },

    /// A config file could not be read or parsed
    #[error("Invalid config file {file}: {reason}")]
    Config {
        /// The offending file
        file: String,
        /// Parser message
        reason: String,
    },

    /// Template nesting went deeper than allowed
    #[error("Template nesting exceeded {limit} levels")]
    TemplateDepth {
        /// The configured limit
        limit: usize,
    },

    /// A controller ended the request with an error page
    #[error("Request aborted with status {status}")]
    Aborted {
        /// Status of the error page to serve
        status: u16,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status code used for the error page of this error
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::RouteNotFound { .. } | Self::MethodNotFound { .. } => 404,
            Self::PayloadTooLarge { .. } => 400,
            Self::Aborted { status } => *status,
            _ => 500,
        }
    }

    /// Whether the error is the client's fault rather than a deployment defect
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
