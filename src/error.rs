use std::io;
use thiserror::Error;

/// Failures reported by a candidate source backend
#[derive(Error, Debug)]
pub enum SourceError {
    /// Nothing is stored at the requested path
    #[error("path not found: {path}")]
    NotFound { path: String },

    /// The backend answered but rejected the request
    #[error("backend error: {message}")]
    Backend { message: String },

    /// The backend could not be reached
    #[error("transport error: {message}")]
    Transport { message: String },

    /// A stored value could not be decoded
    #[error("invalid data at {path}: {message}")]
    InvalidData { path: String, message: String },
}

impl SourceError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a backend error
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::InvalidData {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Main error type returned by every connect entry point
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The target string is not a URL at all
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    /// The target parsed but carries no scheme
    #[error("absolute URL required")]
    AbsoluteUrlRequired,

    /// No provider is registered for the scheme
    #[error("no handler found for {scheme}")]
    NoHandler { scheme: String },

    /// The candidate source could not be read
    #[error("{backend} lookup of {path} failed: {source}")]
    Discovery {
        backend: &'static str,
        path: String,
        #[source]
        source: SourceError,
    },

    /// The lookup succeeded but yielded nothing to dial
    #[error("no connection candidates found for {path}")]
    NoCandidates { path: String },

    /// A TCP dial failed; for discovery targets this is the last attempt
    #[error("dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The context deadline passed before a connection was made
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the context
    #[error("operation cancelled")]
    Cancelled,
}

impl ConnectError {
    /// Create a no handler error
    pub fn no_handler<S: Into<String>>(scheme: S) -> Self {
        Self::NoHandler {
            scheme: scheme.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery<S: Into<String>>(backend: &'static str, path: S, source: SourceError) -> Self {
        Self::Discovery {
            backend,
            path: path.into(),
            source,
        }
    }

    /// Create a no candidates error
    pub fn no_candidates<S: Into<String>>(path: S) -> Self {
        Self::NoCandidates { path: path.into() }
    }

    /// Create a dial error
    pub fn dial<S: Into<String>>(address: S, source: io::Error) -> Self {
        Self::Dial {
            address: address.into(),
            source,
        }
    }

    /// True when the context ended the operation, by deadline or cancellation
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ConnectError::DeadlineExceeded | ConnectError::Cancelled
        )
    }

    /// True for malformed target strings
    pub fn is_malformed_url(&self) -> bool {
        matches!(
            self,
            ConnectError::InvalidUrl(_) | ConnectError::AbsoluteUrlRequired
        )
    }

    /// True when the candidate source itself failed
    pub fn is_discovery(&self) -> bool {
        matches!(self, ConnectError::Discovery { .. })
    }
}

/// Result type alias for connect operations
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Result type alias for candidate source operations
pub type SourceResult<T> = Result<T, SourceError>;
