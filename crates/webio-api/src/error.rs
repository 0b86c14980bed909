use thiserror::Error;

/// Top-level error type for the `webio-api` crate.
///
/// Covers every failure mode of a round trip to an IO module: building
/// the client, the HTTP exchange itself, and decoding the state document.
/// `webio-core` maps these into cache-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Device ──────────────────────────────────────────────────────
    /// The module answered with a non-success HTTP status.
    #[error("Module returned HTTP {status}")]
    Status { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The state document was not a flat JSON object, with the raw body
    /// for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the request never produced a usable response.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } | Self::Status { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        assert!(Error::Timeout { timeout_secs: 2 }.is_transient());
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let busy = Error::Status {
            status: 503,
            body: String::new(),
        };
        let missing = Error::Status {
            status: 404,
            body: String::new(),
        };
        assert!(busy.is_transient());
        assert!(!missing.is_transient());
        assert!(missing.is_connection_error());
    }

    #[test]
    fn bad_document_is_not_a_connection_error() {
        let err = Error::Deserialization {
            message: "expected object".into(),
            body: "[]".into(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_connection_error());
    }
}
