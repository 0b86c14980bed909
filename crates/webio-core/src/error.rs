// ── Core error types ──
//
// Cache-level errors from webio-core. Callers see address, channel and
// connection failures, never raw reqwest errors. The
// `From<webio_api::Error>` impl translates transport-layer errors into
// these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to IO module at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("IO module request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("IO module rejected the request (HTTP {status}): {message}")]
    Device { status: u16, message: String },

    // ── Addressing errors ────────────────────────────────────────────
    #[error("No IO was found with the address of {address}")]
    AddressNotFound { address: String },

    #[error("No channel named {name} is attached to this module")]
    UnknownChannel { name: String },

    #[error("Channel {name} is an input and cannot be written")]
    ReadOnly { name: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Value {value:?} at {address} is not a valid {expected}")]
    Type {
        address: String,
        value: String,
        expected: &'static str,
    },

    #[error("Malformed state document: {message}")]
    Parse { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for failures of the round trip itself (refused,
    /// timed out, or answered with an error status).
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Device { .. }
        )
    }

    pub fn is_address_not_found(&self) -> bool {
        matches!(self, Self::AddressNotFound { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<webio_api::Error> for CoreError {
    fn from(err: webio_api::Error) -> Self {
        match err {
            webio_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if let Some(status) = e.status() {
                    CoreError::Device {
                        status: status.as_u16(),
                        message: e.to_string(),
                    }
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            webio_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            webio_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            webio_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            webio_api::Error::Status { status, body } => CoreError::Device {
                status,
                message: body,
            },
            webio_api::Error::Deserialization { message, body: _ } => {
                CoreError::Parse { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_status_maps_to_device_error() {
        let err: CoreError = webio_api::Error::Status {
            status: 500,
            body: "boom".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Device { status: 500, .. }));
        assert!(err.is_connection_error());
    }

    #[test]
    fn api_timeout_keeps_duration() {
        let err: CoreError = webio_api::Error::Timeout { timeout_secs: 3 }.into();
        assert!(matches!(err, CoreError::Timeout { timeout_secs: 3 }));
    }

    #[test]
    fn bad_document_maps_to_parse_error() {
        let err: CoreError = webio_api::Error::Deserialization {
            message: "expected object".into(),
            body: "[]".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Parse { .. }));
        assert!(!err.is_connection_error());
    }

    #[test]
    fn address_not_found_message_names_the_address() {
        let err = CoreError::AddressNotFound {
            address: "redLamp".into(),
        };
        assert_eq!(err.to_string(), "No IO was found with the address of redLamp");
        assert!(err.is_address_not_found());
    }
}
