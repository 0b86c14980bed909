// webio-api: Async Rust client for web-enabled IO modules

pub mod client;
pub mod document;
pub mod error;
pub mod transport;

pub use client::{DeviceClient, STATE_DOCUMENT};
pub use document::{RawValue, StateDocument, parse_document, render_document};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
