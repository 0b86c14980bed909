// webio-core: Local IO cache and typed channel access for web IO modules.

pub mod channel;
pub mod config;
pub mod error;
pub mod module;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use channel::{
    Analog, AnalogIn, AnalogOut, Channel, ChannelDirection, ChannelInfo, ChannelKind,
    ChannelSpec, Direction, Discrete, DiscreteIn, DiscreteOut, Input, Kind, Output,
};
pub use config::{ModuleConfig, TlsVerification};
pub use error::CoreError;
pub use module::{UNKNOWN_VOLTAGE, WebIoModule, addresses};
pub use store::{Changes, IoStore};

// Wire types callers need for raw reads and writes.
pub use webio_api::{RawValue, StateDocument};
