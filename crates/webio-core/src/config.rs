// ── Runtime module configuration ──
//
// These types describe *how* to reach one IO module. They never touch
// disk: webio-config (or the caller) builds a `ModuleConfig` and hands
// it to `WebIoModule::new`.

use std::time::Duration;

use url::Url;
use webio_api::{TlsMode, TransportConfig};

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs). Default for IO modules.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for one IO module.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Module root URL (e.g., `https://192.168.100.20/`).
    pub url: Url,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Default timeout for each round trip.
    pub timeout: Duration,
    /// Reject unknown addresses once the first full read has happened.
    pub validate_addresses: bool,
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

impl ModuleConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            tls: TlsVerification::default(),
            timeout: DEFAULT_TIMEOUT,
            validate_addresses: true,
        }
    }

    /// Config for a module addressed by bare host (`192.168.100.20`),
    /// reached over HTTPS like the stock firmware.
    pub fn for_host(host: &str) -> Result<Self, CoreError> {
        let url = Url::parse(&format!("https://{host}/")).map_err(|e| CoreError::Config {
            message: format!("invalid module host {host:?}: {e}"),
        })?;
        Ok(Self::new(url))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsVerification) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_address_validation(mut self, enabled: bool) -> Self {
        self.validate_addresses = enabled;
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig::default().with_tls(tls)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn for_host_uses_https_root() {
        let config = ModuleConfig::for_host("192.168.100.20").unwrap();
        assert_eq!(config.url.as_str(), "https://192.168.100.20/");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.validate_addresses);
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn for_host_rejects_garbage() {
        let err = ModuleConfig::for_host("not a host").unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn builders_override_defaults() {
        let config = ModuleConfig::for_host("io.local")
            .unwrap()
            .with_timeout(Duration::from_millis(250))
            .with_address_validation(false)
            .with_tls(TlsVerification::SystemDefaults);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(!config.validate_addresses);
        assert!(matches!(config.transport().tls, TlsMode::System));
    }
}
