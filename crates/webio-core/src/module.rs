// ── Module facade ──
//
// One `WebIoModule` per physical IO module. It owns the store, binds
// channel templates to it, and keeps an explicit registration list so
// attached channels can be enumerated or addressed by name.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;
use url::Url;
use webio_api::{DeviceClient, RawValue};

use crate::channel::{
    Analog, Channel, ChannelDirection, ChannelInfo, ChannelKind, ChannelSpec, Direction, Discrete,
    Kind,
};
use crate::config::ModuleConfig;
use crate::error::CoreError;
use crate::store::{Changes, IoStore};

/// Well-known addresses every module reports alongside its channels.
pub mod addresses {
    pub const SERIAL_NUMBER: &str = "serialNumber";
    pub const SUPPLY_VOLTAGE: &str = "vin";
    pub const UTC_TIME: &str = "utcTime";
    pub const TIMEZONE_OFFSET: &str = "timezoneOffset";
}

/// Supply voltage reported when the module has not provided one.
pub const UNKNOWN_VOLTAGE: f64 = -1.0;

/// A remote IO module and the channels attached to it.
///
/// Machine-specific wrappers hold one of these plus their typed channels:
///
/// ```no_run
/// use webio_core::{DiscreteIn, DiscreteOut, ChannelSpec, ModuleConfig, WebIoModule};
///
/// struct LampPanel {
///     module: WebIoModule,
///     start: DiscreteIn,
///     red: DiscreteOut,
/// }
///
/// impl LampPanel {
///     fn new(host: &str) -> Result<Self, webio_core::CoreError> {
///         let mut module = WebIoModule::new(ModuleConfig::for_host(host)?)?;
///         let start = module.attach(&ChannelSpec::new("Start", "device1DigitalInput1"));
///         let red = module.attach(&ChannelSpec::new("Red Lamp", "redLamp"));
///         Ok(Self { module, start, red })
///     }
/// }
/// ```
#[derive(Debug)]
pub struct WebIoModule {
    config: ModuleConfig,
    store: Arc<IoStore>,
    channels: Vec<ChannelInfo>,
}

impl WebIoModule {
    /// Build the HTTP client and store for `config`. Does not connect.
    pub fn new(config: ModuleConfig) -> Result<Self, CoreError> {
        let client = DeviceClient::new(&config.url, &config.transport()).map_err(|e| {
            CoreError::Config {
                message: e.to_string(),
            }
        })?;
        Ok(Self::with_client(config, client))
    }

    /// Use a pre-built client (tests, shared connection pools).
    pub fn with_client(config: ModuleConfig, client: DeviceClient) -> Self {
        let store = Arc::new(IoStore::new(client, config.validate_addresses));
        Self {
            config,
            store,
            channels: Vec::new(),
        }
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<IoStore> {
        &self.store
    }

    pub fn url(&self) -> &Url {
        self.store.url()
    }

    // ── Channel registration ─────────────────────────────────────────

    /// Bind `spec` to this module's store and register it by name.
    ///
    /// Attaching a second channel with an existing name replaces the
    /// earlier registration entry.
    pub fn attach<K: ChannelKind, D: ChannelDirection>(
        &mut self,
        spec: &ChannelSpec<K, D>,
    ) -> Channel<K, D> {
        let info = spec.info();
        debug!(name = %info.name, address = %info.address, "attached channel");
        match self.channels.iter_mut().find(|c| c.name == info.name) {
            Some(existing) => *existing = info,
            None => self.channels.push(info),
        }
        spec.bind(&self.store)
    }

    /// Names of all attached channels, in attach order.
    pub fn members(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub fn channel_info(&self, name: &str) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.name == name)
    }

    fn require_channel(&self, name: &str) -> Result<&ChannelInfo, CoreError> {
        self.channel_info(name)
            .ok_or_else(|| CoreError::UnknownChannel { name: name.into() })
    }

    /// Raw cached value of an attached channel.
    pub fn read_by_name(&self, name: &str) -> Result<Option<RawValue>, CoreError> {
        let info = self.require_channel(name)?;
        self.store.read(&info.address)
    }

    /// Stage a write to an attached output, coerced to its kind.
    pub fn write_by_name(&self, name: &str, value: impl Into<RawValue>) -> Result<(), CoreError> {
        let info = self.require_channel(name)?;
        if info.direction == Direction::Input {
            return Err(CoreError::ReadOnly { name: name.into() });
        }
        let raw = value.into();
        match info.kind {
            Kind::Discrete => self
                .store
                .write(&info.address, Discrete::coerce(&info.address, &raw)?),
            Kind::Analog => self
                .store
                .write(&info.address, Analog::coerce(&info.address, &raw)?),
        }
    }

    // ── Round trips (configured timeout) ─────────────────────────────

    /// Pull the full state from the module.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.store.refresh(self.config.timeout).await
    }

    /// Send all pending writes in one request.
    pub async fn flush(&self) -> Result<usize, CoreError> {
        self.store.flush(self.config.timeout).await
    }

    pub async fn read_immediate(&self, address: &str) -> Result<Option<RawValue>, CoreError> {
        self.store.read_immediate(address, self.config.timeout).await
    }

    pub async fn write_immediate(
        &self,
        address: &str,
        value: impl Into<RawValue>,
    ) -> Result<(), CoreError> {
        self.store
            .write_immediate(address, value, self.config.timeout)
            .await
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    // ── Local cache access ───────────────────────────────────────────

    pub fn load_document(&self, json: &str) -> Result<(), CoreError> {
        self.store.load_document(json)
    }

    pub fn changes(&self) -> Changes {
        self.store.changes()
    }

    pub fn dump(&self, changes_only: bool) -> String {
        self.store.dump(changes_only)
    }

    // ── Module metadata ──────────────────────────────────────────────

    /// Missing addresses read as `None` here, never as an error.
    fn read_soft(&self, address: &str) -> Option<RawValue> {
        self.store.read(address).ok().flatten()
    }

    pub fn serial_number(&self) -> Option<String> {
        self.read_soft(addresses::SERIAL_NUMBER)
            .map(|raw| raw.to_wire())
    }

    /// Supply voltage in volts, [`UNKNOWN_VOLTAGE`] when not reported.
    pub fn supply_voltage(&self) -> f64 {
        self.read_soft(addresses::SUPPLY_VOLTAGE)
            .and_then(|raw| Analog::coerce(addresses::SUPPLY_VOLTAGE, &raw).ok())
            .unwrap_or(UNKNOWN_VOLTAGE)
    }

    /// Module clock at the last read, `DateTime::<Utc>::MIN_UTC` when not
    /// reported.
    pub fn last_read_time(&self) -> DateTime<Utc> {
        self.read_soft(addresses::UTC_TIME)
            .and_then(|raw| whole_number(&raw))
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Configured UTC offset of the module, in seconds.
    pub fn timezone_offset(&self) -> Option<i32> {
        self.read_soft(addresses::TIMEZONE_OFFSET)
            .and_then(|raw| whole_number(&raw))
            .and_then(|secs| i32::try_from(secs).ok())
    }

    /// [`last_read_time`](Self::last_read_time) in the module's own zone.
    pub fn local_read_time(&self) -> Option<DateTime<FixedOffset>> {
        let secs = self
            .read_soft(addresses::UTC_TIME)
            .and_then(|raw| whole_number(&raw))?;
        let offset = FixedOffset::east_opt(self.timezone_offset()?)?;
        Some(DateTime::<Utc>::from_timestamp(secs, 0)?.with_timezone(&offset))
    }
}

fn whole_number(raw: &RawValue) -> Option<i64> {
    match raw {
        RawValue::Int(n) => Some(*n),
        RawValue::Text(s) => s.trim().parse().ok(),
        RawValue::Bool(_) | RawValue::Float(_) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::channel::{AnalogIn, DiscreteIn, DiscreteOut};

    const INCOMING: &str = r#"{
        "vin": "23.6",
        "device1DigitalInput1": "1",
        "device1DigitalInput2": "0",
        "redLamp": "1",
        "amberLamp": "1",
        "utcTime": "1559533814",
        "timezoneOffset": "-25200",
        "serialNumber": "00:0C:C8:04:24:B2"
    }"#;

    fn module() -> WebIoModule {
        let config = ModuleConfig::for_host("127.0.0.1:9").unwrap();
        WebIoModule::new(config).unwrap()
    }

    #[test]
    fn metadata_reads_well_known_addresses() {
        let module = module();
        module.load_document(INCOMING).unwrap();

        assert_eq!(module.serial_number().as_deref(), Some("00:0C:C8:04:24:B2"));
        assert_eq!(module.supply_voltage(), 23.6);
        assert_eq!(
            module.last_read_time().to_rfc3339(),
            "2019-06-03T03:50:14+00:00"
        );
        assert_eq!(module.timezone_offset(), Some(-25200));
        assert_eq!(
            module.local_read_time().unwrap().to_rfc3339(),
            "2019-06-02T20:50:14-07:00"
        );
    }

    #[test]
    fn metadata_fails_soft_when_missing() {
        let module = module();
        module.load_document(r#"{"redLamp": "0"}"#).unwrap();

        assert_eq!(module.serial_number(), None);
        assert_eq!(module.supply_voltage(), UNKNOWN_VOLTAGE);
        assert_eq!(module.last_read_time(), DateTime::<Utc>::MIN_UTC);
        assert_eq!(module.local_read_time(), None);
    }

    #[test]
    fn metadata_before_sync_uses_sentinels() {
        let module = module();
        assert_eq!(module.supply_voltage(), UNKNOWN_VOLTAGE);
        assert_eq!(module.last_read_time(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn unreadable_ca_cert_is_a_config_error() {
        let config = ModuleConfig::for_host("127.0.0.1:9")
            .unwrap()
            .with_tls(crate::TlsVerification::CustomCa("/nonexistent/ca.pem".into()));
        let err = WebIoModule::new(config).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }), "got: {err:?}");
    }

    #[test]
    fn attach_registers_members_in_order() {
        let mut module = module();
        let _button: DiscreteIn = module.attach(&ChannelSpec::new("Button1", "device1DigitalInput1"));
        let _lamp: DiscreteOut = module.attach(&ChannelSpec::new("Lamp1", "redLamp"));
        let _vin: AnalogIn = module.attach(&ChannelSpec::new("Supply", "vin"));

        assert_eq!(module.members(), vec!["Button1", "Lamp1", "Supply"]);
        let info = module.channel_info("Lamp1").unwrap();
        assert_eq!(info.direction, Direction::Output);
        assert_eq!(info.kind, Kind::Discrete);
    }

    #[test]
    fn reattaching_a_name_replaces_its_entry() {
        let mut module = module();
        let _first: DiscreteOut = module.attach(&ChannelSpec::new("Lamp", "redLamp"));
        let _second: DiscreteOut = module.attach(&ChannelSpec::new("Lamp", "amberLamp"));

        assert_eq!(module.members(), vec!["Lamp"]);
        assert_eq!(module.channel_info("Lamp").unwrap().address, "amberLamp");
    }

    #[test]
    fn write_by_name_respects_direction() {
        let mut module = module();
        let _button: DiscreteIn = module.attach(&ChannelSpec::new("Button1", "device1DigitalInput1"));
        let _lamp: DiscreteOut = module.attach(&ChannelSpec::new("Lamp1", "redLamp"));
        module.load_document(INCOMING).unwrap();

        let err = module.write_by_name("Button1", true).unwrap_err();
        assert!(matches!(err, CoreError::ReadOnly { ref name } if name == "Button1"));

        module.write_by_name("Lamp1", "off").unwrap();
        assert_eq!(module.changes().get("redLamp").map(String::as_str), Some("0"));

        let err = module.write_by_name("Nope", true).unwrap_err();
        assert!(matches!(err, CoreError::UnknownChannel { .. }));
    }

    #[test]
    fn read_by_name_returns_raw_value() {
        let mut module = module();
        let _vin: AnalogIn = module.attach(&ChannelSpec::new("Supply", "vin"));
        module.load_document(INCOMING).unwrap();
        assert_eq!(
            module.read_by_name("Supply").unwrap(),
            Some(RawValue::Text("23.6".into()))
        );
    }
}
