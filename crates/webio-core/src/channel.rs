// ── Typed channel handles ──
//
// A `ChannelSpec` is an unbound template (name, address, default). Binding
// it to an `IoStore` yields a `Channel` that reads from the store's mirror
// and, for outputs, stages writes into its pending set. Kind and direction
// are type parameters, so writing to an input does not compile.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use webio_api::RawValue;

use crate::error::CoreError;
use crate::store::IoStore;

// ── Kind / direction ─────────────────────────────────────────────────

/// Value kind of a channel, as recorded in a module's registration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Kind {
    Discrete,
    Analog,
}

/// Data direction of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Direction {
    #[strum(serialize = "In")]
    Input,
    #[strum(serialize = "Out")]
    Output,
}

/// Coercion rules for one channel kind.
pub trait ChannelKind: fmt::Debug + Clone + Copy + Send + Sync + 'static {
    type Value: Copy
        + PartialEq
        + PartialOrd
        + fmt::Debug
        + fmt::Display
        + Into<RawValue>
        + Send
        + Sync;

    const KIND: Kind;

    /// Value reported when the store has nothing for the address.
    const DEFAULT: Self::Value;

    /// Convert a raw document value, naming `address` on failure.
    fn coerce(address: &str, raw: &RawValue) -> Result<Self::Value, CoreError>;
}

pub trait ChannelDirection: fmt::Debug + Clone + Copy + Send + Sync + 'static {
    const DIRECTION: Direction;
}

/// Boolean channel.
#[derive(Debug, Clone, Copy)]
pub enum Discrete {}

/// Floating-point channel.
#[derive(Debug, Clone, Copy)]
pub enum Analog {}

/// Read-only channel.
#[derive(Debug, Clone, Copy)]
pub enum Input {}

/// Read-write channel.
#[derive(Debug, Clone, Copy)]
pub enum Output {}

impl ChannelKind for Discrete {
    type Value = bool;
    const KIND: Kind = Kind::Discrete;
    const DEFAULT: bool = false;

    fn coerce(address: &str, raw: &RawValue) -> Result<bool, CoreError> {
        match raw {
            RawValue::Bool(b) => Ok(*b),
            RawValue::Int(n) => Ok(*n != 0),
            RawValue::Float(f) => Ok(*f != 0.0),
            RawValue::Text(s) => parse_flag(s).ok_or_else(|| type_error(address, s, "boolean")),
        }
    }
}

impl ChannelKind for Analog {
    type Value = f64;
    const KIND: Kind = Kind::Analog;
    const DEFAULT: f64 = 0.0;

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn coerce(address: &str, raw: &RawValue) -> Result<f64, CoreError> {
        match raw {
            RawValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            RawValue::Int(n) => Ok(*n as f64),
            RawValue::Float(f) => Ok(*f),
            RawValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| type_error(address, s, "number")),
        }
    }
}

impl ChannelDirection for Input {
    const DIRECTION: Direction = Direction::Input;
}

impl ChannelDirection for Output {
    const DIRECTION: Direction = Direction::Output;
}

/// Truthy-string parsing: the usual yes/no words, digits, or any number.
fn parse_flag(s: &str) -> Option<bool> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(false);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|f| !f.is_nan())
            .map(|f| f != 0.0),
    }
}

fn type_error(address: &str, value: &str, expected: &'static str) -> CoreError {
    CoreError::Type {
        address: address.to_owned(),
        value: value.to_owned(),
        expected,
    }
}

pub type DiscreteIn = Channel<Discrete, Input>;
pub type DiscreteOut = Channel<Discrete, Output>;
pub type AnalogIn = Channel<Analog, Input>;
pub type AnalogOut = Channel<Analog, Output>;

// ── ChannelSpec ──────────────────────────────────────────────────────

/// Unbound channel template.
///
/// Declared once, independent of any module, and bound with
/// [`WebIoModule::attach`](crate::WebIoModule::attach) (or
/// [`bind`](Self::bind) for a bare store).
#[derive(Debug, Clone)]
pub struct ChannelSpec<K: ChannelKind, D: ChannelDirection> {
    name: String,
    address: String,
    default: K::Value,
    units: Option<String>,
    ignore_duplicate_writes: bool,
    _marker: PhantomData<fn() -> D>,
}

impl<K: ChannelKind, D: ChannelDirection> ChannelSpec<K, D> {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            default: K::DEFAULT,
            units: None,
            ignore_duplicate_writes: true,
            _marker: PhantomData,
        }
    }

    pub fn with_default(mut self, default: K::Value) -> Self {
        self.default = default;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Send every write, even when it matches the current value.
    pub fn allow_duplicate_writes(mut self) -> Self {
        self.ignore_duplicate_writes = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            name: self.name.clone(),
            address: self.address.clone(),
            kind: K::KIND,
            direction: D::DIRECTION,
        }
    }

    /// Bind a copy of this template to `store`.
    pub fn bind(&self, store: &Arc<IoStore>) -> Channel<K, D> {
        Channel {
            spec: self.clone(),
            store: Arc::clone(store),
        }
    }
}

/// Registration entry: what a module knows about each attached channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub address: String,
    pub kind: Kind,
    pub direction: Direction,
}

// ── Channel ──────────────────────────────────────────────────────────

/// A named, addressed accessor bound to one store for its lifetime.
#[derive(Debug, Clone)]
pub struct Channel<K: ChannelKind, D: ChannelDirection> {
    spec: ChannelSpec<K, D>,
    store: Arc<IoStore>,
}

impl<K: ChannelKind, D: ChannelDirection> Channel<K, D> {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn address(&self) -> &str {
        &self.spec.address
    }

    pub fn units(&self) -> Option<&str> {
        self.spec.units.as_deref()
    }

    pub fn default_value(&self) -> K::Value {
        self.spec.default
    }

    pub fn kind(&self) -> Kind {
        K::KIND
    }

    pub fn direction(&self) -> Direction {
        D::DIRECTION
    }

    pub fn info(&self) -> ChannelInfo {
        self.spec.info()
    }

    pub fn store(&self) -> &Arc<IoStore> {
        &self.store
    }

    /// Current value from the store's mirror, or the default when absent.
    pub fn value(&self) -> Result<K::Value, CoreError> {
        match self.store.read(&self.spec.address)? {
            Some(raw) => K::coerce(&self.spec.address, &raw),
            None => Ok(self.spec.default),
        }
    }

    /// Fresh value straight from the module; the mirror is not updated.
    pub async fn read_immediate(&self, timeout: Duration) -> Result<K::Value, CoreError> {
        match self.store.read_immediate(&self.spec.address, timeout).await? {
            Some(raw) => K::coerce(&self.spec.address, &raw),
            None => Ok(self.spec.default),
        }
    }

    /// Compare coerced values with another channel of the same kind.
    pub fn equals<D2: ChannelDirection>(&self, other: &Channel<K, D2>) -> Result<bool, CoreError> {
        Ok(self.value()? == other.value()?)
    }

    /// Order coerced values against another channel of the same kind.
    pub fn compare<D2: ChannelDirection>(
        &self,
        other: &Channel<K, D2>,
    ) -> Result<Option<Ordering>, CoreError> {
        Ok(self.value()?.partial_cmp(&other.value()?))
    }

    /// Whether the coerced value equals `literal` (coerced the same way).
    pub fn is(&self, literal: impl Into<RawValue>) -> Result<bool, CoreError> {
        let wanted = K::coerce(&self.spec.address, &literal.into())?;
        Ok(self.value()? == wanted)
    }
}

impl<K: ChannelKind> Channel<K, Output> {
    pub fn ignores_duplicate_writes(&self) -> bool {
        self.spec.ignore_duplicate_writes
    }

    /// Stage a write. Returns `false` when suppressed as a duplicate.
    pub fn write(&self, value: impl Into<RawValue>) -> Result<bool, CoreError> {
        let coerced = K::coerce(&self.spec.address, &value.into())?;

        if self.spec.ignore_duplicate_writes {
            let current = match self.store.peek(&self.spec.address)? {
                Some(raw) => K::coerce(&self.spec.address, &raw),
                None => Ok(self.spec.default),
            };
            match current {
                Ok(current) if current == coerced => return Ok(false),
                // A garbled current value should not block overwriting it.
                Ok(_) | Err(CoreError::Type { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        self.store.write(&self.spec.address, coerced)?;
        Ok(true)
    }

    /// Copy another channel's current value into this one.
    pub fn write_from<D2: ChannelDirection>(&self, source: &Channel<K, D2>) -> Result<bool, CoreError> {
        self.write(source.value()?)
    }

    /// Send the value to the module now, bypassing pending writes.
    pub async fn write_immediate(
        &self,
        value: impl Into<RawValue>,
        timeout: Duration,
    ) -> Result<(), CoreError> {
        let coerced = K::coerce(&self.spec.address, &value.into())?;
        self.store
            .write_immediate(&self.spec.address, coerced, timeout)
            .await
    }
}

impl<K: ChannelKind, D: ChannelDirection> fmt::Display for Channel<K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}{}] {} ({})",
            K::KIND,
            D::DIRECTION,
            self.spec.name,
            self.spec.address
        )
    }
}
