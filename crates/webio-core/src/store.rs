// ── Local IO cache ──
//
// Mirrors the module's state document and batches writes until the
// caller flushes them. All network I/O happens outside the lock; its
// result is applied in a single locked section so readers never see a
// half-applied update.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::Url;
use webio_api::{DeviceClient, RawValue, StateDocument, parse_document, render_document};

use crate::error::CoreError;

/// Pending writes: address -> wire value.
pub type Changes = BTreeMap<String, String>;

/// Value store for one IO module.
///
/// Holds the last-known channel values (the mirror) and the writes not yet
/// sent (pending). Each instance has its own lock; separate modules never
/// serialize against each other.
#[derive(Debug)]
pub struct IoStore {
    client: DeviceClient,
    validate_addresses: bool,
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    mirror: StateDocument,
    pending: Changes,
    synced_at: Option<DateTime<Utc>>,
}

impl CacheState {
    fn has_synced(&self) -> bool {
        self.synced_at.is_some()
    }

    /// Before the first sync nothing is known about valid addresses, so
    /// only a synced mirror can reject one.
    fn check_address(&self, address: &str, validate: bool) -> Result<(), CoreError> {
        if validate && self.has_synced() && !self.mirror.contains_key(address) {
            return Err(CoreError::AddressNotFound {
                address: address.to_owned(),
            });
        }
        Ok(())
    }

    fn replace_mirror(&mut self, doc: StateDocument) {
        self.mirror = doc;
        self.synced_at = Some(Utc::now());
    }
}

impl IoStore {
    pub fn new(client: DeviceClient, validate_addresses: bool) -> Self {
        Self {
            client,
            validate_addresses,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// The state document URL this store polls.
    pub fn url(&self) -> &Url {
        self.client.url()
    }

    pub fn validates_addresses(&self) -> bool {
        self.validate_addresses
    }

    pub fn has_synced(&self) -> bool {
        self.lock().has_synced()
    }

    /// When the mirror was last replaced by a full read or load.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.lock().synced_at
    }

    // ── Full reads ───────────────────────────────────────────────────

    /// Replace the mirror from a JSON document without touching the network.
    pub fn load_document(&self, json: &str) -> Result<(), CoreError> {
        let doc = parse_document(json)?;
        let mut state = self.lock();
        state.replace_mirror(doc);
        debug!(channels = state.mirror.len(), "loaded IO mirror from document");
        Ok(())
    }

    /// Pull the full state from the module.
    ///
    /// On success the mirror is replaced and unflushed writes are dropped.
    /// On failure nothing changes.
    pub async fn refresh(&self, timeout: Duration) -> Result<(), CoreError> {
        let doc = self.client.fetch_state(timeout).await?;

        let mut state = self.lock();
        if !state.pending.is_empty() {
            warn!(
                discarded = state.pending.len(),
                "refresh discarded unflushed writes"
            );
            state.pending.clear();
        }
        state.replace_mirror(doc);
        debug!(channels = state.mirror.len(), "refreshed IO mirror");
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The cached value at `address`, or `None` when absent or not yet synced.
    pub fn read(&self, address: &str) -> Result<Option<RawValue>, CoreError> {
        let state = self.lock();
        if !state.has_synced() {
            return Ok(None);
        }
        state.check_address(address, self.validate_addresses)?;
        Ok(state.mirror.get(address).cloned())
    }

    /// Latest local value at `address`: pending first, then the mirror.
    ///
    /// Unlike [`read`](Self::read) this sees writes staged before the
    /// first sync. Address validation still applies once synced.
    pub(crate) fn peek(&self, address: &str) -> Result<Option<RawValue>, CoreError> {
        let state = self.lock();
        state.check_address(address, self.validate_addresses)?;
        Ok(state
            .pending
            .get(address)
            .map(|wire| RawValue::Text(wire.clone()))
            .or_else(|| state.mirror.get(address).cloned()))
    }

    /// Fetch a fresh document and return one address from it.
    ///
    /// Neither the mirror nor pending writes are modified.
    pub async fn read_immediate(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Option<RawValue>, CoreError> {
        let mut doc = self.client.fetch_state(timeout).await?;
        match doc.remove(address) {
            Some(value) => Ok(Some(value)),
            None if self.validate_addresses => Err(CoreError::AddressNotFound {
                address: address.to_owned(),
            }),
            None => Ok(None),
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Stage a write. The value is readable immediately and sent on the
    /// next [`flush`](Self::flush).
    pub fn write(&self, address: &str, value: impl Into<RawValue>) -> Result<(), CoreError> {
        let wire = value.into().to_wire();

        let mut state = self.lock();
        state.check_address(address, self.validate_addresses)?;
        state
            .mirror
            .insert(address.to_owned(), RawValue::Text(wire.clone()));
        state.pending.insert(address.to_owned(), wire);
        Ok(())
    }

    /// Send one value right away, bypassing the pending set.
    ///
    /// The mirror is updated only after the module accepted the write.
    pub async fn write_immediate(
        &self,
        address: &str,
        value: impl Into<RawValue>,
        timeout: Duration,
    ) -> Result<(), CoreError> {
        let wire = value.into().to_wire();
        {
            let state = self.lock();
            state.check_address(address, self.validate_addresses)?;
        }

        let mut single = Changes::new();
        single.insert(address.to_owned(), wire.clone());
        self.client.send_values(&single, timeout).await?;

        self.lock()
            .mirror
            .insert(address.to_owned(), RawValue::Text(wire));
        debug!(address, "wrote IO immediately");
        Ok(())
    }

    /// Send every pending write in one request. Returns how many were sent.
    ///
    /// On failure the pending set is left intact for a retry. Entries
    /// rewritten while the request was in flight stay pending.
    pub async fn flush(&self, timeout: Duration) -> Result<usize, CoreError> {
        let batch = {
            let state = self.lock();
            if state.pending.is_empty() {
                return Ok(0);
            }
            state.pending.clone()
        };

        self.client.send_values(&batch, timeout).await?;

        let mut state = self.lock();
        state
            .pending
            .retain(|address, value| batch.get(address) != Some(&*value));
        debug!(
            sent = batch.len(),
            still_pending = state.pending.len(),
            "flushed pending writes"
        );
        Ok(batch.len())
    }

    /// Drop all pending writes. Returns how many were dropped.
    pub fn discard_changes(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }

    // ── Introspection ────────────────────────────────────────────────

    /// Snapshot of the pending writes.
    pub fn changes(&self) -> Changes {
        self.lock().pending.clone()
    }

    /// Snapshot of the mirror.
    pub fn snapshot(&self) -> StateDocument {
        self.lock().mirror.clone()
    }

    /// JSON of the pending writes (`changes_only`) or of the whole mirror.
    ///
    /// With `changes_only` and nothing pending the result is empty, not `{}`.
    pub fn dump(&self, changes_only: bool) -> String {
        let state = self.lock();
        if !changes_only {
            return render_document(&state.mirror);
        }
        if state.pending.is_empty() {
            return String::new();
        }
        serde_json::to_string(&state.pending).unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Every locked section leaves both maps consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
