//! The persistence seam for respawn records.
//!
//! The in-memory respawn cache in each realm is authoritative. Persisted
//! storage is a write-behind log that is only read at cold start, so a
//! simulation tick never waits on it:
//!
//! - Realm code pushes [`PersistOp`]s into an outbox synchronously.
//! - The manager moves them into a [`WriteBehind`] queue.
//! - [`WriteBehind::flush`] makes at most one attempt per due op, rescheduling
//!   transient failures with bounded exponential backoff and dropping the op
//!   (with a log line) once the retry ceiling is reached.
//!
//! Storage engines implement [`RespawnStore`]. [`MemoryStore`] backs tests and
//! can inject contention; [`JsonFileStore`] keeps one JSON document per realm
//! on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::ids::{RealmId, RoomId, SlotKey, TemplateId, ZoneId};
use crate::status::StatusMap;
use crate::time::Timestamp;

// =============================================================================
// Records and Errors
// =============================================================================

/// A persisted scheduled revival for one spawn slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespawnRecord {
    /// Zone of the slot
    pub zone: ZoneId,
    /// Room of the slot
    pub room: RoomId,
    /// Slot index
    pub slot: usize,
    /// Template the slot held when the record was written
    pub template: TemplateId,
    /// Instant from which the slot may respawn
    pub respawn_at: Timestamp,
    /// Health to restore instead of full health
    #[serde(default)]
    pub current_hp: Option<i64>,
    /// Status effects to restore
    #[serde(default)]
    pub status: Option<StatusMap>,
}

impl RespawnRecord {
    /// A plain respawn timer with nothing to restore.
    #[must_use]
    pub const fn scheduled(key: SlotKey, template: TemplateId, respawn_at: Timestamp) -> Self {
        Self {
            zone: key.zone,
            room: key.room,
            slot: key.slot,
            template,
            respawn_at,
            current_hp: None,
            status: None,
        }
    }

    /// The slot this record belongs to.
    #[must_use]
    pub const fn key(&self) -> SlotKey {
        SlotKey::new(self.zone, self.room, self.slot)
    }
}

/// Errors a [`RespawnStore`] may report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Lock contention; retry later.
    #[error("store contention")]
    Contention,
    /// Backend temporarily unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Stored data cannot be decoded; retrying will not help.
    #[error("store corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns `true` if the operation may succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Contention | Self::Unavailable(_))
    }
}

/// Backend for persisted respawn records.
pub trait RespawnStore: Send {
    /// All records of one realm.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be read.
    fn list_mob_respawns(&mut self, realm: RealmId) -> Result<Vec<RespawnRecord>, StoreError>;

    /// Inserts or replaces the record for the record's slot.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write fails.
    fn upsert(&mut self, realm: RealmId, record: &RespawnRecord) -> Result<(), StoreError>;

    /// Deletes the record for a slot. Deleting a missing record succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write fails.
    fn clear(&mut self, realm: RealmId, key: SlotKey) -> Result<(), StoreError>;
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded exponential backoff for persistence writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before an op is dropped
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay_ms: u64,
    /// Ceiling on any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// Delay after `failures` consecutive failures (1-based).
    #[must_use]
    pub fn backoff_ms(&self, failures: u32) -> u64 {
        let factor = 1_u64.checked_shl(failures.saturating_sub(1)).unwrap_or(u64::MAX);
        self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms)
    }

    /// Clamps malformed values to safe defaults, logging each repair.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.max_attempts == 0 {
            warn!(field = "persistence.max_attempts", "zero retry ceiling, using default");
            self.max_attempts = defaults.max_attempts;
        }
        if self.base_delay_ms == 0 {
            warn!(field = "persistence.base_delay_ms", "zero backoff base, using default");
            self.base_delay_ms = defaults.base_delay_ms;
        }
        if self.max_delay_ms < self.base_delay_ms {
            warn!(
                field = "persistence.max_delay_ms",
                value = self.max_delay_ms,
                "backoff ceiling below base, raising to base"
            );
            self.max_delay_ms = self.base_delay_ms;
        }
    }
}

// =============================================================================
// Write-Behind Queue
// =============================================================================

/// A pending write for one slot.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    /// Write a record
    Upsert(RespawnRecord),
    /// Delete the record for a slot
    Clear(SlotKey),
}

impl PersistOp {
    /// The slot this op touches.
    #[must_use]
    pub const fn key(&self) -> SlotKey {
        match self {
            Self::Upsert(record) => record.key(),
            Self::Clear(key) => *key,
        }
    }

    fn apply(&self, store: &mut dyn RespawnStore, realm: RealmId) -> Result<(), StoreError> {
        match self {
            Self::Upsert(record) => store.upsert(realm, record),
            Self::Clear(key) => store.clear(realm, *key),
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    op: PersistOp,
    failures: u32,
    due: Timestamp,
}

/// Counters from one [`WriteBehind::flush`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Ops written successfully
    pub written: usize,
    /// Ops rescheduled after a transient failure
    pub retried: usize,
    /// Ops given up on
    pub dropped: usize,
    /// Ops not yet due
    pub deferred: usize,
}

/// Fire-and-forget persistence queue.
///
/// At most one op is queued per `(realm, slot)`; a newer op replaces an older
/// one, so the store only ever sees the latest intent for a slot.
#[derive(Debug, Clone, Default)]
pub struct WriteBehind {
    policy: RetryPolicy,
    pending: BTreeMap<(RealmId, SlotKey), Pending>,
}

impl WriteBehind {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            pending: BTreeMap::new(),
        }
    }

    /// Replaces the retry policy. Queued ops keep their schedule.
    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Queues an op, due immediately. Never blocks.
    pub fn enqueue(&mut self, realm: RealmId, op: PersistOp, now: Timestamp) {
        let key = (realm, op.key());
        self.pending.insert(
            key,
            Pending {
                op,
                failures: 0,
                due: now,
            },
        );
    }

    /// Number of queued ops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Attempts every op that is due, once.
    pub fn flush(&mut self, store: &mut dyn RespawnStore, now: Timestamp) -> FlushReport {
        let mut report = FlushReport::default();
        let due: Vec<(RealmId, SlotKey)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(k, _)| *k)
            .collect();
        report.deferred = self.pending.len() - due.len();

        for key in due {
            let Some(mut pending) = self.pending.remove(&key) else {
                continue;
            };
            let (realm, slot) = key;
            match pending.op.apply(store, realm) {
                Ok(()) => report.written += 1,
                Err(err) if err.is_transient() => {
                    pending.failures += 1;
                    if pending.failures >= self.policy.max_attempts {
                        warn!(
                            %realm,
                            %slot,
                            attempts = pending.failures,
                            %err,
                            "dropping respawn write"
                        );
                        report.dropped += 1;
                        continue;
                    }
                    let delay = self.policy.backoff_ms(pending.failures);
                    debug!(
                        %realm,
                        %slot,
                        attempt = pending.failures,
                        delay_ms = delay,
                        %err,
                        "retrying respawn write"
                    );
                    pending.due = now.plus_millis(delay);
                    self.pending.insert(key, pending);
                    report.retried += 1;
                }
                Err(err) => {
                    error!(%realm, %slot, %err, "dropping respawn write after permanent failure");
                    report.dropped += 1;
                }
            }
        }
        report
    }
}

// =============================================================================
// Stores
// =============================================================================

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    realms: BTreeMap<RealmId, BTreeMap<SlotKey, RespawnRecord>>,
    contention: u32,
    calls: u64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `failures` calls fail with [`StoreError::Contention`].
    pub fn inject_contention(&mut self, failures: u32) {
        self.contention = failures;
    }

    /// Stored records of one realm, in slot order.
    #[must_use]
    pub fn records(&self, realm: RealmId) -> Vec<RespawnRecord> {
        self.realms
            .get(&realm)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total calls received, including failed ones.
    #[must_use]
    pub const fn calls(&self) -> u64 {
        self.calls
    }

    fn contend(&mut self) -> Result<(), StoreError> {
        self.calls += 1;
        if self.contention > 0 {
            self.contention -= 1;
            return Err(StoreError::Contention);
        }
        Ok(())
    }
}

impl RespawnStore for MemoryStore {
    fn list_mob_respawns(&mut self, realm: RealmId) -> Result<Vec<RespawnRecord>, StoreError> {
        self.contend()?;
        Ok(self.records(realm))
    }

    fn upsert(&mut self, realm: RealmId, record: &RespawnRecord) -> Result<(), StoreError> {
        self.contend()?;
        self.realms.entry(realm).or_default().insert(record.key(), record.clone());
        Ok(())
    }

    fn clear(&mut self, realm: RealmId, key: SlotKey) -> Result<(), StoreError> {
        self.contend()?;
        if let Some(records) = self.realms.get_mut(&realm) {
            records.remove(&key);
        }
        Ok(())
    }
}

/// One JSON document per realm under a directory.
///
/// Every write rewrites the realm's whole table, so this suits harnesses and
/// small deployments rather than a busy server.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Uses `dir` for realm documents. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a realm's document.
    #[must_use]
    pub fn path_for(&self, realm: RealmId) -> PathBuf {
        self.dir.join(format!("realm-{}.json", realm.get()))
    }

    fn read(&self, realm: RealmId) -> Result<BTreeMap<SlotKey, RespawnRecord>, StoreError> {
        let path = self.path_for(realm);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(unavailable(&path, &err)),
        };
        let records: Vec<RespawnRecord> = serde_json::from_str(&json)
            .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))?;
        Ok(records.into_iter().map(|r| (r.key(), r)).collect())
    }

    fn write(
        &self,
        realm: RealmId,
        records: &BTreeMap<SlotKey, RespawnRecord>,
    ) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|err| unavailable(&self.dir, &err))?;
        let path = self.path_for(realm);
        let list: Vec<&RespawnRecord> = records.values().collect();
        let json = serde_json::to_string_pretty(&list)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        std::fs::write(&path, json).map_err(|err| unavailable(&path, &err))
    }
}

fn unavailable(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

impl RespawnStore for JsonFileStore {
    fn list_mob_respawns(&mut self, realm: RealmId) -> Result<Vec<RespawnRecord>, StoreError> {
        Ok(self.read(realm)?.into_values().collect())
    }

    fn upsert(&mut self, realm: RealmId, record: &RespawnRecord) -> Result<(), StoreError> {
        let mut records = self.read(realm)?;
        records.insert(record.key(), record.clone());
        self.write(realm, &records)
    }

    fn clear(&mut self, realm: RealmId, key: SlotKey) -> Result<(), StoreError> {
        let mut records = self.read(realm)?;
        if records.remove(&key).is_some() {
            self.write(realm, &records)?;
        }
        Ok(())
    }
}
