//! The realm manager.
//!
//! [`RealmManager`] is the entry point the command layer talks to. It owns:
//!
//! - one [`RealmWorldState`] per realm, indexed by [`RealmId`]
//! - the static [`WorldCatalog`] and the hot-reloadable [`Tunables`]
//! - the [`Clock`] every operation reads `now` from
//! - the [`RespawnStore`] and the [`WriteBehind`] queue in front of it
//!
//! Realms share no mutable state, so realm-wide sweeps (stat recomputation
//! after a reload, status ticks) run across realms in parallel with `rayon`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use realm_core::catalog::WorldCatalog;
//! use realm_core::config::Tunables;
//! use realm_core::ids::RealmId;
//! use realm_core::persistence::MemoryStore;
//! use realm_core::realm::RealmManager;
//! use realm_core::time::{ManualClock, Timestamp};
//!
//! let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1)));
//! let mut manager = RealmManager::new(
//!     WorldCatalog::new(),
//!     Tunables::default(),
//!     clock,
//!     Box::new(MemoryStore::new()),
//! );
//! let seeded = manager.bootstrap([(RealmId::new(1), 42)]).unwrap();
//! assert_eq!(seeded, 0);
//! assert!(manager.realm(RealmId::new(1)).is_some());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::catalog::WorldCatalog;
use crate::combat::ExchangeOutcome;
use crate::config::{ConfigError, Tunables};
use crate::entity::{Character, MobInstance};
use crate::ids::{CharacterId, MobId, RealmId, RoomKey};
use crate::lifecycle::{Defeat, RealmWorldState, StatusSweep};
use crate::persistence::{
    FlushReport, PersistOp, RespawnRecord, RespawnStore, StoreError, WriteBehind,
};
use crate::stats::StatContext;
use crate::time::{Clock, Timestamp};

/// Owns every realm plus the shared static data and persistence.
pub struct RealmManager {
    catalog: WorldCatalog,
    tunables: Tunables,
    clock: Arc<dyn Clock>,
    store: Box<dyn RespawnStore>,
    queue: WriteBehind,
    realms: BTreeMap<RealmId, RealmWorldState>,
}

impl std::fmt::Debug for RealmManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmManager")
            .field("realms", &self.realms.keys().collect::<Vec<_>>())
            .field("queued_writes", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl RealmManager {
    /// Creates a manager with no realms. Tunables are sanitized first.
    #[must_use]
    pub fn new(
        catalog: WorldCatalog,
        mut tunables: Tunables,
        clock: Arc<dyn Clock>,
        store: Box<dyn RespawnStore>,
    ) -> Self {
        tunables.sanitize();
        let queue = WriteBehind::new(tunables.persistence);
        Self {
            catalog,
            tunables,
            clock,
            store,
            queue,
            realms: BTreeMap::new(),
        }
    }

    /// Current time from the clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Static catalog.
    #[must_use]
    pub const fn catalog(&self) -> &WorldCatalog {
        &self.catalog
    }

    /// Current tunables.
    #[must_use]
    pub const fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    /// Catalog and tunables bundled for stat derivation.
    #[must_use]
    pub const fn stat_context(&self) -> StatContext<'_> {
        StatContext::new(&self.catalog, &self.tunables)
    }

    /// Looks up a realm.
    #[must_use]
    pub fn realm(&self, id: RealmId) -> Option<&RealmWorldState> {
        self.realms.get(&id)
    }

    /// Looks up a realm for mutation.
    pub fn realm_mut(&mut self, id: RealmId) -> Option<&mut RealmWorldState> {
        self.realms.get_mut(&id)
    }

    /// Realm ids in order.
    pub fn realm_ids(&self) -> impl Iterator<Item = RealmId> + '_ {
        self.realms.keys().copied()
    }

    /// Adds an empty realm without consulting storage.
    pub fn add_realm(&mut self, id: RealmId, seed: u64) -> &mut RealmWorldState {
        self.realms.entry(id).or_insert_with(|| RealmWorldState::new(id, seed))
    }

    // =========================================================================
    // Startup and Configuration
    // =========================================================================

    /// Cold-starts realms, seeding each respawn cache from storage.
    ///
    /// Transient store failures are retried with the configured backoff;
    /// this is the one place the manager waits on storage.
    ///
    /// # Errors
    ///
    /// Returns the last [`StoreError`] if a realm's records cannot be listed
    /// within the retry ceiling, or at once for a permanent failure. Realms
    /// bootstrapped before the failure are kept.
    pub fn bootstrap(
        &mut self,
        realms: impl IntoIterator<Item = (RealmId, u64)>,
    ) -> Result<usize, StoreError> {
        let mut total = 0;
        for (id, seed) in realms {
            let records = self.list_with_retry(id)?;
            let seeded = self.add_realm(id, seed).seed_respawns(records);
            info!(realm = %id, seeded, "realm bootstrapped");
            total += seeded;
        }
        Ok(total)
    }

    fn list_with_retry(&mut self, realm: RealmId) -> Result<Vec<RespawnRecord>, StoreError> {
        let policy = self.tunables.persistence;
        let mut failures = 0;
        loop {
            match self.store.list_mob_respawns(realm) {
                Ok(records) => return Ok(records),
                Err(err) if err.is_transient() && failures + 1 < policy.max_attempts => {
                    failures += 1;
                    let delay = policy.backoff_ms(failures);
                    warn!(
                        %realm,
                        attempt = failures,
                        delay_ms = delay,
                        %err,
                        "retrying respawn listing"
                    );
                    std::thread::sleep(Duration::from_millis(delay));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Replaces tunables from a JSON document and recomputes every character.
    ///
    /// A document that fails to parse leaves the current tunables in place.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] for a document that cannot be parsed.
    pub fn reload_tunables(&mut self, json: &str) -> Result<(), ConfigError> {
        let tunables = match Tunables::from_json_str(json) {
            Ok(tunables) => tunables,
            Err(err) => {
                warn!(%err, "tunables reload rejected, keeping current values");
                return Err(err);
            }
        };
        self.set_tunables(tunables);
        Ok(())
    }

    /// Replaces tunables and recomputes every character.
    ///
    /// Out-of-range values are clamped to their defaults first.
    pub fn set_tunables(&mut self, mut tunables: Tunables) {
        tunables.sanitize();
        self.tunables = tunables;
        self.queue.set_policy(self.tunables.persistence);

        let now = self.clock.now();
        let ctx = StatContext::new(&self.catalog, &self.tunables);
        self.realms
            .par_iter_mut()
            .for_each(|(_, realm)| realm.recompute_characters(&ctx, now));
        info!(realms = self.realms.len(), "tunables reloaded");
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Populates a room in a realm and returns its mobs.
    ///
    /// An unknown realm has no mobs.
    pub fn ensure_room_populated(&mut self, realm: RealmId, room: RoomKey) -> &[MobInstance] {
        let now = self.clock.now();
        match self.realms.get_mut(&realm) {
            Some(state) => state.ensure_room_populated(&self.catalog, &self.tunables, room, now),
            None => &[],
        }
    }

    /// Marks a mob dead. See [`RealmWorldState::defeat`].
    pub fn defeat(&mut self, realm: RealmId, room: RoomKey, mob: MobId) -> Option<Defeat> {
        let now = self.clock.now();
        self.realms
            .get_mut(&realm)?
            .defeat(&self.catalog, &self.tunables, room, mob, now)
    }

    /// Removes a mob without scheduling a respawn.
    pub fn remove_mob(&mut self, realm: RealmId, room: RoomKey, mob: MobId) -> Option<MobInstance> {
        self.realms.get_mut(&realm)?.remove_mob(room, mob)
    }

    // =========================================================================
    // Characters and Fights
    // =========================================================================

    /// Adds a character to a realm, rebuilding its derived stats first.
    ///
    /// Returns `false` if the realm does not exist.
    pub fn insert_character(&mut self, realm: RealmId, mut character: Character) -> bool {
        let now = self.clock.now();
        let Some(state) = self.realms.get_mut(&realm) else {
            return false;
        };
        character.recompute(&StatContext::new(&self.catalog, &self.tunables), now);
        state.insert_character(character);
        true
    }

    /// A character attacks a mob.
    pub fn character_attacks(
        &mut self,
        realm: RealmId,
        attacker: CharacterId,
        room: RoomKey,
        target: MobId,
        power: f64,
    ) -> Option<ExchangeOutcome> {
        let now = self.clock.now();
        self.realms
            .get_mut(&realm)?
            .character_attacks(&self.catalog, &self.tunables, attacker, room, target, power, now)
    }

    /// A mob attacks a character.
    pub fn mob_attacks(
        &mut self,
        realm: RealmId,
        room: RoomKey,
        attacker: MobId,
        target: CharacterId,
        power: f64,
    ) -> Option<ExchangeOutcome> {
        let now = self.clock.now();
        self.realms
            .get_mut(&realm)?
            .mob_attacks(&self.catalog, &self.tunables, room, attacker, target, power, now)
    }

    /// Ticks status effects in every realm and drops lapsed lucky buffs.
    pub fn tick_status(&mut self) -> StatusSweep {
        let now = self.clock.now();
        let ctx = StatContext::new(&self.catalog, &self.tunables);
        self.realms
            .par_iter_mut()
            .map(|(_, realm)| realm.tick_all_status(&ctx, now))
            .reduce(StatusSweep::default, |a, b| a + b)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn drain_outboxes(&mut self, now: Timestamp) {
        for (id, realm) in &mut self.realms {
            for op in realm.take_outbox() {
                self.queue.enqueue(*id, op, now);
            }
        }
    }

    /// Queues a crash-recovery snapshot of damaged mobs in every realm.
    ///
    /// Returns the number of damaged mobs recorded.
    pub fn snapshot(&mut self) -> usize {
        let now = self.clock.now();
        let recorded = self
            .realms
            .values_mut()
            .map(|realm| realm.snapshot_damaged(now).len())
            .sum::<usize>();
        self.drain_outboxes(now);
        recorded
    }

    /// Moves pending writes into the queue and attempts every due write once.
    pub fn flush(&mut self) -> FlushReport {
        let now = self.clock.now();
        self.drain_outboxes(now);
        self.queue.flush(self.store.as_mut(), now)
    }

    /// Writes still queued.
    #[must_use]
    pub fn queued_writes(&self) -> usize {
        self.queue.len()
    }

    /// Queues an arbitrary op, for administrative reconciliation.
    pub fn enqueue(&mut self, realm: RealmId, op: PersistOp) {
        let now = self.clock.now();
        self.queue.enqueue(realm, op, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{RoomId, ZoneId};
    use crate::persistence::MemoryStore;
    use crate::time::ManualClock;

    fn manager(store: MemoryStore) -> (RealmManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1000)));
        let manager = RealmManager::new(
            WorldCatalog::new(),
            Tunables::default(),
            clock.clone(),
            Box::new(store),
        );
        (manager, clock)
    }

    #[test]
    fn bootstrap_retries_contention() {
        let mut store = MemoryStore::new();
        store.inject_contention(2);
        let (mut manager, _) = manager(store);
        assert_eq!(manager.bootstrap([(RealmId::new(1), 1)]), Ok(0));
    }

    #[test]
    fn bootstrap_gives_up_at_ceiling() {
        let mut store = MemoryStore::new();
        store.inject_contention(50);
        let (mut manager, _) = manager(store);
        let mut tunables = Tunables::default();
        tunables.persistence.max_attempts = 2;
        tunables.persistence.base_delay_ms = 1;
        manager.set_tunables(tunables);

        assert_eq!(manager.bootstrap([(RealmId::new(1), 1)]), Err(StoreError::Contention));
        assert!(manager.realm(RealmId::new(1)).is_none());
    }

    #[test]
    fn bad_reload_keeps_current_tunables() {
        let (mut manager, _) = manager(MemoryStore::new());
        manager.reload_tunables(r#"{"kill_growth": {"every": 4}}"#).unwrap();
        assert_eq!(manager.tunables().kill_growth.every, 4);

        assert!(manager.reload_tunables("{ not json").is_err());
        assert_eq!(manager.tunables().kill_growth.every, 4);
    }

    #[test]
    fn malformed_tunables_are_clamped_on_install() {
        let (mut manager, _) = manager(MemoryStore::new());
        manager.add_realm(RealmId::new(1), 1);
        let drifter = {
            let ctx = manager.stat_context();
            Character::new(CharacterId::new(1), "drifter", "nobody", &ctx, manager.now())
        };
        assert!(manager.insert_character(RealmId::new(1), drifter));

        let mut tunables = Tunables::default();
        tunables.max_evade = -0.1;
        tunables.base_evade = f64::NAN;
        manager.set_tunables(tunables);

        let defaults = Tunables::default();
        assert_eq!(manager.tunables().max_evade, defaults.max_evade);
        assert_eq!(manager.tunables().base_evade, defaults.base_evade);
        let realm = manager.realm(RealmId::new(1)).unwrap();
        let drifter = realm.character(CharacterId::new(1)).unwrap();
        assert_eq!(drifter.derived().evade_chance, defaults.base_evade);
    }

    #[test]
    fn unknown_realm_is_empty() {
        let (mut manager, _) = manager(MemoryStore::new());
        assert!(manager
            .ensure_room_populated(RealmId::new(9), RoomKey::new(ZoneId::new(1), RoomId::new(1)))
            .is_empty());
        assert!(manager
            .defeat(RealmId::new(9), RoomKey::new(ZoneId::new(1), RoomId::new(1)), MobId::new(1))
            .is_none());
    }
}
