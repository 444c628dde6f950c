//! Per-realm world state and the room/mob lifecycle.
//!
//! A [`RealmWorldState`] owns everything mutable about one realm: the mobs in
//! each room, the respawn cache, boss kill counters, characters and the
//! realm's random source. Realms share no mutable state.
//!
//! # Slot State Machine
//!
//! ```text
//! EMPTY ──observe──▶ ALIVE ──defeat──▶ DEAD(respawn_at) ──observe after──▶ ALIVE
//!   ▲                                        │
//!   └──────── template changed ──────────────┘
//! ```
//!
//! There are no timers. A dead slot is a [`RespawnRecord`] in the cache, and
//! [`RealmWorldState::ensure_room_populated`] compares its `respawn_at` with
//! the supplied time whenever the room is observed. Deleting the record
//! cancels the respawn.
//!
//! # Persistence
//!
//! The cache is authoritative. Every cache mutation pushes a [`PersistOp`]
//! onto the realm's outbox, which the manager drains into its write-behind
//! queue. Nothing here waits on storage.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Add;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::catalog::{MobTemplate, WorldCatalog};
use crate::combat::{resolve_exchange, tick_status, ExchangeOutcome};
use crate::config::Tunables;
use crate::entity::{Character, MobFlags, MobInstance};
use crate::ids::{CharacterId, MobId, RealmId, RoomKey, SlotKey, TemplateId};
use crate::persistence::{PersistOp, RespawnRecord};
use crate::stats::StatContext;
use crate::time::Timestamp;

/// What [`RealmWorldState::defeat`] did with the mob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Defeat {
    /// Summoned or temporary: gone for good.
    Removed,
    /// Slot mob: the slot revives at `respawn_at`.
    Scheduled {
        /// The slot that will revive
        slot: SlotKey,
        /// When it may revive
        respawn_at: Timestamp,
    },
}

/// What a realm-wide status sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSweep {
    /// Health removed by poison from mobs and characters
    pub poison_damage: i64,
    /// Characters whose lucky buff lapsed
    pub lapsed_buffs: usize,
}

impl Add for StatusSweep {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            poison_damage: self.poison_damage.saturating_add(other.poison_damage),
            lapsed_buffs: self.lapsed_buffs + other.lapsed_buffs,
        }
    }
}

/// Mutable state of one realm.
#[derive(Debug, Clone)]
pub struct RealmWorldState {
    id: RealmId,
    rooms: BTreeMap<RoomKey, Vec<MobInstance>>,
    respawns: BTreeMap<SlotKey, RespawnRecord>,
    snapshotted: BTreeSet<SlotKey>,
    kill_counts: BTreeMap<TemplateId, u64>,
    characters: BTreeMap<CharacterId, Character>,
    next_mob_id: u64,
    rng: ChaCha8Rng,
    outbox: Vec<PersistOp>,
}

impl RealmWorldState {
    /// Creates an empty realm whose fights replay from `seed`.
    #[must_use]
    pub fn new(id: RealmId, seed: u64) -> Self {
        Self {
            id,
            rooms: BTreeMap::new(),
            respawns: BTreeMap::new(),
            snapshotted: BTreeSet::new(),
            kill_counts: BTreeMap::new(),
            characters: BTreeMap::new(),
            next_mob_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
            outbox: Vec::new(),
        }
    }

    /// Realm id.
    #[must_use]
    pub const fn id(&self) -> RealmId {
        self.id
    }

    /// The realm's random source.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    fn allocate_id(next: &mut u64) -> MobId {
        let id = MobId::new(*next);
        *next += 1;
        id
    }

    fn growth_for(
        kill_counts: &BTreeMap<TemplateId, u64>,
        template: &MobTemplate,
        tunables: &Tunables,
    ) -> f64 {
        if !template.category.is_boss_class() {
            return 1.0;
        }
        let kills = kill_counts.get(&template.id).copied().unwrap_or(0);
        tunables.kill_growth.multiplier(kills)
    }

    // =========================================================================
    // Rooms
    // =========================================================================

    /// Materializes every slot of a room that is due, and returns the room's mobs.
    ///
    /// - The room's spawn list is padded or truncated to its target
    ///   population. Mobs and cache entries beyond the target are dropped.
    /// - A cache entry whose template no longer matches the slot is discarded
    ///   and the slot spawns fresh.
    /// - A cache entry still in the future keeps the slot empty.
    /// - An expired entry spawns the slot, restoring persisted health (clamped
    ///   to the scaled max) and status if present.
    ///
    /// Rooms the catalog does not know are left as they are.
    pub fn ensure_room_populated(
        &mut self,
        catalog: &WorldCatalog,
        tunables: &Tunables,
        room: RoomKey,
        now: Timestamp,
    ) -> &[MobInstance] {
        let Some(spawns) = catalog.room(room) else {
            return self.mobs(room);
        };
        let target = spawns.population.unwrap_or(tunables.default_room_population);
        let slots = spawns.padded(target);

        let mobs = self.rooms.entry(room).or_default();
        mobs.retain(|m| m.slot.map_or(true, |s| s < slots.len()));

        let beyond: Vec<SlotKey> = self
            .respawns
            .range(room.slot(slots.len())..=room.slot(usize::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in beyond {
            debug!(realm = %self.id, slot = %key, "dropping respawn beyond room population");
            self.respawns.remove(&key);
            self.outbox.push(PersistOp::Clear(key));
        }

        for (index, template_id) in slots.iter().enumerate() {
            if mobs.iter().any(|m| m.slot == Some(index)) {
                continue;
            }
            let key = room.slot(index);
            let Some(template) = catalog.template(template_id) else {
                warn!(
                    realm = %self.id,
                    slot = %key,
                    template = %template_id,
                    "room declares unknown template"
                );
                continue;
            };

            let restore = match self.respawns.get(&key) {
                Some(record) if record.template != *template_id => {
                    debug!(
                        realm = %self.id,
                        slot = %key,
                        cached = %record.template,
                        configured = %template_id,
                        "discarding stale respawn record"
                    );
                    self.respawns.remove(&key);
                    self.outbox.push(PersistOp::Clear(key));
                    None
                }
                Some(record) if record.respawn_at > now => continue,
                Some(_) => {
                    self.outbox.push(PersistOp::Clear(key));
                    self.respawns.remove(&key)
                }
                None => None,
            };

            let growth = Self::growth_for(&self.kill_counts, template, tunables);
            let id = Self::allocate_id(&mut self.next_mob_id);
            let mut mob = MobInstance::spawn(
                id,
                template,
                tunables.category(template.category),
                growth,
                Some(index),
                MobFlags::empty(),
            );
            if let Some(record) = restore {
                if let Some(hp) = record.current_hp {
                    mob.vitals.hp = hp.clamp(1, mob.vitals.max_hp);
                }
                if let Some(status) = record.status {
                    mob.status = status;
                }
            }
            trace!(realm = %self.id, slot = %key, mob = %mob.id, hp = mob.vitals.hp, "spawned");
            mobs.push(mob);
        }

        mobs.as_slice()
    }

    /// Mobs currently in a room, without populating it.
    #[must_use]
    pub fn mobs(&self, room: RoomKey) -> &[MobInstance] {
        self.rooms.get(&room).map_or(&[], Vec::as_slice)
    }

    /// Looks up a mob in a room.
    #[must_use]
    pub fn find_mob(&self, room: RoomKey, id: MobId) -> Option<&MobInstance> {
        self.mobs(room).iter().find(|m| m.id == id)
    }

    /// Looks up a mob in a room for mutation.
    pub fn find_mob_mut(&mut self, room: RoomKey, id: MobId) -> Option<&mut MobInstance> {
        self.rooms.get_mut(&room)?.iter_mut().find(|m| m.id == id)
    }

    /// Puts a summoned or temporary mob in a room. It has no slot.
    ///
    /// Returns `None` if the template is unknown.
    pub fn summon(
        &mut self,
        catalog: &WorldCatalog,
        tunables: &Tunables,
        room: RoomKey,
        template: &TemplateId,
        flags: MobFlags,
    ) -> Option<MobId> {
        let template = catalog.template(template)?;
        let growth = Self::growth_for(&self.kill_counts, template, tunables);
        let id = Self::allocate_id(&mut self.next_mob_id);
        let tuning = tunables.category(template.category);
        let mob = MobInstance::spawn(id, template, tuning, growth, None, flags);
        debug!(realm = %self.id, %room, mob = %id, template = %template.id, "summoned");
        self.rooms.entry(room).or_default().push(mob);
        Some(id)
    }

    /// Removes a mob without scheduling anything.
    ///
    /// A slot mob removed this way leaves its slot empty, so the next
    /// observation of the room spawns it again.
    pub fn remove_mob(&mut self, room: RoomKey, id: MobId) -> Option<MobInstance> {
        let mobs = self.rooms.get_mut(&room)?;
        let index = mobs.iter().position(|m| m.id == id)?;
        Some(mobs.remove(index))
    }

    /// Marks a mob dead.
    ///
    /// Summoned and temporary mobs are removed outright. A slot mob is removed
    /// and its slot scheduled to revive at `now` plus the template's respawn
    /// delay (or the category's when the template has none). Boss-class kills
    /// advance the template's kill counter.
    ///
    /// Returns `None` if the mob is not in the room.
    pub fn defeat(
        &mut self,
        catalog: &WorldCatalog,
        tunables: &Tunables,
        room: RoomKey,
        id: MobId,
        now: Timestamp,
    ) -> Option<Defeat> {
        let mob = self.remove_mob(room, id)?;
        let slot = match mob.slot {
            Some(slot) if !mob.flags.is_transient() => slot,
            _ => {
                debug!(realm = %self.id, %room, mob = %id, "transient mob removed");
                return Some(Defeat::Removed);
            }
        };

        let key = room.slot(slot);
        let delay = catalog
            .template(&mob.template)
            .and_then(|t| t.respawn_secs)
            .unwrap_or(tunables.category(mob.category).respawn_secs)
            .max(1);
        let respawn_at = now.plus_secs(delay);

        if mob.category.is_boss_class() {
            *self.kill_counts.entry(mob.template.clone()).or_insert(0) += 1;
        }

        let record = RespawnRecord::scheduled(key, mob.template, respawn_at);
        self.outbox.push(PersistOp::Upsert(record.clone()));
        self.respawns.insert(key, record);
        self.snapshotted.remove(&key);
        debug!(realm = %self.id, slot = %key, respawn_at = ?respawn_at, "respawn scheduled");

        Some(Defeat::Scheduled { slot: key, respawn_at })
    }

    /// Kills recorded against a boss-class template in this realm.
    #[must_use]
    pub fn kill_count(&self, template: &TemplateId) -> u64 {
        self.kill_counts.get(template).copied().unwrap_or(0)
    }

    /// Cached respawn record for a slot.
    #[must_use]
    pub fn respawn(&self, slot: SlotKey) -> Option<&RespawnRecord> {
        self.respawns.get(&slot)
    }

    /// Number of slots awaiting respawn.
    #[must_use]
    pub fn pending_respawns(&self) -> usize {
        self.respawns.len()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Loads persisted records into the cache at cold start.
    ///
    /// Records are trusted as-is here; template mismatches are reconciled
    /// when the room is first observed.
    pub fn seed_respawns(&mut self, records: impl IntoIterator<Item = RespawnRecord>) -> usize {
        let mut seeded = 0;
        for record in records {
            self.respawns.insert(record.key(), record);
            seeded += 1;
        }
        seeded
    }

    /// Crash-recovery snapshot of alive slot mobs below full health.
    ///
    /// Each damaged mob yields a record due at `now` carrying its health and
    /// status, so a cold start restores it instead of spawning it fresh. Slots
    /// snapshotted earlier that are now back at full health are cleared.
    /// Both kinds of write go to the outbox.
    pub fn snapshot_damaged(&mut self, now: Timestamp) -> Vec<RespawnRecord> {
        let mut records = Vec::new();
        let mut seen = BTreeSet::new();
        for (room, mobs) in &self.rooms {
            for mob in mobs {
                let Some(slot) = mob.slot else { continue };
                if !mob.vitals.is_damaged() {
                    continue;
                }
                let key = room.slot(slot);
                let mut record = RespawnRecord::scheduled(key, mob.template.clone(), now);
                record.current_hp = Some(mob.vitals.hp);
                if !mob.status.is_empty() {
                    record.status = Some(mob.status.clone());
                }
                seen.insert(key);
                records.push(record);
            }
        }

        for healed in self.snapshotted.difference(&seen) {
            if !self.respawns.contains_key(healed) {
                self.outbox.push(PersistOp::Clear(*healed));
            }
        }
        self.outbox.extend(records.iter().cloned().map(PersistOp::Upsert));
        self.snapshotted = seen;
        records
    }

    /// Drains pending persistence ops.
    pub fn take_outbox(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.outbox)
    }

    // =========================================================================
    // Characters
    // =========================================================================

    /// Adds or replaces a character.
    pub fn insert_character(&mut self, character: Character) {
        self.characters.insert(character.id, character);
    }

    /// Looks up a character.
    #[must_use]
    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    /// Looks up a character for mutation.
    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    /// Removes a character.
    pub fn remove_character(&mut self, id: CharacterId) -> Option<Character> {
        self.characters.remove(&id)
    }

    /// Rebuilds every character's derived stats.
    pub fn recompute_characters(&mut self, ctx: &StatContext<'_>, now: Timestamp) {
        for character in self.characters.values_mut() {
            character.recompute(ctx, now);
        }
    }

    // =========================================================================
    // Fights
    // =========================================================================

    /// A character attacks a mob. A kill is passed on to [`Self::defeat`].
    ///
    /// Returns `None` if either side is missing.
    #[allow(clippy::too_many_arguments)]
    pub fn character_attacks(
        &mut self,
        catalog: &WorldCatalog,
        tunables: &Tunables,
        attacker: CharacterId,
        room: RoomKey,
        target: MobId,
        power: f64,
        now: Timestamp,
    ) -> Option<ExchangeOutcome> {
        let character = self.characters.get_mut(&attacker)?;
        let mob = self.rooms.get_mut(&room)?.iter_mut().find(|m| m.id == target)?;
        character.expire_lucky(&StatContext::new(catalog, tunables), now);
        let outcome =
            resolve_exchange(&*character, mob, power, &tunables.status, now, &mut self.rng);
        if outcome.killed {
            self.defeat(catalog, tunables, room, target, now);
        }
        Some(outcome)
    }

    /// A mob attacks a character.
    ///
    /// Returns `None` if either side is missing.
    #[allow(clippy::too_many_arguments)]
    pub fn mob_attacks(
        &mut self,
        catalog: &WorldCatalog,
        tunables: &Tunables,
        room: RoomKey,
        attacker: MobId,
        target: CharacterId,
        power: f64,
        now: Timestamp,
    ) -> Option<ExchangeOutcome> {
        let mob = self.rooms.get(&room)?.iter().find(|m| m.id == attacker)?;
        let character = self.characters.get_mut(&target)?;
        character.expire_lucky(&StatContext::new(catalog, tunables), now);
        Some(resolve_exchange(mob, character, power, &tunables.status, now, &mut self.rng))
    }

    /// Ticks status effects on every mob and character, and rebuilds any
    /// character whose lucky buff has lapsed.
    pub fn tick_all_status(&mut self, ctx: &StatContext<'_>, now: Timestamp) -> StatusSweep {
        let mut sweep = StatusSweep::default();
        for mob in self.rooms.values_mut().flatten() {
            sweep.poison_damage += tick_status(mob, now).poison_damage;
        }
        for character in self.characters.values_mut() {
            sweep.poison_damage += tick_status(character, now).poison_damage;
            sweep.lapsed_buffs += usize::from(character.expire_lucky(ctx, now));
        }
        sweep
    }
}
