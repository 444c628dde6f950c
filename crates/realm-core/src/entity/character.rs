//! Player characters.
//!
//! A [`Character`] holds the persisted inputs of the stat pipeline plus a
//! [`DerivedStats`] cache. Every mutator that can change an input re-runs
//! [`compute_derived`] before returning, so the cache is never stale from the
//! caller's point of view. The cache is skipped during serialization and must
//! be rebuilt with [`Character::recompute`] after loading.

use serde::{Deserialize, Serialize};

use crate::catalog::EquipSlot;
use crate::ids::{CharacterId, ClassId};
use crate::stats::{
    compute_derived, DerivedStats, Equipment, EquippedItem, LuckyBuff, StatContext, StatInputs,
    StatKind, StatLine,
};
use crate::status::StatusMap;
use crate::time::Timestamp;

use super::{CombatProfile, Combatant, Vitals};

/// A player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Unique id
    pub id: CharacterId,
    /// Display name
    pub name: String,
    /// Class key into the class tuning tables
    pub class: ClassId,
    /// Level, starting at 1
    pub level: u32,
    /// Cultivation tier, 0 for none
    pub cultivation_tier: u32,
    /// Equipped items by slot
    pub equipment: Equipment,
    /// Accumulated training points per attribute
    pub training: StatLine,
    /// Training fruits consumed
    pub fruit_count: u32,
    /// Daily lucky buff
    pub lucky: Option<LuckyBuff>,
    /// Health and mana
    pub vitals: Vitals,
    /// Active status effects
    pub status: StatusMap,
    #[serde(skip)]
    derived: DerivedStats,
}

impl Character {
    /// Creates a level 1 character with full pools.
    #[must_use]
    pub fn new(
        id: CharacterId,
        name: impl Into<String>,
        class: impl Into<ClassId>,
        ctx: &StatContext<'_>,
        now: Timestamp,
    ) -> Self {
        let mut character = Self {
            id,
            name: name.into(),
            class: class.into(),
            level: 1,
            cultivation_tier: 0,
            equipment: Equipment::new(),
            training: StatLine::ZERO,
            fruit_count: 0,
            lucky: None,
            vitals: Vitals::default(),
            status: StatusMap::new(),
            derived: DerivedStats::default(),
        };
        character.recompute(ctx, now);
        character.vitals.hp = character.vitals.max_hp;
        character.vitals.mp = character.vitals.max_mp;
        character
    }

    /// Cached derived stats.
    #[must_use]
    pub const fn derived(&self) -> &DerivedStats {
        &self.derived
    }

    /// Borrowed pipeline inputs.
    #[must_use]
    pub fn inputs(&self) -> StatInputs<'_> {
        StatInputs {
            class: &self.class,
            level: self.level,
            cultivation_tier: self.cultivation_tier,
            equipment: &self.equipment,
            training: &self.training,
            fruit_count: self.fruit_count,
            lucky: self.lucky.as_ref(),
        }
    }

    /// Rebuilds the derived cache and clamps current pools into the new maxima.
    #[allow(clippy::cast_possible_truncation)]
    pub fn recompute(&mut self, ctx: &StatContext<'_>, now: Timestamp) {
        self.derived = compute_derived(&self.inputs(), ctx, now);
        let max_hp = self.derived.max_hp.floor() as i64;
        let max_mp = self.derived.max_mp.floor() as i64;
        self.vitals.set_max(max_hp, max_mp);
    }

    /// Puts an item in a slot, returning whatever was there.
    pub fn equip(
        &mut self,
        slot: EquipSlot,
        item: EquippedItem,
        ctx: &StatContext<'_>,
        now: Timestamp,
    ) -> Option<EquippedItem> {
        let previous = self.equipment.insert(slot, item);
        self.recompute(ctx, now);
        previous
    }

    /// Empties a slot, returning the removed item.
    pub fn unequip(
        &mut self,
        slot: EquipSlot,
        ctx: &StatContext<'_>,
        now: Timestamp,
    ) -> Option<EquippedItem> {
        let removed = self.equipment.remove(&slot);
        self.recompute(ctx, now);
        removed
    }

    /// Raises the level by one.
    pub fn level_up(&mut self, ctx: &StatContext<'_>, now: Timestamp) {
        self.level = self.level.saturating_add(1);
        self.recompute(ctx, now);
    }

    /// Invests training points in one attribute.
    pub fn add_training(
        &mut self,
        stat: StatKind,
        points: f64,
        ctx: &StatContext<'_>,
        now: Timestamp,
    ) {
        if points.is_finite() && points > 0.0 {
            *self.training.get_mut(stat) += points;
        }
        self.recompute(ctx, now);
    }

    /// Consumes `count` training fruits.
    pub fn eat_fruit(&mut self, count: u32, ctx: &StatContext<'_>, now: Timestamp) {
        self.fruit_count = self.fruit_count.saturating_add(count);
        self.recompute(ctx, now);
    }

    /// Grants (or replaces) the daily lucky buff.
    pub fn grant_lucky(&mut self, buff: LuckyBuff, ctx: &StatContext<'_>, now: Timestamp) {
        self.lucky = Some(buff);
        self.recompute(ctx, now);
    }

    /// Drops the lucky buff once it has lapsed and rebuilds the cache.
    ///
    /// Returns `true` if a buff was dropped.
    pub fn expire_lucky(&mut self, ctx: &StatContext<'_>, now: Timestamp) -> bool {
        if !self.lucky.is_some_and(|buff| !buff.is_active(now)) {
            return false;
        }
        self.lucky = None;
        self.recompute(ctx, now);
        true
    }

    /// Moves to a cultivation tier.
    pub fn set_cultivation_tier(&mut self, tier: u32, ctx: &StatContext<'_>, now: Timestamp) {
        self.cultivation_tier = tier;
        self.recompute(ctx, now);
    }
}

impl Combatant for Character {
    fn profile(&self) -> CombatProfile {
        let d = &self.derived;
        CombatProfile {
            atk: d.atk,
            def: d.def,
            mag: d.mag,
            mdef: d.mdef,
            dex: d.dex,
            evade: d.evade_chance,
            element_atk: d.element_atk,
            specials: d.specials,
        }
    }

    fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    fn vitals_mut(&mut self) -> &mut Vitals {
        &mut self.vitals
    }

    fn status_mut(&mut self) -> &mut StatusMap {
        &mut self.status
    }
}
