//! Combat-capable entities.
//!
//! The combat engine never looks at storage directly. It reads a
//! [`CombatProfile`] and mutates [`Vitals`] and [`StatusMap`] through the
//! [`Combatant`] trait, which both [`MobInstance`] and [`Character`]
//! implement.
//!
//! # Example
//!
//! ```
//! use realm_core::entity::Vitals;
//!
//! let mut vitals = Vitals::full(100, 20);
//! assert_eq!(vitals.damage(150), 100);
//! assert!(vitals.is_dead());
//! assert_eq!(vitals.heal(500), 100);
//! assert_eq!(vitals.hp, 100);
//! ```

pub mod character;
pub mod mob;

use serde::{Deserialize, Serialize};

use crate::stats::SpecialEffects;
use crate::status::StatusMap;

pub use character::Character;
pub use mob::{MobFlags, MobInstance};

/// Health and mana pools.
///
/// Every mutator clamps into `[0, max]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    /// Current health
    pub hp: i64,
    /// Maximum health
    pub max_hp: i64,
    /// Current mana
    pub mp: i64,
    /// Maximum mana
    pub max_mp: i64,
}

impl Vitals {
    /// Full pools.
    #[must_use]
    pub const fn full(max_hp: i64, max_mp: i64) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            mp: max_mp,
            max_mp,
        }
    }

    /// Removes up to `amount` health, returning the amount actually removed.
    pub fn damage(&mut self, amount: i64) -> i64 {
        let before = self.hp;
        self.hp = (self.hp - amount.max(0)).clamp(0, self.max_hp);
        before - self.hp
    }

    /// Restores up to `amount` health, returning the amount actually restored.
    pub fn heal(&mut self, amount: i64) -> i64 {
        let before = self.hp;
        self.hp = self.hp.saturating_add(amount.max(0)).clamp(0, self.max_hp);
        self.hp - before
    }

    /// Sets new maxima, clamping current pools into them.
    pub fn set_max(&mut self, max_hp: i64, max_mp: i64) {
        self.max_hp = max_hp.max(1);
        self.max_mp = max_mp.max(0);
        self.hp = self.hp.clamp(0, self.max_hp);
        self.mp = self.mp.clamp(0, self.max_mp);
    }

    /// Returns `true` at zero health.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Returns `true` when alive but below maximum health.
    #[must_use]
    pub const fn is_damaged(&self) -> bool {
        self.hp > 0 && self.hp < self.max_hp
    }
}

/// The numbers one side of an exchange contributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatProfile {
    /// Physical attack
    pub atk: f64,
    /// Physical defense
    pub def: f64,
    /// Magic attack
    pub mag: f64,
    /// Magic defense
    pub mdef: f64,
    /// Dexterity
    pub dex: f64,
    /// Chance to evade an incoming hit
    pub evade: f64,
    /// Flat elemental damage per hit
    pub element_atk: f64,
    /// Singleton item effects
    pub specials: SpecialEffects,
}

/// Anything the combat engine can act on.
pub trait Combatant {
    /// Current combat numbers.
    fn profile(&self) -> CombatProfile;

    /// Health and mana.
    fn vitals(&self) -> &Vitals;

    /// Mutable health and mana.
    fn vitals_mut(&mut self) -> &mut Vitals;

    /// Status effects, for lazy expiry-checked reads.
    fn status_mut(&mut self) -> &mut StatusMap;

    /// Whether poison is refused outright.
    fn is_poison_immune(&self) -> bool {
        false
    }
}
