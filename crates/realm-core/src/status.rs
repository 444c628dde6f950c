//! Timed status effects with lazy, read-triggered expiry.
//!
//! There is no sweep pass. Every read through [`StatusMap`] checks the entry
//! against the supplied time and deletes it when `now > expires_at`, so an
//! expired effect is never observed and a second read sees it absent. This is
//! why the accessors take `&mut self`.
//!
//! # Example
//!
//! ```
//! use realm_core::status::{StatusEffect, StatusKind, StatusMap};
//! use realm_core::time::Timestamp;
//!
//! let mut status = StatusMap::new();
//! status.insert(StatusKind::ArmorBreak, StatusEffect::multiplier(Timestamp::from_secs(10), 0.5));
//!
//! assert_eq!(status.def_multiplier(Timestamp::from_secs(10)), 0.5);
//! assert_eq!(status.def_multiplier(Timestamp::from_secs(11)), 1.0);
//! assert!(status.is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Named status effects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Damage over time; also weakens defense.
    Poison,
    /// Defense multiplier debuff.
    ArmorBreak,
    /// Flat defense buff.
    DefenseUp,
    /// Healing is refused while active.
    HealBlock,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poison => write!(f, "poison"),
            Self::ArmorBreak => write!(f, "armor_break"),
            Self::DefenseUp => write!(f, "defense_up"),
            Self::HealBlock => write!(f, "heal_block"),
        }
    }
}

/// One active effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Last instant at which the effect is still active.
    pub expires_at: Timestamp,
    /// Multiplicative strength (defense multiplier for debuffs).
    pub multiplier: f64,
    /// Additive strength (poison damage per tick, defense buff amount).
    pub magnitude: i64,
}

impl StatusEffect {
    /// An effect carrying only a multiplier.
    #[must_use]
    pub const fn multiplier(expires_at: Timestamp, multiplier: f64) -> Self {
        Self {
            expires_at,
            multiplier,
            magnitude: 0,
        }
    }

    /// An effect carrying only a magnitude.
    #[must_use]
    pub const fn magnitude(expires_at: Timestamp, magnitude: i64) -> Self {
        Self {
            expires_at,
            multiplier: 1.0,
            magnitude,
        }
    }

    /// Returns `true` once `now` is past the expiry instant.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// Status effects on one entity, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMap {
    effects: BTreeMap<StatusKind, StatusEffect>,
}

impl StatusMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an effect, replacing any active effect of the same kind.
    pub fn insert(&mut self, kind: StatusKind, effect: StatusEffect) {
        self.effects.insert(kind, effect);
    }

    /// Removes an effect outright.
    pub fn remove(&mut self, kind: StatusKind) -> Option<StatusEffect> {
        self.effects.remove(&kind)
    }

    /// Returns an active effect, deleting it first if it has expired.
    pub fn get(&mut self, kind: StatusKind, now: Timestamp) -> Option<StatusEffect> {
        let effect = *self.effects.get(&kind)?;
        if effect.is_expired(now) {
            self.effects.remove(&kind);
            return None;
        }
        Some(effect)
    }

    /// Returns `true` if the effect is active. Expired entries are deleted.
    pub fn is_active(&mut self, kind: StatusKind, now: Timestamp) -> bool {
        self.get(kind, now).is_some()
    }

    /// Returns the effect's multiplier, or `1.0` if absent or expired.
    pub fn multiplier_of(&mut self, kind: StatusKind, now: Timestamp) -> f64 {
        self.get(kind, now).map_or(1.0, |e| e.multiplier)
    }

    /// Product of all active defense debuff multipliers.
    ///
    /// Poison and armor break compose multiplicatively and expire
    /// independently.
    pub fn def_multiplier(&mut self, now: Timestamp) -> f64 {
        self.multiplier_of(StatusKind::Poison, now)
            * self.multiplier_of(StatusKind::ArmorBreak, now)
    }

    /// Flat defense from an active buff.
    pub fn def_bonus(&mut self, now: Timestamp) -> i64 {
        self.get(StatusKind::DefenseUp, now).map_or(0, |e| e.magnitude)
    }

    /// Number of entries, including any not yet observed as expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Removes every effect.
    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Raw view of stored entries without triggering expiry.
    ///
    /// Used for persistence snapshots; simulation code should use [`Self::get`].
    #[must_use]
    pub fn entries(&self) -> &BTreeMap<StatusKind, StatusEffect> {
        &self.effects
    }
}
