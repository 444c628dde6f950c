//! Combat resolution.
//!
//! Every function here is deterministic given its inputs, the supplied
//! `now` and the supplied random source. Randomness is always injected, so a
//! realm's fights replay exactly from its seed and tests can pin rolls with
//! `StepRng`.
//!
//! # Damage
//!
//! ```text
//! roll   = atk + uniform(0, atk / 2)
//! effDef = floor((def + buff) * debuffProduct)
//! effDef = effDef + uniform(0, effDef / 2)
//! damage = max(1, floor((roll - effDef) * power))
//! ```
//!
//! Debuff multipliers (poison, armor break) compose multiplicatively and
//! expire independently. Reading them goes through [`StatusMap`], which drops
//! expired entries as a side effect.
//!
//! # Invariants
//!
//! - Damage is always at least 1.
//! - Hit chance always lies in `[MIN_HIT_CHANCE, MAX_HIT_CHANCE]`.
//! - Health is always clamped to `[0, max_hp]`.
//!
//! [`StatusMap`]: crate::status::StatusMap

mod exchange;

pub use exchange::{resolve_exchange, ExchangeOutcome, MAX_DEFENSE_REDUCTION};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ArmorBreakTuning, PoisonTuning};
use crate::entity::{CombatProfile, Combatant};
use crate::status::{StatusEffect, StatusKind};
use crate::time::Timestamp;

/// Hit chance with equal dexterity.
pub const BASE_HIT_CHANCE: f64 = 0.75;
/// Hit chance gained per point of dexterity advantage.
pub const HIT_PER_DEX: f64 = 0.01;
/// Floor on hit chance.
pub const MIN_HIT_CHANCE: f64 = 0.20;
/// Ceiling on hit chance.
pub const MAX_HIT_CHANCE: f64 = 0.95;

// =============================================================================
// Rolls
// =============================================================================

/// Chance that `attacker` lands a blow on `defender`.
#[must_use]
pub fn calc_hit_chance(attacker: &CombatProfile, defender: &CombatProfile) -> f64 {
    let chance = BASE_HIT_CHANCE + HIT_PER_DEX * (attacker.dex - defender.dex);
    if chance.is_nan() {
        return MIN_HIT_CHANCE;
    }
    chance.clamp(MIN_HIT_CHANCE, MAX_HIT_CHANCE)
}

#[allow(clippy::cast_possible_truncation)]
fn whole(value: f64) -> i64 {
    if value.is_finite() {
        value.floor().max(0.0) as i64
    } else {
        0
    }
}

/// `value + uniform(0, value / 2)`.
fn spread<R: Rng + ?Sized>(value: i64, rng: &mut R) -> i64 {
    value.saturating_add(rng.gen_range(0..=value / 2))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn mitigate(roll: i64, defense: i64, power: f64) -> i64 {
    let raw = ((roll - defense) as f64 * power).floor();
    if raw.is_finite() {
        (raw as i64).max(1)
    } else {
        1
    }
}

/// Physical damage from one blow.
///
/// The defender's status map is read (and expired entries dropped) to find
/// the active defense buff and debuff multipliers.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn calc_damage<D, R>(
    attacker: &CombatProfile,
    defender: &mut D,
    power: f64,
    now: Timestamp,
    rng: &mut R,
) -> i64
where
    D: Combatant + ?Sized,
    R: Rng + ?Sized,
{
    let base_def = whole(defender.profile().def);
    let status = defender.status_mut();
    let buffed = base_def + status.def_bonus(now);
    let multiplier = status.def_multiplier(now);

    let roll = spread(whole(attacker.atk), rng);
    let eff_def = spread(whole(buffed as f64 * multiplier), rng);
    mitigate(roll, eff_def, power)
}

/// Magic damage from one blow: `mag` against `mdef`.
///
/// The defense buff applies to magic defense; physical debuffs do not.
pub fn calc_magic_damage<D, R>(
    attacker: &CombatProfile,
    defender: &mut D,
    power: f64,
    now: Timestamp,
    rng: &mut R,
) -> i64
where
    D: Combatant + ?Sized,
    R: Rng + ?Sized,
{
    let base_mdef = whole(defender.profile().mdef);
    let buffed = base_mdef + defender.status_mut().def_bonus(now);

    let roll = spread(whole(attacker.mag), rng);
    let eff_def = spread(buffed.max(0), rng);
    mitigate(roll, eff_def, power)
}

// =============================================================================
// Health
// =============================================================================

/// Removes health, clamped at zero. Returns the amount removed.
pub fn apply_damage<T: Combatant + ?Sized>(target: &mut T, amount: i64) -> i64 {
    target.vitals_mut().damage(amount)
}

/// Restores health, clamped at max. Returns the amount restored.
///
/// Refused (returns 0) while heal block is active.
pub fn apply_healing<T: Combatant + ?Sized>(target: &mut T, amount: i64, now: Timestamp) -> i64 {
    if target.status_mut().is_active(StatusKind::HealBlock, now) {
        return 0;
    }
    target.vitals_mut().heal(amount)
}

// =============================================================================
// Status Application
// =============================================================================

/// Poisons the target.
///
/// Returns `false` without touching the target if it is poison-immune.
/// Tick damage is a fraction of max health, at least 1.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn apply_poison<T: Combatant + ?Sized>(
    target: &mut T,
    tuning: &PoisonTuning,
    now: Timestamp,
) -> bool {
    if target.is_poison_immune() {
        return false;
    }
    let tick = whole(target.vitals().max_hp as f64 * tuning.tick_damage_ratio).max(1);
    target.status_mut().insert(
        StatusKind::Poison,
        StatusEffect {
            expires_at: now.plus_secs(tuning.duration_secs),
            multiplier: tuning.def_multiplier,
            magnitude: tick,
        },
    );
    true
}

/// Applies the armor-break defense debuff.
pub fn apply_armor_break<T: Combatant + ?Sized>(
    target: &mut T,
    tuning: &ArmorBreakTuning,
    now: Timestamp,
) {
    target.status_mut().insert(
        StatusKind::ArmorBreak,
        StatusEffect::multiplier(now.plus_secs(tuning.duration_secs), tuning.def_multiplier),
    );
}

/// Blocks healing for `secs` seconds.
pub fn apply_heal_block<T: Combatant + ?Sized>(target: &mut T, secs: u64, now: Timestamp) {
    target
        .status_mut()
        .insert(StatusKind::HealBlock, StatusEffect::magnitude(now.plus_secs(secs), 0));
}

/// Grants a flat defense buff for `secs` seconds.
pub fn apply_defense_up<T: Combatant + ?Sized>(
    target: &mut T,
    amount: i64,
    secs: u64,
    now: Timestamp,
) {
    target
        .status_mut()
        .insert(StatusKind::DefenseUp, StatusEffect::magnitude(now.plus_secs(secs), amount));
}

/// What one status tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Health removed by poison
    pub poison_damage: i64,
    /// Effects still active after the tick
    pub active: Vec<StatusKind>,
}

/// Advances status effects by one tick.
///
/// Poison deals its magnitude but never takes the target below 1 health.
/// Every kind is read, so anything expired is removed.
pub fn tick_status<T: Combatant + ?Sized>(target: &mut T, now: Timestamp) -> TickReport {
    let mut report = TickReport::default();
    for kind in [
        StatusKind::Poison,
        StatusKind::ArmorBreak,
        StatusKind::DefenseUp,
        StatusKind::HealBlock,
    ] {
        let Some(effect) = target.status_mut().get(kind, now) else {
            continue;
        };
        if kind == StatusKind::Poison {
            let room = (target.vitals().hp - 1).max(0);
            report.poison_damage = target.vitals_mut().damage(effect.magnitude.min(room));
        }
        report.active.push(kind);
    }
    report
}
