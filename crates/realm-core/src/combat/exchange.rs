//! One full attacker-on-defender exchange.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::StatusTuning;
use crate::entity::Combatant;
use crate::time::Timestamp;

use super::{
    apply_damage, apply_heal_block, apply_poison, calc_damage, calc_hit_chance, MAX_HIT_CHANCE,
};

/// Cap on the `defense` item effect's damage reduction.
pub const MAX_DEFENSE_REDUCTION: f64 = 0.75;

/// Result of [`resolve_exchange`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    /// Whether the first blow landed
    pub hit: bool,
    /// Total health removed
    pub damage: i64,
    /// Blows that landed
    pub strikes: u32,
    /// Whether the defender ended at zero health
    pub killed: bool,
    /// Whether poison was applied
    pub poisoned: bool,
    /// Whether heal block was applied
    pub heal_blocked: bool,
}

fn procs<R: Rng + ?Sized>(chance: Option<f64>, rng: &mut R) -> bool {
    match chance {
        Some(chance) if chance > 0.0 => rng.gen::<f64>() < chance,
        _ => false,
    }
}

/// Resolves one exchange.
///
/// 1. Hit roll against [`calc_hit_chance`] less the defender's evade.
/// 2. One blow, plus a second if the attacker's `combo` procs. Each blow is
///    [`calc_damage`] scaled by `1 + fury`, plus elemental attack, reduced by
///    the defender's `defense` effect (capped at [`MAX_DEFENSE_REDUCTION`]),
///    and never below 1.
/// 3. If the defender survives, `poison` and `healblock` may proc.
#[allow(clippy::cast_possible_truncation)]
pub fn resolve_exchange<A, D, R>(
    attacker: &A,
    defender: &mut D,
    power: f64,
    tuning: &StatusTuning,
    now: Timestamp,
    rng: &mut R,
) -> ExchangeOutcome
where
    A: Combatant + ?Sized,
    D: Combatant + ?Sized,
    R: Rng + ?Sized,
{
    let mut outcome = ExchangeOutcome::default();
    let offense = attacker.profile();
    let defense = defender.profile();

    let chance =
        (calc_hit_chance(&offense, &defense) - defense.evade.max(0.0)).clamp(0.0, MAX_HIT_CHANCE);
    if rng.gen::<f64>() >= chance {
        return outcome;
    }
    outcome.hit = true;

    let fury = 1.0 + offense.specials.fury.unwrap_or(0.0);
    let reduction = 1.0 - defense.specials.defense.unwrap_or(0.0).clamp(0.0, MAX_DEFENSE_REDUCTION);
    let element = offense.element_atk.max(0.0);
    let blows = if procs(offense.specials.combo, rng) { 2 } else { 1 };

    for _ in 0..blows {
        let base = calc_damage(&offense, defender, power, now, rng);
        #[allow(clippy::cast_precision_loss)]
        let scaled = ((base as f64 * fury + element) * reduction).floor();
        let blow = if scaled.is_finite() { (scaled as i64).max(1) } else { 1 };
        outcome.damage += apply_damage(defender, blow);
        outcome.strikes += 1;
        if defender.vitals().is_dead() {
            break;
        }
    }

    outcome.killed = defender.vitals().is_dead();
    if outcome.killed {
        return outcome;
    }
    if procs(offense.specials.poison, rng) {
        outcome.poisoned = apply_poison(defender, &tuning.poison, now);
    }
    if procs(offense.specials.heal_block, rng) {
        apply_heal_block(defender, tuning.heal_block_secs, now);
        outcome.heal_blocked = true;
    }
    outcome
}
