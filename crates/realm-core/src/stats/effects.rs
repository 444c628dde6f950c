//! Item special effects.
//!
//! Singleton effects (`fury`, `defense`, `dodge`, `poison`, `combo`,
//! `healblock`) apply from at most one equipped source: when several items
//! carry the same kind, only the strongest counts. Elemental attack is the
//! exception and sums across every equipped item.

use serde::{Deserialize, Serialize};

/// Kinds of item special effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Fractional bonus to outgoing damage.
    Fury,
    /// Fractional reduction of incoming damage.
    Defense,
    /// Added to evade chance.
    Dodge,
    /// Chance on hit to poison the target.
    Poison,
    /// Chance on hit to strike a second time.
    Combo,
    /// Chance on hit to block the target's healing.
    #[serde(alias = "healblock")]
    HealBlock,
    /// Flat elemental damage added to each hit.
    #[serde(alias = "element")]
    ElementAtk,
}

impl EffectKind {
    /// Returns `true` for kinds that apply from a single source only.
    #[must_use]
    pub const fn is_singleton(self) -> bool {
        !matches!(self, Self::ElementAtk)
    }
}

/// One effect carried by an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemEffect {
    /// Effect kind
    pub kind: EffectKind,
    /// Effect strength
    pub value: f64,
}

impl ItemEffect {
    /// Creates an effect.
    #[must_use]
    pub const fn new(kind: EffectKind, value: f64) -> Self {
        Self { kind, value }
    }
}

/// Resolved singleton effects. `None` means no equipped source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecialEffects {
    /// Outgoing damage bonus
    pub fury: Option<f64>,
    /// Incoming damage reduction
    pub defense: Option<f64>,
    /// Evade bonus
    pub dodge: Option<f64>,
    /// Poison proc chance
    pub poison: Option<f64>,
    /// Extra strike chance
    pub combo: Option<f64>,
    /// Heal-block proc chance
    pub heal_block: Option<f64>,
}

impl SpecialEffects {
    fn slot_mut(&mut self, kind: EffectKind) -> Option<&mut Option<f64>> {
        match kind {
            EffectKind::Fury => Some(&mut self.fury),
            EffectKind::Defense => Some(&mut self.defense),
            EffectKind::Dodge => Some(&mut self.dodge),
            EffectKind::Poison => Some(&mut self.poison),
            EffectKind::Combo => Some(&mut self.combo),
            EffectKind::HealBlock => Some(&mut self.heal_block),
            EffectKind::ElementAtk => None,
        }
    }

    /// Returns the value for a singleton kind, or `0.0` if absent.
    #[must_use]
    pub fn value(&self, kind: EffectKind) -> f64 {
        let v = match kind {
            EffectKind::Fury => self.fury,
            EffectKind::Defense => self.defense,
            EffectKind::Dodge => self.dodge,
            EffectKind::Poison => self.poison,
            EffectKind::Combo => self.combo,
            EffectKind::HealBlock => self.heal_block,
            EffectKind::ElementAtk => None,
        };
        v.unwrap_or(0.0)
    }
}

/// Folds equipped effects into singleton effects plus summed elemental attack.
///
/// Non-finite or negative values are ignored.
pub fn resolve_effects<'a>(
    effects: impl IntoIterator<Item = &'a ItemEffect>,
) -> (SpecialEffects, f64) {
    let mut specials = SpecialEffects::default();
    let mut element_atk = 0.0;
    for effect in effects {
        if !effect.value.is_finite() || effect.value < 0.0 {
            continue;
        }
        match specials.slot_mut(effect.kind) {
            Some(slot) => {
                let strongest = slot.map_or(effect.value, |current| current.max(effect.value));
                *slot = Some(strongest);
            }
            None => element_atk += effect.value,
        }
    }
    (specials, element_atk)
}
