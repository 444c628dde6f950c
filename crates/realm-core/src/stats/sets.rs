//! Table-driven equipment set matching.
//!
//! Each [`SetDefinition`] lists the `(slot, item)` pairs it requires. A set is
//! active only when every pair is equipped at once; there is no partial
//! credit. Matching goes through one generic [`subset_match`] helper so new
//! sets are data, not code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{EquipSlot, ItemTemplate};
use crate::ids::{ItemId, SkillId};

use super::{Equipment, StatKind, StatLine};

/// One required piece of a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPiece {
    /// Slot the piece must occupy
    pub slot: EquipSlot,
    /// Item that must be in that slot
    pub item: ItemId,
}

/// A configured equipment set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDefinition {
    /// Set key
    pub id: String,
    /// Required pieces
    pub pieces: Vec<SetPiece>,
    /// Bonus as a fraction of each contributing piece's stats
    #[serde(default)]
    pub rate: f64,
    /// Restrict the bonus to each piece's main stat (defensive stats still scale)
    #[serde(default)]
    pub main_stat_only: bool,
}

impl SetDefinition {
    /// Stat bonus this set grants to one of its pieces.
    #[must_use]
    pub fn bonus_for(&self, item: &ItemTemplate) -> StatLine {
        let mut bonus = StatLine::ZERO;
        for kind in StatKind::ALL {
            let applies = !self.main_stat_only || kind == item.main_stat || kind.is_defensive();
            if applies {
                *bonus.get_mut(kind) = item.stats.get(kind) * self.rate;
            }
        }
        bonus
    }
}

/// An active set and the slots it claims.
#[derive(Debug, Clone, PartialEq)]
pub struct SetBonusDescriptor<'a> {
    /// The matched definition
    pub set: &'a SetDefinition,
    /// Slots whose piece receives this set's bonus
    pub slots: Vec<EquipSlot>,
}

/// Returns `true` when every required `(key, value)` pair is present in
/// `equipped`. An empty requirement never matches.
pub fn subset_match<'a, K, V, W>(
    required: impl IntoIterator<Item = (&'a K, &'a V)>,
    equipped: &BTreeMap<K, W>,
    same: impl Fn(&V, &W) -> bool,
) -> bool
where
    K: Ord + 'a,
    V: 'a,
{
    let mut any = false;
    for (key, want) in required {
        any = true;
        match equipped.get(key) {
            Some(have) if same(want, have) => {}
            _ => return false,
        }
    }
    any
}

/// Returns the active sets in table order.
///
/// A slot is claimed by the first active set that lists it; later sets only
/// receive the slots still unclaimed.
#[must_use]
pub fn active_sets<'a>(
    equipment: &Equipment,
    sets: &'a [SetDefinition],
) -> Vec<SetBonusDescriptor<'a>> {
    let mut claimed: Vec<EquipSlot> = Vec::new();
    let mut active = Vec::new();
    for set in sets {
        let required = set.pieces.iter().map(|p| (&p.slot, &p.item));
        if !subset_match(required, equipment, |want, have| *want == have.item) {
            continue;
        }
        let slots: Vec<EquipSlot> = set
            .pieces
            .iter()
            .map(|p| p.slot)
            .filter(|slot| !claimed.contains(slot))
            .collect();
        claimed.extend(slots.iter().copied());
        active.push(SetBonusDescriptor { set, slots });
    }
    active
}

/// Returns the skill an active set grants, if every piece agrees on it.
pub fn granted_skill<'a>(
    set: &SetDefinition,
    lookup: impl Fn(&ItemId) -> Option<&'a ItemTemplate>,
) -> Option<SkillId> {
    let mut granted: Option<&SkillId> = None;
    for piece in &set.pieces {
        let skill = lookup(&piece.item)?.grants_skill.as_ref()?;
        match granted {
            None => granted = Some(skill),
            Some(existing) if existing == skill => {}
            Some(_) => return None,
        }
    }
    granted.cloned()
}
