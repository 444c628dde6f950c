//! The derived-stat pipeline.
//!
//! [`compute_derived`] is a pure function of a character's persisted fields,
//! the equipped items, the current [`Tunables`] and the current time (only the
//! daily lucky buff is time-boxed). Its output is a cache that must be rebuilt
//! after every input mutation; it is never persisted as a source of truth.
//!
//! # Ordering
//!
//! 1. Equipment: each piece's base stats, its set bonus (when the whole set is
//!    on) and its refine add-on.
//! 2. Flat bonuses: class base, per-level growth, cultivation tier, training
//!    investment, training fruit.
//! 3. Daily lucky multiplier on one attribute.
//! 4. Evade chance from base evade plus the strongest dodge source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{EquipSlot, WorldCatalog};
use crate::config::Tunables;
use crate::ids::{ClassId, ItemId, SkillId};
use crate::time::Timestamp;

use super::effects::{resolve_effects, EffectKind, ItemEffect, SpecialEffects};
use super::sets::{active_sets, granted_skill, SetDefinition};
use super::{StatKind, StatLine};

/// An item in an equipment slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquippedItem {
    /// Catalog key of the item
    pub item: ItemId,
    /// Forging level
    #[serde(default)]
    pub refine: u32,
}

impl EquippedItem {
    /// An unrefined item.
    #[must_use]
    pub fn new(item: impl Into<ItemId>) -> Self {
        Self {
            item: item.into(),
            refine: 0,
        }
    }

    /// Builder-style refine level.
    #[must_use]
    pub const fn refined(mut self, refine: u32) -> Self {
        self.refine = refine;
        self
    }
}

/// Equipped items by slot.
pub type Equipment = BTreeMap<EquipSlot, EquippedItem>;

/// Time-boxed multiplier on one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LuckyBuff {
    /// Attribute the multiplier applies to
    pub stat: StatKind,
    /// Multiplier applied to the final value
    pub multiplier: f64,
    /// Last instant the buff is active
    pub expires_at: Timestamp,
}

impl LuckyBuff {
    /// Returns `true` while the buff applies.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        now <= self.expires_at && self.multiplier.is_finite() && self.multiplier > 0.0
    }
}

/// Persisted inputs to the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct StatInputs<'a> {
    /// Character class
    pub class: &'a ClassId,
    /// Character level (1-based)
    pub level: u32,
    /// Cultivation tier (0 = none)
    pub cultivation_tier: u32,
    /// Equipped items
    pub equipment: &'a Equipment,
    /// Accumulated training points per attribute
    pub training: &'a StatLine,
    /// Training fruits consumed
    pub fruit_count: u32,
    /// Daily lucky buff, if granted
    pub lucky: Option<&'a LuckyBuff>,
}

/// Static data and tunables the pipeline reads.
#[derive(Debug, Clone, Copy)]
pub struct StatContext<'a> {
    /// Item templates
    pub catalog: &'a WorldCatalog,
    /// Current tunables
    pub tunables: &'a Tunables,
}

impl<'a> StatContext<'a> {
    /// Bundles catalog and tunables.
    #[must_use]
    pub const fn new(catalog: &'a WorldCatalog, tunables: &'a Tunables) -> Self {
        Self { catalog, tunables }
    }
}

/// Combat-ready attributes of a character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
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
    /// Spirit
    pub spirit: f64,
    /// Maximum health
    pub max_hp: f64,
    /// Maximum mana
    pub max_mp: f64,
    /// Chance to evade an incoming hit
    pub evade_chance: f64,
    /// Flat elemental damage per hit
    pub element_atk: f64,
    /// Resolved singleton item effects
    pub specials: SpecialEffects,
    /// Skills unlocked by complete sets, sorted
    pub granted_skills: Vec<SkillId>,
    /// Ids of the active sets, in table order
    pub active_sets: Vec<String>,
}

impl DerivedStats {
    /// Returns one attribute.
    #[must_use]
    pub const fn get(&self, kind: StatKind) -> f64 {
        match kind {
            StatKind::Atk => self.atk,
            StatKind::Def => self.def,
            StatKind::Mag => self.mag,
            StatKind::Mdef => self.mdef,
            StatKind::Dex => self.dex,
            StatKind::Spirit => self.spirit,
            StatKind::Hp => self.max_hp,
            StatKind::Mp => self.max_mp,
        }
    }

    fn from_line(line: &StatLine) -> Self {
        Self {
            atk: line.atk,
            def: line.def,
            mag: line.mag,
            mdef: line.mdef,
            dex: line.dex,
            spirit: line.spirit,
            max_hp: line.hp,
            max_mp: line.mp,
            ..Self::default()
        }
    }
}

/// Equipment contribution: summed piece stats plus the effects to resolve.
struct EquipmentFold<'a> {
    stats: StatLine,
    effects: Vec<&'a ItemEffect>,
    sets: Vec<&'a SetDefinition>,
}

fn fold_equipment<'a>(equipment: &Equipment, ctx: &StatContext<'a>) -> EquipmentFold<'a> {
    let tunables = ctx.tunables;
    let active = active_sets(equipment, &tunables.sets);

    let mut claimed: BTreeMap<EquipSlot, &SetDefinition> = BTreeMap::new();
    for descriptor in &active {
        for slot in &descriptor.slots {
            claimed.insert(*slot, descriptor.set);
        }
    }

    let mut fold = EquipmentFold {
        stats: StatLine::ZERO,
        effects: Vec::new(),
        sets: active.iter().map(|d| d.set).collect(),
    };

    for (slot, equipped) in equipment {
        // Unknown items contribute nothing.
        let Some(item) = ctx.catalog.item(&equipped.item) else {
            continue;
        };

        let mut piece = item.stats;
        if let Some(set) = claimed.get(slot) {
            piece += set.bonus_for(item);
        }

        let refine = f64::from(equipped.refine);
        *piece.get_mut(item.main_stat) += refine * tunables.refine_per_level;
        if *slot != EquipSlot::Weapon {
            piece.def += refine * tunables.refine_defense_per_level;
        }

        fold.stats += piece;
        fold.effects.extend(item.effects.iter());
    }

    fold
}

fn flat_bonuses(inputs: &StatInputs<'_>, tunables: &Tunables) -> StatLine {
    let class = tunables.classes.get(inputs.class).copied().unwrap_or_default();
    let levels_gained = f64::from(inputs.level.saturating_sub(1));

    class.base
        + class.per_level * levels_gained
        + tunables.cultivation_bonus(inputs.cultivation_tier)
        + inputs.training.scaled_by(&tunables.training_rate)
        + tunables.fruit_bonus * f64::from(inputs.fruit_count)
}

/// Recomputes a character's derived stats.
///
/// Idempotent: the same inputs, context and time yield identical output.
#[must_use]
pub fn compute_derived(
    inputs: &StatInputs<'_>,
    ctx: &StatContext<'_>,
    now: Timestamp,
) -> DerivedStats {
    let tunables = ctx.tunables;

    let equipment = fold_equipment(inputs.equipment, ctx);
    let mut total = equipment.stats + flat_bonuses(inputs, tunables);

    if let Some(lucky) = inputs.lucky.filter(|l| l.is_active(now)) {
        *total.get_mut(lucky.stat) *= lucky.multiplier;
    }

    let (specials, element_atk) = resolve_effects(equipment.effects.iter().copied());

    let mut granted_skills: Vec<SkillId> = equipment
        .sets
        .iter()
        .filter_map(|set| granted_skill(set, |id| ctx.catalog.item(id)))
        .collect();
    granted_skills.sort();
    granted_skills.dedup();

    let evade = (tunables.base_evade + specials.value(EffectKind::Dodge))
        .max(0.0)
        .min(tunables.max_evade.max(0.0));

    DerivedStats {
        evade_chance: evade,
        element_atk,
        specials,
        granted_skills,
        active_sets: equipment.sets.iter().map(|s| s.id.clone()).collect(),
        ..DerivedStats::from_line(&total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemTemplate;
    use crate::config::ClassTuning;
    use crate::stats::sets::SetPiece;

    fn sword() -> ItemTemplate {
        ItemTemplate {
            id: ItemId::new("sword"),
            slot: EquipSlot::Weapon,
            stats: StatLine::ZERO.with(StatKind::Atk, 100.0),
            main_stat: StatKind::Atk,
            effects: vec![ItemEffect::new(EffectKind::ElementAtk, 5.0)],
            grants_skill: Some(SkillId::new("cleave")),
        }
    }

    fn helm() -> ItemTemplate {
        ItemTemplate {
            id: ItemId::new("helm"),
            slot: EquipSlot::Helmet,
            stats: StatLine::ZERO.with(StatKind::Def, 50.0).with(StatKind::Hp, 200.0),
            main_stat: StatKind::Def,
            effects: vec![
                ItemEffect::new(EffectKind::Dodge, 0.1),
                ItemEffect::new(EffectKind::ElementAtk, 3.0),
            ],
            grants_skill: Some(SkillId::new("cleave")),
        }
    }

    fn catalog() -> WorldCatalog {
        let mut catalog = WorldCatalog::new();
        catalog.add_item(sword());
        catalog.add_item(helm());
        catalog
    }

    fn bare_tunables() -> Tunables {
        Tunables {
            training_rate: StatLine::ZERO,
            fruit_bonus: StatLine::ZERO,
            refine_per_level: 0.0,
            refine_defense_per_level: 0.0,
            ..Tunables::default()
        }
    }

    fn blade_set(rate: f64) -> SetDefinition {
        SetDefinition {
            id: "blade".into(),
            pieces: vec![
                SetPiece {
                    slot: EquipSlot::Weapon,
                    item: ItemId::new("sword"),
                },
                SetPiece {
                    slot: EquipSlot::Helmet,
                    item: ItemId::new("helm"),
                },
            ],
            rate,
            main_stat_only: false,
        }
    }

    struct Fixture {
        class: ClassId,
        equipment: Equipment,
        training: StatLine,
        fruit_count: u32,
        level: u32,
        tier: u32,
        lucky: Option<LuckyBuff>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                class: ClassId::new("warrior"),
                equipment: Equipment::new(),
                training: StatLine::ZERO,
                fruit_count: 0,
                level: 1,
                tier: 0,
                lucky: None,
            }
        }

        fn inputs(&self) -> StatInputs<'_> {
            StatInputs {
                class: &self.class,
                level: self.level,
                cultivation_tier: self.tier,
                equipment: &self.equipment,
                training: &self.training,
                fruit_count: self.fruit_count,
                lucky: self.lucky.as_ref(),
            }
        }

        fn derive(&self, catalog: &WorldCatalog, tunables: &Tunables) -> DerivedStats {
            let ctx = StatContext::new(catalog, tunables);
            compute_derived(&self.inputs(), &ctx, Timestamp::from_secs(100))
        }
    }

    mod equipment_tests {
        use super::*;

        #[test]
        fn sums_item_base_stats() {
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword"));
            f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm"));
            let d = f.derive(&catalog(), &bare_tunables());
            assert_eq!(d.atk, 100.0);
            assert_eq!(d.def, 50.0);
            assert_eq!(d.max_hp, 200.0);
        }

        #[test]
        fn unknown_item_contributes_nothing() {
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Ring, EquippedItem::new("lost_ring"));
            assert_eq!(f.derive(&catalog(), &bare_tunables()).atk, 0.0);
        }

        #[test]
        fn refine_adds_flat_per_level() {
            let mut tunables = bare_tunables();
            tunables.refine_per_level = 3.0;
            tunables.refine_defense_per_level = 1.0;
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword").refined(5));
            f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm").refined(2));
            let d = f.derive(&catalog(), &tunables);
            // sword main stat atk +15; helm main stat def +6, plus defense add-on +2
            assert_eq!(d.atk, 115.0);
            assert_eq!(d.def, 58.0);
        }

        #[test]
        fn set_bonus_applies_to_every_piece_only_when_complete() {
            let mut tunables = bare_tunables();
            tunables.sets = vec![blade_set(0.1)];
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword"));
            f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm"));

            let full = f.derive(&catalog(), &tunables);
            assert!((full.atk - 110.0).abs() < 1e-9);
            assert!((full.def - 55.0).abs() < 1e-9);
            assert!((full.max_hp - 220.0).abs() < 1e-9);
            assert_eq!(full.active_sets, vec!["blade".to_string()]);

            f.equipment.remove(&EquipSlot::Helmet);
            let partial = f.derive(&catalog(), &tunables);
            assert_eq!(partial.atk, 100.0);
            assert!(partial.active_sets.is_empty());
        }

        #[test]
        fn skill_granted_only_by_complete_agreeing_set() {
            let mut tunables = bare_tunables();
            tunables.sets = vec![blade_set(0.0)];
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword"));
            assert!(f.derive(&catalog(), &tunables).granted_skills.is_empty());

            f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm"));
            assert_eq!(
                f.derive(&catalog(), &tunables).granted_skills,
                vec![SkillId::new("cleave")]
            );
        }

        #[test]
        fn effects_resolve_into_evade_and_element() {
            let mut tunables = bare_tunables();
            tunables.base_evade = 0.05;
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword"));
            f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm"));
            let d = f.derive(&catalog(), &tunables);
            assert!((d.evade_chance - 0.15).abs() < 1e-12);
            assert!((d.element_atk - 8.0).abs() < 1e-12);
        }

        #[test]
        fn evade_is_capped() {
            let mut tunables = bare_tunables();
            tunables.base_evade = 0.45;
            tunables.max_evade = 0.5;
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm"));
            assert_eq!(f.derive(&catalog(), &tunables).evade_chance, 0.5);
        }

        #[test]
        fn malformed_evade_limits_floor_at_zero() {
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm"));

            let mut tunables = bare_tunables();
            tunables.max_evade = -0.1;
            assert_eq!(f.derive(&catalog(), &tunables).evade_chance, 0.0);

            tunables.max_evade = f64::NAN;
            tunables.base_evade = f64::NAN;
            assert_eq!(f.derive(&catalog(), &tunables).evade_chance, 0.0);
        }
    }

    mod flat_bonus_tests {
        use super::*;

        #[test]
        fn training_is_points_times_rate() {
            let mut tunables = bare_tunables();
            tunables.training_rate = StatLine::ZERO.with(StatKind::Atk, 0.1);
            let mut f = Fixture::new();
            f.training.atk = 50.0;
            f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword"));
            let d = f.derive(&catalog(), &tunables);
            assert!((d.atk - 105.0).abs() < 1e-9);
        }

        #[test]
        fn class_level_tier_and_fruit_stack() {
            let mut tunables = bare_tunables();
            tunables.classes.insert(
                ClassId::new("warrior"),
                ClassTuning {
                    base: StatLine::ZERO.with(StatKind::Hp, 100.0),
                    per_level: StatLine::ZERO.with(StatKind::Hp, 10.0),
                },
            );
            tunables.cultivation_tiers = vec![StatLine::ZERO.with(StatKind::Hp, 50.0)];
            tunables.fruit_bonus = StatLine::ZERO.with(StatKind::Hp, 2.0);

            let mut f = Fixture::new();
            f.level = 11;
            f.tier = 1;
            f.fruit_count = 7;
            let d = f.derive(&catalog(), &tunables);
            assert_eq!(d.max_hp, 100.0 + 100.0 + 50.0 + 14.0);
        }

        #[test]
        fn unknown_class_gets_no_base() {
            let f = Fixture::new();
            assert_eq!(f.derive(&catalog(), &bare_tunables()), DerivedStats::default());
        }
    }

    mod lucky_tests {
        use super::*;

        #[test]
        fn multiplies_one_attribute_after_flat_bonuses() {
            let mut tunables = bare_tunables();
            tunables.training_rate = StatLine::ZERO.with(StatKind::Atk, 1.0);
            let mut f = Fixture::new();
            f.training.atk = 20.0;
            f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword"));
            f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm"));
            f.lucky = Some(LuckyBuff {
                stat: StatKind::Atk,
                multiplier: 1.5,
                expires_at: Timestamp::from_secs(200),
            });
            let d = f.derive(&catalog(), &tunables);
            assert!((d.atk - 180.0).abs() < 1e-9);
            assert_eq!(d.def, 50.0);
        }

        #[test]
        fn expired_buff_is_ignored() {
            let mut f = Fixture::new();
            f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword"));
            f.lucky = Some(LuckyBuff {
                stat: StatKind::Atk,
                multiplier: 2.0,
                expires_at: Timestamp::from_secs(99),
            });
            assert_eq!(f.derive(&catalog(), &bare_tunables()).atk, 100.0);
        }
    }

    #[test]
    fn repeated_invocation_is_identical() {
        let mut tunables = Tunables::default();
        tunables.sets = vec![blade_set(0.15)];
        let mut f = Fixture::new();
        f.level = 9;
        f.training.dex = 33.0;
        f.equipment.insert(EquipSlot::Weapon, EquippedItem::new("sword").refined(3));
        f.equipment.insert(EquipSlot::Helmet, EquippedItem::new("helm").refined(1));
        let first = f.derive(&catalog(), &tunables);
        let second = f.derive(&catalog(), &tunables);
        assert_eq!(first, second);
        assert_eq!(first.atk.to_bits(), second.atk.to_bits());
    }
}
