//! Runtime mob instances.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::catalog::{MobCategory, MobTemplate};
use crate::config::CategoryTuning;
use crate::ids::{MobId, TemplateId};
use crate::status::StatusMap;

use super::{CombatProfile, Combatant, Vitals};

bitflags! {
    /// Lifecycle flags for a mob instance.
    ///
    /// Flagged creatures are removed outright on death instead of being
    /// scheduled for respawn.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MobFlags: u8 {
        /// Summoned by a player or another mob
        const SUMMONED = 0b0000_0001;
        /// Event or script spawn with no slot
        const TEMPORARY = 0b0000_0010;
    }
}

impl MobFlags {
    /// Returns `true` if death removes the mob instead of scheduling it.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.intersects(Self::SUMMONED.union(Self::TEMPORARY))
    }
}

/// A materialized creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobInstance {
    /// Realm-unique id
    pub id: MobId,
    /// Template this instance was built from
    pub template: TemplateId,
    /// Display name
    pub name: String,
    /// Template category
    pub category: MobCategory,
    /// Spawn slot, `None` for summoned and temporary mobs
    pub slot: Option<usize>,
    /// Lifecycle flags
    pub flags: MobFlags,
    /// Health pool
    pub vitals: Vitals,
    /// Scaled physical attack
    pub atk: i64,
    /// Scaled physical defense
    pub def: i64,
    /// Scaled magic defense
    pub mdef: i64,
    /// Scaled dexterity
    pub dex: i64,
    /// Active status effects
    pub status: StatusMap,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn scale(base: i64, factor: f64) -> i64 {
    ((base as f64) * factor).round().max(0.0) as i64
}

impl MobInstance {
    /// Builds a full-health instance from a template.
    ///
    /// Base stats are multiplied by the category tuning and by
    /// `growth` (the kill-growth multiplier, `1.0` when none applies).
    #[must_use]
    pub fn spawn(
        id: MobId,
        template: &MobTemplate,
        tuning: &CategoryTuning,
        growth: f64,
        slot: Option<usize>,
        flags: MobFlags,
    ) -> Self {
        let max_hp = scale(template.hp, tuning.hp_scale * growth).max(1);
        Self {
            id,
            template: template.id.clone(),
            name: template.name.clone(),
            category: template.category,
            slot,
            flags,
            vitals: Vitals::full(max_hp, 0),
            atk: scale(template.atk, tuning.atk_scale * growth),
            def: scale(template.def, tuning.def_scale * growth),
            mdef: scale(template.mdef, tuning.mdef_scale * growth),
            dex: scale(template.dex, tuning.dex_scale * growth),
            status: StatusMap::new(),
        }
    }

    /// Returns `true` while health is above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.vitals.is_dead()
    }
}

impl Combatant for MobInstance {
    #[allow(clippy::cast_precision_loss)]
    fn profile(&self) -> CombatProfile {
        CombatProfile {
            atk: self.atk as f64,
            def: self.def as f64,
            mag: self.atk as f64,
            mdef: self.mdef as f64,
            dex: self.dex as f64,
            ..CombatProfile::default()
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

    fn is_poison_immune(&self) -> bool {
        self.category.is_poison_immune()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ogre() -> MobTemplate {
        MobTemplate {
            id: TemplateId::new("ogre"),
            name: "Ogre".into(),
            category: MobCategory::Boss,
            hp: 100,
            atk: 20,
            def: 10,
            mdef: 5,
            dex: 7,
            respawn_secs: None,
        }
    }

    #[test]
    fn spawn_scales_by_category_and_growth() {
        let tuning = CategoryTuning::default_for(MobCategory::Boss);
        let mob =
            MobInstance::spawn(MobId::new(1), &ogre(), &tuning, 1.1, Some(0), MobFlags::empty());
        // 100 * 3.0 * 1.1, 20 * 1.5 * 1.1, 10 * 1.5 * 1.1
        assert_eq!(mob.vitals.max_hp, 330);
        assert_eq!(mob.vitals.hp, 330);
        assert_eq!(mob.atk, 33);
        assert_eq!(mob.def, 17);
        assert_eq!(mob.dex, 8);
    }

    #[test]
    fn spawn_never_yields_zero_health() {
        let mut template = ogre();
        template.hp = 0;
        let tuning = CategoryTuning::default_for(MobCategory::Trash);
        let mob =
            MobInstance::spawn(MobId::new(1), &template, &tuning, 1.0, None, MobFlags::empty());
        assert_eq!(mob.vitals.max_hp, 1);
        assert!(mob.is_alive());
    }

    #[test]
    fn transient_flags() {
        assert!(!MobFlags::empty().is_transient());
        assert!(MobFlags::SUMMONED.is_transient());
        assert!(MobFlags::TEMPORARY.is_transient());
    }

    #[test]
    fn poison_immunity_follows_category() {
        let tuning = CategoryTuning::default_for(MobCategory::WorldBoss);
        let mut template = ogre();
        template.category = MobCategory::WorldBoss;
        let mob =
            MobInstance::spawn(MobId::new(1), &template, &tuning, 1.0, None, MobFlags::empty());
        assert!(mob.is_poison_immune());
    }
}
