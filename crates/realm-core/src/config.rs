//! Admin-tunable, hot-reloadable configuration.
//!
//! [`Tunables`] holds every number an operator may change without a restart:
//! category scaling and respawn delays, kill growth, class tables, training,
//! fruit and refine coefficients, set bonuses and status-effect strengths.
//!
//! # Malformed Values
//!
//! A live game must never crash on bad admin input. Parsing failures are
//! reported as [`ConfigError`], but a document that parses and carries
//! nonsensical numbers (NaN, negative rates, zero intervals) is repaired by
//! [`Tunables::sanitize`], which clamps each bad field to its default and
//! logs a warning naming the field.
//!
//! # Example
//!
//! ```
//! use realm_core::catalog::MobCategory;
//! use realm_core::config::Tunables;
//!
//! let tunables = Tunables::from_json_str(r#"{
//!     "categories": {"boss": {"respawn_secs": 1800}},
//!     "kill_growth": {"every": 0}
//! }"#).unwrap();
//!
//! assert_eq!(tunables.category(MobCategory::Boss).respawn_secs, 1800);
//! // A zero interval is replaced by the default.
//! assert_eq!(tunables.kill_growth.every, 10);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::catalog::MobCategory;
use crate::ids::ClassId;
use crate::persistence::RetryPolicy;
use crate::stats::{SetDefinition, StatKind, StatLine};

/// Errors raised while loading tunables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read tunables {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid tunables JSON.
    #[error("malformed tunables: {0}")]
    Parse(#[from] serde_json::Error),
}

// =============================================================================
// Category Tuning
// =============================================================================

/// Stat scaling and respawn delay for one [`MobCategory`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTuning {
    /// Health multiplier
    pub hp_scale: f64,
    /// Attack multiplier
    pub atk_scale: f64,
    /// Defense multiplier
    pub def_scale: f64,
    /// Magic defense multiplier
    pub mdef_scale: f64,
    /// Dexterity multiplier
    pub dex_scale: f64,
    /// Delay between death and respawn
    pub respawn_secs: u64,
}

impl CategoryTuning {
    const fn uniform(hp_scale: f64, other_scale: f64, respawn_secs: u64) -> Self {
        Self {
            hp_scale,
            atk_scale: other_scale,
            def_scale: other_scale,
            mdef_scale: other_scale,
            dex_scale: 1.0,
            respawn_secs,
        }
    }

    /// Default tuning for a category.
    #[must_use]
    pub const fn default_for(category: MobCategory) -> Self {
        match category {
            MobCategory::Trash => Self::uniform(1.0, 1.0, 30),
            MobCategory::Boss => Self::uniform(3.0, 1.5, 3600),
            MobCategory::WorldBoss => Self::uniform(10.0, 2.0, 3600),
            MobCategory::SpecialBoss => Self::uniform(5.0, 1.8, 3600),
        }
    }

    fn sanitize(&mut self, category: MobCategory) {
        let defaults = Self::default_for(category);
        let prefix = format!("categories.{category}");
        positive(&format!("{prefix}.hp_scale"), &mut self.hp_scale, defaults.hp_scale);
        positive(&format!("{prefix}.atk_scale"), &mut self.atk_scale, defaults.atk_scale);
        positive(&format!("{prefix}.def_scale"), &mut self.def_scale, defaults.def_scale);
        positive(&format!("{prefix}.mdef_scale"), &mut self.mdef_scale, defaults.mdef_scale);
        positive(&format!("{prefix}.dex_scale"), &mut self.dex_scale, defaults.dex_scale);
        if self.respawn_secs == 0 {
            warn!(field = %format!("{prefix}.respawn_secs"), "zero respawn delay, using default");
            self.respawn_secs = defaults.respawn_secs;
        }
    }
}

impl Default for CategoryTuning {
    fn default() -> Self {
        Self::default_for(MobCategory::Trash)
    }
}

/// Per-category tuning table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTable {
    /// Trash mobs
    pub trash: CategoryTuning,
    /// Room bosses
    pub boss: CategoryTuning,
    /// World bosses
    pub world_boss: CategoryTuning,
    /// Special bosses
    pub special_boss: CategoryTuning,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            trash: CategoryTuning::default_for(MobCategory::Trash),
            boss: CategoryTuning::default_for(MobCategory::Boss),
            world_boss: CategoryTuning::default_for(MobCategory::WorldBoss),
            special_boss: CategoryTuning::default_for(MobCategory::SpecialBoss),
        }
    }
}

impl CategoryTable {
    /// Tuning for one category.
    #[must_use]
    pub const fn get(&self, category: MobCategory) -> &CategoryTuning {
        match category {
            MobCategory::Trash => &self.trash,
            MobCategory::Boss => &self.boss,
            MobCategory::WorldBoss => &self.world_boss,
            MobCategory::SpecialBoss => &self.special_boss,
        }
    }

    fn get_mut(&mut self, category: MobCategory) -> &mut CategoryTuning {
        match category {
            MobCategory::Trash => &mut self.trash,
            MobCategory::Boss => &mut self.boss,
            MobCategory::WorldBoss => &mut self.world_boss,
            MobCategory::SpecialBoss => &mut self.special_boss,
        }
    }
}

// =============================================================================
// Kill Growth
// =============================================================================

/// Boss growth driven by a realm's kill counter.
///
/// Every `every` kills of a boss-class template raise subsequent spawns of it
/// by `percent` (additively per step).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillGrowth {
    /// Kills per growth step
    pub every: u64,
    /// Fractional stat increase per step
    pub percent: f64,
}

impl Default for KillGrowth {
    fn default() -> Self {
        Self {
            every: 10,
            percent: 0.05,
        }
    }
}

impl KillGrowth {
    /// Stat multiplier after `kills` kills.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn multiplier(&self, kills: u64) -> f64 {
        let steps = kills / self.every.max(1);
        1.0 + steps as f64 * self.percent
    }
}

// =============================================================================
// Class and Status Tuning
// =============================================================================

/// Base stats and per-level growth for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassTuning {
    /// Stats at level 1
    pub base: StatLine,
    /// Flat growth per level above 1
    pub per_level: StatLine,
}

/// Poison strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoisonTuning {
    /// Damage per tick as a fraction of the target's max health
    pub tick_damage_ratio: f64,
    /// Defense multiplier while poisoned
    pub def_multiplier: f64,
    /// Duration
    pub duration_secs: u64,
}

impl Default for PoisonTuning {
    fn default() -> Self {
        Self {
            tick_damage_ratio: 0.02,
            def_multiplier: 0.9,
            duration_secs: 10,
        }
    }
}

/// Armor-break strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmorBreakTuning {
    /// Defense multiplier while broken
    pub def_multiplier: f64,
    /// Duration
    pub duration_secs: u64,
}

impl Default for ArmorBreakTuning {
    fn default() -> Self {
        Self {
            def_multiplier: 0.5,
            duration_secs: 8,
        }
    }
}

/// Status effects applied by combat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTuning {
    /// Poison
    pub poison: PoisonTuning,
    /// Armor break
    pub armor_break: ArmorBreakTuning,
    /// Heal-block duration
    pub heal_block_secs: u64,
}

impl Default for StatusTuning {
    fn default() -> Self {
        Self {
            poison: PoisonTuning::default(),
            armor_break: ArmorBreakTuning::default(),
            heal_block_secs: 6,
        }
    }
}

// =============================================================================
// Tunables
// =============================================================================

/// Every admin-tunable number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Per-category scaling and respawn delays
    pub categories: CategoryTable,
    /// Boss kill growth
    pub kill_growth: KillGrowth,
    /// Target population for rooms that declare none (0 = spawn list length)
    pub default_room_population: usize,
    /// Per-class base and growth tables
    pub classes: BTreeMap<ClassId, ClassTuning>,
    /// Flat bonus per cultivation tier; index 0 is tier 1
    pub cultivation_tiers: Vec<StatLine>,
    /// Stat gained per accumulated training point
    pub training_rate: StatLine,
    /// Stat gained per training fruit consumed
    pub fruit_bonus: StatLine,
    /// Main-stat bonus per refine level of each equipped piece
    pub refine_per_level: f64,
    /// Defense bonus per refine level of each non-weapon piece
    pub refine_defense_per_level: f64,
    /// Equipment set definitions
    pub sets: Vec<SetDefinition>,
    /// Evade chance before equipment
    pub base_evade: f64,
    /// Evade chance ceiling
    pub max_evade: f64,
    /// Status-effect strengths
    pub status: StatusTuning,
    /// Persistence retry policy
    pub persistence: RetryPolicy,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            categories: CategoryTable::default(),
            kill_growth: KillGrowth::default(),
            default_room_population: 0,
            classes: BTreeMap::new(),
            cultivation_tiers: Vec::new(),
            training_rate: StatLine::ZERO
                .with(StatKind::Atk, 0.1)
                .with(StatKind::Def, 0.1)
                .with(StatKind::Mag, 0.1)
                .with(StatKind::Mdef, 0.1)
                .with(StatKind::Dex, 0.05)
                .with(StatKind::Spirit, 0.1)
                .with(StatKind::Hp, 1.0)
                .with(StatKind::Mp, 0.5),
            fruit_bonus: StatLine::ZERO.with(StatKind::Atk, 1.0).with(StatKind::Hp, 10.0),
            refine_per_level: 2.0,
            refine_defense_per_level: 1.0,
            sets: Vec::new(),
            base_evade: 0.0,
            max_evade: 0.5,
            status: StatusTuning::default(),
            persistence: RetryPolicy::default(),
        }
    }
}

impl Tunables {
    /// Parses and sanitizes a tunables document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the JSON does not match the schema.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut tunables: Self = serde_json::from_str(json)?;
        tunables.sanitize();
        Ok(tunables)
    }

    /// Reads, parses and sanitizes a tunables file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Tuning for a mob category.
    #[must_use]
    pub const fn category(&self, category: MobCategory) -> &CategoryTuning {
        self.categories.get(category)
    }

    /// Flat bonus for a cultivation tier. Tier 0 grants nothing; tiers past
    /// the end of the table use its last entry.
    #[must_use]
    pub fn cultivation_bonus(&self, tier: u32) -> StatLine {
        if tier == 0 {
            return StatLine::ZERO;
        }
        let index = usize::try_from(tier - 1).unwrap_or(usize::MAX);
        self.cultivation_tiers
            .get(index)
            .or_else(|| self.cultivation_tiers.last())
            .copied()
            .unwrap_or(StatLine::ZERO)
    }

    /// Clamps malformed values to safe defaults, logging each repair.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        for category in MobCategory::ALL {
            self.categories.get_mut(category).sanitize(category);
        }

        if self.kill_growth.every == 0 {
            warn!(field = "kill_growth.every", "zero growth interval, using default");
            self.kill_growth.every = defaults.kill_growth.every;
        }
        non_negative(
            "kill_growth.percent",
            &mut self.kill_growth.percent,
            defaults.kill_growth.percent,
        );

        for (class, tuning) in &mut self.classes {
            stat_line(&format!("classes.{class}.base"), &mut tuning.base);
            stat_line(&format!("classes.{class}.per_level"), &mut tuning.per_level);
        }
        for (i, tier) in self.cultivation_tiers.iter_mut().enumerate() {
            stat_line(&format!("cultivation_tiers[{i}]"), tier);
        }
        stat_line("training_rate", &mut self.training_rate);
        stat_line("fruit_bonus", &mut self.fruit_bonus);
        non_negative("refine_per_level", &mut self.refine_per_level, defaults.refine_per_level);
        non_negative(
            "refine_defense_per_level",
            &mut self.refine_defense_per_level,
            defaults.refine_defense_per_level,
        );

        for set in &mut self.sets {
            non_negative(&format!("sets.{}.rate", set.id), &mut set.rate, 0.0);
        }

        unit_interval("max_evade", &mut self.max_evade, defaults.max_evade);
        unit_interval("base_evade", &mut self.base_evade, defaults.base_evade);

        let status_defaults = StatusTuning::default();
        unit_interval(
            "status.poison.tick_damage_ratio",
            &mut self.status.poison.tick_damage_ratio,
            status_defaults.poison.tick_damage_ratio,
        );
        unit_interval(
            "status.poison.def_multiplier",
            &mut self.status.poison.def_multiplier,
            status_defaults.poison.def_multiplier,
        );
        unit_interval(
            "status.armor_break.def_multiplier",
            &mut self.status.armor_break.def_multiplier,
            status_defaults.armor_break.def_multiplier,
        );

        self.persistence.sanitize();
    }
}

fn positive(field: &str, value: &mut f64, default: f64) {
    if !value.is_finite() || *value <= 0.0 {
        warn!(field, value = *value, default, "non-positive tunable, using default");
        *value = default;
    }
}

fn non_negative(field: &str, value: &mut f64, default: f64) {
    if !value.is_finite() || *value < 0.0 {
        warn!(field, value = *value, default, "negative tunable, using default");
        *value = default;
    }
}

fn unit_interval(field: &str, value: &mut f64, default: f64) {
    if !value.is_finite() || !(0.0..=1.0).contains(value) {
        warn!(field, value = *value, default, "tunable outside [0, 1], using default");
        *value = default;
    }
}

fn stat_line(field: &str, line: &mut StatLine) {
    for kind in StatKind::ALL {
        let value = line.get_mut(kind);
        if !value.is_finite() {
            warn!(field, stat = %kind, "non-finite tunable, using zero");
            *value = 0.0;
        }
    }
}
