//! Per-attribute stat vectors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul};

/// A single character attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Physical attack
    Atk,
    /// Physical defense
    Def,
    /// Magic attack
    Mag,
    /// Magic defense
    Mdef,
    /// Dexterity (accuracy and evasion)
    Dex,
    /// Spirit
    Spirit,
    /// Maximum health
    Hp,
    /// Maximum mana
    Mp,
}

impl StatKind {
    /// Every attribute, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Atk,
        Self::Def,
        Self::Mag,
        Self::Mdef,
        Self::Dex,
        Self::Spirit,
        Self::Hp,
        Self::Mp,
    ];

    /// Attributes that main-stat-only set bonuses still scale.
    pub const DEFENSIVE: [Self; 3] = [Self::Def, Self::Mdef, Self::Hp];

    /// Returns `true` for attributes in [`Self::DEFENSIVE`].
    #[must_use]
    pub fn is_defensive(self) -> bool {
        Self::DEFENSIVE.contains(&self)
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Atk => "atk",
            Self::Def => "def",
            Self::Mag => "mag",
            Self::Mdef => "mdef",
            Self::Dex => "dex",
            Self::Spirit => "spirit",
            Self::Hp => "hp",
            Self::Mp => "mp",
        };
        f.write_str(name)
    }
}

/// One value per [`StatKind`].
///
/// Used for item base stats, class tables, training points and rates alike.
/// Missing fields deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatLine {
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
    pub hp: f64,
    /// Maximum mana
    pub mp: f64,
}

impl StatLine {
    /// All-zero line.
    pub const ZERO: Self = Self {
        atk: 0.0,
        def: 0.0,
        mag: 0.0,
        mdef: 0.0,
        dex: 0.0,
        spirit: 0.0,
        hp: 0.0,
        mp: 0.0,
    };

    /// Returns the value for one attribute.
    #[must_use]
    pub const fn get(&self, kind: StatKind) -> f64 {
        match kind {
            StatKind::Atk => self.atk,
            StatKind::Def => self.def,
            StatKind::Mag => self.mag,
            StatKind::Mdef => self.mdef,
            StatKind::Dex => self.dex,
            StatKind::Spirit => self.spirit,
            StatKind::Hp => self.hp,
            StatKind::Mp => self.mp,
        }
    }

    /// Returns a mutable reference to one attribute.
    pub fn get_mut(&mut self, kind: StatKind) -> &mut f64 {
        match kind {
            StatKind::Atk => &mut self.atk,
            StatKind::Def => &mut self.def,
            StatKind::Mag => &mut self.mag,
            StatKind::Mdef => &mut self.mdef,
            StatKind::Dex => &mut self.dex,
            StatKind::Spirit => &mut self.spirit,
            StatKind::Hp => &mut self.hp,
            StatKind::Mp => &mut self.mp,
        }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, kind: StatKind, value: f64) -> Self {
        *self.get_mut(kind) = value;
        self
    }

    /// Component-wise product.
    #[must_use]
    pub fn scaled_by(&self, rates: &Self) -> Self {
        let mut out = Self::ZERO;
        for kind in StatKind::ALL {
            *out.get_mut(kind) = self.get(kind) * rates.get(kind);
        }
        out
    }

    /// Returns `true` if every component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        StatKind::ALL.iter().all(|k| self.get(*k).is_finite())
    }
}

impl Add for StatLine {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for StatLine {
    fn add_assign(&mut self, rhs: Self) {
        for kind in StatKind::ALL {
            *self.get_mut(kind) += rhs.get(kind);
        }
    }
}

impl Mul<f64> for StatLine {
    type Output = Self;

    fn mul(mut self, rhs: f64) -> Self {
        for kind in StatKind::ALL {
            *self.get_mut(kind) *= rhs;
        }
        self
    }
}
