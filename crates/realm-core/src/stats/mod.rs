//! Player stat derivation.
//!
//! Composes class base stats, cultivation tier, equipment (with set bonuses,
//! refine levels and special effects), training investment, training fruit,
//! per-level growth and the daily lucky buff into the [`DerivedStats`] the
//! combat engine consumes.
//!
//! - [`line`]: [`StatKind`] and the [`StatLine`] vector type
//! - [`sets`]: table-driven set matching
//! - [`effects`]: singleton and additive item effects
//! - [`derive`]: the [`compute_derived`] pipeline itself

pub mod derive;
pub mod effects;
pub mod line;
pub mod sets;

pub use derive::{
    compute_derived, DerivedStats, Equipment, EquippedItem, LuckyBuff, StatContext, StatInputs,
};
pub use effects::{resolve_effects, EffectKind, ItemEffect, SpecialEffects};
pub use line::{StatKind, StatLine};
pub use sets::{active_sets, SetBonusDescriptor, SetDefinition, SetPiece};
