//! # Realm Core
//!
//! Simulation core for a sharded, persistent text-adventure world.
//!
//! Three coupled subsystems share one deterministic model:
//!
//! - **Lifecycle** ([`lifecycle`], [`realm`]): materializes mobs per room,
//!   pads or truncates spawn slots to a target population, scales stats by
//!   category and boss kill growth, and schedules respawns that survive
//!   restarts through a write-behind [`persistence`] seam.
//! - **Combat** ([`combat`]): hit chance, damage under stacking defense
//!   modifiers, clamped health changes and timed [`status`] effects that
//!   expire lazily on read.
//! - **Stat derivation** ([`stats`]): a pure pipeline from class, cultivation,
//!   equipment, sets, refine levels, training, fruits and the daily lucky buff
//!   to the numbers combat consumes.
//!
//! ## Determinism
//!
//! Time is always passed in as a [`time::Timestamp`] and randomness as a
//! `rand::Rng`. Each realm owns a seeded `ChaCha8Rng`, so a realm's fights
//! replay exactly.
//!
//! ## Usage
//!
//! ```
//! use realm_core::catalog::WorldCatalog;
//! use realm_core::config::Tunables;
//! use realm_core::ids::{RealmId, RoomId, RoomKey, ZoneId};
//! use realm_core::lifecycle::RealmWorldState;
//! use realm_core::time::Timestamp;
//!
//! let catalog = WorldCatalog::from_json_str(r#"{
//!     "mobs": [{"id": "rat", "name": "Rat", "category": "trash",
//!               "hp": 20, "atk": 4, "def": 1, "mdef": 0, "dex": 3}],
//!     "rooms": [{"zone": 1, "room": 1, "spawns": ["rat"], "population": 3}]
//! }"#).unwrap();
//! let tunables = Tunables::default();
//!
//! let mut realm = RealmWorldState::new(RealmId::new(1), 7);
//! let room = RoomKey::new(ZoneId::new(1), RoomId::new(1));
//! let mobs = realm.ensure_room_populated(&catalog, &tunables, room, Timestamp::from_secs(0));
//! assert_eq!(mobs.len(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod combat;
pub mod config;
pub mod entity;
pub mod ids;
pub mod lifecycle;
pub mod persistence;
pub mod realm;
pub mod stats;
pub mod status;
pub mod time;

pub use catalog::{MobCategory, WorldCatalog};
pub use config::Tunables;
pub use entity::{Character, MobInstance};
pub use lifecycle::RealmWorldState;
pub use realm::RealmManager;

#[cfg(test)]
mod tests;
