//! Static world catalog: mob templates, room spawn lists and item templates.
//!
//! The catalog is authored data loaded once at startup. Unlike
//! [`Tunables`](crate::config::Tunables) it is not hot-reloaded; the room graph
//! itself (exits, descriptions) lives outside this crate and only the spawn
//! declarations are mirrored here.
//!
//! # Example
//!
//! ```
//! use realm_core::catalog::{MobCategory, WorldCatalog};
//!
//! let catalog = WorldCatalog::from_json_str(r#"{
//!     "mobs": [{"id": "cave_rat", "name": "Cave Rat", "category": "trash",
//!               "hp": 40, "atk": 8, "def": 2, "mdef": 1, "dex": 5}],
//!     "rooms": [{"zone": 1, "room": 1, "spawns": ["cave_rat"], "population": 3}]
//! }"#).unwrap();
//!
//! let rat = catalog.template(&"cave_rat".into()).unwrap();
//! assert_eq!(rat.category, MobCategory::Trash);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ItemId, RoomId, RoomKey, SkillId, TemplateId, ZoneId};
use crate::stats::{ItemEffect, StatKind, StatLine};

// =============================================================================
// Mob Templates
// =============================================================================

/// Authored creature category.
///
/// Categories drive stat scaling, respawn delay, kill growth and poison
/// immunity. They are tagged explicitly in data, never inferred from ids.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobCategory {
    /// Ordinary creatures that respawn within seconds.
    Trash,
    /// Room bosses.
    Boss,
    /// Realm-wide bosses.
    WorldBoss,
    /// Event or quest bosses.
    SpecialBoss,
}

impl MobCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 4] = [Self::Trash, Self::Boss, Self::WorldBoss, Self::SpecialBoss];

    /// Returns `true` for categories that track kill growth.
    #[must_use]
    pub const fn is_boss_class(self) -> bool {
        !matches!(self, Self::Trash)
    }

    /// Returns `true` for categories that refuse poison.
    #[must_use]
    pub const fn is_poison_immune(self) -> bool {
        matches!(self, Self::WorldBoss | Self::SpecialBoss)
    }
}

impl fmt::Display for MobCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trash => write!(f, "trash"),
            Self::Boss => write!(f, "boss"),
            Self::WorldBoss => write!(f, "world_boss"),
            Self::SpecialBoss => write!(f, "special_boss"),
        }
    }
}

/// Catalog entry for a creature before runtime scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobTemplate {
    /// Catalog key
    pub id: TemplateId,
    /// Display name
    pub name: String,
    /// Authored category
    pub category: MobCategory,
    /// Base health
    pub hp: i64,
    /// Base physical attack
    pub atk: i64,
    /// Base physical defense
    pub def: i64,
    /// Base magic defense
    pub mdef: i64,
    /// Base dexterity
    pub dex: i64,
    /// Per-template respawn delay, overriding the category default.
    #[serde(default)]
    pub respawn_secs: Option<u64>,
}

// =============================================================================
// Rooms
// =============================================================================

/// Spawn declaration for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSpawns {
    /// Zone containing the room
    pub zone: ZoneId,
    /// Room id within the zone
    pub room: RoomId,
    /// Declared spawnable templates, one per slot before padding.
    pub spawns: Vec<TemplateId>,
    /// Target population. `None` falls back to the configured default.
    #[serde(default)]
    pub population: Option<usize>,
}

impl RoomSpawns {
    /// Returns the key of this room.
    #[must_use]
    pub const fn key(&self) -> RoomKey {
        RoomKey::new(self.zone, self.room)
    }

    /// Returns the slot list padded (by cycling) or truncated to `target`.
    ///
    /// A `target` of zero means "exactly the declared list".
    #[must_use]
    pub fn padded(&self, target: usize) -> Vec<TemplateId> {
        if self.spawns.is_empty() {
            return Vec::new();
        }
        let target = if target == 0 { self.spawns.len() } else { target };
        self.spawns.iter().cycle().take(target).cloned().collect()
    }
}

// =============================================================================
// Items
// =============================================================================

/// Equipment slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    /// Main-hand weapon
    Weapon,
    /// Head
    Helmet,
    /// Body armor
    Armor,
    /// Hands
    Gloves,
    /// Feet
    Boots,
    /// Waist
    Belt,
    /// Finger
    Ring,
    /// Neck
    Amulet,
}

impl EquipSlot {
    /// Every slot, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Weapon,
        Self::Helmet,
        Self::Armor,
        Self::Gloves,
        Self::Boots,
        Self::Belt,
        Self::Ring,
        Self::Amulet,
    ];
}

impl fmt::Display for EquipSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Weapon => "weapon",
            Self::Helmet => "helmet",
            Self::Armor => "armor",
            Self::Gloves => "gloves",
            Self::Boots => "boots",
            Self::Belt => "belt",
            Self::Ring => "ring",
            Self::Amulet => "amulet",
        };
        f.write_str(name)
    }
}

/// Catalog entry for an equippable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Catalog key
    pub id: ItemId,
    /// Slot this item occupies
    pub slot: EquipSlot,
    /// Base stats granted while equipped
    #[serde(default)]
    pub stats: StatLine,
    /// Nominal main stat, used by refine and main-stat-only set bonuses.
    pub main_stat: StatKind,
    /// Special effects carried by the item
    #[serde(default)]
    pub effects: Vec<ItemEffect>,
    /// Skill granted when this item's whole set agrees on it.
    #[serde(default)]
    pub grants_skill: Option<SkillId>,
}

// =============================================================================
// World Catalog
// =============================================================================

/// Errors raised while loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid catalog JSON.
    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),
    /// Two entries share a key.
    #[error("duplicate catalog entry: {0}")]
    Duplicate(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogDocument {
    mobs: Vec<MobTemplate>,
    rooms: Vec<RoomSpawns>,
    items: Vec<ItemTemplate>,
}

/// Indexed static catalog.
#[derive(Debug, Clone, Default)]
pub struct WorldCatalog {
    templates: BTreeMap<TemplateId, MobTemplate>,
    rooms: BTreeMap<RoomKey, RoomSpawns>,
    items: BTreeMap<ItemId, ItemTemplate>,
}

impl WorldCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a catalog document.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] for malformed JSON and
    /// [`CatalogError::Duplicate`] if two entries share a key.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for mob in doc.mobs {
            if catalog.templates.contains_key(&mob.id) {
                return Err(CatalogError::Duplicate(format!("mob {}", mob.id)));
            }
            catalog.add_template(mob);
        }
        for room in doc.rooms {
            if catalog.rooms.contains_key(&room.key()) {
                return Err(CatalogError::Duplicate(format!("room {}", room.key())));
            }
            catalog.add_room(room);
        }
        for item in doc.items {
            if catalog.items.contains_key(&item.id) {
                return Err(CatalogError::Duplicate(format!("item {}", item.id)));
            }
            catalog.add_item(item);
        }
        Ok(catalog)
    }

    /// Reads and parses a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Inserts or replaces a mob template.
    pub fn add_template(&mut self, template: MobTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Inserts or replaces a room spawn declaration.
    pub fn add_room(&mut self, room: RoomSpawns) {
        self.rooms.insert(room.key(), room);
    }

    /// Inserts or replaces an item template.
    pub fn add_item(&mut self, item: ItemTemplate) {
        self.items.insert(item.id.clone(), item);
    }

    /// Looks up a mob template.
    #[must_use]
    pub fn template(&self, id: &TemplateId) -> Option<&MobTemplate> {
        self.templates.get(id)
    }

    /// Looks up a room's spawn declaration.
    #[must_use]
    pub fn room(&self, key: RoomKey) -> Option<&RoomSpawns> {
        self.rooms.get(&key)
    }

    /// Looks up an item template.
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&ItemTemplate> {
        self.items.get(id)
    }

    /// Iterates rooms in key order.
    pub fn rooms(&self) -> impl Iterator<Item = &RoomSpawns> + '_ {
        self.rooms.values()
    }

    /// Number of mob templates.
    #[must_use]
    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}
