//! Identifier newtypes used across the realm core.
//!
//! Numeric identifiers wrap integers and order by their raw value; string
//! identifiers wrap authored catalog keys. All of them are `Ord` so that every
//! per-realm table can be a `BTreeMap` with deterministic iteration order.
//!
//! # Example
//!
//! ```
//! use realm_core::ids::{MobId, SlotKey, ZoneId, RoomId};
//!
//! let a = MobId::new(1);
//! let b = MobId::new(2);
//! assert!(a < b);
//!
//! let slot = SlotKey::new(ZoneId::new(3), RoomId::new(12), 0);
//! assert_eq!(slot.room_key().zone, ZoneId::new(3));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $raw:ty) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($raw);

        impl $name {
            /// Creates the identifier from its raw value.
            #[must_use]
            pub const fn new(id: $raw) -> Self {
                Self(id)
            }

            /// Returns the raw value of this identifier.
            #[must_use]
            pub const fn get(self) -> $raw {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$raw> for $name {
            fn from(id: $raw) -> Self {
                Self::new(id)
            }
        }
    };
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from an authored key.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

numeric_id!(
    /// An isolated world shard.
    RealmId,
    u32
);
numeric_id!(
    /// A zone (area) within a realm's room graph.
    ZoneId,
    u32
);
numeric_id!(
    /// A room inside a zone.
    RoomId,
    u32
);
numeric_id!(
    /// A live mob instance. Assigned monotonically per realm and never reused.
    MobId,
    u64
);
numeric_id!(
    /// A player character.
    CharacterId,
    u64
);

string_id!(
    /// Key of a [`MobTemplate`](crate::catalog::MobTemplate) in the catalog.
    TemplateId
);
string_id!(
    /// Key of an [`ItemTemplate`](crate::catalog::ItemTemplate) in the catalog.
    ItemId
);
string_id!(
    /// A skill that equipment may grant.
    SkillId
);
string_id!(
    /// A character class, keyed into the class tuning tables.
    ClassId
);

/// A room address within a realm.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomKey {
    /// Zone containing the room.
    pub zone: ZoneId,
    /// Room within the zone.
    pub room: RoomId,
}

impl RoomKey {
    /// Creates a room key.
    #[must_use]
    pub const fn new(zone: ZoneId, room: RoomId) -> Self {
        Self { zone, room }
    }

    /// Returns the key for a spawn slot of this room.
    #[must_use]
    pub const fn slot(self, slot: usize) -> SlotKey {
        SlotKey::new(self.zone, self.room, slot)
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.room)
    }
}

/// A spawn slot: a fixed index into a room's padded spawn list.
///
/// At most one alive mob occupies a slot at any time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    /// Zone containing the room.
    pub zone: ZoneId,
    /// Room within the zone.
    pub room: RoomId,
    /// Index into the room's spawn list.
    pub slot: usize,
}

impl SlotKey {
    /// Creates a slot key.
    #[must_use]
    pub const fn new(zone: ZoneId, room: RoomId, slot: usize) -> Self {
        Self { zone, room, slot }
    }

    /// Returns the room this slot belongs to.
    #[must_use]
    pub const fn room_key(self) -> RoomKey {
        RoomKey::new(self.zone, self.room)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.zone, self.room, self.slot)
    }
}
