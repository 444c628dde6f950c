//! Fixture data and setup utilities shared by the cross-module tests.

use std::sync::Arc;

use crate::catalog::{EquipSlot, ItemTemplate, MobCategory, MobTemplate, RoomSpawns, WorldCatalog};
use crate::config::{ClassTuning, Tunables};
use crate::entity::{Character, MobFlags, MobInstance};
use crate::ids::{
    CharacterId, ItemId, MobId, RealmId, RoomId, RoomKey, SkillId, TemplateId, ZoneId,
};
use crate::persistence::RespawnStore;
use crate::realm::RealmManager;
use crate::stats::{
    EffectKind, ItemEffect, SetDefinition, SetPiece, StatContext, StatKind, StatLine,
};
use crate::time::{ManualClock, Timestamp};

/// Realm used by single-realm tests.
pub const REALM: RealmId = RealmId::new(1);

/// Wall-clock start for manager tests.
pub const START_SECS: u64 = 1000;

// =============================================================================
// Keys and Time
// =============================================================================

/// Room declaring `[rat, wolf]` padded to 3 slots: rat, wolf, rat.
pub fn den() -> RoomKey {
    RoomKey::new(ZoneId::new(1), RoomId::new(1))
}

/// Room holding a single ogre boss.
pub fn lair() -> RoomKey {
    RoomKey::new(ZoneId::new(1), RoomId::new(2))
}

/// Shorthand for whole seconds.
pub fn at(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

// =============================================================================
// Catalog
// =============================================================================

fn template(id: &str, category: MobCategory, hp: i64, atk: i64, def: i64, dex: i64) -> MobTemplate {
    MobTemplate {
        id: TemplateId::new(id),
        name: id.to_string(),
        category,
        hp,
        atk,
        def,
        mdef: def / 2,
        dex,
        respawn_secs: None,
    }
}

fn item(id: &str, slot: EquipSlot, main: StatKind, stats: StatLine) -> ItemTemplate {
    ItemTemplate {
        id: ItemId::new(id),
        slot,
        stats,
        main_stat: main,
        effects: Vec::new(),
        grants_skill: None,
    }
}

/// Catalog with trash, boss and world-boss templates plus a small armory.
///
/// - `iron_sword`: weapon, atk 60, poison proc 0.3, element 5
/// - `wolf_helm`, `wolf_mail`: the `wolf` set, both granting `howl`
/// - `swift_boots`: dex 15, dodge 0.1
pub fn fixture_catalog() -> WorldCatalog {
    let mut catalog = WorldCatalog::new();
    catalog.add_template(template("rat", MobCategory::Trash, 40, 12, 4, 8));
    catalog.add_template(template("wolf", MobCategory::Trash, 300, 20, 10, 12));
    catalog.add_template(template("ogre", MobCategory::Boss, 100, 30, 20, 5));
    catalog.add_template(template("dragon", MobCategory::WorldBoss, 500, 80, 60, 20));

    catalog.add_room(RoomSpawns {
        zone: den().zone,
        room: den().room,
        spawns: vec![TemplateId::new("rat"), TemplateId::new("wolf")],
        population: Some(3),
    });
    catalog.add_room(RoomSpawns {
        zone: lair().zone,
        room: lair().room,
        spawns: vec![TemplateId::new("ogre")],
        population: None,
    });

    let mut sword = item(
        "iron_sword",
        EquipSlot::Weapon,
        StatKind::Atk,
        StatLine::ZERO.with(StatKind::Atk, 60.0),
    );
    sword.effects = vec![
        ItemEffect::new(EffectKind::Poison, 0.3),
        ItemEffect::new(EffectKind::ElementAtk, 5.0),
    ];
    catalog.add_item(sword);

    let mut helm = item(
        "wolf_helm",
        EquipSlot::Helmet,
        StatKind::Def,
        StatLine::ZERO.with(StatKind::Def, 20.0).with(StatKind::Hp, 50.0),
    );
    helm.grants_skill = Some(SkillId::new("howl"));
    catalog.add_item(helm);

    let mut mail = item(
        "wolf_mail",
        EquipSlot::Armor,
        StatKind::Def,
        StatLine::ZERO.with(StatKind::Def, 40.0).with(StatKind::Hp, 100.0),
    );
    mail.grants_skill = Some(SkillId::new("howl"));
    catalog.add_item(mail);

    let mut boots = item(
        "swift_boots",
        EquipSlot::Boots,
        StatKind::Dex,
        StatLine::ZERO.with(StatKind::Dex, 15.0),
    );
    boots.effects = vec![ItemEffect::new(EffectKind::Dodge, 0.1)];
    catalog.add_item(boots);

    catalog
}

// =============================================================================
// Tunables and Characters
// =============================================================================

/// Default tunables plus the `warrior` class and the `wolf` set at rate 0.2.
pub fn fixture_tunables() -> Tunables {
    let mut tunables = Tunables::default();
    tunables.classes.insert(
        "warrior".into(),
        ClassTuning {
            base: StatLine {
                atk: 30.0,
                def: 10.0,
                mag: 5.0,
                mdef: 5.0,
                dex: 10.0,
                spirit: 5.0,
                hp: 200.0,
                mp: 20.0,
            },
            per_level: StatLine::ZERO
                .with(StatKind::Atk, 3.0)
                .with(StatKind::Def, 1.0)
                .with(StatKind::Hp, 20.0),
        },
    );
    tunables.sets.push(SetDefinition {
        id: "wolf".into(),
        pieces: vec![
            SetPiece {
                slot: EquipSlot::Helmet,
                item: ItemId::new("wolf_helm"),
            },
            SetPiece {
                slot: EquipSlot::Armor,
                item: ItemId::new("wolf_mail"),
            },
        ],
        rate: 0.2,
        main_stat_only: false,
    });
    tunables
}

/// A fresh level 1 warrior.
pub fn warrior(id: u64, ctx: &StatContext<'_>) -> Character {
    Character::new(CharacterId::new(id), format!("warrior-{id}"), "warrior", ctx, Timestamp::ZERO)
}

/// A slot-less mob with unit category scaling.
pub fn target_mob(category: MobCategory, hp: i64, def: i64) -> MobInstance {
    let template = template("target", category, hp, 10, def, 0);
    let tuning = crate::config::CategoryTuning {
        hp_scale: 1.0,
        atk_scale: 1.0,
        def_scale: 1.0,
        mdef_scale: 1.0,
        dex_scale: 1.0,
        respawn_secs: 30,
    };
    MobInstance::spawn(MobId::new(1), &template, &tuning, 1.0, None, MobFlags::empty())
}

// =============================================================================
// Managers
// =============================================================================

/// A manager over the fixture data with a manual clock at [`START_SECS`].
pub fn fixture_manager(
    store: impl RespawnStore + 'static,
) -> (RealmManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(at(START_SECS)));
    let manager =
        RealmManager::new(fixture_catalog(), fixture_tunables(), clock.clone(), Box::new(store));
    (manager, clock)
}
