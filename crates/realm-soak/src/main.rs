//! Realm soak harness.
//!
//! Cold-starts realms from a directory of JSON respawn tables, puts one
//! fighter in every catalog room and trades blows for a number of rounds,
//! snapshotting damaged mobs and flushing the write-behind queue as it goes.
//! Running it twice against the same store exercises crash recovery.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use realm_core::catalog::{RoomSpawns, WorldCatalog};
use realm_core::combat::ExchangeOutcome;
use realm_core::config::Tunables;
use realm_core::entity::{Character, Vitals};
use realm_core::ids::{CharacterId, RealmId, RoomKey};
use realm_core::persistence::{FlushReport, JsonFileStore};
use realm_core::realm::RealmManager;
use realm_core::time::{Clock, ManualClock, SystemClock};

/// Flush passes attempted at shutdown before giving up on queued writes.
const FINAL_FLUSH_PASSES: u32 = 8;

/// How often, in rounds, damaged mobs are snapshotted.
const SNAPSHOT_EVERY: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "realm-soak")]
#[command(about = "Drive scripted fights through the realm core and persist respawn timers")]
struct Args {
    /// World catalog JSON (mobs, rooms, items)
    #[arg(short, long)]
    catalog: PathBuf,

    /// Tunables JSON (built-in defaults if not specified)
    #[arg(short, long)]
    tunables: Option<PathBuf>,

    /// Directory holding one respawn table per realm
    #[arg(short = 'd', long, default_value = "soak-store")]
    store: PathBuf,

    /// Number of realms to run
    #[arg(short, long, default_value = "2")]
    realms: u32,

    /// Base seed; realm N fights with seed + N
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Rounds of combat per room
    #[arg(long, default_value = "100")]
    rounds: u32,

    /// Simulated seconds between rounds
    #[arg(long, default_value = "5")]
    step_secs: u64,

    /// Class of the generated fighters
    #[arg(long, default_value = "warrior")]
    class: String,

    /// Skill power of fighter attacks
    #[arg(long, default_value = "1.0")]
    power: f64,

    /// Follow the wall clock instead of simulated time
    #[arg(long)]
    wall_clock: bool,
}

// =============================================================================
// Tally
// =============================================================================

#[derive(Debug, Default)]
struct Tally {
    exchanges: u64,
    hits: u64,
    damage_dealt: i64,
    kills: u64,
    poison_procs: u64,
    damage_taken: i64,
    deaths: u64,
    poison_damage: i64,
    lapsed_buffs: usize,
    snapshots: usize,
    flush: FlushReport,
}

impl Tally {
    fn dealt(&mut self, outcome: &ExchangeOutcome) {
        self.exchanges += 1;
        self.hits += u64::from(outcome.hit);
        self.damage_dealt += outcome.damage;
        self.kills += u64::from(outcome.killed);
        self.poison_procs += u64::from(outcome.poisoned);
    }

    fn taken(&mut self, outcome: &ExchangeOutcome) {
        self.exchanges += 1;
        self.damage_taken += outcome.damage;
    }

    fn flushed(&mut self, report: FlushReport) {
        self.flush.written += report.written;
        self.flush.retried += report.retried;
        self.flush.dropped += report.dropped;
        self.flush.deferred = report.deferred;
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    manager: RealmManager,
    manual: Option<Arc<ManualClock>>,
    realms: Vec<RealmId>,
    rooms: Vec<RoomKey>,
    tally: Tally,
}

impl Harness {
    fn advance(&self, secs: u64) {
        match &self.manual {
            Some(clock) => clock.advance_secs(secs),
            None => std::thread::sleep(Duration::from_secs(secs)),
        }
    }

    fn advance_millis(&self, ms: u64) {
        match &self.manual {
            Some(clock) => clock.advance_millis(ms),
            None => std::thread::sleep(Duration::from_millis(ms)),
        }
    }

    /// One fighter per room, ids counting up from 1 in room order.
    fn fighters(&self) -> impl Iterator<Item = (CharacterId, RoomKey)> + '_ {
        (1..).map(CharacterId::new).zip(self.rooms.iter().copied())
    }

    fn enlist(&mut self, class: &str) {
        let now = self.manager.now();
        let fighters: Vec<_> = self.fighters().collect();
        for &realm in &self.realms {
            for &(id, room) in &fighters {
                let fighter = {
                    let ctx = self.manager.stat_context();
                    Character::new(id, format!("soak-{}-{room}", id.get()), class, &ctx, now)
                };
                self.manager.insert_character(realm, fighter);
            }
        }
    }

    fn round(&mut self, power: f64) {
        let fighters: Vec<_> = self.fighters().collect();
        for realm in self.realms.clone() {
            for &(fighter, room) in &fighters {
                let mobs = self.manager.ensure_room_populated(realm, room);
                let Some(target) = mobs.first().map(|m| m.id) else {
                    continue;
                };
                let dealt = self.manager.character_attacks(realm, fighter, room, target, power);
                if let Some(outcome) = dealt {
                    self.tally.dealt(&outcome);
                }
                if let Some(outcome) = self.manager.mob_attacks(realm, room, target, fighter, 1.0) {
                    self.tally.taken(&outcome);
                }
                self.revive(realm, fighter);
            }
        }
        let sweep = self.manager.tick_status();
        self.tally.poison_damage += sweep.poison_damage;
        self.tally.lapsed_buffs += sweep.lapsed_buffs;
    }

    fn revive(&mut self, realm: RealmId, id: CharacterId) {
        let Some(character) = self.manager.realm_mut(realm).and_then(|r| r.character_mut(id)) else {
            return;
        };
        if character.vitals.is_dead() {
            character.vitals = Vitals::full(character.vitals.max_hp, character.vitals.max_mp);
            character.status.clear();
            self.tally.deaths += 1;
        }
    }

    fn checkpoint(&mut self) {
        self.tally.snapshots += self.manager.snapshot();
        let report = self.manager.flush();
        debug!(?report, "checkpoint flushed");
        self.tally.flushed(report);
    }

    fn drain(&mut self) {
        let retry_ms = self.manager.tunables().persistence.max_delay_ms;
        let mut passes = 0;
        while self.manager.queued_writes() > 0 && passes < FINAL_FLUSH_PASSES {
            self.advance_millis(retry_ms);
            let report = self.manager.flush();
            self.tally.flushed(report);
            passes += 1;
        }
        if self.manager.queued_writes() > 0 {
            warn!(queued = self.manager.queued_writes(), "shutting down with unflushed writes");
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    if args.realms == 0 {
        bail!("--realms must be at least 1");
    }

    let catalog = WorldCatalog::load(&args.catalog)
        .with_context(|| format!("failed to load catalog from {}", args.catalog.display()))?;
    let tunables = match &args.tunables {
        Some(path) => Tunables::load(path)
            .with_context(|| format!("failed to load tunables from {}", path.display()))?,
        None => Tunables::default(),
    };
    std::fs::create_dir_all(&args.store)
        .with_context(|| format!("failed to create store directory {}", args.store.display()))?;

    let manual = (!args.wall_clock).then(|| Arc::new(ManualClock::new(SystemClock.now())));
    let clock: Arc<dyn Clock> = match &manual {
        Some(clock) => clock.clone(),
        None => Arc::new(SystemClock),
    };

    let rooms: Vec<RoomKey> = catalog.rooms().map(RoomSpawns::key).collect();
    if rooms.is_empty() {
        warn!("catalog declares no rooms; nothing will fight");
    }

    let store = Box::new(JsonFileStore::new(&args.store));
    let mut manager = RealmManager::new(catalog, tunables, clock, store);
    let realms: Vec<RealmId> = (1..=args.realms).map(RealmId::new).collect();
    let seeded = manager
        .bootstrap(realms.iter().map(|id| (*id, args.seed.wrapping_add(u64::from(id.get())))))
        .with_context(|| format!("failed to bootstrap realms from {}", args.store.display()))?;
    info!(realms = realms.len(), rooms = rooms.len(), seeded, "bootstrap complete");

    let mut harness = Harness {
        manager,
        manual,
        realms,
        rooms,
        tally: Tally::default(),
    };
    harness.enlist(&args.class);

    for round in 1..=args.rounds {
        harness.round(args.power);
        if round % SNAPSHOT_EVERY == 0 {
            harness.checkpoint();
        }
        harness.advance(args.step_secs);
    }
    harness.checkpoint();
    harness.drain();

    let t = &harness.tally;
    info!(kills = t.kills, deaths = t.deaths, "soak finished");
    let summary = json!({
        "realms": harness.realms.len(),
        "rooms": harness.rooms.len(),
        "rounds": args.rounds,
        "exchanges": t.exchanges,
        "hits": t.hits,
        "damage_dealt": t.damage_dealt,
        "damage_taken": t.damage_taken,
        "kills": t.kills,
        "deaths": t.deaths,
        "poison_procs": t.poison_procs,
        "poison_damage": t.poison_damage,
        "lapsed_buffs": t.lapsed_buffs,
        "snapshots": t.snapshots,
        "flush": t.flush,
        "unflushed": harness.manager.queued_writes(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
