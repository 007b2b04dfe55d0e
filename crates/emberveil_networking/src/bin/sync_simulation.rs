//! # Sync Simulation
//!
//! Crowds bots into a small area, random-walks them for a number of ticks
//! and prints tick timing and attribute cache statistics.
//!
//! ```text
//! sync_simulation [bots] [ticks] [config.toml]
//! ```
//!
//! Ticks run back to back; the interval from the configuration is only used
//! to count late ticks.

use std::time::Instant;

use emberveil_core::{Animation, ChatMessage, ConnectionId, EntityId, HitType};
use emberveil_networking::{SyncConfig, SyncServer, TickLoop, TickReport, WorldCommand};
use emberveil_shared::{Direction, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Bots spawn inside a square of this many tiles per side.
const AREA: u16 = 24;
/// South-west corner of the spawn area.
const ORIGIN: Position = Position::new(3200, 3200, 0);
/// NPCs spawned next to the bots.
const NPCS: u16 = 40;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let mut args = std::env::args().skip(1);
    let bots: u16 = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(200);
    let ticks: u64 = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(100);
    let config = match args.next() {
        Some(path) => match SyncConfig::from_toml_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(%path, error = %e, "invalid configuration");
                std::process::exit(1);
            }
        },
        None => SyncConfig::default(),
    };

    let mut server = match SyncServer::new(&config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "server setup failed");
            std::process::exit(1);
        }
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         EMBERVEIL - ENTITY SYNC SIMULATION                       ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Bots:               {bots}");
    println!("│ NPCs:               {NPCS}");
    println!("│ Ticks:              {ticks}");
    println!("│ Area:               {AREA}x{AREA} tiles");
    println!("│ View Distance:      {}", config.view_distance);
    println!("│ Admissions/Tick:    {}", config.max_admissions_per_tick);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let mut rng = StdRng::seed_from_u64(0x5EED);
    let connections = spawn(&mut server, &mut rng, bots);

    let mut tick_loop = TickLoop::new(config.tick_interval_ms);
    let outbound = server.outbound();
    let started = Instant::now();
    let mut totals = TickReport::default();
    let mut hit_rate_sum = 0.0;

    for _ in 0..ticks {
        drive_bots(&server, &mut rng, &connections);

        let start = tick_loop.begin_tick();
        let report = server.tick();
        tick_loop.end_tick(start);

        totals.packets_sent += report.packets_sent;
        totals.failures += report.failures;
        totals.bytes += report.bytes;
        totals.deaths += report.deaths;
        totals.cache_hits += report.cache_hits;
        totals.cache_misses += report.cache_misses;
        hit_rate_sum += report.cache_hit_rate();

        while outbound.try_recv().is_ok() {}
        revive(&mut server);
    }

    let elapsed = started.elapsed();
    let stats = tick_loop.stats();
    let budget_us = tick_loop.interval().as_micros();

    println!("┌─ TICK PERFORMANCE ─────────────────────────────────────────────┐");
    println!("│ Wall Time:          {:.2} s", elapsed.as_secs_f64());
    println!("│ Budget per Tick:    {budget_us} μs");
    println!("│ Min Tick Time:      {} μs", stats.min_tick_us);
    println!("│ Max Tick Time:      {} μs", stats.max_tick_us);
    println!("│ Avg Tick Time:      {} μs", stats.avg_tick_us);
    println!("│ Late Ticks:         {}", stats.late_ticks);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
    println!("┌─ PACKETS ───────────────────────────────────────────────────────┐");
    println!("│ Sent:               {}", totals.packets_sent);
    println!("│ Failed:             {}", totals.failures);
    println!("│ Bytes:              {}", totals.bytes);
    println!(
        "│ Avg Packet:         {} bytes",
        totals.bytes / totals.packets_sent.max(1)
    );
    println!("│ Deaths:             {}", totals.deaths);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
    println!("┌─ ATTRIBUTE CACHE ───────────────────────────────────────────────┐");
    println!("│ Hits:               {}", totals.cache_hits);
    println!("│ Misses:             {}", totals.cache_misses);
    println!("│ Overall Hit Rate:   {:.2}%", totals.cache_hit_rate() * 100.0);
    println!(
        "│ Mean Tick Hit Rate: {:.2}%",
        hit_rate_sum / ticks.max(1) as f64 * 100.0
    );
    println!("└──────────────────────────────────────────────────────────────────┘");

    info!(ticks, bots, "simulation finished");
}

fn random_tile(rng: &mut StdRng) -> Position {
    Position::new(
        ORIGIN.x + rng.gen_range(0..AREA),
        ORIGIN.y + rng.gen_range(0..AREA),
        ORIGIN.plane,
    )
}

/// Logs every bot in and spawns the NPCs, then runs one tick so the logins
/// take effect.
fn spawn(server: &mut SyncServer, rng: &mut StdRng, bots: u16) -> Vec<ConnectionId> {
    let commands = server.command_sender();
    let mut connections = Vec::with_capacity(usize::from(bots));
    for i in 0..bots {
        let connection = server.connections().write().register();
        let login = WorldCommand::Login {
            connection,
            username: format!("bot{i}"),
            position: random_tile(rng),
        };
        if commands.send(login).is_ok() {
            connections.push(connection);
        }
    }
    for i in 0..NPCS {
        let spawn = WorldCommand::SpawnNpc {
            definition_id: 1 + i % 50,
            position: random_tile(rng),
            hitpoints: 20,
        };
        let _ = commands.send(spawn);
    }
    server.tick();
    connections
}

/// Queues one tick worth of bot behaviour.
fn drive_bots(server: &SyncServer, rng: &mut StdRng, connections: &[ConnectionId]) {
    let commands = server.command_sender();
    let players: Vec<EntityId> = {
        let table = server.connections();
        let table = table.read();
        connections
            .iter()
            .filter_map(|&connection| table.get(connection).and_then(|entry| entry.player))
            .collect()
    };

    for &player in &players {
        let Some(entity) = server.world().get(player) else {
            continue;
        };
        let here = entity.position();
        let command = match rng.gen_range(0..100) {
            0..=39 => {
                let direction = wander(rng, here);
                WorldCommand::Walk { entity: player, direction }
            }
            40..=54 => {
                let first = wander(rng, here);
                let second = wander(rng, here.translate(first));
                WorldCommand::Run { entity: player, first, second }
            }
            55..=62 => WorldCommand::Animate {
                entity: player,
                animation: Animation::new(rng.gen_range(800..900), 0),
            },
            63..=66 => WorldCommand::Say {
                player,
                message: ChatMessage {
                    color: 0,
                    effects: 0,
                    rank: 0,
                    text: b"hello".to_vec(),
                },
            },
            67..=69 => WorldCommand::Hit {
                entity: player,
                damage: rng.gen_range(0..4),
                kind: HitType::Normal,
            },
            70..=71 => {
                let target = players[rng.gen_range(0..players.len())];
                WorldCommand::FaceEntity { entity: player, target }
            }
            _ => continue,
        };
        let _ = commands.send(command);
    }
}

/// A random step that keeps the bot inside the spawn area.
fn wander(rng: &mut StdRng, from: Position) -> Direction {
    loop {
        let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
        let to = from.translate(direction);
        let inside = (ORIGIN.x..ORIGIN.x + AREA).contains(&to.x)
            && (ORIGIN.y..ORIGIN.y + AREA).contains(&to.y);
        if inside {
            return direction;
        }
    }
}

/// Dead bots get back up on the next tick.
fn revive(server: &mut SyncServer) {
    let dead: Vec<EntityId> = server.deaths().to_vec();
    for id in dead {
        if let Some(entity) = server.world_mut().get_mut(id) {
            let maximum = entity.hitpoints().maximum;
            if let Err(e) = entity.restore(emberveil_core::Hitpoints::full(maximum)) {
                warn!(entity = ?id, error = %e, "revive failed");
            }
        }
    }
}
