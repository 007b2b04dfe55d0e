//! # Entity Sync End-to-End Tests
//!
//! Full update cycles through the coordinator, checked at the byte level:
//!
//! 1. **Cache**: third-party observers receive byte-identical blocks, built once
//! 2. **Hits**: overkill damage clamps and kills exactly once
//! 3. **Sectors**: a walk decodes back from a real packet
//! 4. **Isolation**: one observer's overflow never touches another's packet
//! 5. **Caps**: local lists and admissions stay within their limits
//!
//! Run with: cargo test --test entity_sync

use emberveil::networking::{
    movement::decode_sector, ConnectionState, ConnectionTable, ObserverViews, OutboundPacket,
    PacketReader, Sector, SyncConfig, TickReport, UpdateCoordinator,
};
use emberveil::shared::{Direction, Position, NPC_UPDATE_OPCODE, PLAYER_UPDATE_OPCODE};
use emberveil::world::{
    Animation, ConnectionId, EntityId, EntityKind, HitType, PlayerDetails, WorldRegistry,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// HARNESS
// ============================================================================

struct Harness {
    world: WorldRegistry,
    connections: ConnectionTable,
    views: ObserverViews,
    coordinator: UpdateCoordinator,
    sent: Vec<OutboundPacket>,
    deaths: Vec<EntityId>,
}

impl Harness {
    fn new(config: &SyncConfig) -> Self {
        Self {
            world: WorldRegistry::new(config.player_capacity, config.npc_capacity).unwrap(),
            connections: ConnectionTable::new(),
            views: ObserverViews::new(),
            coordinator: UpdateCoordinator::new(config),
            sent: Vec::new(),
            deaths: Vec::new(),
        }
    }

    fn login(&mut self, x: u16, y: u16) -> (ConnectionId, EntityId) {
        let connection = self.connections.register();
        let id = self
            .world
            .register_player(PlayerDetails::new("tester", connection), Position::new(x, y, 0))
            .unwrap();
        self.connections.bind_player(connection, id);
        self.connections.set_state(connection, ConnectionState::Connected);
        (connection, id)
    }

    fn tick(&mut self) -> TickReport {
        self.sent.clear();
        self.deaths.clear();
        self.coordinator.run_tick(
            &mut self.world,
            &mut self.views,
            &self.connections,
            &mut self.sent,
            &mut self.deaths,
        )
    }

    fn packet(&self, connection: ConnectionId, opcode: u8) -> &[u8] {
        &self
            .sent
            .iter()
            .find(|packet| packet.connection == connection && packet.opcode == opcode)
            .unwrap()
            .bytes
    }
}

fn players_only() -> SyncConfig {
    SyncConfig {
        sync_npcs: false,
        ..SyncConfig::default()
    }
}

/// Animation 866 with no delay: mask 0x08, id little-endian, delay negated.
const ANIMATION_BLOCK: [u8; 4] = [0x08, 0x62, 0x03, 0x00];

// ============================================================================
// CACHE
// ============================================================================

#[test]
fn test_observers_share_one_cached_block() {
    let mut harness = Harness::new(&players_only());
    let (_, speaker) = harness.login(3200, 3200);
    let observers: Vec<ConnectionId> = (0..3).map(|i| harness.login(3201 + i, 3201).0).collect();
    harness.tick();

    harness
        .world
        .get_mut(speaker)
        .unwrap()
        .play_animation(Animation::new(866, 0));
    let report = harness.tick();

    assert_eq!(report.cache_misses, 1);
    assert_eq!(report.cache_hits, 2);
    for &connection in &observers {
        let packet = harness.packet(connection, PLAYER_UPDATE_OPCODE);
        assert!(packet.ends_with(&ANIMATION_BLOCK), "packet {packet:?}");
    }
}

#[test]
fn test_cache_does_not_leak_into_next_tick() {
    let mut harness = Harness::new(&players_only());
    let (_, speaker) = harness.login(3200, 3200);
    let (observer, _) = harness.login(3201, 3200);
    harness.tick();

    harness
        .world
        .get_mut(speaker)
        .unwrap()
        .play_animation(Animation::new(866, 0));
    harness.tick();

    let report = harness.tick();
    assert_eq!(report.cache_hits + report.cache_misses, 0);
    let packet = harness.packet(observer, PLAYER_UPDATE_OPCODE);
    // Idle own sector, count 1, idle sector, no terminator and no tail.
    assert_eq!(packet, &[PLAYER_UPDATE_OPCODE, 0, 2, 0b0000_0000, 0b1000_0000]);
}

#[test]
fn test_muted_speaker_chat_is_suppressed_for_muter_only() {
    let mut harness = Harness::new(&players_only());
    let (_, speaker) = harness.login(3200, 3200);
    let (muter_connection, muter) = harness.login(3201, 3200);
    let (listener_connection, _) = harness.login(3202, 3200);
    harness.tick();

    harness.world.get_mut(muter).unwrap().set_muted(speaker, true).unwrap();
    harness
        .world
        .get_mut(speaker)
        .unwrap()
        .say(emberveil::world::ChatMessage {
            color: 0,
            effects: 0,
            rank: 0,
            text: b"hi".to_vec(),
        })
        .unwrap();
    harness.tick();

    let muted = harness.packet(muter_connection, PLAYER_UPDATE_OPCODE);
    let heard = harness.packet(listener_connection, PLAYER_UPDATE_OPCODE);
    // mask 0x80, effects, rank, length C, text reversed
    let chat_block = [0x80, 0x00, 0x00, 0x00, 0xFE, b'i', b'h'];
    assert!(heard.ends_with(&chat_block));
    assert!(!muted.ends_with(&chat_block));
}

// ============================================================================
// HITS
// ============================================================================

#[test]
fn test_overkill_hit_kills_once_across_observers() {
    let mut harness = Harness::new(&SyncConfig::default());
    let observers: Vec<ConnectionId> = (0..3).map(|i| harness.login(3200 + i, 3200).0).collect();
    let npc = harness
        .world
        .register_npc(50, Position::new(3203, 3203, 0), 50)
        .unwrap();
    harness.tick();

    harness.world.get_mut(npc).unwrap().queue_hit(200, HitType::Normal).unwrap();
    let report = harness.tick();

    assert_eq!(report.deaths, 1);
    assert_eq!(harness.deaths, vec![npc]);
    let entity = harness.world.get(npc).unwrap();
    assert!(entity.is_dead());
    assert_eq!(entity.hitpoints().current, 0);

    // mask 0x40, damage C (50), type S (1), hitpoints S (0), max C (50)
    let hit_block = [0x40, 206, 127, 128, 206];
    for &connection in &observers {
        let packet = harness.packet(connection, NPC_UPDATE_OPCODE);
        assert!(packet.ends_with(&hit_block), "packet {packet:?}");
    }
    assert_eq!(report.cache_misses, 1);
    assert_eq!(report.cache_hits, 2);

    let report = harness.tick();
    assert_eq!(report.deaths, 0);
}

// ============================================================================
// SECTORS
// ============================================================================

#[test]
fn test_walk_decodes_from_packet() {
    let mut harness = Harness::new(&players_only());
    let (observer, _) = harness.login(3200, 3200);
    let (_, walker) = harness.login(3203, 3200);
    harness.tick();

    let entity = harness.world.get_mut(walker).unwrap();
    entity.walk(Direction::from_id(3).unwrap());
    entity.play_animation(Animation::new(866, 0));
    harness.tick();

    let packet = harness.packet(observer, PLAYER_UPDATE_OPCODE);
    let mut reader = PacketReader::new(packet);
    let length = reader.read_var_short_header(PLAYER_UPDATE_OPCODE).unwrap();
    assert_eq!(usize::from(length), packet.len() - 3);

    reader.start_bit_access().unwrap();
    assert_eq!(decode_sector(&mut reader, true).unwrap(), (Sector::NoMove, false));
    assert_eq!(reader.read_bits(8).unwrap(), 1);
    let (sector, pending) = decode_sector(&mut reader, false).unwrap();
    assert_eq!(sector, Sector::Walk(Direction::West));
    assert!(pending);
    assert_eq!(reader.read_bits(11).unwrap(), 2047);
    reader.finish_bit_access().unwrap();
    assert_eq!(reader.read_bytes(4).unwrap(), &ANIMATION_BLOCK);
    assert_eq!(reader.remaining(), 0);

    assert_eq!(
        harness.world.get(walker).unwrap().position(),
        Position::new(3202, 3200, 0)
    );
}

#[test]
fn test_teleport_places_own_entity() {
    let mut harness = Harness::new(&players_only());
    let (connection, player) = harness.login(3200, 3200);
    harness.tick();

    harness
        .world
        .get_mut(player)
        .unwrap()
        .teleport(Position::new(3205, 3210, 1));
    harness.tick();

    let packet = harness.packet(connection, PLAYER_UPDATE_OPCODE);
    let mut reader = PacketReader::new(packet);
    reader.read_var_short_header(PLAYER_UPDATE_OPCODE).unwrap();
    reader.start_bit_access().unwrap();
    let (sector, pending) = decode_sector(&mut reader, true).unwrap();
    assert!(!pending);
    assert_eq!(
        sector,
        Sector::Placement {
            local_x: 48 + 5,
            local_y: 48 + 10,
            plane: 1,
            reset_queue: true,
        }
    );
}

// ============================================================================
// ISOLATION
// ============================================================================

#[test]
fn test_overflowing_observer_does_not_affect_others() {
    let config = SyncConfig {
        packet_capacity: 100,
        ..players_only()
    };
    let mut harness = Harness::new(&config);
    let crowd: Vec<ConnectionId> = (0..5).map(|i| harness.login(3200 + i, 3200).0).collect();
    let (loner, _) = harness.login(3300, 3300);

    let report = harness.tick();
    assert_eq!(report.failures, 5);
    assert_eq!(report.packets_sent, 1);
    assert_eq!(harness.sent.len(), 1);
    assert_eq!(harness.sent[0].connection, loner);
    for connection in crowd {
        assert!(harness.views[&connection].players().is_empty());
    }
}

#[test]
fn test_rejected_chat_keeps_every_packet_flowing() {
    let mut harness = Harness::new(&players_only());
    let crowd: Vec<(ConnectionId, EntityId)> =
        (0..5).map(|i| harness.login(3200 + i, 3200)).collect();
    harness.tick();

    let (_, speaker) = crowd[0];
    let entity = harness.world.get_mut(speaker).unwrap();
    assert!(entity.force_chat("hi\nthere").is_err());
    let long = emberveil::world::ChatMessage {
        color: 0,
        effects: 0,
        rank: 0,
        text: vec![b'a'; 300],
    };
    assert!(entity.say(long).is_err());

    let report = harness.tick();
    assert_eq!(report.failures, 0);
    assert_eq!(report.packets_sent, 5);
}

// ============================================================================
// CAPS
// ============================================================================

#[test]
fn test_crowd_is_admitted_fifteen_per_tick() {
    let mut harness = Harness::new(&SyncConfig::default());
    let (observer, _) = harness.login(3200, 3200);
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let position = Position::new(
            rng.gen_range(3190..3210),
            rng.gen_range(3190..3210),
            0,
        );
        harness.world.register_npc(1, position, 10).unwrap();
    }

    let mut sizes = Vec::new();
    for _ in 0..8 {
        harness.tick();
        sizes.push(harness.views[&observer].npcs().len());
    }
    assert_eq!(sizes, vec![15, 30, 45, 60, 75, 90, 100, 100]);
}

#[test]
fn test_each_list_has_its_own_admission_cap() {
    let mut harness = Harness::new(&SyncConfig::default());
    let (observer, _) = harness.login(3200, 3200);
    for i in 0..40 {
        harness.login(3190 + i % 20, 3195 + i / 20);
        harness
            .world
            .register_npc(1, Position::new(3190 + i % 20, 3205 + i / 20, 0), 10)
            .unwrap();
    }

    let report = harness.tick();
    assert_eq!(report.failures, 0);
    let view = &harness.views[&observer];
    assert_eq!(view.admitted_this_tick(EntityKind::Player), 15);
    assert_eq!(view.admitted_this_tick(EntityKind::Npc), 15);
    assert_eq!(view.players().len(), 15);
    assert_eq!(view.npcs().len(), 15);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_local_lists_respect_caps(
        npc_count in 0usize..600,
        view_distance in 1u8..=15,
        ticks in 1usize..25,
        seed in any::<u64>(),
    ) {
        let config = SyncConfig {
            view_distance,
            ..SyncConfig::default()
        };
        let mut harness = Harness::new(&config);
        let (observer, _) = harness.login(3200, 3200);
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..npc_count {
            let position = Position::new(
                rng.gen_range(3184..3216),
                rng.gen_range(3184..3216),
                0,
            );
            harness.world.register_npc(1, position, 10).unwrap();
        }

        let mut previous = 0usize;
        for _ in 0..ticks {
            let report = harness.tick();
            prop_assert_eq!(report.failures, 0);
            let view = &harness.views[&observer];
            prop_assert!(view.npcs().len() <= 255);
            prop_assert!(view.admitted_this_tick(EntityKind::Npc) <= 15);
            prop_assert!(view.admitted_this_tick(EntityKind::Player) <= 15);
            prop_assert!(view.npcs().len() <= previous + 15);
            previous = view.npcs().len();
        }
    }
}
