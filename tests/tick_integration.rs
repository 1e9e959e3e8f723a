//! End-to-end tick tests against the in-memory store
//!
//! Every test drives `advance_tick` on a manual clock. Growth runs before
//! attacks within a tick, so expected garrisons are derived with
//! `troop_growth` where a node grows ahead of the fight.

use std::sync::Arc;

use glam::Vec3;

use star_conquest::command::{launch_attack, AttackOrder};
use star_conquest::core::types::{NodeId, PlayerId, SessionId, Timestamp};
use star_conquest::simulation::troop_growth;
use star_conquest::bot::acts_on_tick;
use star_conquest::world::{
    Attack, AttackStatus, BotProfile, CombatOutcome, CombatRecord, Difficulty, GameSession,
    PlayerEconomy, Resources, SessionStatus, Terrain, TerritoryNode,
};
use star_conquest::{Engine, EngineConfig, InMemoryStore, ManualClock, Store, TickReport};

const START: Timestamp = Timestamp(1_000_000);

struct Game {
    engine: Engine<InMemoryStore, ManualClock>,
    session: SessionId,
}

impl Game {
    async fn new(players: &[PlayerId]) -> Self {
        Self::with_config(players, EngineConfig::default()).await
    }

    async fn with_config(players: &[PlayerId], config: EngineConfig) -> Self {
        let engine = Engine::new(Arc::new(InMemoryStore::new()), ManualClock::new(START), config);
        let mut session = GameSession::new(SessionId::new());
        session.status = SessionStatus::Active;
        let id = session.id;
        engine.store().insert_session(session).await.unwrap();
        for &player in players {
            engine
                .store()
                .insert_economy(PlayerEconomy::new(id, player, Resources::default()))
                .await
                .unwrap();
        }
        Self {
            engine,
            session: id,
        }
    }

    fn store(&self) -> &InMemoryStore {
        self.engine.store().as_ref()
    }

    async fn node(&self, at: Vec3, owner: Option<PlayerId>, garrison: u32) -> NodeId {
        self.node_on(at, owner, garrison, Terrain::Open).await
    }

    async fn node_on(
        &self,
        at: Vec3,
        owner: Option<PlayerId>,
        garrison: u32,
        terrain: Terrain,
    ) -> NodeId {
        let mut node = TerritoryNode::new(self.session, "Node", at).with_terrain(terrain);
        node.owner = owner;
        node.garrison = garrison;
        let id = node.id;
        self.store().insert_node(node).await.unwrap();
        id
    }

    async fn attack(&self, player: PlayerId, source: NodeId, target: NodeId, troops: u32) -> Attack {
        let order = AttackOrder {
            session: self.session,
            player,
            source,
            target,
            troops,
        };
        launch_attack(self.store(), self.engine.config(), self.engine.now(), order)
            .await
            .unwrap()
    }

    fn wait(&self, ms: u64) {
        self.engine.clock().advance(ms);
    }

    async fn tick(&self) -> TickReport {
        self.engine.advance_tick(self.session).await.unwrap()
    }

    async fn get(&self, node: NodeId) -> TerritoryNode {
        self.store().node(node).await.unwrap().unwrap()
    }

    async fn status(&self, attack: &Attack) -> AttackStatus {
        self.store().attack(attack.id).await.unwrap().unwrap().status
    }

    async fn records(&self) -> Vec<CombatRecord> {
        self.store().combat_records(self.session).await.unwrap()
    }

    async fn bot(&self, player: PlayerId) {
        let profile = BotProfile {
            session: self.session,
            player,
            difficulty: Difficulty::Hard,
        };
        self.store().insert_bot_profile(profile).await.unwrap();
    }

    async fn open_attacks(&self) -> Vec<Attack> {
        self.store().open_attacks(self.session).await.unwrap()
    }
}

/// Bots act every tick and never build
fn eager_bots() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.bots.interval_ticks = 1;
    config.bots.build_chance = 0.0;
    config
}

#[tokio::test]
async fn test_owned_empty_node_grows_by_ten() {
    let player = PlayerId::new();
    let game = Game::new(&[player]).await;
    let node = game.node(Vec3::ZERO, Some(player), 0).await;

    let report = game.tick().await;

    assert_eq!(report.grown_nodes, 1);
    assert_eq!(game.get(node).await.garrison, 10);
}

#[tokio::test]
async fn test_neutral_nodes_do_not_grow() {
    let player = PlayerId::new();
    let game = Game::new(&[player]).await;
    let neutral = game.node(Vec3::ZERO, None, 7).await;

    game.tick().await;

    assert_eq!(game.get(neutral).await.garrison, 7);
}

#[tokio::test]
async fn test_attack_captures_neutral_node() {
    let attacker = PlayerId::new();
    let game = Game::new(&[attacker]).await;
    let source = game.node(Vec3::ZERO, Some(attacker), 150).await;
    let target = game.node(Vec3::new(40.0, 0.0, 0.0), None, 40).await;

    let attack = game.attack(attacker, source, target, 100).await;
    assert_eq!(game.get(source).await.garrison, 50);
    assert_eq!(attack.travel_ms(), 1_000);

    // Not due yet
    let early = game.tick().await;
    assert_eq!(early.resolved_attacks, 0);
    assert_eq!(game.status(&attack).await, AttackStatus::InTransit);

    game.wait(1_000);
    let report = game.tick().await;
    assert_eq!(report.resolved_attacks, 1);

    let captured = game.get(target).await;
    assert_eq!(captured.owner, Some(attacker));
    assert_eq!(captured.garrison, 88);
    assert_eq!(game.status(&attack).await, AttackStatus::Arrived);

    let records = game.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.outcome, CombatOutcome::AttackerVictory);
    assert_eq!(record.defender, None);
    assert_eq!(record.attacker_losses, 12);
    assert_eq!(record.defender_losses, 40);
    assert_eq!(record.attacker_survivors, 88);
    assert!(!record.flags.flanking && !record.flags.encircled);
}

#[tokio::test]
async fn test_second_advance_does_not_reprocess_arrived_attack() {
    let attacker = PlayerId::new();
    let game = Game::new(&[attacker]).await;
    let source = game.node(Vec3::ZERO, Some(attacker), 150).await;
    let target = game.node(Vec3::new(40.0, 0.0, 0.0), None, 40).await;
    let attack = game.attack(attacker, source, target, 100).await;

    game.wait(1_000);
    game.tick().await;
    let again = game.tick().await;

    assert_eq!(again.resolved_attacks, 0);
    assert_eq!(game.records().await.len(), 1);
    assert_eq!(game.status(&attack).await, AttackStatus::Arrived);
    assert_eq!(game.get(target).await.owner, Some(attacker));
}

#[tokio::test]
async fn test_outnumbered_attack_retreats_home() {
    let attacker = PlayerId::new();
    let defender = PlayerId::new();
    let game = Game::new(&[attacker, defender]).await;
    let source = game.node(Vec3::ZERO, Some(attacker), 20).await;
    let target = game.node(Vec3::new(40.0, 0.0, 0.0), Some(defender), 100).await;

    let attack = game.attack(attacker, source, target, 20).await;
    assert_eq!(game.get(source).await.garrison, 0);

    game.wait(1_000);
    let report = game.tick().await;
    assert_eq!(report.resolved_attacks, 1);

    // 16 of 20 make it back on top of this tick's growth
    assert_eq!(game.get(source).await.garrison, troop_growth(0, 500) + 16);
    assert_eq!(game.get(target).await.owner, Some(defender));
    assert_eq!(
        game.status(&attack).await,
        AttackStatus::Retreating {
            returns_at: START.plus_millis(2_000)
        }
    );

    let records = game.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, CombatOutcome::Retreat);
    assert_eq!(records[0].attacker_survivors, 16);
    assert_eq!(records[0].attacker_losses, 4);

    // Still on the way home
    game.tick().await;
    assert!(matches!(
        game.status(&attack).await,
        AttackStatus::Retreating { .. }
    ));

    game.wait(1_000);
    let home = game.tick().await;
    assert_eq!(home.resolved_attacks, 1);
    assert_eq!(game.status(&attack).await, AttackStatus::Arrived);
    assert_eq!(game.records().await.len(), 1);
}

#[tokio::test]
async fn test_defender_holds_in_nebula() {
    let attacker = PlayerId::new();
    let defender = PlayerId::new();
    let game = Game::new(&[attacker, defender]).await;
    let source = game.node(Vec3::ZERO, Some(attacker), 200).await;
    let target = game
        .node_on(
            Vec3::new(40.0, 0.0, 0.0),
            Some(defender),
            300,
            Terrain::Nebula,
        )
        .await;

    let attack = game.attack(attacker, source, target, 100).await;
    game.wait(1_000);
    game.tick().await;

    let defended = troop_growth(300, 500);
    let held = game.get(target).await;
    assert_eq!(held.owner, Some(defender));
    assert_eq!(held.garrison, defended - 40);
    assert_eq!(game.status(&attack).await, AttackStatus::Arrived);

    let records = game.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, CombatOutcome::DefenderVictory);
    assert_eq!(records[0].terrain, Terrain::Nebula);
    assert_eq!(records[0].defender_force, defended);
    assert_eq!(records[0].attacker_survivors, 0);
}

#[tokio::test]
async fn test_reinforcement_is_capped_at_capacity() {
    let player = PlayerId::new();
    let game = Game::new(&[player]).await;
    let source = game.node(Vec3::ZERO, Some(player), 400).await;
    let target = game.node(Vec3::new(40.0, 0.0, 0.0), Some(player), 480).await;

    let attack = game.attack(player, source, target, 100).await;
    game.wait(1_000);
    let report = game.tick().await;

    assert_eq!(report.resolved_attacks, 1);
    assert_eq!(game.get(target).await.garrison, 500);
    assert_eq!(game.status(&attack).await, AttackStatus::Arrived);
    assert!(game.records().await.is_empty());
}

#[tokio::test]
async fn test_encircled_node_falls_without_a_fight() {
    let attacker = PlayerId::new();
    let defender = PlayerId::new();
    let game = Game::new(&[attacker, defender]).await;
    let target = game.node(Vec3::ZERO, Some(defender), 300).await;

    let mut ring = Vec::new();
    for offset in [
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
        Vec3::Z,
        Vec3::NEG_Z,
    ] {
        ring.push(game.node(offset * 100.0, Some(attacker), 200).await);
    }

    let attack = game.attack(attacker, ring[0], target, 120).await;
    assert_eq!(attack.travel_ms(), 2_000);
    game.wait(2_000);
    let report = game.tick().await;

    let captured = game.get(target).await;
    assert_eq!(captured.owner, Some(attacker));
    assert_eq!(captured.garrison, 120);

    let records = game.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, CombatOutcome::AttackerVictory);
    assert!(records[0].flags.encircled);
    assert_eq!(records[0].attacker_losses, 0);

    // The defender held nothing else
    assert!(report.completed);
    assert_eq!(report.winner, Some(attacker));
}

#[tokio::test]
async fn test_encircle_capture_record_matches_capped_garrison() {
    let attacker = PlayerId::new();
    let defender = PlayerId::new();
    let game = Game::new(&[attacker, defender]).await;
    let target = game.node(Vec3::ZERO, Some(defender), 50).await;

    let mut ring = Vec::new();
    for offset in [
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
        Vec3::Z,
        Vec3::NEG_Z,
    ] {
        ring.push(game.node(offset * 100.0, Some(attacker), 200).await);
    }
    // Over capacity, so growth leaves the staging node alone
    let staging = game.node(Vec3::new(0.0, 0.0, -150.0), Some(attacker), 900).await;

    game.attack(attacker, staging, target, 700).await;
    game.wait(3_000);
    game.tick().await;

    let captured = game.get(target).await;
    assert_eq!(captured.owner, Some(attacker));
    assert_eq!(captured.garrison, 500);

    let records = game.records().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].flags.encircled);
    assert_eq!(records[0].attacker_force, 700);
    assert_eq!(records[0].attacker_survivors, captured.garrison);
}

#[tokio::test]
async fn test_converging_attacks_flank() {
    let attacker = PlayerId::new();
    let defender = PlayerId::new();
    let game = Game::new(&[attacker, defender]).await;
    let target = game.node(Vec3::ZERO, Some(defender), 100).await;
    let west = game.node(Vec3::new(-100.0, 0.0, 0.0), Some(attacker), 100).await;
    let east = game.node(Vec3::new(100.0, 0.0, 0.0), Some(attacker), 100).await;

    game.attack(attacker, west, target, 60).await;
    game.attack(attacker, east, target, 60).await;
    game.wait(2_000);
    game.tick().await;

    let records = game.records().await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.flags.flanking));
    assert!(records.iter().all(|r| !r.flags.encircled));
}

#[tokio::test]
async fn test_failed_capture_commit_is_redone_from_scratch() {
    for op in ["capture_node", "insert_combat_record", "transition_attack"] {
        let attacker = PlayerId::new();
        let game = Game::new(&[attacker]).await;
        let source = game.node(Vec3::ZERO, Some(attacker), 150).await;
        let target = game.node(Vec3::new(40.0, 0.0, 0.0), None, 40).await;
        let attack = game.attack(attacker, source, target, 100).await;

        game.wait(1_000);
        game.store().fail_next(op);
        let report = game.tick().await;

        // Nothing of the resolution landed
        assert_eq!(report.resolved_attacks, 0, "{op}");
        assert_eq!(game.status(&attack).await, AttackStatus::InTransit, "{op}");
        let untouched = game.get(target).await;
        assert_eq!((untouched.owner, untouched.garrison), (None, 40), "{op}");
        assert!(game.records().await.is_empty(), "{op}");

        let retry = game.tick().await;
        assert_eq!(retry.resolved_attacks, 1, "{op}");
        let captured = game.get(target).await;
        assert_eq!((captured.owner, captured.garrison), (Some(attacker), 88), "{op}");
        assert_eq!(game.status(&attack).await, AttackStatus::Arrived, "{op}");

        let records = game.records().await;
        assert_eq!(records.len(), 1, "{op}");
        assert_eq!(records[0].outcome, CombatOutcome::AttackerVictory, "{op}");

        // Later ticks only grow the node
        game.tick().await;
        assert_eq!(game.get(target).await.garrison, troop_growth(88, 500), "{op}");
        assert_eq!(game.records().await.len(), 1, "{op}");
    }
}

#[tokio::test]
async fn test_failed_retreat_commit_returns_survivors_once() {
    let attacker = PlayerId::new();
    let defender = PlayerId::new();
    let game = Game::new(&[attacker, defender]).await;
    let source = game.node(Vec3::ZERO, Some(attacker), 20).await;
    let target = game.node(Vec3::new(40.0, 0.0, 0.0), Some(defender), 100).await;
    let attack = game.attack(attacker, source, target, 20).await;

    game.wait(1_000);
    game.store().fail_next("insert_combat_record");
    game.tick().await;

    let grown = troop_growth(0, 500);
    assert_eq!(game.get(source).await.garrison, grown);
    assert_eq!(game.status(&attack).await, AttackStatus::InTransit);
    assert!(game.records().await.is_empty());

    let retry = game.tick().await;
    assert_eq!(retry.resolved_attacks, 1);
    assert_eq!(game.get(source).await.garrison, troop_growth(grown, 500) + 16);
    assert_eq!(
        game.status(&attack).await,
        AttackStatus::Retreating {
            returns_at: START.plus_millis(2_000)
        }
    );
    let records = game.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, CombatOutcome::Retreat);
}

#[tokio::test]
async fn test_failed_repel_commit_fights_once() {
    let attacker = PlayerId::new();
    let defender = PlayerId::new();
    let game = Game::new(&[attacker, defender]).await;
    let source = game.node(Vec3::ZERO, Some(attacker), 200).await;
    let target = game
        .node_on(
            Vec3::new(40.0, 0.0, 0.0),
            Some(defender),
            300,
            Terrain::Nebula,
        )
        .await;
    let attack = game.attack(attacker, source, target, 100).await;

    game.wait(1_000);
    game.store().fail_next("insert_combat_record");
    game.tick().await;

    // The failed fight left the defender at its grown strength
    let first = troop_growth(300, 500);
    assert_eq!(game.get(target).await.garrison, first);
    assert_eq!(game.status(&attack).await, AttackStatus::InTransit);
    assert!(game.records().await.is_empty());

    game.tick().await;

    let second = troop_growth(first, 500);
    let held = game.get(target).await;
    assert_eq!(held.owner, Some(defender));
    assert_eq!(held.garrison, second - 40);
    assert_eq!(game.status(&attack).await, AttackStatus::Arrived);

    let records = game.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, CombatOutcome::DefenderVictory);
    assert_eq!(records[0].defender_force, second);
}

#[tokio::test]
async fn test_phase_fetch_failure_aborts_only_that_invocation() {
    let attacker = PlayerId::new();
    let game = Game::new(&[attacker]).await;
    let source = game.node(Vec3::ZERO, Some(attacker), 150).await;
    let target = game.node(Vec3::new(40.0, 0.0, 0.0), None, 40).await;
    let attack = game.attack(attacker, source, target, 100).await;

    game.wait(1_000);
    game.store().fail_next("open_attacks");
    let err = game.engine.advance_tick(game.session).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(game.status(&attack).await, AttackStatus::InTransit);

    let report = game.tick().await;
    assert_eq!(report.tick_number, 2);
    assert_eq!(report.resolved_attacks, 1);
    assert_eq!(game.get(target).await.owner, Some(attacker));
}

#[tokio::test]
async fn test_expansion_wave_and_capture_propagation() {
    let a = PlayerId::new();
    let b = PlayerId::new();
    let game = Game::new(&[a, b]).await;
    let home = game.node(Vec3::ZERO, Some(a), 480).await;
    let rival = game.node(Vec3::new(30.0, 0.0, 0.0), Some(b), 5).await;

    for _ in 0..9 {
        assert_eq!(game.tick().await.sectors_created, 0);
        game.wait(1_000);
    }
    let wave = game.tick().await;
    assert_eq!(wave.tick_number, 10);
    assert!(wave.sectors_created > 0);

    let config = EngineConfig::default().expansion;
    let sectors = game.store().sectors(game.session).await.unwrap();
    assert_eq!(sectors.len(), wave.sectors_created);
    for sector in &sectors {
        let node = game.get(sector.node).await;
        assert_eq!(sector.owner, node.owner);
        assert!(sector.position.distance(node.position) <= config.max_radius + 1e-3);
        assert_eq!(sector.wave, 1);
    }
    for (i, s) in sectors.iter().enumerate() {
        for other in &sectors[i + 1..] {
            assert!(s.position.distance(other.position) > config.sector_size - 1e-3);
        }
    }

    let rival_sectors = game.store().sectors_for_node(rival).await.unwrap();
    assert!(!rival_sectors.is_empty());

    game.wait(1_000);
    game.attack(a, home, rival, 400).await;
    game.wait(1_000);
    let report = game.tick().await;

    assert_eq!(game.get(rival).await.owner, Some(a));
    let rival_sectors = game.store().sectors_for_node(rival).await.unwrap();
    assert!(rival_sectors.iter().all(|s| s.owner == Some(a)));
    assert!(report.completed);
}

#[tokio::test]
async fn test_completed_session_stops_ticking() {
    let a = PlayerId::new();
    let b = PlayerId::new();
    let game = Game::new(&[a, b]).await;
    let source = game.node(Vec3::ZERO, Some(a), 200).await;
    let target = game.node(Vec3::new(40.0, 0.0, 0.0), Some(b), 10).await;

    game.attack(a, source, target, 100).await;
    game.wait(1_000);
    let report = game.tick().await;
    assert!(report.completed);
    assert_eq!(report.winner, Some(a));

    let session = game.store().session(game.session).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.winner, Some(a));

    let after = game.tick().await;
    assert!(after.skipped);
    assert_eq!(after.tick_number, report.tick_number);
}

#[tokio::test]
async fn test_bot_expands_through_the_atomic_decrement() {
    let bot = PlayerId::new();
    let config = eager_bots();
    let commit_fraction = config.bots.commit_fraction;
    let game = Game::with_config(&[bot], config).await;
    let home = game.node(Vec3::ZERO, Some(bot), 100).await;
    let neutral = game.node(Vec3::new(40.0, 0.0, 0.0), None, 10).await;
    game.bot(bot).await;
    assert!(acts_on_tick(bot, 1, 1));

    let report = game.tick().await;
    assert_eq!(report.bot_actions, 1);

    let attacks = game.open_attacks().await;
    assert_eq!(attacks.len(), 1);
    let attack = &attacks[0];
    assert_eq!(attack.attacker, bot);
    assert_eq!((attack.source, attack.target), (home, neutral));
    assert_eq!(attack.status, AttackStatus::InTransit);

    // The bot decided on the grown garrison and paid for it exactly once
    let grown = troop_growth(100, 500);
    assert_eq!(attack.troops, (grown as f64 * commit_fraction + 1e-9).floor() as u32);
    assert_eq!(game.get(home).await.garrison, grown - attack.troops);
}

#[tokio::test]
async fn test_bot_waits_for_its_turn() {
    let bot = PlayerId::new();
    let mut config = eager_bots();
    config.bots.interval_ticks = 30;
    let game = Game::with_config(&[bot], config).await;
    game.node(Vec3::ZERO, Some(bot), 100).await;
    game.node(Vec3::new(40.0, 0.0, 0.0), None, 10).await;
    game.bot(bot).await;

    let first_turn = (1..=30).find(|t| acts_on_tick(bot, *t, 30)).unwrap();
    for tick in 1..first_turn {
        assert_eq!(game.tick().await.bot_actions, 0, "tick {tick}");
        game.wait(1_000);
    }
    let report = game.tick().await;
    assert_eq!(report.tick_number, first_turn);
    assert_eq!(report.bot_actions, 1);
}

#[tokio::test]
async fn test_failed_bot_action_does_not_stop_the_phase() {
    let a = PlayerId::new();
    let b = PlayerId::new();
    let game = Game::with_config(&[a, b], eager_bots()).await;
    let home_a = game.node(Vec3::ZERO, Some(a), 100).await;
    game.node(Vec3::new(40.0, 0.0, 0.0), None, 10).await;
    let home_b = game.node(Vec3::new(5_000.0, 0.0, 0.0), Some(b), 100).await;
    game.node(Vec3::new(5_040.0, 0.0, 0.0), None, 10).await;
    game.bot(a).await;
    game.bot(b).await;

    // Whichever bot commits first has its troop withdrawal fail
    game.store().fail_next("decrement_garrison");
    let report = game.tick().await;

    assert!(!report.skipped);
    assert_eq!(report.bot_actions, 1);
    let attacks = game.open_attacks().await;
    assert_eq!(attacks.len(), 1);

    let grown = troop_growth(100, 500);
    let (acted_home, idle_home) = if attacks[0].attacker == a {
        (home_a, home_b)
    } else {
        (home_b, home_a)
    };
    assert_eq!(game.get(acted_home).await.garrison, grown - attacks[0].troops);
    assert_eq!(game.get(idle_home).await.garrison, grown);
}
