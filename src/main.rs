//! Star Conquest - headless session runner
//!
//! Seeds a session into an in-memory store and ticks it, either as fast as
//! possible on a manual clock or in real time through the tick driver.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use star_conquest::core::types::PlayerId;
use star_conquest::scenario::{seed_session, ScenarioSpec, SeededSession};
use star_conquest::store::Store;
use star_conquest::world::{Difficulty, Resources};
use star_conquest::{
    Clock, Engine, EngineConfig, InMemoryStore, ManualClock, Result, SystemClock, TickDriver,
    TickReport,
};

/// Run a seeded conquest session without a frontend
#[derive(Parser, Debug)]
#[command(name = "star_conquest")]
#[command(about = "Run a seeded territory-conquest session headless")]
struct Args {
    /// Random seed for the map layout
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of territory nodes
    #[arg(long, default_value_t = 40)]
    nodes: usize,

    /// Number of human (idle) players
    #[arg(long, default_value_t = 0)]
    humans: usize,

    /// Bot difficulties, comma separated
    #[arg(long, value_delimiter = ',', default_value = "easy,normal,hard")]
    bots: Vec<Difficulty>,

    /// Maximum ticks to run
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Simulated milliseconds per tick on the manual clock
    #[arg(long, default_value_t = 1_000)]
    tick_ms: u64,

    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick on the wall clock through the driver instead of a manual clock
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Print the final summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct PlayerSummary {
    player: PlayerId,
    bot: Option<Difficulty>,
    nodes: usize,
    garrison: u64,
    balance: Resources,
}

#[derive(Debug, Serialize)]
struct Summary {
    ticks_run: u64,
    last: Option<TickReport>,
    players: Vec<PlayerSummary>,
    neutral_nodes: usize,
    sectors: usize,
    combat_records: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("star_conquest=info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;

    let spec = ScenarioSpec {
        seed: args.seed,
        node_count: args.nodes,
        humans: args.humans,
        bots: args.bots.clone(),
        ..Default::default()
    };

    let rt = Runtime::new()?;
    let summary = rt.block_on(async {
        let store = Arc::new(InMemoryStore::new());
        let seeded = seed_session(store.as_ref(), &config, &spec).await?;

        let (ticks_run, last) = if args.realtime {
            run_realtime(Arc::clone(&store), config, &seeded, args.ticks).await
        } else {
            run_fast(Arc::clone(&store), config, &seeded, args.ticks, args.tick_ms).await?
        };
        summarize(store.as_ref(), &seeded, ticks_run, last).await
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

async fn run_fast(
    store: Arc<InMemoryStore>,
    config: EngineConfig,
    seeded: &SeededSession,
    max_ticks: u64,
    tick_ms: u64,
) -> Result<(u64, Option<TickReport>)> {
    let clock = Arc::new(ManualClock::new(SystemClock.now()));
    let engine = Engine::new(store, Arc::clone(&clock), config);

    let mut last = None;
    let mut ticks_run = 0;
    while ticks_run < max_ticks {
        let report = engine.advance_tick(seeded.session).await?;
        ticks_run += 1;
        clock.advance(tick_ms);
        let done = report.completed;
        last = Some(report);
        if done {
            break;
        }
    }
    Ok((ticks_run, last))
}

async fn run_realtime(
    store: Arc<InMemoryStore>,
    config: EngineConfig,
    seeded: &SeededSession,
    max_ticks: u64,
) -> (u64, Option<TickReport>) {
    let engine = Arc::new(Engine::new(store, SystemClock, config));
    let driver = TickDriver::new(engine);
    let runs = driver.run(&[seeded.session], Some(max_ticks)).await;
    runs.into_iter()
        .find(|r| r.session == seeded.session)
        .map(|r| (r.ticks, r.last))
        .unwrap_or((0, None))
}

async fn summarize(
    store: &InMemoryStore,
    seeded: &SeededSession,
    ticks_run: u64,
    last: Option<TickReport>,
) -> Result<Summary> {
    let session = seeded.session;
    let nodes = store.nodes(session).await?;
    let profiles = store.bot_profiles(session).await?;

    let mut players = Vec::new();
    for player in seeded.players() {
        let owned: Vec<_> = nodes.iter().filter(|n| n.is_owned_by(player)).collect();
        let balance = store
            .economy(session, player)
            .await?
            .map(|e| e.balance)
            .unwrap_or_default();
        players.push(PlayerSummary {
            player,
            bot: profiles
                .iter()
                .find(|p| p.player == player)
                .map(|p| p.difficulty),
            nodes: owned.len(),
            garrison: owned.iter().map(|n| n.garrison as u64).sum(),
            balance,
        });
    }

    Ok(Summary {
        ticks_run,
        last,
        players,
        neutral_nodes: nodes.iter().filter(|n| n.is_neutral()).count(),
        sectors: store.sectors(session).await?.len(),
        combat_records: store.combat_records(session).await?.len(),
    })
}

fn print_summary(summary: &Summary) {
    println!("\n=== STAR CONQUEST ===");
    println!("Ticks run: {}", summary.ticks_run);
    if let Some(last) = &summary.last {
        match (last.completed, last.winner) {
            (true, Some(winner)) => println!("Session completed, winner {}", winner),
            (true, None) => println!("Session completed"),
            _ => println!("Session still active at tick {}", last.tick_number),
        }
    }
    println!();
    println!(
        "{:<38} {:<8} {:>6} {:>9} {:>9} {:>8} {:>9}",
        "player", "kind", "nodes", "garrison", "credits", "energy", "minerals"
    );
    for p in &summary.players {
        let kind = match p.bot {
            Some(Difficulty::Easy) => "easy",
            Some(Difficulty::Normal) => "normal",
            Some(Difficulty::Hard) => "hard",
            None => "human",
        };
        println!(
            "{:<38} {:<8} {:>6} {:>9} {:>9} {:>8} {:>9}",
            p.player.to_string(),
            kind,
            p.nodes,
            p.garrison,
            p.balance.credits,
            p.balance.energy,
            p.balance.minerals
        );
    }
    println!();
    println!("Neutral nodes:  {}", summary.neutral_nodes);
    println!("Sectors:        {}", summary.sectors);
    println!("Combat records: {}", summary.combat_records);
}
