use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use database::{DatabaseConfig, MemoryStore, TournamentStore};
use engine::{EngineConfig, LogPublisher, Orchestrator};
use strategies::RandomStrategy;
use types::{Color, Person};

#[derive(Parser, Debug)]
struct Params {
    /// Number of people to register.
    #[arg(short, long, default_value_t = 24)]
    players: usize,

    /// YAML file with engine settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database URL. Without one everything stays in memory.
    #[arg(short, long)]
    database: Option<String>,

    #[arg(short, long)]
    seed: Option<u64>,

    /// Play without sending change notifications.
    #[arg(short, long)]
    quiet_broadcast: bool,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Params::parse();
    log::info!("args: {args:?}");
    if let Err(e) = run(args).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Params) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };
    if args.quiet_broadcast {
        config.broadcasting = false;
    }

    let db_config = DatabaseConfig::from_cli_or_env_or_yaml(args.database.clone(), None);
    let store: Arc<dyn TournamentStore> = if db_config.is_in_memory() {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(database::connect(&db_config).await?)
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    for i in 0..args.players {
        let color = Color::ALL[rng.gen_range(0..Color::ALL.len())];
        let person = Person::new(&format!("Archer {i}"), &format!("archer{i}")).with_color(color);
        store.save_person(&person).await?;
    }

    let orchestrator = Orchestrator::create(
        Arc::clone(&store),
        config,
        Arc::new(LogPublisher),
        "Simulated Fall",
        "simfall",
        Utc::now(),
    )
    .await?;
    orchestrator.usurp(args.players).await?;
    orchestrator.start().await?;

    let mut strategy = match args.seed {
        Some(seed) => RandomStrategy::seeded(seed),
        None => RandomStrategy::default(),
    };
    let tournament = orchestrator.autoplay_tournament(&mut strategy).await?;
    let snapshot = orchestrator.snapshot().await;
    println!("{tournament} after {} matches", snapshot.matches.len());

    for (place, id) in tournament.winners.iter().enumerate() {
        let person = store.get_person(*id).await?;
        let summary = store.player_summary(tournament.id, *id).await?;
        println!("{}. {} ({} points)", place + 1, person.nick, summary.total_score);
    }
    Ok(())
}
