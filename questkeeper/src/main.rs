//! QuestKeeper skirmish runner.
//!
//! Plays one encounter between the party and a band of monsters with every
//! turn chosen automatically, printing each result as it resolves.
//!
//! ```bash
//! cargo run -p questkeeper -- --monsters monsters.json --save party.json
//! ```
//!
//! Engine settings come from the environment (or a `.env` file):
//! `QUESTKEEPER_HP_GAIN`, `QUESTKEEPER_MONSTER_SAVE_BONUS`,
//! `QUESTKEEPER_CONCENTRATION_CHECKS` and `QUESTKEEPER_SEED`.
//! Logging is controlled with `RUST_LOG`.

mod skirmish;

use questkeeper_core::{EngineConfig, RandomDice};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("questkeeper=info,questkeeper_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = skirmish::parse_config_from_args(&args);
    let engine = EngineConfig::from_env();
    tracing::debug!(?engine, "Engine configuration");

    let mut dice = RandomDice::from_seed_option(engine.dice_seed);
    let outcome = skirmish::run(config, engine, &mut dice).await?;
    tracing::info!(outcome = ?outcome, "Skirmish finished");
    Ok(())
}

fn print_help() {
    println!("QuestKeeper - D&D 5e skirmish runner");
    println!();
    println!("USAGE:");
    println!("  questkeeper [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help           Show this help message");
    println!("  --party <PATH>       Load the party from a save file");
    println!("  --monsters <PATH>    JSON array of monster stat blocks");
    println!("  --save <PATH>        Save the party after the fight");
    println!();
    println!("ENVIRONMENT:");
    println!("  QUESTKEEPER_HP_GAIN              average | roll (default: average)");
    println!("  QUESTKEEPER_MONSTER_SAVE_BONUS   flat monster save bonus (default: 2)");
    println!("  QUESTKEEPER_CONCENTRATION_CHECKS true | false (default: true)");
    println!("  QUESTKEEPER_SEED                 seed for reproducible dice");
}
