//! Forward conversion entry point
//!
//! Usage: `otforge <game-data-root> <output-name>`
//!
//! Reads the server's dat/, map/, mon/ and npc/ trees and writes the
//! editor map, item database, XML companions and diagnostic logs under
//! output/ and logs/.

use std::env;

use anyhow::bail;
use otforge_convert::{run_pipeline, PipelineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <game-data-root> <output-name>", args[0]);
        eprintln!();
        eprintln!("Reads  <root>/dat/objects.srv, <root>/map/*.sec, ...");
        eprintln!("Writes output/<name>.otbm, output/<name>-house.xml,");
        eprintln!("       output/<name>-spawn.xml, output/rme_config/");
        bail!("expected exactly two arguments");
    }

    let config = PipelineConfig::new(args[1].as_str(), &args[2]);
    let stats = run_pipeline(&config)?;
    println!("{}", stats);
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,otforge_world=info,otforge_convert=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
