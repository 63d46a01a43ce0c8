//! Inverse conversion entry point
//!
//! Usage: `otbm-export <map.otbm> <output-folder> <objects.srv>`
//!
//! Walks an OTBM map, validates every item type against the object
//! catalog, and re-emits sector text files. Unknown type ids are dropped
//! and logged once each to logs/invalid_typeids.log.

use std::env;
use std::path::Path;

use anyhow::{bail, Context};
use otforge_convert::export::export_map_to_sectors;
use otforge_world::ItemCatalog;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("Usage: {} <map.otbm> <output-folder> <objects.srv>", args[0]);
        bail!("expected exactly three arguments");
    }

    let catalog = ItemCatalog::load(&args[3]).context("cannot load object catalog")?;
    let stats = export_map_to_sectors(&args[1], &args[2], Path::new("logs"), &catalog)?;

    println!("Exported {} tiles / {} items", stats.tiles, stats.items);
    println!(
        "Sector files: {}; invalid type ids dropped: {} ({} unique); unknown attributes skipped: {}",
        stats.sector_files,
        stats.invalid_dropped,
        stats.invalid_ids.len(),
        stats.unknown_attributes
    );
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
