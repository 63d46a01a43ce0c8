//! World model and server-data parsing
//!
//! Typed records for everything the game server's textual data files
//! describe: the object catalog, sector tiles, houses, towns, creatures
//! and spawn regions, plus the translators bridging server and editor
//! conventions.

pub mod catalog;
pub mod creature;
pub mod house;
pub mod item;
pub mod liquid;
pub mod position;
pub mod sector;
pub mod spawn;
pub mod tile;
pub mod town;

// Re-exports
pub use catalog::ItemCatalog;
pub use creature::{CreatureFile, CreatureKind, Outfit, SpawnEntry};
pub use house::{House, HouseArea};
pub use item::{ItemFlags, ItemGroup, ItemInstance, ItemType};
pub use position::Position;
pub use sector::{AttributeKind, AttributeOccurrence, Sector, SectorParser};
pub use spawn::{PlacedSpawn, PlacementPlanner, SpawnCreature, SpawnRegion};
pub use tile::{normalize_stack, Tile, TileFlags};
pub use town::Town;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorldError>;

#[derive(Error, Debug)]
pub enum WorldError {
    #[error("mandatory input missing: {0}")]
    ConfigurationMissing(String),

    #[error("malformed record in {file}: {detail}")]
    MalformedRecord { file: String, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sector edge length in tiles.
pub const SECTOR_SIZE: u16 = 32;

/// World dimensions
pub const MAP_MAX_X: u16 = 65535;
pub const MAP_MAX_Y: u16 = 65535;
pub const MAP_MAX_Z: u8 = 15;

/// Decode a Latin-1 byte slice into a String, one char per byte.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a string back to Latin-1, replacing unmappable chars with '?'.
pub fn string_to_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}
