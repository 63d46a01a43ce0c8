//! Conversion pipeline
//!
//! Emits the editor-facing artifacts from parsed server data: the OTB
//! item database, the OTBM world map, the auxiliary XML files and the
//! diagnostic logs, plus the inverse OTBM-to-sector export.

pub mod debug_log;
pub mod export;
pub mod otb;
pub mod otbm;
pub mod pipeline;
pub mod stats;
pub mod xml;

pub use otb::write_item_database;
pub use otbm::{write_map, MapDocument};
pub use pipeline::{run_pipeline, PipelineConfig};
pub use stats::ConvertStats;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("codec error: {0}")]
    Codec(#[from] otforge_codec::CodecError),

    #[error("world error: {0}")]
    World(#[from] otforge_world::WorldError),

    #[error("mandatory input missing: {0}")]
    ConfigurationMissing(String),

    #[error("XML emission failed: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
