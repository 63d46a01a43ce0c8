//! Node-tree binary codec
//!
//! Both the OTB item database and the OTBM map format are tag-delimited
//! trees of byte payloads sharing the same framing: 0xFE opens a node,
//! 0xFF closes it, and 0xFD escapes the next byte so payloads may contain
//! the marker values.

pub mod reader;
pub mod writer;

pub use reader::NodeReader;
pub use writer::NodeWriter;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

/// Escape marker: the byte that follows is literal payload.
pub const NODE_ESCAPE: u8 = 0xFD;
/// Start-of-node marker.
pub const NODE_START: u8 = 0xFE;
/// End-of-node marker.
pub const NODE_END: u8 = 0xFF;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated node stream at offset {0}")]
    BadFraming(usize),

    #[error("node close with no open node at offset {0}")]
    UnbalancedClose(usize),

    #[error("escape byte at end of stream")]
    BadEscape,
}
