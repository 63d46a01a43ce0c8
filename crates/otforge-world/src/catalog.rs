//! Object catalog - the server's item-type registry
//!
//! Parses the textual object catalog into [`ItemType`] records. Records
//! are keyed by `TypeID = <int>` and terminated by a blank line or the
//! next `TypeID`; fields are `Name`, `Flags = {..}` and
//! `Attributes = {K=V, ..}`. The parser is Latin-1 tolerant, strips
//! trailing `#` comments outside quotes and never aborts on a bad line.

use crate::item::{ItemFlags, ItemType};
use crate::{latin1_to_string, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// All item types known to the server, keyed by type id.
#[derive(Debug, Default)]
pub struct ItemCatalog {
    types: HashMap<u16, ItemType>,
    /// Malformed lines skipped during the parse.
    pub skipped_lines: usize,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog from an object catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Loading object catalog from {}", path.as_ref().display());
        let bytes = fs::read(&path)?;
        let catalog = Self::parse(&latin1_to_string(&bytes));
        info!(
            "Loaded {} item types ({} lines skipped)",
            catalog.len(),
            catalog.skipped_lines
        );
        Ok(catalog)
    }

    /// Parse catalog text.
    pub fn parse(text: &str) -> Self {
        let mut catalog = Self::new();
        let mut current: Option<ItemType> = None;

        for raw_line in text.lines() {
            let line = strip_comment(raw_line).trim();

            if line.is_empty() {
                catalog.flush(current.take());
                continue;
            }

            let Some((key, value)) = split_assignment(line) else {
                catalog.skipped_lines += 1;
                continue;
            };

            match key {
                "TypeID" => {
                    catalog.flush(current.take());
                    match value.parse::<u16>() {
                        Ok(id) => current = Some(ItemType::new(id)),
                        Err(_) => {
                            warn!("Bad TypeID value: {:?}", value);
                            catalog.skipped_lines += 1;
                        }
                    }
                }
                "Name" => {
                    if let Some(item) = current.as_mut() {
                        item.name = unquote(value);
                    }
                }
                "Flags" => {
                    if let Some(item) = current.as_mut() {
                        item.flags = parse_flags(value);
                    }
                }
                "Attributes" => {
                    if let Some(item) = current.as_mut() {
                        apply_attributes(item, value);
                    }
                }
                _ => {
                    // Fields the converter has no use for (Description,
                    // sound effects, ...) are legal and ignored.
                    debug!("Ignoring catalog field {:?}", key);
                }
            }
        }
        catalog.flush(current.take());
        catalog
    }

    fn flush(&mut self, item: Option<ItemType>) {
        if let Some(item) = item {
            self.types.insert(item.type_id, item);
        }
    }

    pub fn get(&self, type_id: u16) -> Option<&ItemType> {
        self.types.get(&type_id)
    }

    pub fn contains(&self, type_id: u16) -> bool {
        self.types.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Stack priority for a type id; unknown types rank as loose items.
    pub fn stack_priority(&self, type_id: u16) -> u8 {
        self.get(type_id).map(|t| t.stack_priority()).unwrap_or(5)
    }

    /// Types in ascending id order, for deterministic emission.
    pub fn types_sorted(&self) -> Vec<&ItemType> {
        let mut types: Vec<&ItemType> = self.types.values().collect();
        types.sort_by_key(|t| t.type_id);
        types
    }
}

/// Strip a trailing `#` comment, honoring double quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Split `Key = Value` into trimmed halves.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Take the contents of a double-quoted value; bare values pass through.
fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(start) = trimmed.find('"') {
        if let Some(end) = trimmed.rfind('"') {
            if end > start {
                return trimmed[start + 1..end].to_string();
            }
        }
    }
    trimmed.to_string()
}

fn parse_flags(value: &str) -> ItemFlags {
    let inner = value.trim().trim_start_matches('{').trim_end_matches('}');
    let mut flags = ItemFlags::empty();
    for token in inner.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(flag) = ItemFlags::from_token(token) {
            flags |= flag;
        }
    }
    flags
}

fn apply_attributes(item: &mut ItemType, value: &str) {
    let inner = value.trim().trim_start_matches('{').trim_end_matches('}');
    for pair in inner.split(',') {
        let Some((key, val)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();
        match key {
            "Capacity" => item.capacity = val.parse().ok(),
            "DisguiseTarget" => item.disguise_target = val.parse().ok(),
            "Weight" => item.weight = val.parse().ok(),
            // Consumable state the editor does not model.
            "RemainingUses" => {}
            _ => {}
        }
    }
}
