//! Sector tile files
//!
//! A sector file covers a 32x32 block of one floor, named
//! `SSSS-SSSS-ZZ.sec`. Each line describes one tile:
//!
//! ```text
//! LX-LY: [Refresh,] [ProtectionZone,] Content={<item-spec-list>}
//! ```
//!
//! An item spec is a type id followed by `Key=Value` assignments, at most
//! one `String="..."` and at most one nested `Content={...}`. Comma
//! splitting respects string interiors and brace depth; `Content` is
//! carved out before `String` so a quote inside the nested list cannot
//! truncate its closing brace.

use crate::item::ItemInstance;
use crate::liquid::translate_liquid;
use crate::position::Position;
use crate::tile::{Tile, TileFlags};
use crate::{latin1_to_string, Result, SECTOR_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Instance-attribute kinds recorded for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeKind {
    ChestQuestNumber,
    KeyholeNumber,
    DoorQuestNumber,
    Level,
    KeyNumber,
    DoorQuestValue,
    Amount,
    Charges,
    ContainerLiquidType,
    PoolLiquidType,
    AbsTeleportDestination,
    String,
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One observed instance attribute, for the debug log.
#[derive(Debug, Clone)]
pub struct AttributeOccurrence {
    pub kind: AttributeKind,
    pub position: Position,
    pub source_file: String,
    pub local_x: u16,
    pub local_y: u16,
    pub line: String,
}

/// One parsed sector file.
#[derive(Debug, Clone)]
pub struct Sector {
    pub sector_x: u16,
    pub sector_y: u16,
    pub z: u8,
    pub tiles: Vec<Tile>,
}

/// Parser state shared across all sector files of a run.
#[derive(Debug, Default)]
pub struct SectorParser {
    pub occurrences: Vec<AttributeOccurrence>,
    pub skipped_lines: usize,
}

impl SectorParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one sector file; the sector coordinates come from the name.
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Sector> {
        let path = path.as_ref();
        let (sector_x, sector_y, z) = parse_sector_name(path)?;
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.parse_text(&name, sector_x, sector_y, z, &latin1_to_string(&bytes)))
    }

    /// Parse sector text for the given sector coordinates.
    pub fn parse_text(
        &mut self,
        source_file: &str,
        sector_x: u16,
        sector_y: u16,
        z: u8,
        text: &str,
    ) -> Sector {
        let mut tiles = Vec::new();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.parse_tile_line(source_file, sector_x, sector_y, z, line) {
                Some(tile) => tiles.push(tile),
                None => {
                    if line.contains(':') {
                        self.skipped_lines += 1;
                        debug!("Skipping malformed tile line in {}: {}", source_file, line);
                    }
                }
            }
        }
        Sector {
            sector_x,
            sector_y,
            z,
            tiles,
        }
    }

    fn parse_tile_line(
        &mut self,
        source_file: &str,
        sector_x: u16,
        sector_y: u16,
        z: u8,
        line: &str,
    ) -> Option<Tile> {
        let (coords, rest) = line.split_once(':')?;
        let (lx, ly) = coords.trim().split_once('-')?;
        let lx: u16 = lx.trim().parse().ok()?;
        let ly: u16 = ly.trim().parse().ok()?;
        if lx >= SECTOR_SIZE || ly >= SECTOR_SIZE {
            return None;
        }

        let position = Position::new(
            sector_x.checked_mul(SECTOR_SIZE)?.checked_add(lx)?,
            sector_y.checked_mul(SECTOR_SIZE)?.checked_add(ly)?,
            z,
        );
        let mut tile = Tile::new(position);

        let (content, remainder) = extract_braced(rest, "Content")?;
        for token in remainder.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if let Some(flag) = TileFlags::from_token(token) {
                tile.flags |= flag;
            }
        }

        let ctx = LineContext {
            source_file,
            position,
            local_x: lx,
            local_y: ly,
            line,
        };
        for spec in split_top_level(&content) {
            let spec = spec.trim();
            if spec.is_empty() {
                continue;
            }
            if let Some(item) = self.parse_item_spec(spec, &ctx) {
                tile.items.push(item);
            }
        }
        Some(tile)
    }

    /// Parse one item spec, recursing into nested container contents.
    fn parse_item_spec(&mut self, spec: &str, ctx: &LineContext<'_>) -> Option<ItemInstance> {
        // Content before String: the nested list may contain quotes that
        // would otherwise cut its closing brace off.
        let (contents, spec) = match extract_braced(spec, "Content") {
            Some((inner, remainder)) => (Some(inner), remainder),
            None => (None, spec.to_string()),
        };
        let (text, spec) = match extract_quoted(&spec, "String") {
            Some((value, remainder)) => (Some(value), remainder),
            None => (None, spec),
        };

        let mut words = spec.split_whitespace();
        let type_id: u16 = words.next()?.parse().ok()?;
        let mut item = ItemInstance::new(type_id);

        if let Some(text) = text {
            self.record(ctx, AttributeKind::String);
            item.text = Some(text);
        }

        for word in words {
            let Some((key, value)) = word.split_once('=') else {
                continue;
            };
            let Ok(value) = value.parse::<i64>() else {
                continue;
            };
            match key {
                "ChestQuestNumber" => {
                    self.record(ctx, AttributeKind::ChestQuestNumber);
                    item.action_id = Some(clamp_u16(value));
                }
                "KeyholeNumber" => {
                    self.record(ctx, AttributeKind::KeyholeNumber);
                    item.action_id = Some(clamp_u16(value));
                }
                "DoorQuestNumber" => {
                    self.record(ctx, AttributeKind::DoorQuestNumber);
                    item.action_id = Some(clamp_u16(value));
                }
                "Level" => {
                    self.record(ctx, AttributeKind::Level);
                    item.action_id = Some(clamp_u16(value));
                }
                "KeyNumber" => {
                    self.record(ctx, AttributeKind::KeyNumber);
                    item.unique_id = Some(clamp_u16(value));
                }
                "DoorQuestValue" => {
                    self.record(ctx, AttributeKind::DoorQuestValue);
                    item.unique_id = Some(clamp_u16(value));
                }
                "Amount" => {
                    self.record(ctx, AttributeKind::Amount);
                    item.count = Some(value.clamp(0, u8::MAX as i64) as u8);
                }
                "Charges" => {
                    self.record(ctx, AttributeKind::Charges);
                    item.charges = Some(clamp_u16(value));
                }
                "ContainerLiquidType" => {
                    self.record(ctx, AttributeKind::ContainerLiquidType);
                    item.liquid_subtype =
                        Some(translate_liquid(value.clamp(0, u8::MAX as i64) as u8));
                }
                "PoolLiquidType" => {
                    self.record(ctx, AttributeKind::PoolLiquidType);
                    item.liquid_subtype =
                        Some(translate_liquid(value.clamp(0, u8::MAX as i64) as u8));
                }
                "AbsTeleportDestination" => {
                    self.record(ctx, AttributeKind::AbsTeleportDestination);
                    item.teleport_dest = Some(Position::from_packed(value as i32));
                }
                // Server-managed timers and uses; defaults are restored
                // on load, so nothing is carried over.
                "RemainingExpireTime" | "SavedExpireTime" | "RemainingUses" => {}
                _ => {
                    debug!("Ignoring item key {:?} in {}", key, ctx.source_file);
                }
            }
        }

        if let Some(inner) = contents {
            for child_spec in split_top_level(&inner) {
                let child_spec = child_spec.trim();
                if child_spec.is_empty() {
                    continue;
                }
                if let Some(child) = self.parse_item_spec(child_spec, ctx) {
                    item.contents.push(child);
                }
            }
        }

        Some(item)
    }

    fn record(&mut self, ctx: &LineContext<'_>, kind: AttributeKind) {
        self.occurrences.push(AttributeOccurrence {
            kind,
            position: ctx.position,
            source_file: ctx.source_file.to_string(),
            local_x: ctx.local_x,
            local_y: ctx.local_y,
            line: ctx.line.to_string(),
        });
    }
}

struct LineContext<'a> {
    source_file: &'a str,
    position: Position,
    local_x: u16,
    local_y: u16,
    line: &'a str,
}

fn clamp_u16(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}

/// Decode `SSSS-SSSS-ZZ.sec` into sector coordinates.
pub fn parse_sector_name(path: &Path) -> Result<(u16, u16, u8)> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut parts = stem.split('-');
    let err = || crate::WorldError::MalformedRecord {
        file: stem.clone(),
        detail: "sector file name is not SSSS-SSSS-ZZ".to_string(),
    };
    let sx: u16 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
    let sy: u16 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
    let z: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
    if z > crate::MAP_MAX_Z {
        return Err(err());
    }
    Ok((sx, sy, z))
}

/// Split on top-level commas, honoring quoted strings (with backslash
/// escapes) and brace nesting.
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for ch in s.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                current.push(ch);
            }
            '{' => {
                depth += 1;
                current.push(ch);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

/// Carve `<key>={...}` out of `s`, returning the brace interior and the
/// remainder with the whole span removed. Brace matching skips quoted
/// strings so braces inside text do not unbalance the scan.
fn extract_braced(s: &str, key: &str) -> Option<(String, String)> {
    let needle = format!("{}={{", key);
    let start = s.find(&needle)?;
    let inner_start = start + needle.len();

    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in s[inner_start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let inner_end = inner_start + offset;
                    let inner = s[inner_start..inner_end].to_string();
                    let mut remainder = s[..start].to_string();
                    remainder.push(' ');
                    remainder.push_str(&s[inner_end + 1..]);
                    return Some((inner, remainder));
                }
            }
            _ => {}
        }
    }
    warn!("Unterminated {}= block: {:?}", key, s);
    None
}

/// Carve `<key>="..."` out of `s`, resolving `\\` and `\"` escapes.
fn extract_quoted(s: &str, key: &str) -> Option<(String, String)> {
    let needle = format!("{}=\"", key);
    let start = s.find(&needle)?;
    let inner_start = start + needle.len();

    let mut value = String::new();
    let mut escaped = false;
    for (offset, ch) in s[inner_start..].char_indices() {
        if escaped {
            match ch {
                '\\' | '"' => value.push(ch),
                'n' => value.push('\n'),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            let inner_end = inner_start + offset;
            let mut remainder = s[..start].to_string();
            remainder.push(' ');
            remainder.push_str(&s[inner_end + 1..]);
            return Some((value, remainder));
        } else {
            value.push(ch);
        }
    }
    warn!("Unterminated {}= string: {:?}", key, s);
    None
}
