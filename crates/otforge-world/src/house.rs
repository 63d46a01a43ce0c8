//! House registry
//!
//! `houses.dat` holds one block per house, introduced by `ID = <int>`,
//! with the house name, rent, area id, guildhall flag, entry position and
//! the explicit set of occupied tile positions. `houseareas.dat` maps
//! area ids to named regions with a price and a depot id.

use crate::position::Position;
use crate::{latin1_to_string, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// One house, with its explicit tile set.
#[derive(Debug, Clone, Default)]
pub struct House {
    pub id: u32,
    pub name: String,
    pub area: u32,
    pub rent: u64,
    pub entry: Position,
    pub guildhall: bool,
    pub tiles: Vec<Position>,
}

impl House {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// One named house region from the area registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseArea {
    pub area_id: u32,
    pub name: String,
    pub price: u64,
    pub depot_id: u32,
}

/// Parse the house registry file. Returns the houses plus the number of
/// malformed records skipped.
pub fn load_houses<P: AsRef<Path>>(path: P) -> Result<(Vec<House>, usize)> {
    let bytes = fs::read(&path)?;
    let (houses, skipped) = parse_houses(&latin1_to_string(&bytes));
    info!(
        "Loaded {} houses from {} ({} records skipped)",
        houses.len(),
        path.as_ref().display(),
        skipped
    );
    Ok((houses, skipped))
}

/// Parse house registry text.
pub fn parse_houses(text: &str) -> (Vec<House>, usize) {
    let mut houses = Vec::new();
    let mut skipped = 0usize;
    let mut current: Option<House> = None;

    for line in join_continuations(text) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            skipped += 1;
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key == "ID" {
            if let Some(house) = current.take() {
                houses.push(house);
            }
            match value.parse::<u32>() {
                Ok(id) => current = Some(House::new(id)),
                Err(_) => {
                    warn!("Bad house ID value: {:?}", value);
                    skipped += 1;
                }
            }
            continue;
        }

        let Some(house) = current.as_mut() else {
            skipped += 1;
            continue;
        };
        match key {
            "Name" => house.name = unquote(value),
            "RentOffset" => house.rent = value.parse().unwrap_or(0),
            "Area" => house.area = value.parse().unwrap_or(0),
            "GuildHouse" => house.guildhall = parse_bool(value),
            "Exit" => match parse_bracketed_position(value) {
                Some(pos) => house.entry = pos,
                None => {
                    warn!("Bad house exit position: {:?}", value);
                    skipped += 1;
                }
            },
            "Fields" => house.tiles = parse_position_set(value),
            _ => {}
        }
    }
    if let Some(house) = current.take() {
        houses.push(house);
    }
    (houses, skipped)
}

/// Parse the house-area registry file. Returns the areas plus the number
/// of malformed lines skipped.
pub fn load_house_areas<P: AsRef<Path>>(path: P) -> Result<(Vec<HouseArea>, usize)> {
    let bytes = fs::read(&path)?;
    let (areas, skipped) = parse_house_areas(&latin1_to_string(&bytes));
    info!(
        "Loaded {} house areas from {} ({} lines skipped)",
        areas.len(),
        path.as_ref().display(),
        skipped
    );
    Ok((areas, skipped))
}

/// Parse house-area tuples: `Area = (area_id, "name", price, depot_id)`.
///
/// Names may contain commas, so the tuple is split with a quote-aware
/// scan rather than a plain comma split.
pub fn parse_house_areas(text: &str) -> (Vec<HouseArea>, usize) {
    let mut areas = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() != "Area" {
            continue;
        }
        let inner = value
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();
        let fields = split_quoted_commas(inner);
        if fields.len() != 4 {
            warn!("Skipping malformed house area line: {}", line);
            skipped += 1;
            continue;
        }
        let (Ok(area_id), Ok(price), Ok(depot_id)) = (
            fields[0].trim().parse::<u32>(),
            fields[2].trim().parse::<u64>(),
            fields[3].trim().parse::<u32>(),
        ) else {
            warn!("Skipping malformed house area line: {}", line);
            skipped += 1;
            continue;
        };
        areas.push(HouseArea {
            area_id,
            name: unquote(&fields[1]),
            price,
            depot_id,
        });
    }
    (areas, skipped)
}

/// Join lines whose braces have not closed yet, so a Fields set wrapped
/// over several lines parses as one assignment.
fn join_continuations(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    let mut balance = 0i32;

    for line in text.lines() {
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(line);
        balance += line.matches('{').count() as i32;
        balance -= line.matches('}').count() as i32;
        if balance <= 0 {
            lines.push(std::mem::take(&mut pending));
            balance = 0;
        }
    }
    if !pending.is_empty() {
        lines.push(pending);
    }
    lines
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "True" | "TRUE")
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    if let (Some(start), Some(end)) = (trimmed.find('"'), trimmed.rfind('"')) {
        if end > start {
            return trimmed[start + 1..end].to_string();
        }
    }
    trimmed.to_string()
}

/// Parse one `[x,y,z]` position.
pub fn parse_bracketed_position(value: &str) -> Option<Position> {
    let inner = value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    let mut parts = inner.split(',');
    let x: i64 = parts.next()?.trim().parse().ok()?;
    let y: i64 = parts.next()?.trim().parse().ok()?;
    let z: i64 = parts.next()?.trim().parse().ok()?;
    Some(Position::clamped(x, y, z))
}

/// Parse a `{[x,y,z],[x,y,z],...}` set.
fn parse_position_set(value: &str) -> Vec<Position> {
    let inner = value.trim().trim_start_matches('{').trim_end_matches('}');
    let mut positions = Vec::new();
    for chunk in inner.split(']') {
        let chunk = chunk.trim().trim_start_matches(',').trim();
        if chunk.is_empty() {
            continue;
        }
        if let Some(pos) = parse_bracketed_position(&format!("{}]", chunk)) {
            positions.push(pos);
        }
    }
    positions
}

fn split_quoted_commas(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in s.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# houses.dat
ID = 7
Name = "Harbour Flat"
RentOffset = 500
Area = 33
GuildHouse = 1
Exit = [32345,32223,7]
Fields = {[32342,32220,7],[32343,32220,7],
          [32344,32220,7]}

ID = 8
Name = "Shack"
Area = 33
Exit = [32400,32230,7]
Fields = {[32400,32231,7]}
"#;

    #[test]
    fn parses_house_blocks() {
        let (houses, skipped) = parse_houses(SAMPLE);
        assert_eq!(houses.len(), 2);
        assert_eq!(skipped, 0);

        let flat = &houses[0];
        assert_eq!(flat.id, 7);
        assert_eq!(flat.name, "Harbour Flat");
        assert_eq!(flat.rent, 500);
        assert!(flat.guildhall);
        assert_eq!(flat.entry, Position::new(32345, 32223, 7));
        assert_eq!(flat.tiles.len(), 3);
        assert_eq!(flat.tiles[2], Position::new(32344, 32220, 7));

        let shack = &houses[1];
        assert!(!shack.guildhall);
        assert_eq!(shack.tiles.len(), 1);
    }

    #[test]
    fn area_names_may_contain_commas() {
        let (areas, skipped) = parse_house_areas("Area = (33,\"Carlin, North\",10000,2)\n");
        assert_eq!(areas.len(), 1);
        assert_eq!(skipped, 0);
        assert_eq!(areas[0].name, "Carlin, North");
        assert_eq!(areas[0].depot_id, 2);
        assert_eq!(areas[0].price, 10000);
    }

    #[test]
    fn malformed_area_lines_are_counted() {
        let (areas, skipped) =
            parse_house_areas("Area = (33,\"x\")\nArea = (bad,\"y\",5,1)\nArea = (34,\"y\",5,1)\n");
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].area_id, 34);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn malformed_house_records_are_counted() {
        let (houses, skipped) = parse_houses(
            "Name = \"orphan\"\nID = banana\nID = 9\nName = \"ok\"\nExit = [x,y,z]\n",
        );
        assert_eq!(houses.len(), 1);
        assert_eq!(houses[0].id, 9);
        // Orphan assignment, bad ID value, bad exit position.
        assert_eq!(skipped, 3);
    }
}
