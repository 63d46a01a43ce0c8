//! Town discovery and temple resolution
//!
//! Towns are discovered from the scripted move-use registry: inside the
//! "Hometeleporters" section, a label like `"Home Thais (1)"` names the
//! town whose temple is the following `SetStart(Obj2,[x,y,z])`
//! destination. Labels marked `(1)` win over duplicates. Towns absent
//! from the registry fall back to `Mark = ("Name",[x,y,z])` entries in
//! the map file. Town ids are depot ids plus one, matched against the
//! house-area registry by name.

use crate::house::{parse_bracketed_position, HouseArea};
use crate::position::Position;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Town definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Town {
    pub id: u32,
    pub name: String,
    pub temple: Position,
}

/// A temple candidate scraped from one of the two sources.
#[derive(Debug, Clone)]
struct TempleCandidate {
    name: String,
    temple: Position,
    /// Whether the label carried the `(1)` marker.
    primary: bool,
}

/// Scan the move-use registry's Hometeleporters section.
fn parse_hometeleporters(text: &str) -> Vec<TempleCandidate> {
    let mut candidates = Vec::new();
    let mut in_section = false;
    let mut label: Option<(String, bool)> = None;

    for line in text.lines() {
        if !in_section {
            if line.contains("Hometeleporters") {
                in_section = true;
            }
            continue;
        }
        if let Some(parsed) = parse_home_label(line) {
            label = Some(parsed);
        }
        if let Some(pos) = parse_set_start(line) {
            if let Some((name, primary)) = label.clone() {
                candidates.push(TempleCandidate {
                    name,
                    temple: pos,
                    primary,
                });
            } else {
                debug!("SetStart with no home label: {}", line.trim());
            }
        }
    }
    candidates
}

/// Extract `("Home <Name> (n)", primary)` from a line, if labeled.
fn parse_home_label(line: &str) -> Option<(String, bool)> {
    let start = line.find("\"Home ")?;
    let rest = &line[start + 1..];
    let end = rest.find('"')?;
    let label = &rest[..end];
    let body = label.strip_prefix("Home ")?.trim();
    // Split off the trailing "(n)" marker.
    let open = body.rfind('(')?;
    let marker = body[open..].trim();
    let name = body[..open].trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), marker == "(1)"))
}

/// Extract the destination of a `SetStart(Obj2,[x,y,z])` call.
fn parse_set_start(line: &str) -> Option<Position> {
    let at = line.find("SetStart")?;
    let rest = &line[at..];
    if !rest.contains("Obj2") {
        return None;
    }
    let open = rest.find('[')?;
    let close = rest[open..].find(']')? + open;
    parse_bracketed_position(&rest[open..=close])
}

/// Parse `Mark = ("Name",[x,y,z])` lines from the map file.
fn parse_map_marks(text: &str) -> Vec<(String, Position)> {
    let mut marks = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() != "Mark" {
            continue;
        }
        let Some(q_start) = value.find('"') else {
            continue;
        };
        let Some(q_len) = value[q_start + 1..].find('"') else {
            continue;
        };
        let name = value[q_start + 1..q_start + 1 + q_len].to_string();
        let after = &value[q_start + 1 + q_len + 1..];
        let Some(open) = after.find('[') else {
            continue;
        };
        let Some(close) = after[open..].find(']') else {
            continue;
        };
        if let Some(pos) = parse_bracketed_position(&after[open..=open + close]) {
            marks.push((name, pos));
        }
    }
    marks
}

/// Build the town list from both sources plus the house-area registry.
///
/// The teleporter section wins; map marks only add towns it missed.
pub fn resolve_towns(
    moveuse_text: &str,
    map_text: &str,
    areas: &[HouseArea],
) -> Vec<Town> {
    let mut picked: Vec<TempleCandidate> = Vec::new();
    for candidate in parse_hometeleporters(moveuse_text) {
        match picked.iter_mut().find(|c| c.name == candidate.name) {
            Some(existing) => {
                if candidate.primary && !existing.primary {
                    *existing = candidate;
                }
            }
            None => picked.push(candidate),
        }
    }
    for (name, temple) in parse_map_marks(map_text) {
        if !picked.iter().any(|c| c.name.eq_ignore_ascii_case(&name)) {
            picked.push(TempleCandidate {
                name,
                temple,
                primary: false,
            });
        }
    }

    let mut towns = Vec::new();
    let mut unmatched: Vec<TempleCandidate> = Vec::new();
    for candidate in picked {
        match depot_for(&candidate.name, areas) {
            Some(depot_id) => towns.push(Town {
                id: depot_id + 1,
                name: candidate.name,
                temple: candidate.temple,
            }),
            None => unmatched.push(candidate),
        }
    }

    let mut next_id = towns.iter().map(|t| t.id).max().unwrap_or(0) + 1;
    for candidate in unmatched {
        warn!(
            "No depot area matches town {:?}; assigning id {}",
            candidate.name, next_id
        );
        towns.push(Town {
            id: next_id,
            name: candidate.name,
            temple: candidate.temple,
        });
        next_id += 1;
    }

    towns.sort_by_key(|t| t.id);
    info!("Resolved {} towns", towns.len());
    towns
}

/// Depot id for a town name: exact case-insensitive area-name match
/// first, then an area name starting with the town name.
fn depot_for(town_name: &str, areas: &[HouseArea]) -> Option<u32> {
    if let Some(area) = areas
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(town_name))
    {
        return Some(area.depot_id);
    }
    areas
        .iter()
        .find(|a| {
            a.name
                .to_ascii_lowercase()
                .starts_with(&town_name.to_ascii_lowercase())
        })
        .map(|a| a.depot_id)
}
