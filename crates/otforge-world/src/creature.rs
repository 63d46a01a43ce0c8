//! Creature definitions and the spawn list
//!
//! One file per creature: the filename stem is the creature's stable
//! identifier, prefixed `mon-` or `npc-` where the two namespaces need
//! disambiguation. Monster spawn regions come from the spawn list file;
//! NPC spawn regions come from the `Home`/`Radius` fields of the NPC
//! files themselves.

use crate::house::parse_bracketed_position;
use crate::position::Position;
use crate::{latin1_to_string, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Which namespace a creature file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatureKind {
    Monster,
    Npc,
}

/// Default NPC looktype when neither outfit nor race number is usable.
const NPC_FALLBACK_LOOKTYPE: u16 = 130;

/// Creature outfit: looktype plus the four color channels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Outfit {
    pub look_type: u16,
    pub head: u8,
    pub body: u8,
    pub legs: u8,
    pub feet: u8,
}

/// One parsed creature file.
#[derive(Debug, Clone)]
pub struct CreatureFile {
    pub kind: CreatureKind,
    /// Filename stem.
    pub stem: String,
    pub name: String,
    pub race_number: u32,
    pub outfit: Outfit,
    /// NPC home position, when present.
    pub home: Option<Position>,
    /// NPC wander radius, when present.
    pub radius: Option<u16>,
}

impl CreatureFile {
    /// Namespaced identifier, stable across runs.
    pub fn identifier(&self) -> String {
        match self.kind {
            CreatureKind::Monster => format!("mon-{}", self.stem),
            CreatureKind::Npc => format!("npc-{}", self.stem),
        }
    }

    /// Looktype with the server's fallback chain applied.
    pub fn effective_looktype(&self) -> u16 {
        if self.outfit.look_type != 0 {
            return self.outfit.look_type;
        }
        if self.race_number != 0 {
            return self.race_number as u16;
        }
        match self.kind {
            CreatureKind::Monster => 0,
            CreatureKind::Npc => NPC_FALLBACK_LOOKTYPE,
        }
    }
}

/// Parse one creature file.
pub fn load_creature_file<P: AsRef<Path>>(path: P, kind: CreatureKind) -> Result<CreatureFile> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(parse_creature_text(&stem, kind, &latin1_to_string(&bytes)))
}

/// Parse creature file text.
pub fn parse_creature_text(stem: &str, kind: CreatureKind, text: &str) -> CreatureFile {
    let mut creature = CreatureFile {
        kind,
        stem: stem.to_string(),
        name: stem.to_string(),
        race_number: 0,
        outfit: Outfit::default(),
        home: None,
        radius: None,
    };

    for line in text.lines() {
        let line = strip_comment(line).trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "Name" => {
                if let Some(name) = unquote(value) {
                    creature.name = name;
                }
            }
            "RaceNumber" => creature.race_number = value.parse().unwrap_or(0),
            "Outfit" => {
                if let Some(outfit) = parse_outfit(value) {
                    creature.outfit = outfit;
                }
            }
            "Home" => creature.home = parse_bracketed_position(value),
            "Radius" => creature.radius = value.parse().ok(),
            _ => {}
        }
    }
    creature
}

/// Parse `(looktype, head-body-legs-feet)`.
fn parse_outfit(value: &str) -> Option<Outfit> {
    let inner = value
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let (look, colors) = match inner.split_once(',') {
        Some((look, colors)) => (look.trim(), colors.trim()),
        None => (inner.trim(), ""),
    };
    let look_type: u16 = look.parse().ok()?;

    let mut channels = colors.split('-').map(|c| c.trim().parse::<u8>());
    let mut next = || channels.next().and_then(|c| c.ok()).unwrap_or(0);
    Some(Outfit {
        look_type,
        head: next(),
        body: next(),
        legs: next(),
        feet: next(),
    })
}

/// One line of the spawn list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnEntry {
    pub race: u32,
    pub position: Position,
    pub radius: u16,
    pub amount: u16,
    pub respawn_seconds: u32,
}

/// Parse the spawn list file. Returns the entries plus the number of
/// short lines skipped.
pub fn load_spawn_entries<P: AsRef<Path>>(path: P) -> Result<(Vec<SpawnEntry>, usize)> {
    let bytes = fs::read(&path)?;
    let (entries, skipped) = parse_spawn_entries(&latin1_to_string(&bytes));
    info!(
        "Loaded {} spawn entries from {} ({} lines skipped)",
        entries.len(),
        path.as_ref().display(),
        skipped
    );
    Ok((entries, skipped))
}

/// Parse spawn list text.
///
/// Each line carries, in order, the integers race, x, y, z, radius,
/// amount and respawn seconds, with arbitrary punctuation between them.
/// Lines with fewer than seven integers are skipped and counted.
pub fn parse_spawn_entries(text: &str) -> (Vec<SpawnEntry>, usize) {
    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        let numbers = extract_integers(line);
        if numbers.len() < 7 {
            // Integer-free lines are structural, not malformed.
            if !numbers.is_empty() {
                debug!("Skipping short spawn line: {}", line);
                skipped += 1;
            }
            continue;
        }
        entries.push(SpawnEntry {
            race: numbers[0].clamp(0, u32::MAX as i64) as u32,
            position: Position::clamped(numbers[1], numbers[2], numbers[3]),
            radius: numbers[4].clamp(0, u16::MAX as i64) as u16,
            amount: numbers[5].clamp(0, u16::MAX as i64) as u16,
            respawn_seconds: numbers[6].clamp(0, u32::MAX as i64) as u32,
        });
    }
    (entries, skipped)
}

fn extract_integers(line: &str) -> Vec<i64> {
    let mut numbers = Vec::new();
    let mut current = String::new();
    for ch in line.chars() {
        if ch.is_ascii_digit() || (ch == '-' && current.is_empty()) {
            current.push(ch);
        } else if !current.is_empty() {
            if let Ok(n) = current.parse() {
                numbers.push(n);
            }
            current.clear();
        }
    }
    if let Ok(n) = current.parse() {
        numbers.push(n);
    }
    numbers
}

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

fn unquote(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let start = trimmed.find('"')?;
    let end = trimmed.rfind('"')?;
    (end > start).then(|| trimmed[start + 1..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monster_file() {
        let creature = parse_creature_text(
            "bear",
            CreatureKind::Monster,
            "# bear\nRaceNumber = 23\nName = \"bear\"\nOutfit = (82, 0-0-0-0)\n",
        );
        assert_eq!(creature.race_number, 23);
        assert_eq!(creature.outfit.look_type, 82);
        assert_eq!(creature.effective_looktype(), 82);
        assert_eq!(creature.identifier(), "mon-bear");
    }

    #[test]
    fn looktype_falls_back_to_race_number() {
        let creature = parse_creature_text(
            "slime",
            CreatureKind::Monster,
            "RaceNumber = 19\nOutfit = (0, 0-0-0-0)\n",
        );
        assert_eq!(creature.effective_looktype(), 19);
    }

    #[test]
    fn npc_falls_back_to_citizen_looktype() {
        let creature = parse_creature_text("sam", CreatureKind::Npc, "Name = \"Sam\"\n");
        assert_eq!(creature.effective_looktype(), NPC_FALLBACK_LOOKTYPE);
        assert_eq!(creature.identifier(), "npc-sam");
    }

    #[test]
    fn npc_home_and_radius() {
        let creature = parse_creature_text(
            "sam",
            CreatureKind::Npc,
            "Outfit = (128, 19-57-113-95)\nHome = [32313,32211,7]\nRadius = 3\n",
        );
        assert_eq!(creature.home, Some(Position::new(32313, 32211, 7)));
        assert_eq!(creature.radius, Some(3));
        assert_eq!(creature.outfit.head, 19);
        assert_eq!(creature.outfit.feet, 95);
    }

    #[test]
    fn spawn_lines_tolerate_punctuation() {
        let (entries, skipped) = parse_spawn_entries(
            "# spawns\n23, (32100,32200,7), 5, 3, 60\n17 32000 32001 6 2 1 300\nshort 1 2\n",
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(entries[0].race, 23);
        assert_eq!(entries[0].position, Position::new(32100, 32200, 7));
        assert_eq!(entries[0].radius, 5);
        assert_eq!(entries[0].amount, 3);
        assert_eq!(entries[0].respawn_seconds, 60);
        assert_eq!(entries[1].respawn_seconds, 300);
    }
}
