//! Run counters surfaced in the final summary

use std::fmt;

/// Counters accumulated across the whole pipeline.
#[derive(Debug, Default, Clone)]
pub struct ConvertStats {
    pub item_types: usize,
    pub sector_files_parsed: usize,
    pub sector_files_failed: usize,
    pub malformed_lines: usize,
    pub house_records_skipped: usize,
    pub creature_files_failed: usize,
    pub spawn_lines_skipped: usize,
    pub tiles_written: usize,
    pub house_tiles: usize,
    pub items_written: usize,
    pub container_child_items: usize,
    pub action_id_items: usize,
    pub text_items: usize,
    pub houses: usize,
    pub towns: usize,
    pub creatures_placed: usize,
    pub npc_centers_shifted: usize,
    pub spawn_regions_skipped: usize,
    pub attribute_occurrences: usize,
}

impl fmt::Display for ConvertStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Conversion summary:")?;
        writeln!(f, "  item types:          {}", self.item_types)?;
        writeln!(
            f,
            "  sector files:        {} parsed, {} failed",
            self.sector_files_parsed, self.sector_files_failed
        )?;
        writeln!(f, "  malformed lines:     {}", self.malformed_lines)?;
        writeln!(
            f,
            "  skipped records:     {} house, {} creature files, {} spawn lines",
            self.house_records_skipped, self.creature_files_failed, self.spawn_lines_skipped
        )?;
        writeln!(
            f,
            "  tiles written:       {} ({} house tiles)",
            self.tiles_written, self.house_tiles
        )?;
        writeln!(
            f,
            "  items written:       {} ({} inside containers)",
            self.items_written, self.container_child_items
        )?;
        writeln!(
            f,
            "  tagged items:        {} action-id, {} text",
            self.action_id_items, self.text_items
        )?;
        writeln!(f, "  houses:              {}", self.houses)?;
        writeln!(f, "  towns:               {}", self.towns)?;
        writeln!(
            f,
            "  creatures placed:    {} ({} NPC centers shifted, {} regions skipped)",
            self.creatures_placed, self.npc_centers_shifted, self.spawn_regions_skipped
        )?;
        write!(
            f,
            "  attribute records:   {}",
            self.attribute_occurrences
        )
    }
}
