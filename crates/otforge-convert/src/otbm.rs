//! OTBM map writer
//!
//! Emits the editor's binary world map: a root header node, a MapData
//! node with the description and external file attributes, tile areas of
//! 256x256 tiles, and a Towns node written after the areas so the editor
//! finds every temple tile already present.

use crate::stats::ConvertStats;
use crate::Result;
use otforge_codec::NodeWriter;
use otforge_world::{string_to_latin1, ItemInstance, Tile, Town};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// OTBM node types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtbmNodeType {
    Root = 0,
    MapData = 2,
    TileArea = 4,
    Tile = 5,
    Item = 6,
    Towns = 12,
    Town = 13,
    HouseTile = 14,
}

/// OTBM attribute tags
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtbmAttribute {
    Description = 1,
    TileFlags = 3,
    ActionId = 4,
    UniqueId = 5,
    Text = 6,
    TeleDest = 8,
    ExtSpawnFile = 11,
    ExtHouseFile = 13,
    Count = 15,
    Charges = 22,
}

/// Map format header constants
const OTBM_VERSION: u32 = 1;
const MAP_DIMENSION: u16 = 65535;
const ITEMS_MAJOR_VERSION: u32 = 1;
const ITEMS_MINOR_VERSION: u32 = 100;

/// Containers nested deeper than this are dropped.
const MAX_CONTAINER_DEPTH: usize = 16;

/// Everything the map file needs, assembled by the pipeline.
#[derive(Debug, Default)]
pub struct MapDocument {
    pub description: String,
    pub spawn_file: String,
    pub house_file: String,
    pub towns: Vec<Town>,
    /// Tiles with absolute positions, normalized stacks and house ids.
    pub tiles: Vec<Tile>,
}

/// Emit the complete OTBM byte stream.
pub fn write_map(doc: &MapDocument, stats: &mut ConvertStats) -> Result<Vec<u8>> {
    let mut writer = NodeWriter::new();
    writer.write_raw(b"OTBM");

    writer.begin_node(OtbmNodeType::Root as u8);
    writer.write_u32(OTBM_VERSION);
    writer.write_u16(MAP_DIMENSION);
    writer.write_u16(MAP_DIMENSION);
    writer.write_u32(ITEMS_MAJOR_VERSION);
    writer.write_u32(ITEMS_MINOR_VERSION);

    writer.begin_node(OtbmNodeType::MapData as u8);
    write_string_attr(&mut writer, OtbmAttribute::Description, &doc.description);
    write_string_attr(&mut writer, OtbmAttribute::ExtSpawnFile, &doc.spawn_file);
    write_string_attr(&mut writer, OtbmAttribute::ExtHouseFile, &doc.house_file);

    // 256x256 areas keyed by the high coordinate bytes, in sorted order.
    let mut areas: BTreeMap<(u16, u16, u8), Vec<&Tile>> = BTreeMap::new();
    for tile in &doc.tiles {
        let key = (
            tile.position.x & 0xFF00,
            tile.position.y & 0xFF00,
            tile.position.z,
        );
        areas.entry(key).or_default().push(tile);
    }
    info!("Writing {} tile areas", areas.len());

    for ((base_x, base_y, z), tiles) in &areas {
        writer.begin_node(OtbmNodeType::TileArea as u8);
        writer.write_u16(*base_x);
        writer.write_u16(*base_y);
        writer.write_u8(*z);
        for tile in tiles {
            write_tile(&mut writer, tile, stats)?;
        }
        writer.end_node()?;
    }

    writer.begin_node(OtbmNodeType::Towns as u8);
    for town in &doc.towns {
        writer.begin_node(OtbmNodeType::Town as u8);
        writer.write_u32(town.id);
        writer.write_string(&string_to_latin1(&town.name));
        writer.write_u16(town.temple.x);
        writer.write_u16(town.temple.y);
        writer.write_u8(town.temple.z);
        writer.end_node()?;
    }
    writer.end_node()?;

    writer.end_node()?; // MapData
    writer.end_node()?; // Root
    Ok(writer.finish()?)
}

fn write_tile(writer: &mut NodeWriter, tile: &Tile, stats: &mut ConvertStats) -> Result<()> {
    let node_type = if tile.house_id.is_some() {
        OtbmNodeType::HouseTile
    } else {
        OtbmNodeType::Tile
    };
    writer.begin_node(node_type as u8);
    writer.write_u8((tile.position.x & 0xFF) as u8);
    writer.write_u8((tile.position.y & 0xFF) as u8);
    if let Some(house_id) = tile.house_id {
        writer.write_u32(house_id);
        stats.house_tiles += 1;
    }

    // Flags precede item children; interleaving confuses other tools.
    if !tile.flags.is_empty() {
        writer.write_u8(OtbmAttribute::TileFlags as u8);
        writer.write_u32(tile.flags.bits());
    }

    for item in &tile.items {
        write_item(writer, item, 0, stats)?;
    }

    writer.end_node()?;
    stats.tiles_written += 1;
    Ok(())
}

fn write_item(
    writer: &mut NodeWriter,
    item: &ItemInstance,
    depth: usize,
    stats: &mut ConvertStats,
) -> Result<()> {
    if depth > MAX_CONTAINER_DEPTH {
        warn!(
            "Dropping item {} nested deeper than {}",
            item.type_id, MAX_CONTAINER_DEPTH
        );
        return Ok(());
    }
    if depth > 0 {
        stats.container_child_items += 1;
    }

    writer.begin_node(OtbmNodeType::Item as u8);
    writer.write_u16(item.type_id);

    // The Count attribute carries either a stack count or a liquid
    // subtype; the liquid wins if both are present.
    if let Some(subtype) = item.liquid_subtype {
        writer.write_u8(OtbmAttribute::Count as u8);
        writer.write_u8(subtype);
    } else if let Some(count) = item.count {
        writer.write_u8(OtbmAttribute::Count as u8);
        writer.write_u8(count);
    }
    if let Some(action_id) = item.action_id {
        writer.write_u8(OtbmAttribute::ActionId as u8);
        writer.write_u16(action_id);
        stats.action_id_items += 1;
    }
    if let Some(unique_id) = item.unique_id {
        writer.write_u8(OtbmAttribute::UniqueId as u8);
        writer.write_u16(unique_id);
    }
    if let Some(charges) = item.charges {
        writer.write_u8(OtbmAttribute::Charges as u8);
        writer.write_u16(charges);
    }
    if let Some(text) = &item.text {
        writer.write_u8(OtbmAttribute::Text as u8);
        writer.write_string(&string_to_latin1(text));
        stats.text_items += 1;
    }
    if let Some(dest) = item.teleport_dest {
        writer.write_u8(OtbmAttribute::TeleDest as u8);
        writer.write_u16(dest.x);
        writer.write_u16(dest.y);
        writer.write_u8(dest.z);
    }

    for child in &item.contents {
        write_item(writer, child, depth + 1, stats)?;
    }

    writer.end_node()?;
    stats.items_written += 1;
    Ok(())
}

fn write_string_attr(writer: &mut NodeWriter, attr: OtbmAttribute, value: &str) {
    writer.write_u8(attr as u8);
    writer.write_string(&string_to_latin1(value));
}
