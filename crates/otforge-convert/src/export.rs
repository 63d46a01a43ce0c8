//! OTBM to sector-file export
//!
//! The inverse direction: walk an OTBM node stream, validate every item
//! type against the object catalog, and re-emit sector text files. Item
//! ids missing from the catalog are dropped and logged once each.

use crate::otbm::{OtbmAttribute, OtbmNodeType};
use crate::Result;
use flate2::read::GzDecoder;
use otforge_codec::NodeReader;
use otforge_world::{ItemCatalog, ItemInstance, SECTOR_SIZE};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Counters for one export run.
#[derive(Debug, Default)]
pub struct ExportStats {
    pub tiles: usize,
    pub items: usize,
    pub invalid_dropped: usize,
    pub invalid_ids: BTreeSet<u16>,
    pub sector_files: usize,
    /// Attribute tags outside this reader's vocabulary, skipped over.
    pub unknown_attributes: usize,
}

/// Export an OTBM file to sector files under `out_dir`.
pub fn export_map_to_sectors<P: AsRef<Path>, Q: AsRef<Path>>(
    otbm_path: P,
    out_dir: Q,
    logs_dir: &Path,
    catalog: &ItemCatalog,
) -> Result<ExportStats> {
    let data = read_map_bytes(otbm_path.as_ref())?;
    info!("Read OTBM stream: {} bytes", data.len());

    let mut stats = ExportStats::default();
    let mut buckets: BTreeMap<(u16, u16, u8), Vec<(u16, u16, Vec<ItemInstance>)>> =
        BTreeMap::new();

    parse_map(&data, catalog, &mut stats, &mut buckets)?;

    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;
    for ((sx, sy, z), tiles) in &buckets {
        let path = out_dir.join(format!("{:04}-{:04}-{:02}.sec", sx, sy, z));
        let mut out = fs::File::create(&path)?;
        writeln!(out, "# Data for sector {}/{}/{}", sx, sy, z)?;
        writeln!(out)?;
        writeln!(out, "# SectorFormat=TextDump")?;
        writeln!(out, "# FormatVersion=1")?;
        writeln!(out)?;
        writeln!(out, "# SectorCoords: {} {} {}", sx, sy, z)?;
        writeln!(out)?;
        for (lx, ly, items) in tiles {
            writeln!(out, "{}-{}: Content={{{}}}", lx, ly, render_items(items))?;
        }
        stats.sector_files += 1;
    }

    if !stats.invalid_ids.is_empty() {
        fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join("invalid_typeids.log");
        let mut log = fs::File::create(&log_path)?;
        writeln!(log, "# type ids absent from the object catalog")?;
        for id in &stats.invalid_ids {
            writeln!(log, "{}", id)?;
        }
        warn!(
            "{} invalid type ids logged to {}",
            stats.invalid_ids.len(),
            log_path.display()
        );
    }

    info!(
        "Exported {} tiles / {} items into {} sector files",
        stats.tiles, stats.items, stats.sector_files
    );
    Ok(stats)
}

/// Read the map file, transparently decompressing a gzip stream.
fn read_map_bytes(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path)?;
    if raw.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(raw.as_slice());
        let mut data = Vec::new();
        decoder.read_to_end(&mut data)?;
        return Ok(data);
    }
    Ok(raw)
}

fn parse_map(
    data: &[u8],
    catalog: &ItemCatalog,
    stats: &mut ExportStats,
    buckets: &mut BTreeMap<(u16, u16, u8), Vec<(u16, u16, Vec<ItemInstance>)>>,
) -> Result<()> {
    let mut reader = NodeReader::new(data);
    // File identifier: `OTBM` magic or four zero bytes.
    reader.skip_raw(4)?;

    reader.enter_node()?;
    let _version = reader.read_u32()?;
    let _width = reader.read_u16()?;
    let _height = reader.read_u16()?;
    let _otb_major = reader.read_u32()?;
    let _otb_minor = reader.read_u32()?;

    while reader.at_node_start() {
        let tag = reader.enter_node()?;
        if tag == OtbmNodeType::MapData as u8 {
            parse_map_data(&mut reader, catalog, stats, buckets)?;
            reader.leave_node()?;
        } else {
            reader.skip_node()?;
        }
    }
    reader.leave_node()?;
    Ok(())
}

fn parse_map_data(
    reader: &mut NodeReader<'_>,
    catalog: &ItemCatalog,
    stats: &mut ExportStats,
    buckets: &mut BTreeMap<(u16, u16, u8), Vec<(u16, u16, Vec<ItemInstance>)>>,
) -> Result<()> {
    while !reader.at_node_start() && !reader.at_node_end() {
        let attr = reader.read_u8()?;
        match attr {
            a if a == OtbmAttribute::Description as u8
                || a == OtbmAttribute::ExtSpawnFile as u8
                || a == OtbmAttribute::ExtHouseFile as u8 =>
            {
                reader.read_string()?;
            }
            other => {
                warn!("Skipping unknown map attribute 0x{:02X}", other);
                stats.unknown_attributes += 1;
                skip_to_node_boundary(reader)?;
            }
        }
    }

    while reader.at_node_start() {
        let tag = reader.enter_node()?;
        if tag == OtbmNodeType::TileArea as u8 {
            parse_tile_area(reader, catalog, stats, buckets)?;
            reader.leave_node()?;
        } else {
            // Towns, waypoints and anything newer have no sector
            // counterpart.
            reader.skip_node()?;
        }
    }
    Ok(())
}

fn parse_tile_area(
    reader: &mut NodeReader<'_>,
    catalog: &ItemCatalog,
    stats: &mut ExportStats,
    buckets: &mut BTreeMap<(u16, u16, u8), Vec<(u16, u16, Vec<ItemInstance>)>>,
) -> Result<()> {
    let base_x = reader.read_u16()?;
    let base_y = reader.read_u16()?;
    let z = reader.read_u8()?;

    while reader.at_node_start() {
        let tag = reader.enter_node()?;
        if tag == OtbmNodeType::Tile as u8 || tag == OtbmNodeType::HouseTile as u8 {
            let local_x = reader.read_u8()? as u16;
            let local_y = reader.read_u8()? as u16;
            if tag == OtbmNodeType::HouseTile as u8 {
                let _house_id = reader.read_u32()?;
            }
            skip_tile_attributes(reader, stats)?;

            let mut items = Vec::new();
            while reader.at_node_start() {
                let child = reader.enter_node()?;
                if child == OtbmNodeType::Item as u8 {
                    items.extend(parse_item(reader, catalog, stats)?);
                    reader.leave_node()?;
                } else {
                    reader.skip_node()?;
                }
            }
            reader.leave_node()?;

            if !items.is_empty() {
                let abs_x = base_x + local_x;
                let abs_y = base_y + local_y;
                let sector = (abs_x / SECTOR_SIZE, abs_y / SECTOR_SIZE, z);
                let lx = abs_x % SECTOR_SIZE;
                let ly = abs_y % SECTOR_SIZE;
                buckets.entry(sector).or_default().push((lx, ly, items));
                stats.tiles += 1;
            }
        } else {
            reader.skip_node()?;
        }
    }
    Ok(())
}

fn skip_tile_attributes(reader: &mut NodeReader<'_>, stats: &mut ExportStats) -> Result<()> {
    while !reader.at_node_start() && !reader.at_node_end() {
        let attr = reader.read_u8()?;
        match attr {
            a if a == OtbmAttribute::TileFlags as u8 => {
                reader.read_u32()?;
            }
            other => {
                warn!("Skipping unknown tile attribute 0x{:02X}", other);
                stats.unknown_attributes += 1;
                skip_to_node_boundary(reader)?;
            }
        }
    }
    Ok(())
}

/// Consume payload bytes up to the next unescaped node marker.
///
/// Attribute payloads are escaped on the wire, so the first unescaped
/// marker is a real node boundary; everything before it can be discarded
/// without losing the framing.
fn skip_to_node_boundary(reader: &mut NodeReader<'_>) -> Result<()> {
    while !reader.at_node_start() && !reader.at_node_end() {
        reader.read_u8()?;
    }
    Ok(())
}

/// Parse one Item node body.
///
/// Returns the surviving instances at this level: the item itself when
/// its id is in the catalog, otherwise its valid children hoisted up.
fn parse_item(
    reader: &mut NodeReader<'_>,
    catalog: &ItemCatalog,
    stats: &mut ExportStats,
) -> Result<Vec<ItemInstance>> {
    let type_id = reader.read_u16()?;
    let mut item = ItemInstance::new(type_id);

    while !reader.at_node_start() && !reader.at_node_end() {
        let attr = reader.read_u8()?;
        match attr {
            a if a == OtbmAttribute::Count as u8 => item.count = Some(reader.read_u8()?),
            a if a == OtbmAttribute::ActionId as u8 => {
                item.action_id = Some(reader.read_u16()?)
            }
            a if a == OtbmAttribute::UniqueId as u8 => {
                item.unique_id = Some(reader.read_u16()?)
            }
            a if a == OtbmAttribute::Charges as u8 => item.charges = Some(reader.read_u16()?),
            a if a == OtbmAttribute::Text as u8 => {
                let bytes = reader.read_string()?;
                item.text = Some(otforge_world::latin1_to_string(&bytes));
            }
            a if a == OtbmAttribute::TeleDest as u8 => {
                let x = reader.read_u16()?;
                let y = reader.read_u16()?;
                let z = reader.read_u8()?;
                item.teleport_dest = Some(otforge_world::Position::new(x, y, z));
            }
            other => {
                warn!("Skipping unknown item attribute 0x{:02X}", other);
                stats.unknown_attributes += 1;
                skip_to_node_boundary(reader)?;
            }
        }
    }

    while reader.at_node_start() {
        let child = reader.enter_node()?;
        if child == OtbmNodeType::Item as u8 {
            let nested = parse_item(reader, catalog, stats)?;
            item.contents.extend(nested);
            reader.leave_node()?;
        } else {
            reader.skip_node()?;
        }
    }

    if !catalog.contains(type_id) {
        stats.invalid_dropped += 1;
        stats.invalid_ids.insert(type_id);
        return Ok(item.contents);
    }
    stats.items += 1;
    Ok(vec![item])
}

/// Render an item list back into sector Content syntax, ids only, with
/// container nesting preserved.
fn render_items(items: &[ItemInstance]) -> String {
    items
        .iter()
        .map(|item| {
            if item.contents.is_empty() {
                item.type_id.to_string()
            } else {
                format!("{} Content={{{}}}", item.type_id, render_items(&item.contents))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
