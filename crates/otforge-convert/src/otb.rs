//! OTB item-database writer
//!
//! Produces the editor's binary item-type database. The root node carries
//! a fixed version record; every named catalog entry becomes one child
//! node whose tag byte is the item group.

use crate::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use otforge_codec::NodeWriter;
use otforge_world::{string_to_latin1, ItemCatalog, ItemGroup, ItemType};
use tracing::{debug, info};

/// Root attribute holding the version record.
const ROOT_ATTR_VERSION: u8 = 0x01;

/// Item attribute tags.
const ATTR_SERVER_ID: u8 = 0x10;
const ATTR_CLIENT_ID: u8 = 0x11;
const ATTR_NAME: u8 = 0x12;
const ATTR_SPEED: u8 = 0x14;
const ATTR_MAX_ITEMS: u8 = 0x16;

/// Version record: (major, minor, build) plus the NUL-padded identifier.
const OTB_MAJOR_VERSION: u32 = 1;
const OTB_MINOR_VERSION: u32 = 100;
const OTB_BUILD_NUMBER: u32 = 1;
const OTB_IDENTIFIER: &[u8] = b"OTB 1.0.0-7.70-cipsoft";
const OTB_IDENTIFIER_LEN: usize = 128;

/// Ground tiles all report this walking speed.
const GROUND_SPEED: u16 = 150;
/// Container volume when the catalog gives none.
const DEFAULT_CONTAINER_VOLUME: u16 = 8;

/// Emit the complete OTB file for a catalog.
pub fn write_item_database(catalog: &ItemCatalog) -> Result<Vec<u8>> {
    let mut writer = NodeWriter::new();
    // File signature: four zero bytes outside the node framing.
    writer.write_raw(&[0, 0, 0, 0]);

    writer.begin_node(0x00);
    writer.write_u32(0); // root flags
    writer.write_u8(ROOT_ATTR_VERSION);
    let version = version_record();
    writer.write_u16(version.len() as u16);
    writer.write_bytes(&version);

    let mut emitted = 0usize;
    let mut skipped_unnamed = 0usize;
    for item in catalog.types_sorted() {
        if item.name.is_empty() {
            skipped_unnamed += 1;
            debug!("Skipping unnamed item type {}", item.type_id);
            continue;
        }
        write_item_node(&mut writer, item)?;
        emitted += 1;
    }

    writer.end_node()?;
    info!(
        "Item database: {} types emitted, {} unnamed skipped",
        emitted, skipped_unnamed
    );
    Ok(writer.finish()?)
}

/// The 140-byte version payload of the root node.
fn version_record() -> Vec<u8> {
    let mut record = Vec::with_capacity(12 + OTB_IDENTIFIER_LEN);
    record.write_u32::<LittleEndian>(OTB_MAJOR_VERSION).ok();
    record.write_u32::<LittleEndian>(OTB_MINOR_VERSION).ok();
    record.write_u32::<LittleEndian>(OTB_BUILD_NUMBER).ok();
    record.extend_from_slice(OTB_IDENTIFIER);
    record.resize(12 + OTB_IDENTIFIER_LEN, 0);
    record
}

fn write_item_node(writer: &mut NodeWriter, item: &ItemType) -> Result<()> {
    writer.begin_node(item.group() as u8);
    writer.write_u32(item.otb_flags());

    write_attr_u16(writer, ATTR_SERVER_ID, item.type_id);
    write_attr_u16(
        writer,
        ATTR_CLIENT_ID,
        item.disguise_target.unwrap_or(item.type_id),
    );

    let name = string_to_latin1(&item.name);
    writer.write_u8(ATTR_NAME);
    writer.write_u16(name.len() as u16);
    writer.write_bytes(&name);

    if item.group() == ItemGroup::Ground {
        write_attr_u16(writer, ATTR_SPEED, GROUND_SPEED);
    }
    if item.is_container() {
        let volume = item.capacity.unwrap_or(DEFAULT_CONTAINER_VOLUME).max(1);
        write_attr_u16(writer, ATTR_MAX_ITEMS, volume);
    }

    writer.end_node()?;
    Ok(())
}

fn write_attr_u16(writer: &mut NodeWriter, tag: u8, value: u16) {
    writer.write_u8(tag);
    writer.write_u16(2);
    writer.write_u16(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bytes of the header block: signature, root framing, root flags,
    /// version attribute and its 140-byte record.
    const HEADER_LEN: usize = 4 + 2 + 4 + 1 + 2 + 140;

    #[test]
    fn empty_catalog_is_header_plus_close() {
        let catalog = ItemCatalog::parse("");
        let bytes = write_item_database(&catalog).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 1);
        assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
        assert_eq!(bytes[4], 0xFE);
        assert_eq!(*bytes.last().unwrap(), 0xFF);
    }

    #[test]
    fn version_record_layout() {
        let record = version_record();
        assert_eq!(record.len(), 140);
        assert_eq!(&record[0..4], &1u32.to_le_bytes());
        assert_eq!(&record[4..8], &100u32.to_le_bytes());
        assert_eq!(&record[8..12], &1u32.to_le_bytes());
        assert_eq!(&record[12..12 + OTB_IDENTIFIER.len()], OTB_IDENTIFIER);
        assert!(record[12 + OTB_IDENTIFIER.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn escape_heavy_name_attribute_bytes() {
        let catalog = ItemCatalog::parse("TypeID = 5\nName = \"\u{FD}test\u{FE}\"\n");
        let bytes = write_item_database(&catalog).unwrap();
        let expected = [
            0x12, 0x06, 0x00, 0xFD, 0xFD, b't', b'e', b's', b't', 0xFD, 0xFE,
        ];
        assert!(
            bytes.windows(expected.len()).any(|w| w == expected),
            "name attribute bytes not found"
        );
    }

    #[test]
    fn unnamed_items_are_skipped() {
        let catalog = ItemCatalog::parse("TypeID = 5\n\nTypeID = 6\nName = \"rock\"\n");
        let bytes = write_item_database(&catalog).unwrap();
        // Exactly one item child: one 0xFE after the root's.
        let starts = count_unescaped(&bytes[4..], 0xFE);
        assert_eq!(starts, 2);
    }

    #[test]
    fn container_gets_volume_and_client_id() {
        let catalog = ItemCatalog::parse(
            "TypeID = 2547\nName = \"a chest\"\nFlags = {Chest}\n\
             Attributes = {Capacity=8,DisguiseTarget=3639}\n",
        );
        let bytes = write_item_database(&catalog).unwrap();

        // ClientID attribute carries the disguise target.
        let client = [ATTR_CLIENT_ID, 2, 0, (3639u16 & 0xFF) as u8, (3639u16 >> 8) as u8];
        assert!(bytes.windows(client.len()).any(|w| w == client));

        // MaxItems carries the parsed capacity.
        let volume = [ATTR_MAX_ITEMS, 2, 0, 8, 0];
        assert!(bytes.windows(volume.len()).any(|w| w == volume));

        // Node tag is the container group.
        let node = [0xFE, ItemGroup::Container as u8];
        assert!(bytes.windows(node.len()).any(|w| w == node));
    }

    #[test]
    fn ground_gets_speed() {
        let catalog = ItemCatalog::parse("TypeID = 101\nName = \"grass\"\nFlags = {Bank}\n");
        let bytes = write_item_database(&catalog).unwrap();
        let speed = [ATTR_SPEED, 2, 0, 150, 0];
        assert!(bytes.windows(speed.len()).any(|w| w == speed));
    }

    #[test]
    fn stackable_flag_for_cumulative() {
        let catalog =
            ItemCatalog::parse("TypeID = 3031\nName = \"a gold coin\"\nFlags = {Cumulative}\n");
        let bytes = write_item_database(&catalog).unwrap();
        // Item node: FE, group byte 0, then the u32 flags word.
        let flags = [0xFE, 0x00, 0x80, 0x00, 0x00, 0x00];
        assert!(bytes.windows(flags.len()).any(|w| w == flags));
    }

    fn count_unescaped(bytes: &[u8], marker: u8) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == 0xFD {
                i += 2;
                continue;
            }
            if bytes[i] == marker {
                count += 1;
            }
            i += 1;
        }
        count
    }
}
