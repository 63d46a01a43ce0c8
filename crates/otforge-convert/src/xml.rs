//! Auxiliary XML emitters
//!
//! The editor reads houses, spawns and creature outfits from XML files
//! next to the map, plus palette tilesets in its configuration
//! directory. These are thin emitters over the already-parsed data.

use crate::{ConvertError, Result};
use otforge_world::{
    CreatureFile, CreatureKind, House, HouseArea, ItemCatalog, ItemGroup, PlacedSpawn,
    SpawnCreature,
};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::collections::HashMap;
use tracing::warn;

fn xml_error<E: std::fmt::Display>(err: E) -> ConvertError {
    ConvertError::Xml(err.to_string())
}

type XmlWriter = Writer<Vec<u8>>;

fn new_document() -> Result<XmlWriter> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    Ok(writer)
}

/// Emit the house file consumed alongside the map.
pub fn write_house_xml(houses: &[House], areas: &[HouseArea]) -> Result<Vec<u8>> {
    let depot_by_area: HashMap<u32, u32> =
        areas.iter().map(|a| (a.area_id, a.depot_id)).collect();

    let mut writer = new_document()?;
    writer
        .write_event(Event::Start(BytesStart::new("houses")))
        .map_err(xml_error)?;

    for house in houses {
        let town_id = depot_by_area
            .get(&house.area)
            .map(|depot| depot + 1)
            .unwrap_or(0);
        let mut elem = BytesStart::new("house");
        elem.push_attribute(("name", house.name.as_str()));
        elem.push_attribute(("houseid", house.id.to_string().as_str()));
        elem.push_attribute(("entryx", house.entry.x.to_string().as_str()));
        elem.push_attribute(("entryy", house.entry.y.to_string().as_str()));
        elem.push_attribute(("entryz", house.entry.z.to_string().as_str()));
        elem.push_attribute(("rent", house.rent.to_string().as_str()));
        elem.push_attribute(("townid", town_id.to_string().as_str()));
        elem.push_attribute(("size", house.tiles.len().to_string().as_str()));
        if house.guildhall {
            elem.push_attribute(("guildhall", "true"));
        }
        writer.write_event(Event::Empty(elem)).map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("houses")))
        .map_err(xml_error)?;
    Ok(writer.into_inner())
}

/// Display names for spawn entries.
pub struct SpawnNames<'a> {
    /// Monster race number to creature name.
    pub monsters: &'a HashMap<u32, String>,
    /// NPC file stem to display name.
    pub npcs: &'a HashMap<String, String>,
}

/// Emit the spawn file consumed alongside the map.
pub fn write_spawn_xml(spawns: &[PlacedSpawn], names: &SpawnNames<'_>) -> Result<Vec<u8>> {
    let mut writer = new_document()?;
    writer
        .write_event(Event::Start(BytesStart::new("spawns")))
        .map_err(xml_error)?;

    for spawn in spawns {
        let mut elem = BytesStart::new("spawn");
        elem.push_attribute(("centerx", spawn.center.x.to_string().as_str()));
        elem.push_attribute(("centery", spawn.center.y.to_string().as_str()));
        elem.push_attribute(("centerz", spawn.center.z.to_string().as_str()));
        elem.push_attribute(("radius", spawn.radius.to_string().as_str()));
        writer.write_event(Event::Start(elem)).map_err(xml_error)?;

        let (tag, name) = match &spawn.creature {
            SpawnCreature::Monster(race) => {
                let name = names.monsters.get(race).cloned().unwrap_or_else(|| {
                    warn!("No creature file for race {}", race);
                    format!("race-{}", race)
                });
                ("monster", name)
            }
            SpawnCreature::Npc(stem) => {
                let name = names
                    .npcs
                    .get(stem)
                    .cloned()
                    .unwrap_or_else(|| stem.clone());
                ("npc", name)
            }
        };
        for &(dx, dy) in &spawn.offsets {
            let mut entry = BytesStart::new(tag);
            entry.push_attribute(("name", name.as_str()));
            entry.push_attribute(("x", dx.to_string().as_str()));
            entry.push_attribute(("y", dy.to_string().as_str()));
            entry.push_attribute(("z", spawn.center.z.to_string().as_str()));
            entry.push_attribute(("spawntime", spawn.respawn_seconds.to_string().as_str()));
            writer.write_event(Event::Empty(entry)).map_err(xml_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("spawn")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("spawns")))
        .map_err(xml_error)?;
    Ok(writer.into_inner())
}

/// Emit the creature-outfit registry for the editor configuration.
pub fn write_creatures_xml(creatures: &[CreatureFile]) -> Result<Vec<u8>> {
    let mut writer = new_document()?;
    writer
        .write_event(Event::Start(BytesStart::new("creatures")))
        .map_err(xml_error)?;

    for creature in creatures {
        let kind = match creature.kind {
            CreatureKind::Monster => "monster",
            CreatureKind::Npc => "npc",
        };
        let mut elem = BytesStart::new("creature");
        elem.push_attribute(("name", creature.name.as_str()));
        elem.push_attribute(("type", kind));
        elem.push_attribute((
            "looktype",
            creature.effective_looktype().to_string().as_str(),
        ));
        elem.push_attribute(("lookhead", creature.outfit.head.to_string().as_str()));
        elem.push_attribute(("lookbody", creature.outfit.body.to_string().as_str()));
        elem.push_attribute(("looklegs", creature.outfit.legs.to_string().as_str()));
        elem.push_attribute(("lookfeet", creature.outfit.feet.to_string().as_str()));
        writer.write_event(Event::Empty(elem)).map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("creatures")))
        .map_err(xml_error)?;
    Ok(writer.into_inner())
}

/// Emit palette tilesets grouping the catalog by item group.
pub fn write_palette_xml(catalog: &ItemCatalog) -> Result<Vec<u8>> {
    let sets: [(&str, ItemGroup); 5] = [
        ("Grounds", ItemGroup::Ground),
        ("Containers", ItemGroup::Container),
        ("Doors", ItemGroup::Door),
        ("Teleports", ItemGroup::Teleport),
        ("Writeables", ItemGroup::Writeable),
    ];

    let mut writer = new_document()?;
    writer
        .write_event(Event::Start(BytesStart::new("tilesets")))
        .map_err(xml_error)?;

    for (name, group) in sets {
        let mut tileset = BytesStart::new("tileset");
        tileset.push_attribute(("name", name));
        writer.write_event(Event::Start(tileset)).map_err(xml_error)?;
        writer
            .write_event(Event::Start(BytesStart::new("items")))
            .map_err(xml_error)?;
        for item in catalog.types_sorted() {
            if item.group() != group || item.name.is_empty() {
                continue;
            }
            let mut elem = BytesStart::new("item");
            elem.push_attribute(("id", item.type_id.to_string().as_str()));
            writer.write_event(Event::Empty(elem)).map_err(xml_error)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("items")))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("tileset")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("tilesets")))
        .map_err(xml_error)?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use otforge_world::{Outfit, Position};

    #[test]
    fn house_xml_resolves_town_id() {
        let houses = vec![House {
            id: 7,
            name: "Harbour Flat".to_string(),
            area: 33,
            rent: 500,
            entry: Position::new(32345, 32223, 7),
            guildhall: true,
            tiles: vec![Position::new(1, 1, 7), Position::new(1, 2, 7)],
        }];
        let areas = vec![HouseArea {
            area_id: 33,
            name: "Thais".to_string(),
            price: 0,
            depot_id: 0,
        }];
        let text = String::from_utf8(write_house_xml(&houses, &areas).unwrap()).unwrap();
        assert!(text.contains("houseid=\"7\""));
        assert!(text.contains("townid=\"1\""));
        assert!(text.contains("size=\"2\""));
        assert!(text.contains("guildhall=\"true\""));
    }

    #[test]
    fn spawn_xml_lists_offsets() {
        let spawns = vec![PlacedSpawn {
            creature: SpawnCreature::Monster(23),
            center: Position::new(32100, 32200, 7),
            radius: 2,
            respawn_seconds: 60,
            offsets: vec![(0, 0), (1, -1)],
        }];
        let monsters = HashMap::from([(23, "bear".to_string())]);
        let npcs = HashMap::new();
        let names = SpawnNames {
            monsters: &monsters,
            npcs: &npcs,
        };
        let text = String::from_utf8(write_spawn_xml(&spawns, &names).unwrap()).unwrap();
        assert!(text.contains("centerx=\"32100\""));
        assert!(text.contains("radius=\"2\""));
        assert!(text.contains("<monster name=\"bear\" x=\"0\" y=\"0\""));
        assert!(text.contains("x=\"1\" y=\"-1\""));
        assert!(text.contains("spawntime=\"60\""));
    }

    #[test]
    fn creatures_xml_uses_effective_looktype() {
        let creatures = vec![CreatureFile {
            kind: CreatureKind::Monster,
            stem: "slime".to_string(),
            name: "slime".to_string(),
            race_number: 19,
            outfit: Outfit::default(),
            home: None,
            radius: None,
        }];
        let text = String::from_utf8(write_creatures_xml(&creatures).unwrap()).unwrap();
        assert!(text.contains("looktype=\"19\""));
        assert!(text.contains("type=\"monster\""));
    }

    #[test]
    fn palette_groups_by_item_group() {
        let catalog = ItemCatalog::parse(
            "TypeID = 101\nName = \"grass\"\nFlags = {Bank}\n\n\
             TypeID = 2547\nName = \"a chest\"\nFlags = {Chest}\n",
        );
        let text = String::from_utf8(write_palette_xml(&catalog).unwrap()).unwrap();
        let grounds = text.find("name=\"Grounds\"").unwrap();
        let containers = text.find("name=\"Containers\"").unwrap();
        let grass = text.find("id=\"101\"").unwrap();
        let chest = text.find("id=\"2547\"").unwrap();
        assert!(grounds < grass && grass < containers && containers < chest);
    }
}
