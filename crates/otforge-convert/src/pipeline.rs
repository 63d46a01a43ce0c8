//! Pipeline orchestration
//!
//! Sequences one full conversion: parse all server inputs, normalize the
//! tile stacks, plan creature placement, then emit the item database,
//! the map, the auxiliary XML files and the diagnostic logs. Individual
//! files are independently fallible; only missing mandatory inputs abort
//! the run.

use crate::debug_log::write_attribute_log;
use crate::otb::write_item_database;
use crate::otbm::{write_map, MapDocument};
use crate::stats::ConvertStats;
use crate::xml::{self, SpawnNames};
use crate::{ConvertError, Result};
use otforge_world::{
    creature, house, latin1_to_string, town, CreatureFile, CreatureKind, ItemCatalog,
    PlacedSpawn, PlacementPlanner, Position, SectorParser, SpawnCreature, SpawnRegion, Tile,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where a run reads from and writes to.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_root: PathBuf,
    pub output_name: String,
    pub output_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl PipelineConfig {
    pub fn new<P: Into<PathBuf>>(data_root: P, output_name: &str) -> Self {
        Self {
            data_root: data_root.into(),
            output_name: output_name.to_string(),
            output_dir: PathBuf::from("output"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

/// Run the whole forward conversion.
pub fn run_pipeline(config: &PipelineConfig) -> Result<ConvertStats> {
    let root = &config.data_root;
    if !root.is_dir() {
        return Err(ConvertError::ConfigurationMissing(format!(
            "game data root {}",
            root.display()
        )));
    }
    let objects_path = root.join("dat").join("objects.srv");
    if !objects_path.is_file() {
        return Err(ConvertError::ConfigurationMissing(format!(
            "object catalog {}",
            objects_path.display()
        )));
    }
    let map_dir = root.join("map");
    if !map_dir.is_dir() {
        return Err(ConvertError::ConfigurationMissing(format!(
            "map directory {}",
            map_dir.display()
        )));
    }

    let mut stats = ConvertStats::default();

    let catalog = ItemCatalog::load(&objects_path)?;
    stats.item_types = catalog.len();
    stats.malformed_lines += catalog.skipped_lines;

    // Sector files, in sorted filename order for determinism.
    let mut sector_parser = SectorParser::new();
    let mut tiles: Vec<Tile> = Vec::new();
    for path in sorted_files(&map_dir, "sec")? {
        match sector_parser.parse_file(&path) {
            Ok(sector) => {
                stats.sector_files_parsed += 1;
                tiles.extend(sector.tiles.into_iter().filter(|t| !t.items.is_empty()));
            }
            Err(err) => {
                warn!("Failed to parse {}: {}", path.display(), err);
                stats.sector_files_failed += 1;
            }
        }
    }
    stats.malformed_lines += sector_parser.skipped_lines;
    stats.attribute_occurrences = sector_parser.occurrences.len();
    info!("Collected {} tiles", tiles.len());

    for tile in &mut tiles {
        tile.normalize(&catalog);
    }

    // Houses and house areas.
    let (houses, house_skipped) = house::load_houses(root.join("dat").join("houses.dat"))
        .unwrap_or_else(|err| {
            warn!("No house registry: {}", err);
            (Vec::new(), 0)
        });
    let (areas, area_skipped) = house::load_house_areas(root.join("dat").join("houseareas.dat"))
        .unwrap_or_else(|err| {
            warn!("No house area registry: {}", err);
            (Vec::new(), 0)
        });
    stats.houses = houses.len();
    stats.house_records_skipped = house_skipped + area_skipped;

    let mut house_by_tile: HashMap<Position, u32> = HashMap::new();
    for h in &houses {
        for pos in &h.tiles {
            house_by_tile.insert(*pos, h.id);
        }
    }
    for tile in &mut tiles {
        if let Some(id) = house_by_tile.get(&tile.position) {
            tile.house_id = Some(*id);
        }
    }

    // Towns.
    let moveuse_text = read_text_or_empty(&root.join("dat").join("moveuse.dat"));
    let map_text = read_text_or_empty(&root.join("dat").join("map.dat"));
    let towns = town::resolve_towns(&moveuse_text, &map_text, &areas);
    stats.towns = towns.len();

    // Creature files.
    let (monsters, monster_failures) = load_creatures(&root.join("mon"), "mon", CreatureKind::Monster);
    let (npcs, npc_failures) = load_creatures(&root.join("npc"), "npc", CreatureKind::Npc);
    stats.creature_files_failed = monster_failures + npc_failures;
    info!("Loaded {} monsters, {} NPCs", monsters.len(), npcs.len());

    // Spawn planning over the walkable tile set.
    let walkable: HashSet<Position> = tiles.iter().map(|t| t.position).collect();
    let mut planner = PlacementPlanner::new(walkable);
    let mut placed: Vec<PlacedSpawn> = Vec::new();

    let spawn_path = root.join("dat").join("monster.db");
    let spawn_entries = if spawn_path.is_file() {
        let (entries, skipped) = creature::load_spawn_entries(&spawn_path)?;
        stats.spawn_lines_skipped = skipped;
        entries
    } else {
        warn!("No spawn list at {}", spawn_path.display());
        Vec::new()
    };
    for entry in &spawn_entries {
        let region = SpawnRegion {
            creature: SpawnCreature::Monster(entry.race),
            center: entry.position,
            radius: entry.radius,
            amount: entry.amount.max(1),
            respawn_seconds: entry.respawn_seconds,
        };
        placed.extend(planner.place_monsters(&region));
    }
    for npc in &npcs {
        let Some(home) = npc.home else { continue };
        let region = SpawnRegion {
            creature: SpawnCreature::Npc(npc.stem.clone()),
            center: home,
            radius: npc.radius.unwrap_or(1),
            amount: 1,
            respawn_seconds: 60,
        };
        placed.extend(planner.place_npc(&region));
    }
    stats.creatures_placed = planner.creatures_placed;
    stats.npc_centers_shifted = planner.npc_centers_shifted;
    stats.spawn_regions_skipped = planner.regions_skipped;

    // Emission.
    let out_dir = &config.output_dir;
    fs::create_dir_all(out_dir)?;
    let rme_dir = out_dir
        .join("rme_config")
        .join("data")
        .join("770-cipsoft");
    fs::create_dir_all(&rme_dir)?;

    fs::write(rme_dir.join("items.otb"), write_item_database(&catalog)?)?;

    let spawn_file = format!("{}-spawn.xml", config.output_name);
    let house_file = format!("{}-house.xml", config.output_name);
    let doc = MapDocument {
        description: config.output_name.clone(),
        spawn_file: spawn_file.clone(),
        house_file: house_file.clone(),
        towns,
        tiles,
    };
    let map_bytes = write_map(&doc, &mut stats)?;
    fs::write(
        out_dir.join(format!("{}.otbm", config.output_name)),
        map_bytes,
    )?;

    fs::write(
        out_dir.join(&house_file),
        xml::write_house_xml(&houses, &areas)?,
    )?;

    let monster_names: HashMap<u32, String> = monsters
        .iter()
        .map(|c| (c.race_number, c.name.clone()))
        .collect();
    let npc_names: HashMap<String, String> = npcs
        .iter()
        .map(|c| (c.stem.clone(), c.name.clone()))
        .collect();
    let names = SpawnNames {
        monsters: &monster_names,
        npcs: &npc_names,
    };
    fs::write(out_dir.join(&spawn_file), xml::write_spawn_xml(&placed, &names)?)?;

    let mut all_creatures = monsters;
    all_creatures.extend(npcs);
    fs::write(
        rme_dir.join("creatures.xml"),
        xml::write_creatures_xml(&all_creatures)?,
    )?;
    fs::write(rme_dir.join("tilesets.xml"), xml::write_palette_xml(&catalog)?)?;

    write_attribute_log(&config.logs_dir, &sector_parser.occurrences)?;

    Ok(stats)
}

/// Files with the given extension under a directory, sorted by name.
fn sorted_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == extension))
        .collect();
    paths.sort();
    Ok(paths)
}

fn read_text_or_empty(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => latin1_to_string(&bytes),
        Err(_) => {
            warn!("Optional input missing: {}", path.display());
            String::new()
        }
    }
}

/// Load every creature file in a directory. Returns the creatures plus
/// the number of files that failed to parse.
fn load_creatures(dir: &Path, extension: &str, kind: CreatureKind) -> (Vec<CreatureFile>, usize) {
    let paths = match sorted_files(dir, extension) {
        Ok(paths) => paths,
        Err(err) => {
            warn!("No creature directory {}: {}", dir.display(), err);
            return (Vec::new(), 0);
        }
    };
    let mut creatures = Vec::new();
    let mut failed = 0usize;
    for path in &paths {
        match creature::load_creature_file(path, kind) {
            Ok(creature) => creatures.push(creature),
            Err(err) => {
                warn!("Failed to parse {}: {}", path.display(), err);
                failed += 1;
            }
        }
    }
    (creatures, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_game_root(root: &Path) {
        let dat = root.join("dat");
        let map = root.join("map");
        let mon = root.join("mon");
        let npc = root.join("npc");
        for dir in [&dat, &map, &mon, &npc] {
            fs::create_dir_all(dir).unwrap();
        }

        fs::write(
            dat.join("objects.srv"),
            "TypeID = 101\nName = \"grass\"\nFlags = {Bank,Unmove}\n\n\
             TypeID = 2547\nName = \"a chest\"\nFlags = {Chest,Take}\nAttributes = {Capacity=8}\n\n\
             TypeID = 3031\nName = \"a gold coin\"\nFlags = {Cumulative,Take}\n",
        )
        .unwrap();

        fs::write(
            map.join("1000-1000-07.sec"),
            "# sector\n\
             0-0: Content={101, 2547 Content={3031 Amount=25}}\n\
             0-1: Content={101}\n\
             1-0: ProtectionZone, Content={101}\n\
             1-1: Content={101}\n",
        )
        .unwrap();

        fs::write(
            dat.join("houses.dat"),
            "ID = 7\nName = \"Shack\"\nArea = 33\nRentOffset = 100\n\
             Exit = [32000,32001,7]\nFields = {[32000,32001,7]}\n",
        )
        .unwrap();
        fs::write(
            dat.join("houseareas.dat"),
            "Area = (33,\"Testville\",100,0)\nArea = (bad)\n",
        )
        .unwrap();
        fs::write(
            dat.join("moveuse.dat"),
            "# Hometeleporters\nBEGIN \"Home Testville (1)\"\nSetStart (Obj2, [32000,32000,7])\nEND\n",
        )
        .unwrap();
        fs::write(dat.join("map.dat"), "").unwrap();
        fs::write(
            dat.join("monster.db"),
            "23, (32000,32000,7), 3, 2, 60\nshort 1 2\n",
        )
        .unwrap();

        fs::write(
            mon.join("bear.mon"),
            "RaceNumber = 23\nName = \"bear\"\nOutfit = (82, 0-0-0-0)\n",
        )
        .unwrap();
        fs::write(
            npc.join("sam.npc"),
            "Name = \"Sam\"\nOutfit = (128, 19-57-113-95)\nHome = [32001,32000,7]\nRadius = 2\n",
        )
        .unwrap();
    }

    fn test_config(base: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::new(base.join("game"), "test");
        config.output_dir = base.join("output");
        config.logs_dir = base.join("logs");
        config
    }

    #[test]
    fn full_run_produces_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write_game_root(&dir.path().join("game"));
        let config = test_config(dir.path());

        let stats = run_pipeline(&config).unwrap();
        assert_eq!(stats.item_types, 3);
        assert_eq!(stats.sector_files_parsed, 1);
        assert_eq!(stats.tiles_written, 4);
        assert_eq!(stats.house_tiles, 1);
        assert_eq!(stats.items_written, 6);
        assert_eq!(stats.container_child_items, 1);
        assert_eq!(stats.towns, 1);
        // Two monsters plus one NPC.
        assert_eq!(stats.creatures_placed, 3);
        assert_eq!(stats.house_records_skipped, 1);
        assert_eq!(stats.spawn_lines_skipped, 1);
        assert_eq!(stats.creature_files_failed, 0);

        let out = &config.output_dir;
        assert!(out.join("test.otbm").is_file());
        assert!(out.join("test-house.xml").is_file());
        assert!(out.join("test-spawn.xml").is_file());
        let rme = out.join("rme_config").join("data").join("770-cipsoft");
        assert!(rme.join("items.otb").is_file());
        assert!(rme.join("creatures.xml").is_file());
        assert!(rme.join("tilesets.xml").is_file());
        assert!(config.logs_dir.join("debug_attributes.log").is_file());

        let spawn_xml =
            fs::read_to_string(out.join("test-spawn.xml")).unwrap();
        assert!(spawn_xml.contains("name=\"bear\""));
        assert!(spawn_xml.contains("name=\"Sam\""));

        let map_bytes = fs::read(out.join("test.otbm")).unwrap();
        assert_eq!(&map_bytes[..4], b"OTBM");
    }

    #[test]
    fn missing_root_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(err, ConvertError::ConfigurationMissing(_)));
    }

    #[test]
    fn missing_catalog_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let game = dir.path().join("game");
        fs::create_dir_all(game.join("map")).unwrap();
        let config = test_config(dir.path());
        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(err, ConvertError::ConfigurationMissing(_)));
    }
}
