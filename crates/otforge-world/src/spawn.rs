//! Spawn regions and creature placement
//!
//! Spawn regions declare a center, a radius and an amount; the planner
//! assigns each creature a concrete walkable tile, never reusing a tile
//! across the whole map. Probing expands in Chebyshev rings around the
//! center, so placements are deterministic for a given input order.

use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Probing stops after this many rings around the center.
const RING_CAP: i32 = 50;

/// What a spawn region produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnCreature {
    /// Monster race number.
    Monster(u32),
    /// NPC identifier (file stem).
    Npc(String),
}

/// A spawn region as declared by the server data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRegion {
    pub creature: SpawnCreature,
    pub center: Position,
    pub radius: u16,
    pub amount: u16,
    pub respawn_seconds: u32,
}

/// A spawn region after planning: a concrete center and tile offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedSpawn {
    pub creature: SpawnCreature,
    pub center: Position,
    pub radius: u16,
    pub respawn_seconds: u32,
    /// One `(dx, dy)` per placed creature, relative to the center.
    pub offsets: Vec<(i32, i32)>,
}

/// Allocates tiles for spawn regions over the walkable subset of the map.
#[derive(Debug)]
pub struct PlacementPlanner {
    walkable: HashSet<Position>,
    claimed: HashSet<Position>,
    centers: HashSet<Position>,
    pub creatures_placed: usize,
    pub npc_centers_shifted: usize,
    pub regions_skipped: usize,
    pub regions_truncated: usize,
}

impl PlacementPlanner {
    pub fn new(walkable: HashSet<Position>) -> Self {
        Self {
            walkable,
            claimed: HashSet::new(),
            centers: HashSet::new(),
            creatures_placed: 0,
            npc_centers_shifted: 0,
            regions_skipped: 0,
            regions_truncated: 0,
        }
    }

    /// Plan a monster region: claim up to `amount` tiles in expanding
    /// rings. Returns None when nothing could be placed.
    pub fn place_monsters(&mut self, region: &SpawnRegion) -> Option<PlacedSpawn> {
        if self.centers.contains(&region.center) {
            warn!(
                "Spawn center {} already used by another region; skipping",
                region.center
            );
            self.regions_skipped += 1;
            return None;
        }

        let mut offsets = Vec::with_capacity(region.amount as usize);
        'rings: for r in 0..=RING_CAP {
            for (dx, dy) in ring_cells(r) {
                if offsets.len() >= region.amount as usize {
                    break 'rings;
                }
                let candidate = region.center.offset(dx, dy);
                if self.walkable.contains(&candidate) && self.claimed.insert(candidate) {
                    offsets.push((dx, dy));
                }
            }
        }

        if offsets.is_empty() {
            warn!(
                "No walkable tile for spawn at {}; skipping region",
                region.center
            );
            self.regions_skipped += 1;
            return None;
        }
        if offsets.len() < region.amount as usize {
            warn!(
                "Placed {}/{} creatures for spawn at {}",
                offsets.len(),
                region.amount,
                region.center
            );
            self.regions_truncated += 1;
        }

        self.centers.insert(region.center);
        self.creatures_placed += offsets.len();
        let radius = offsets
            .iter()
            .map(|&(dx, dy)| dx.abs().max(dy.abs()) as u16)
            .max()
            .unwrap_or(0)
            .max(1);
        Some(PlacedSpawn {
            creature: region.creature.clone(),
            center: region.center,
            radius,
            respawn_seconds: region.respawn_seconds,
            offsets,
        })
    }

    /// Plan an NPC region. The center itself is the uniqueness key: a
    /// taken center shifts to the four cardinal neighbors, then to
    /// expanding rings of radius 2..=9. The NPC always sits on its
    /// (possibly shifted) center with offset (0,0).
    pub fn place_npc(&mut self, region: &SpawnRegion) -> Option<PlacedSpawn> {
        let center = self.find_npc_center(region.center);
        let Some(center) = center else {
            warn!(
                "No free center for NPC spawn at {}; skipping",
                region.center
            );
            self.regions_skipped += 1;
            return None;
        };
        if center != region.center {
            debug!("NPC center shifted from {} to {}", region.center, center);
            self.npc_centers_shifted += 1;
        }

        self.centers.insert(center);
        self.claimed.insert(center);
        self.creatures_placed += 1;
        Some(PlacedSpawn {
            creature: region.creature.clone(),
            center,
            radius: region.radius.max(1),
            respawn_seconds: region.respawn_seconds,
            offsets: vec![(0, 0)],
        })
    }

    fn find_npc_center(&self, declared: Position) -> Option<Position> {
        if self.center_is_free(declared) {
            return Some(declared);
        }
        for (dx, dy) in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
            let candidate = declared.offset(dx, dy);
            if self.center_is_free(candidate) {
                return Some(candidate);
            }
        }
        for r in 2..=9 {
            for (dx, dy) in ring_cells(r) {
                let candidate = declared.offset(dx, dy);
                if self.center_is_free(candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn center_is_free(&self, candidate: Position) -> bool {
        !self.centers.contains(&candidate)
            && !self.claimed.contains(&candidate)
            && self.walkable.contains(&candidate)
    }

    /// All tiles claimed so far, for invariant checks.
    pub fn claimed(&self) -> &HashSet<Position> {
        &self.claimed
    }
}

/// Cells at Chebyshev distance exactly `r`, in deterministic row order.
fn ring_cells(r: i32) -> Vec<(i32, i32)> {
    if r == 0 {
        return vec![(0, 0)];
    }
    let mut cells = Vec::with_capacity((8 * r) as usize);
    for dy in -r..=r {
        for dx in -r..=r {
            if dx.abs().max(dy.abs()) == r {
                cells.push((dx, dy));
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walkable_block(x0: u16, y0: u16, w: u16, h: u16, z: u8) -> HashSet<Position> {
        let mut set = HashSet::new();
        for x in x0..x0 + w {
            for y in y0..y0 + h {
                set.insert(Position::new(x, y, z));
            }
        }
        set
    }

    fn monster_region(center: Position, amount: u16) -> SpawnRegion {
        SpawnRegion {
            creature: SpawnCreature::Monster(23),
            center,
            radius: 5,
            amount,
            respawn_seconds: 60,
        }
    }

    fn npc_region(center: Position) -> SpawnRegion {
        SpawnRegion {
            creature: SpawnCreature::Npc("sam".to_string()),
            center,
            radius: 1,
            amount: 1,
            respawn_seconds: 60,
        }
    }

    #[test]
    fn center_is_claimed_first() {
        let center = Position::new(100, 100, 7);
        let mut planner = PlacementPlanner::new(walkable_block(95, 95, 11, 11, 7));
        let placed = planner.place_monsters(&monster_region(center, 1)).unwrap();
        assert_eq!(placed.offsets, vec![(0, 0)]);
        assert_eq!(placed.radius, 1);
    }

    #[test]
    fn placements_never_collide_across_regions() {
        let mut planner = PlacementPlanner::new(walkable_block(90, 90, 21, 21, 7));
        let a = planner
            .place_monsters(&monster_region(Position::new(100, 100, 7), 9))
            .unwrap();
        let b = planner
            .place_monsters(&monster_region(Position::new(101, 100, 7), 9))
            .unwrap();

        let mut seen = HashSet::new();
        for spawn in [&a, &b] {
            for &(dx, dy) in &spawn.offsets {
                let pos = spawn.center.offset(dx, dy);
                assert!(seen.insert(pos), "tile claimed twice: {}", pos);
                assert!(planner.claimed().contains(&pos));
            }
        }
        assert_eq!(planner.creatures_placed, 18);
    }

    #[test]
    fn colliding_center_skips_second_region() {
        let center = Position::new(200, 200, 7);
        let mut walkable = HashSet::new();
        walkable.insert(center);
        let mut planner = PlacementPlanner::new(walkable);

        assert!(planner.place_monsters(&monster_region(center, 1)).is_some());
        assert!(planner.place_monsters(&monster_region(center, 1)).is_none());
        assert_eq!(planner.regions_skipped, 1);
    }

    #[test]
    fn exhausted_region_is_skipped() {
        let mut planner = PlacementPlanner::new(HashSet::new());
        assert!(planner
            .place_monsters(&monster_region(Position::new(10, 10, 0), 3))
            .is_none());
        assert_eq!(planner.regions_skipped, 1);
    }

    #[test]
    fn short_region_truncates_with_warning() {
        let center = Position::new(300, 300, 7);
        let mut walkable = HashSet::new();
        walkable.insert(center);
        walkable.insert(center.offset(1, 0));
        let mut planner = PlacementPlanner::new(walkable);

        let placed = planner.place_monsters(&monster_region(center, 5)).unwrap();
        assert_eq!(placed.offsets.len(), 2);
        assert_eq!(planner.regions_truncated, 1);
    }

    #[test]
    fn radius_covers_farthest_offset() {
        let center = Position::new(400, 400, 7);
        let mut walkable = HashSet::new();
        walkable.insert(center);
        walkable.insert(center.offset(3, -2));
        let mut planner = PlacementPlanner::new(walkable);

        let placed = planner.place_monsters(&monster_region(center, 2)).unwrap();
        assert_eq!(placed.radius, 3);
    }

    #[test]
    fn npc_center_shifts_to_cardinal_neighbor() {
        let center = Position::new(500, 500, 7);
        let mut planner = PlacementPlanner::new(walkable_block(495, 495, 11, 11, 7));

        let first = planner.place_npc(&npc_region(center)).unwrap();
        assert_eq!(first.center, center);
        assert_eq!(planner.npc_centers_shifted, 0);

        let second = planner.place_npc(&npc_region(center)).unwrap();
        assert_eq!(second.center, center.offset(0, -1));
        assert_eq!(second.offsets, vec![(0, 0)]);
        assert_eq!(planner.npc_centers_shifted, 1);
    }

    #[test]
    fn npc_shift_falls_back_to_rings() {
        let center = Position::new(600, 600, 7);
        let mut planner = PlacementPlanner::new(walkable_block(590, 590, 21, 21, 7));

        // Occupy the center and all four cardinal neighbors.
        planner.place_npc(&npc_region(center)).unwrap();
        for _ in 0..4 {
            planner.place_npc(&npc_region(center)).unwrap();
        }
        let shifted = planner.place_npc(&npc_region(center)).unwrap();
        assert_eq!(center.distance_to(&shifted.center), 2);
    }

    #[test]
    fn ring_cells_are_exact_distance() {
        for r in 1..5 {
            let cells = ring_cells(r);
            assert_eq!(cells.len(), (8 * r) as usize);
            assert!(cells
                .iter()
                .all(|&(dx, dy)| dx.abs().max(dy.abs()) == r));
        }
    }
}
