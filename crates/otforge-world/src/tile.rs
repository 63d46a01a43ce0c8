//! Tile model and stack normalization

use crate::catalog::ItemCatalog;
use crate::item::ItemInstance;
use crate::position::Position;

bitflags::bitflags! {
    /// Per-tile state flags carried into the map file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TileFlags: u32 {
        const PROTECTION_ZONE = 1 << 0;
        const NO_PVP_ZONE = 1 << 1;
        const NO_LOGOUT = 1 << 2;
        const PVP_ZONE = 1 << 3;
        const REFRESH = 1 << 4;
    }
}

impl TileFlags {
    /// Map one sector-line flag token to its bit, if recognized.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ProtectionZone" => Some(Self::PROTECTION_ZONE),
            "NoPvp" => Some(Self::NO_PVP_ZONE),
            "NoLogout" => Some(Self::NO_LOGOUT),
            "PvpZone" => Some(Self::PVP_ZONE),
            "Refresh" => Some(Self::REFRESH),
            _ => None,
        }
    }
}

/// A single cell of the world grid.
#[derive(Debug, Clone, Default)]
pub struct Tile {
    pub position: Position,
    pub flags: TileFlags,
    pub items: Vec<ItemInstance>,
    pub house_id: Option<u32>,
}

impl Tile {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Reorder this tile's items into the order the editor expects.
    pub fn normalize(&mut self, catalog: &ItemCatalog) {
        normalize_stack(&mut self.items, catalog);
    }
}

/// Sort a tile stack into emission order.
///
/// The server lists items bottom-first within equal priority; the editor
/// draws the first on-disk item as the absolute bottom of the stack. A
/// stable ascending priority sort followed by a full reversal keeps the
/// within-priority stacking while lifting loose items above the
/// ground/border/top layers.
pub fn normalize_stack(items: &mut [ItemInstance], catalog: &ItemCatalog) {
    items.sort_by_key(|item| catalog.stack_priority(item.type_id));
    items.reverse();
}
