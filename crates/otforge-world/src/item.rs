//! Item model - catalog types and per-instance attributes

use crate::position::Position;
use serde::{Deserialize, Serialize};

/// Symbolic flags carried by an object-catalog entry.
///
/// Only the flags that influence grouping, stacking order or emission are
/// kept; unrecognized tokens in the catalog are dropped by the parser.
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ItemFlags: u32 {
        const BANK = 1 << 0;
        const CLIP = 1 << 1;
        const BOTTOM = 1 << 2;
        const TOP = 1 << 3;
        const HEIGHT = 1 << 4;
        const CONTAINER = 1 << 5;
        const CHEST = 1 << 6;
        const CUMULATIVE = 1 << 7;
        const LIQUID_CONTAINER = 1 << 8;
        const LIQUID_POOL = 1 << 9;
        const MAGIC_FIELD = 1 << 10;
        const KEY = 1 << 11;
        const KEY_DOOR = 1 << 12;
        const NAME_DOOR = 1 << 13;
        const LEVEL_DOOR = 1 << 14;
        const QUEST_DOOR = 1 << 15;
        const DOOR = 1 << 16;
        const TEXT = 1 << 17;
        const WRITE = 1 << 18;
        const WRITE_ONCE = 1 << 19;
        const TELEPORT_ABSOLUTE = 1 << 20;
        const RUNE = 1 << 21;
        const DISGUISE = 1 << 22;
        const UNPASS = 1 << 23;
        const UNMOVE = 1 << 24;
        const TAKE = 1 << 25;
        const EXPIRE = 1 << 26;
        const CORPSE = 1 << 27;
    }
}

impl ItemFlags {
    /// Map one catalog flag token to its bit, if recognized.
    pub fn from_token(token: &str) -> Option<Self> {
        let flag = match token {
            "Bank" => Self::BANK,
            "Clip" => Self::CLIP,
            "Bottom" => Self::BOTTOM,
            "Top" => Self::TOP,
            "Height" => Self::HEIGHT,
            "Container" => Self::CONTAINER,
            "Chest" => Self::CHEST,
            "Cumulative" => Self::CUMULATIVE,
            "LiquidContainer" => Self::LIQUID_CONTAINER,
            "LiquidPool" => Self::LIQUID_POOL,
            "MagicField" => Self::MAGIC_FIELD,
            "Key" => Self::KEY,
            "KeyDoor" => Self::KEY_DOOR,
            "NameDoor" => Self::NAME_DOOR,
            "LevelDoor" => Self::LEVEL_DOOR,
            "QuestDoor" => Self::QUEST_DOOR,
            "Door" => Self::DOOR,
            "Text" => Self::TEXT,
            "Write" => Self::WRITE,
            "WriteOnce" => Self::WRITE_ONCE,
            "TeleportAbsolute" => Self::TELEPORT_ABSOLUTE,
            "Rune" => Self::RUNE,
            "Disguise" => Self::DISGUISE,
            "Unpass" => Self::UNPASS,
            "Unmove" => Self::UNMOVE,
            "Take" => Self::TAKE,
            "Expire" => Self::EXPIRE,
            "Corpse" => Self::CORPSE,
            _ => return None,
        };
        Some(flag)
    }
}

/// Broad classification of an item type; the discriminant is the OTB node
/// tag byte for the type.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemGroup {
    None = 0,
    Ground = 1,
    Container = 2,
    Weapon = 3,
    Ammunition = 4,
    Armor = 5,
    Rune = 6,
    Teleport = 7,
    MagicField = 8,
    Writeable = 9,
    Key = 10,
    Splash = 11,
    Fluid = 12,
    Door = 13,
    Deprecated = 14,
}

/// OTB flags word; only stackability survives the translation.
pub const OTB_FLAG_STACKABLE: u32 = 1 << 7;

/// One entry of the object catalog.
#[derive(Debug, Clone, Default)]
pub struct ItemType {
    pub type_id: u16,
    pub name: String,
    pub flags: ItemFlags,
    /// Alternate sprite id shown in place of the type's own.
    pub disguise_target: Option<u16>,
    /// Container volume.
    pub capacity: Option<u16>,
    pub weight: Option<u32>,
}

impl ItemType {
    pub fn new(type_id: u16) -> Self {
        Self {
            type_id,
            ..Default::default()
        }
    }

    /// Editor item group derived from the symbolic flags.
    pub fn group(&self) -> ItemGroup {
        let f = self.flags;
        if f.contains(ItemFlags::BANK) {
            ItemGroup::Ground
        } else if f.intersects(ItemFlags::CONTAINER | ItemFlags::CHEST) {
            ItemGroup::Container
        } else if f.contains(ItemFlags::LIQUID_POOL) {
            ItemGroup::Splash
        } else if f.contains(ItemFlags::LIQUID_CONTAINER) {
            ItemGroup::Fluid
        } else if f.contains(ItemFlags::MAGIC_FIELD) {
            ItemGroup::MagicField
        } else if f.contains(ItemFlags::KEY) {
            ItemGroup::Key
        } else if f.intersects(
            ItemFlags::DOOR
                | ItemFlags::KEY_DOOR
                | ItemFlags::NAME_DOOR
                | ItemFlags::LEVEL_DOOR
                | ItemFlags::QUEST_DOOR,
        ) {
            ItemGroup::Door
        } else if f.intersects(ItemFlags::TEXT | ItemFlags::WRITE | ItemFlags::WRITE_ONCE) {
            ItemGroup::Writeable
        } else if f.contains(ItemFlags::TELEPORT_ABSOLUTE) {
            ItemGroup::Teleport
        } else if f.contains(ItemFlags::RUNE) {
            ItemGroup::Rune
        } else {
            ItemGroup::None
        }
    }

    /// Rendering-priority ordinal within a tile stack; lower draws first.
    pub fn stack_priority(&self) -> u8 {
        let f = self.flags;
        if f.contains(ItemFlags::BANK) {
            0
        } else if f.contains(ItemFlags::CLIP) {
            1
        } else if f.contains(ItemFlags::BOTTOM) {
            2
        } else if f.contains(ItemFlags::TOP) {
            3
        } else if f.contains(ItemFlags::HEIGHT) {
            4
        } else {
            5
        }
    }

    /// OTB flags word for the item-database node.
    pub fn otb_flags(&self) -> u32 {
        if self.flags.contains(ItemFlags::CUMULATIVE) {
            OTB_FLAG_STACKABLE
        } else {
            0
        }
    }

    pub fn is_container(&self) -> bool {
        self.flags.intersects(ItemFlags::CONTAINER | ItemFlags::CHEST)
    }
}

/// One item occurrence in a tile stack or inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemInstance {
    pub type_id: u16,
    pub count: Option<u8>,
    pub action_id: Option<u16>,
    pub unique_id: Option<u16>,
    pub charges: Option<u16>,
    pub text: Option<String>,
    pub teleport_dest: Option<Position>,
    /// Editor numbering; translated at parse time.
    pub liquid_subtype: Option<u8>,
    pub contents: Vec<ItemInstance>,
}

impl ItemInstance {
    pub fn new(type_id: u16) -> Self {
        Self {
            type_id,
            ..Default::default()
        }
    }

    /// Total instances including nested container contents.
    pub fn deep_count(&self) -> usize {
        1 + self
            .contents
            .iter()
            .map(ItemInstance::deep_count)
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(flags: ItemFlags) -> ItemType {
        ItemType {
            type_id: 100,
            name: "thing".to_string(),
            flags,
            ..Default::default()
        }
    }

    #[test]
    fn group_from_flags() {
        assert_eq!(typed(ItemFlags::BANK).group(), ItemGroup::Ground);
        assert_eq!(typed(ItemFlags::CHEST).group(), ItemGroup::Container);
        assert_eq!(typed(ItemFlags::LIQUID_POOL).group(), ItemGroup::Splash);
        assert_eq!(typed(ItemFlags::LIQUID_CONTAINER).group(), ItemGroup::Fluid);
        assert_eq!(typed(ItemFlags::LEVEL_DOOR).group(), ItemGroup::Door);
        assert_eq!(typed(ItemFlags::WRITE_ONCE).group(), ItemGroup::Writeable);
        assert_eq!(typed(ItemFlags::TAKE).group(), ItemGroup::None);
    }

    #[test]
    fn ground_wins_over_other_flags() {
        let t = typed(ItemFlags::BANK | ItemFlags::UNPASS);
        assert_eq!(t.group(), ItemGroup::Ground);
        assert_eq!(t.stack_priority(), 0);
    }

    #[test]
    fn priority_ladder() {
        assert_eq!(typed(ItemFlags::BANK).stack_priority(), 0);
        assert_eq!(typed(ItemFlags::CLIP).stack_priority(), 1);
        assert_eq!(typed(ItemFlags::BOTTOM).stack_priority(), 2);
        assert_eq!(typed(ItemFlags::TOP).stack_priority(), 3);
        assert_eq!(typed(ItemFlags::HEIGHT).stack_priority(), 4);
        assert_eq!(typed(ItemFlags::TAKE).stack_priority(), 5);
    }

    #[test]
    fn only_cumulative_maps_to_otb_flags() {
        assert_eq!(typed(ItemFlags::CUMULATIVE).otb_flags(), OTB_FLAG_STACKABLE);
        assert_eq!(typed(ItemFlags::BANK | ItemFlags::TAKE).otb_flags(), 0);
    }

    #[test]
    fn deep_count_recurses() {
        let mut bag = ItemInstance::new(2853);
        bag.contents.push(ItemInstance::new(3031));
        let mut outer = ItemInstance::new(2854);
        outer.contents.push(bag);
        assert_eq!(outer.deep_count(), 3);
    }
}
