//! # Player Appearance
//!
//! Body looks, colors, movement animations and worn equipment. The appearance
//! block encoder walks these in a fixed slot order; this module only stores
//! them.

/// Character gender. Females never render a beard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gender {
    /// Male body.
    #[default]
    Male = 0,
    /// Female body.
    Female = 1,
}

/// Body parts with a configurable look.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum BodyPart {
    /// Hair / head.
    Head = 0,
    /// Torso.
    Torso = 1,
    /// Arms.
    Arms = 2,
    /// Hands.
    Hands = 3,
    /// Legs.
    Legs = 4,
    /// Feet.
    Feet = 5,
    /// Beard (male only).
    Beard = 6,
}

/// Worn equipment slots, indexed the way the equipment interface is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum EquipmentSlot {
    /// Helmets and hats.
    Hat = 0,
    /// Capes.
    Cape = 1,
    /// Amulets.
    Amulet = 2,
    /// Weapons.
    Weapon = 3,
    /// Body armour.
    Chest = 4,
    /// Shields.
    Shield = 5,
    /// Leg armour.
    Legs = 7,
    /// Gloves.
    Hands = 9,
    /// Boots.
    Feet = 10,
    /// Rings.
    Ring = 12,
    /// Ammunition.
    Arrows = 13,
}

/// Number of equipment slots (including the unused gaps).
pub const EQUIPMENT_SLOTS: usize = 14;

/// Item ids worn in each equipment slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Equipment {
    items: [Option<u16>; EQUIPMENT_SLOTS],
}

impl Equipment {
    /// Item worn in `slot`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: EquipmentSlot) -> Option<u16> {
        self.items[slot as usize]
    }

    /// Wears `item` in `slot` (or clears it with `None`).
    pub fn set(&mut self, slot: EquipmentSlot, item: Option<u16>) {
        self.items[slot as usize] = item;
    }
}

/// Everything the appearance block describes apart from equipment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Appearance {
    /// Body type.
    pub gender: Gender,
    /// Prayer head icon, `None` for no icon.
    pub head_icon: Option<u8>,
    /// Skull icon, `None` for no skull.
    pub skull_icon: Option<u8>,
    /// Look id per [`BodyPart`].
    pub looks: [u16; 7],
    /// Hair, torso, legs, feet and skin colors.
    pub colors: [u8; 5],
    /// Stand, stand-turn, walk, turn-180, turn-90-cw, turn-90-ccw, run.
    pub movement_animations: [u16; 7],
}

impl Appearance {
    /// Look id of one body part.
    #[inline]
    #[must_use]
    pub fn look(&self, part: BodyPart) -> u16 {
        self.looks[part as usize]
    }
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            gender: Gender::Male,
            head_icon: None,
            skull_icon: None,
            looks: [0, 18, 26, 33, 36, 42, 10],
            colors: [7, 8, 9, 5, 0],
            movement_animations: [808, 823, 819, 820, 821, 822, 824],
        }
    }
}
