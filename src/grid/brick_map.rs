//! Brick map entries and their sentinel encoding

/// Brick map element type
pub type BrickIndex = u16;

/// Brick is entirely outside the narrow band, on the positive side
pub const BRICK_AIR: BrickIndex = 0;

/// Brick is entirely outside the narrow band, on the negative side
pub const BRICK_SOLID: BrickIndex = BrickIndex::MAX;

/// Brick straddles the narrow band and is waiting for an atlas slot
pub const BRICK_PENDING: BrickIndex = BrickIndex::MAX - 1;

/// Atlas slots addressable by the brick map (entries `1..=MAX_ATLAS_SLOTS`)
pub const MAX_ATLAS_SLOTS: u32 = (BRICK_PENDING - 1) as u32;

/// Decoded brick map entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrickState {
    Air,
    Solid,
    /// Classified active, not yet packed
    Pending,
    /// Packed at this zero-based atlas slot
    Slot(u32),
}

impl BrickState {
    /// Decode a raw brick map entry
    #[inline]
    pub fn decode(raw: BrickIndex) -> Self {
        match raw {
            BRICK_AIR => BrickState::Air,
            BRICK_SOLID => BrickState::Solid,
            BRICK_PENDING => BrickState::Pending,
            index => BrickState::Slot(index as u32 - 1),
        }
    }

    /// Encode into a raw brick map entry.
    ///
    /// Slots must be below [`MAX_ATLAS_SLOTS`]; fill checks this before
    /// assigning any slot.
    #[inline]
    pub fn encode(self) -> BrickIndex {
        match self {
            BrickState::Air => BRICK_AIR,
            BrickState::Solid => BRICK_SOLID,
            BrickState::Pending => BRICK_PENDING,
            BrickState::Slot(slot) => {
                debug_assert!(slot < MAX_ATLAS_SLOTS);
                (slot + 1) as BrickIndex
            }
        }
    }

    /// Far-field state for a center distance
    #[inline]
    pub fn far_field(center_distance: f32) -> Self {
        if center_distance > 0.0 {
            BrickState::Air
        } else {
            BrickState::Solid
        }
    }

    /// Returns true if this brick has (or will get) atlas data
    pub fn is_active(&self) -> bool {
        matches!(self, BrickState::Pending | BrickState::Slot(_))
    }
}
