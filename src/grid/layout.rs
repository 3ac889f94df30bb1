//! Atlas packing geometry.
//!
//! Two packing strategies share one slot-to-coordinate rule:
//!
//! - **Row/column**: sized from the active brick count after Pass 1. A
//!   single layer of `bricks_per_row x bricks_per_col` bricks. Tight,
//!   but the atlas can only be allocated once the count is known.
//! - **Cube**: `n x n x n` bricks, typically the planner's worst case.
//!   Can be allocated up front, at the cost of unused memory.
//!
//! Slot `i` lives at brick coordinate
//! `(i % bx, (i / bx) % by, i / (bx * by))` in both cases.

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{Result, UVec3};
use super::brick_map::MAX_ATLAS_SLOTS;
use super::planner::CapacityPlan;
use super::{linear_index, PADDED_BRICK_EDGE, PADDED_BRICK_VOXELS};

/// Which packing rule produced a layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackingStrategy {
    #[default]
    RowColumn,
    Cube,
}

/// Atlas dimensions in bricks, plus the strategy that chose them
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AtlasLayout {
    strategy: PackingStrategy,
    bricks: [u32; 3],
}

impl AtlasLayout {
    /// Tight single-layer layout for a known active brick count.
    ///
    /// An empty grid still gets one slot so the atlas is never a
    /// zero-sized texture. Counts above [`MAX_ATLAS_SLOTS`] get a layout
    /// of that many slots; the brick map cannot address more.
    pub fn row_column(active_bricks: u32) -> Self {
        let slots = active_bricks.clamp(1, MAX_ATLAS_SLOTS);
        let per_row = ceil_sqrt(slots);
        let per_col = slots.div_ceil(per_row);
        Self {
            strategy: PackingStrategy::RowColumn,
            bricks: [per_row, per_col, 1],
        }
    }

    /// Cube layout with `bricks_per_side` bricks on every axis
    pub fn cube(bricks_per_side: u32) -> Result<Self> {
        if bricks_per_side == 0 {
            return Err(Error::InvalidLayout("cube atlas needs at least one brick per side".into()));
        }
        Self::with_bricks(PackingStrategy::Cube, UVec3::splat(bricks_per_side))
    }

    /// Layout with explicit brick counts per axis.
    ///
    /// The slot count must fit a `u32` and every voxel dimension must fit
    /// a `u32`.
    pub fn with_bricks(strategy: PackingStrategy, bricks: UVec3) -> Result<Self> {
        if bricks.cmpeq(UVec3::ZERO).any() {
            return Err(Error::InvalidLayout(format!("empty atlas dimensions {bricks}")));
        }
        let capacity = bricks.x.checked_mul(bricks.y).and_then(|n| n.checked_mul(bricks.z));
        let voxels_fit = bricks.max_element().checked_mul(PADDED_BRICK_EDGE).is_some();
        let bytes_fit = capacity
            .and_then(|n| (n as usize).checked_mul(PADDED_BRICK_VOXELS as usize))
            .is_some();
        if capacity.is_none() || !voxels_fit || !bytes_fit {
            return Err(Error::InvalidLayout(format!("atlas of {bricks} bricks is too large")));
        }
        Ok(Self {
            strategy,
            bricks: bricks.to_array(),
        })
    }

    /// Worst-case cube layout from a capacity plan
    pub fn from_plan(plan: &CapacityPlan) -> Result<Self> {
        Self::cube(plan.atlas_bricks_per_side)
    }

    pub fn strategy(&self) -> PackingStrategy {
        self.strategy
    }

    /// Atlas size in bricks per axis
    pub fn bricks(&self) -> UVec3 {
        UVec3::from_array(self.bricks)
    }

    /// Bricks along x; the divisor that turns a slot into a row
    pub fn bricks_per_row(&self) -> u32 {
        self.bricks[0]
    }

    /// Number of brick slots
    pub fn capacity(&self) -> u32 {
        self.bricks[0] * self.bricks[1] * self.bricks[2]
    }

    /// Atlas size in voxels per axis
    pub fn dimensions(&self) -> UVec3 {
        self.bricks() * PADDED_BRICK_EDGE
    }

    /// Bytes needed for an 8-bit atlas with this layout
    pub fn atlas_bytes(&self) -> usize {
        self.capacity() as usize * PADDED_BRICK_VOXELS as usize
    }

    /// Brick-grid coordinate of a slot
    pub fn slot_coord(&self, slot: u32) -> UVec3 {
        let [bx, by, _] = self.bricks;
        UVec3::new(slot % bx, (slot / bx) % by, slot / (bx * by))
    }

    /// Voxel coordinate of a slot's first (apron) voxel
    pub fn slot_origin(&self, slot: u32) -> UVec3 {
        self.slot_coord(slot) * PADDED_BRICK_EDGE
    }

    /// Slot at a brick-grid coordinate
    pub fn slot_at(&self, coord: UVec3) -> u32 {
        let [bx, by, _] = self.bricks;
        coord.x + coord.y * bx + coord.z * bx * by
    }

    /// Linear atlas offset of voxel `padded` inside `slot`
    pub fn voxel_offset(&self, slot: u32, padded: UVec3) -> usize {
        let p = self.slot_origin(slot) + padded;
        let dims = self.dimensions();
        linear_index(p.x, p.y, p.z, dims.x, dims.y)
    }

    /// Reciprocal atlas dimensions, for normalized texture coordinates
    pub fn inverse_dimensions(&self) -> [f32; 3] {
        let d = self.dimensions().as_vec3();
        [1.0 / d.x, 1.0 / d.y, 1.0 / d.z]
    }
}

/// Smallest `k` with `k * k >= n`
fn ceil_sqrt(n: u32) -> u32 {
    let mut k = (n as f64).sqrt().ceil() as u32;
    while k > 0 && (k as u64 - 1).pow(2) >= n as u64 {
        k -= 1;
    }
    while (k as u64).pow(2) < n as u64 {
        k += 1;
    }
    k
}
