//! Capacity planning for brick map and atlas buffers.
//!
//! Pure arithmetic on the grid resolution. Run it before allocating so
//! that buffers are sized exactly once.

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use super::brick_map::BrickIndex;
use super::{BRICK_EDGE, PADDED_BRICK_EDGE};

/// Buffer sizes for one grid resolution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPlan {
    /// Cells per axis
    pub cell_count: u32,
    /// Bricks per axis
    pub brick_resolution: u32,
    /// `brick_resolution^3`
    pub total_bricks: u32,
    /// Smallest cube side (in bricks) that holds every brick at once
    pub atlas_bricks_per_side: u32,
    /// Bytes for the brick map
    pub brick_map_bytes: usize,
    /// Bytes for a worst-case cube atlas
    pub atlas_bytes: usize,
}

impl CapacityPlan {
    /// Bytes for a single combined allocation, brick map first
    pub fn total_bytes(&self) -> usize {
        self.brick_map_bytes + self.atlas_bytes
    }

    /// Atlas edge length in voxels for the worst-case cube
    pub fn atlas_side_voxels(&self) -> u32 {
        self.atlas_bricks_per_side * PADDED_BRICK_EDGE
    }

    /// Brick slots available in the worst-case cube
    pub fn atlas_capacity(&self) -> u32 {
        self.atlas_bricks_per_side.pow(3)
    }
}

/// Size the buffers for a grid of `cell_count` cells per axis
pub fn plan_capacity(cell_count: u32) -> Result<CapacityPlan> {
    if cell_count == 0 {
        return Err(Error::ZeroResolution);
    }
    if cell_count % BRICK_EDGE != 0 {
        return Err(Error::IndivisibleResolution { cell_count, brick_edge: BRICK_EDGE });
    }

    let too_large = || Error::ResolutionTooLarge { cell_count };
    let brick_resolution = cell_count / BRICK_EDGE;
    let total_bricks = brick_resolution.checked_pow(3).ok_or_else(too_large)?;
    let atlas_bricks_per_side = ceil_cbrt(total_bricks);
    let atlas_side = atlas_bricks_per_side as usize * PADDED_BRICK_EDGE as usize;
    let atlas_bytes = atlas_side
        .checked_pow(3)
        .and_then(|voxels| voxels.checked_mul(std::mem::size_of::<u8>()))
        .ok_or_else(too_large)?;

    Ok(CapacityPlan {
        cell_count,
        brick_resolution,
        total_bricks,
        atlas_bricks_per_side,
        brick_map_bytes: total_bricks as usize * std::mem::size_of::<BrickIndex>(),
        atlas_bytes,
    })
}

/// Smallest `k` with `k^3 >= n`
pub fn ceil_cbrt(n: u32) -> u32 {
    let cube = |k: u32| (k as u64).pow(3);
    let mut k = (n as f64).cbrt().ceil() as u32;
    // Correct the float estimate in both directions.
    while k > 0 && cube(k - 1) >= n as u64 {
        k -= 1;
    }
    while cube(k) < n as u64 {
        k += 1;
    }
    k
}
