//! Brick map + atlas storage carved from one memory block.
//!
//! The brick map region comes first, the atlas region follows it.
//! [`split_grid_memory`] works on a caller-provided byte block;
//! [`GridArena`] owns its block.

use crate::core::error::Error;
use crate::core::types::Result;
use super::brick_map::BrickIndex;
use super::planner::CapacityPlan;

/// Mutable views of the two build buffers
#[derive(Debug)]
pub struct GridBuffers<'a> {
    pub brick_map: &'a mut [BrickIndex],
    pub atlas: &'a mut [u8],
}

/// Split a caller-provided block into brick map and worst-case atlas regions.
///
/// The block must hold at least `plan.total_bytes()` bytes and start on a
/// `BrickIndex` boundary.
pub fn split_grid_memory<'a>(memory: &'a mut [u8], plan: &CapacityPlan) -> Result<GridBuffers<'a>> {
    let required = plan.total_bytes();
    if memory.len() < required {
        return Err(Error::BufferTooSmall {
            buffer: "grid memory",
            required,
            actual: memory.len(),
        });
    }

    let (map_bytes, rest) = memory.split_at_mut(plan.brick_map_bytes);
    let brick_map: &mut [BrickIndex] =
        bytemuck::try_cast_slice_mut(map_bytes).map_err(|_| Error::MisalignedBuffer)?;

    Ok(GridBuffers {
        brick_map,
        atlas: &mut rest[..plan.atlas_bytes],
    })
}

/// Owned single-allocation storage for a brick map and an atlas.
///
/// Backed by `BrickIndex` words so the brick map is always aligned. The
/// atlas region can be resized after classification, keeping the brick
/// map intact.
#[derive(Clone, Debug, Default)]
pub struct GridArena {
    words: Vec<BrickIndex>,
    brick_map_len: usize,
    atlas_len: usize,
}

const WORD: usize = std::mem::size_of::<BrickIndex>();

impl GridArena {
    /// Allocate `brick_map_len` entries plus `atlas_len` atlas bytes, zeroed
    pub fn new(brick_map_len: usize, atlas_len: usize) -> Self {
        Self {
            words: vec![0; brick_map_len + atlas_len.div_ceil(WORD)],
            brick_map_len,
            atlas_len,
        }
    }

    /// Arena sized for a plan's brick map and worst-case atlas
    pub fn from_plan(plan: &CapacityPlan) -> Self {
        Self::new(plan.total_bricks as usize, plan.atlas_bytes)
    }

    /// Resize the atlas region; new bytes are zeroed
    pub fn resize_atlas(&mut self, atlas_len: usize) {
        self.words.resize(self.brick_map_len + atlas_len.div_ceil(WORD), 0);
        self.atlas_len = atlas_len;
    }

    pub fn brick_map(&self) -> &[BrickIndex] {
        &self.words[..self.brick_map_len]
    }

    pub fn atlas(&self) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.words[self.brick_map_len..]);
        &bytes[..self.atlas_len]
    }

    /// Both regions at once, mutably
    pub fn buffers_mut(&mut self) -> GridBuffers<'_> {
        let (brick_map, rest) = self.words.split_at_mut(self.brick_map_len);
        let atlas: &mut [u8] = bytemuck::cast_slice_mut(rest);
        GridBuffers {
            brick_map,
            atlas: &mut atlas[..self.atlas_len],
        }
    }

    /// Bytes held by both regions
    pub fn byte_len(&self) -> usize {
        self.brick_map_len * WORD + self.atlas_len
    }
}
