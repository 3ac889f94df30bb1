//! Finished sparse grid and its GPU-facing parameters

use bytemuck::{Pod, Zeroable};

use crate::core::types::{IVec3, UVec3, Vec3};
use super::arena::GridArena;
use super::brick_map::{BrickIndex, BrickState};
use super::build::BuildReport;
use super::descriptor::GridDescriptor;
use super::layout::AtlasLayout;
use super::quantize::SampleFormat;
use super::{BRICK_APRON, BRICK_EDGE};

/// Grid uniform data for GPU (must match shader struct exactly)
/// WGSL vec3 has 16-byte alignment, so scalars fill the fourth lane
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GridGpuParams {
    /// World position of the grid's minimum corner (12 bytes, offset 0)
    pub grid_start: [f32; 3],
    /// Cell edge length (4 bytes, offset 12)
    pub cell_size: f32,
    /// Reciprocal atlas size in voxels (12 bytes, offset 16)
    pub inverse_atlas_size: [f32; 3],
    /// Narrow band half-width (4 bytes, offset 28)
    pub truncation: f32,
    /// Atlas size in bricks (12 bytes, offset 32)
    pub atlas_bricks: [u32; 3],
    /// Bricks per brick map axis (4 bytes, offset 44)
    pub brick_map_dim: u32,
    /// Cell diagonal, the safe march step near the band edge (4 bytes, offset 48)
    pub cell_diagonal: f32,
    /// Padding to 64 bytes (12 bytes, offset 52)
    pub _pad: [f32; 3],
}

/// Brick map, distance atlas and optional material atlas for one field snapshot.
///
/// Read-only once built. Brick map entries decode with
/// [`BrickState::decode`]; a `Slot(s)` brick's padded voxels start at
/// [`AtlasLayout::slot_origin`]`(s)` in the atlas.
#[derive(Clone, Debug)]
pub struct SparseDistanceGrid {
    descriptor: GridDescriptor,
    layout: AtlasLayout,
    format: SampleFormat,
    arena: GridArena,
    materials: Option<Vec<u8>>,
    report: BuildReport,
}

impl SparseDistanceGrid {
    pub(crate) fn new(
        descriptor: GridDescriptor,
        layout: AtlasLayout,
        format: SampleFormat,
        arena: GridArena,
        materials: Option<Vec<u8>>,
        report: BuildReport,
    ) -> Self {
        Self { descriptor, layout, format, arena, materials, report }
    }

    pub fn descriptor(&self) -> &GridDescriptor {
        &self.descriptor
    }

    pub fn origin(&self) -> Vec3 {
        self.descriptor.origin()
    }

    pub fn cell_size(&self) -> f32 {
        self.descriptor.cell_size()
    }

    pub fn truncation_distance(&self) -> f32 {
        self.descriptor.truncation_distance()
    }

    pub fn brick_resolution(&self) -> u32 {
        self.descriptor.brick_resolution()
    }

    pub fn brick_map(&self) -> &[BrickIndex] {
        self.arena.brick_map()
    }

    pub fn atlas(&self) -> &[u8] {
        self.arena.atlas()
    }

    /// Material ids in atlas layout, if the build stored them
    pub fn materials(&self) -> Option<&[u8]> {
        self.materials.as_deref()
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Atlas size in voxels
    pub fn atlas_dimensions(&self) -> UVec3 {
        self.layout.dimensions()
    }

    pub fn bricks_per_row(&self) -> u32 {
        self.layout.bricks_per_row()
    }

    /// State of the brick at `brick`, or `None` outside the grid
    pub fn brick_state(&self, brick: UVec3) -> Option<BrickState> {
        if brick.cmpge(UVec3::splat(self.brick_resolution())).any() {
            return None;
        }
        let raw = self.brick_map()[self.descriptor.brick_index(brick)];
        Some(BrickState::decode(raw))
    }

    /// Brick containing a world position and its state, or `None` outside the grid
    pub fn brick_state_at(&self, position: Vec3) -> Option<(UVec3, BrickState)> {
        let brick = self.descriptor.brick_at(position)?;
        Some((brick, self.brick_state(brick)?))
    }

    /// Atlas voxel coordinate of a packed brick's first apron voxel
    pub fn brick_atlas_origin(&self, brick: UVec3) -> Option<UVec3> {
        match self.brick_state(brick)? {
            BrickState::Slot(slot) => Some(self.layout.slot_origin(slot)),
            _ => None,
        }
    }

    /// Dequantized distance stored for voxel `local` of a packed brick.
    ///
    /// `local` runs over `-1..=8` on each axis; -1 and 8 are apron voxels.
    pub fn voxel_distance(&self, brick: UVec3, local: IVec3) -> Option<f32> {
        let offset = self.voxel_offset(brick, local)?;
        Some(self.format.decode(self.atlas()[offset], self.truncation_distance()))
    }

    /// Material id stored for voxel `local` of a packed brick
    pub fn voxel_material(&self, brick: UVec3, local: IVec3) -> Option<u8> {
        let offset = self.voxel_offset(brick, local)?;
        self.materials.as_ref().map(|materials| materials[offset])
    }

    /// Packed bricks with their atlas slots, in brick-map order
    pub fn active_bricks(&self) -> impl Iterator<Item = (UVec3, u32)> + '_ {
        self.brick_map()
            .iter()
            .enumerate()
            .filter_map(|(index, &raw)| match BrickState::decode(raw) {
                BrickState::Slot(slot) => Some((self.descriptor.brick_coord(index), slot)),
                _ => None,
            })
    }

    /// Uniform block for shaders that march this grid
    pub fn gpu_params(&self) -> GridGpuParams {
        let cell_size = self.cell_size();
        GridGpuParams {
            grid_start: self.origin().to_array(),
            cell_size,
            inverse_atlas_size: self.layout.inverse_dimensions(),
            truncation: self.truncation_distance(),
            atlas_bricks: self.layout.bricks().to_array(),
            brick_map_dim: self.brick_resolution(),
            cell_diagonal: cell_size * 3.0_f32.sqrt(),
            _pad: [0.0; 3],
        }
    }

    fn voxel_offset(&self, brick: UVec3, local: IVec3) -> Option<usize> {
        let lo = -(BRICK_APRON as i32);
        let hi = (BRICK_EDGE + BRICK_APRON) as i32;
        if local.cmplt(IVec3::splat(lo)).any() || local.cmpge(IVec3::splat(hi)).any() {
            return None;
        }
        let BrickState::Slot(slot) = self.brick_state(brick)? else {
            return None;
        };
        let padded = (local - IVec3::splat(lo)).as_uvec3();
        Some(self.layout.voxel_offset(slot, padded))
    }
}
