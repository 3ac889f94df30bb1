//! Sparse distance grid: brick map plus packed distance atlas.
//!
//! The build runs in a fixed order:
//! 1. [`plan_capacity`] sizes the buffers from the grid resolution
//! 2. [`classify_bricks`] labels every brick AIR, SOLID or pending
//! 3. [`refine_bricks`] (optional) demotes pending bricks with no voxel in band
//! 4. [`AtlasLayout`] is chosen from the active count or the worst case
//! 5. [`fill_atlas`] samples and packs every pending brick
//!
//! [`GridBuild`] drives these steps as a state machine and owns the
//! buffers; the free functions work on caller-provided slices.

pub mod descriptor;
pub mod planner;
pub mod brick_map;
pub mod field;
pub mod quantize;
pub mod layout;
pub mod arena;
pub mod classify;
pub mod refine;
pub mod fill;
pub mod config;
pub mod build;
pub mod sparse_grid;

pub use descriptor::GridDescriptor;
pub use planner::{plan_capacity, CapacityPlan};
pub use brick_map::{BrickIndex, BrickState};
pub use field::{CountingField, DistanceField, FieldSample};
pub use quantize::SampleFormat;
pub use layout::{AtlasLayout, PackingStrategy};
pub use arena::{split_grid_memory, GridArena, GridBuffers};
pub use classify::{classify_bricks, ClassifyReport};
pub use refine::{refine_bricks, RefineReport};
pub use fill::{fill_atlas, FillReport};
pub use config::{BuildConfig, PackingMode, MAX_LOD_LEVELS};
pub use build::{build_grid, build_lod_chain, BuildReport, BuildState, GridBuild};
pub use sparse_grid::{GridGpuParams, SparseDistanceGrid};

/// Logical brick edge length in cells
pub const BRICK_EDGE: u32 = 8;

/// Border voxels stored on every face of a brick
pub const BRICK_APRON: u32 = 1;

/// Stored brick edge length including the apron (10)
pub const PADDED_BRICK_EDGE: u32 = BRICK_EDGE + 2 * BRICK_APRON;

/// Voxels stored per brick (1000)
pub const PADDED_BRICK_VOXELS: u32 = PADDED_BRICK_EDGE * PADDED_BRICK_EDGE * PADDED_BRICK_EDGE;

/// Linear index into an x-fastest 3D array
#[inline]
pub fn linear_index(x: u32, y: u32, z: u32, width: u32, height: u32) -> usize {
    x as usize + y as usize * width as usize + z as usize * width as usize * height as usize
}

#[cfg(test)]
pub(crate) mod test_fields {
    use crate::core::types::Vec3;

    /// Sphere centered at the origin
    pub fn sphere(radius: f32) -> impl Fn(Vec3) -> f32 + Sync {
        move |p: Vec3| p.length() - radius
    }
}
