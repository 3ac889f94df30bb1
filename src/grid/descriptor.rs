//! World-space description of a sparse grid

use crate::core::error::Error;
use crate::core::types::{IVec3, Result, UVec3, Vec3};
use crate::math::aabb::Aabb;
use super::{linear_index, BRICK_APRON, BRICK_EDGE, PADDED_BRICK_EDGE};

/// Default narrow band half-width, in cells
pub const DEFAULT_TRUNCATION_CELLS: f32 = 4.0;

/// Grid placement, resolution and derived culling constants.
///
/// Built once per distance field snapshot and shared read-only by both
/// build passes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridDescriptor {
    center: Vec3,
    origin: Vec3,
    cell_size: f32,
    cell_count: u32,
    brick_resolution: u32,
    truncation_distance: f32,
    brick_radius: f32,
}

impl GridDescriptor {
    /// Create a descriptor with the default 4-cell narrow band
    pub fn new(center: Vec3, cell_size: f32, cell_count: u32) -> Result<Self> {
        Self::with_truncation_cells(center, cell_size, cell_count, DEFAULT_TRUNCATION_CELLS)
    }

    /// Create a descriptor whose narrow band is `truncation_cells * cell_size` wide
    pub fn with_truncation_cells(
        center: Vec3,
        cell_size: f32,
        cell_count: u32,
        truncation_cells: f32,
    ) -> Result<Self> {
        if cell_count == 0 {
            return Err(Error::ZeroResolution);
        }
        if cell_count % BRICK_EDGE != 0 {
            return Err(Error::IndivisibleResolution { cell_count, brick_edge: BRICK_EDGE });
        }
        if (cell_count / BRICK_EDGE).checked_pow(3).is_none() {
            return Err(Error::ResolutionTooLarge { cell_count });
        }
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(Error::InvalidCellSize(cell_size));
        }

        let truncation_distance = truncation_cells * cell_size;
        if !truncation_distance.is_finite() || truncation_distance <= 0.0 {
            return Err(Error::InvalidTruncation(truncation_distance));
        }

        // Half diagonal of the padded brick. Every voxel center, apron
        // included, lies within this distance of the brick center.
        let brick_radius =
            Aabb::from_min_edge(Vec3::ZERO, PADDED_BRICK_EDGE as f32 * cell_size).bounding_radius();

        Ok(Self {
            center,
            origin: center - Vec3::splat(cell_count as f32 * cell_size * 0.5),
            cell_size,
            cell_count,
            brick_resolution: cell_count / BRICK_EDGE,
            truncation_distance,
            brick_radius,
        })
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// World-space minimum corner of the grid
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn cell_count(&self) -> u32 {
        self.cell_count
    }

    /// Bricks per axis
    pub fn brick_resolution(&self) -> u32 {
        self.brick_resolution
    }

    pub fn total_bricks(&self) -> u32 {
        self.brick_resolution * self.brick_resolution * self.brick_resolution
    }

    pub fn truncation_distance(&self) -> f32 {
        self.truncation_distance
    }

    pub fn brick_radius(&self) -> f32 {
        self.brick_radius
    }

    /// Center distance beyond which a brick cannot touch the narrow band
    pub fn cull_threshold(&self) -> f32 {
        self.brick_radius + self.truncation_distance
    }

    /// World-space extent of the whole grid
    pub fn extent(&self) -> f32 {
        self.cell_count as f32 * self.cell_size
    }

    /// World bounds of the whole grid
    pub fn bounds(&self) -> Aabb {
        Aabb::from_min_edge(self.origin, self.extent())
    }

    /// Brick-map index of a brick coordinate
    pub fn brick_index(&self, brick: UVec3) -> usize {
        let n = self.brick_resolution;
        linear_index(brick.x, brick.y, brick.z, n, n)
    }

    /// Brick coordinate of a brick-map index
    pub fn brick_coord(&self, index: usize) -> UVec3 {
        let n = self.brick_resolution as usize;
        UVec3::new((index % n) as u32, ((index / n) % n) as u32, (index / (n * n)) as u32)
    }

    /// World position of the brick's minimum corner (apron excluded)
    pub fn brick_start(&self, brick: UVec3) -> Vec3 {
        self.origin + (brick * BRICK_EDGE).as_vec3() * self.cell_size
    }

    pub fn brick_center(&self, brick: UVec3) -> Vec3 {
        self.brick_bounds(brick).center()
    }

    /// World bounds of the logical brick (apron excluded)
    pub fn brick_bounds(&self, brick: UVec3) -> Aabb {
        Aabb::from_min_edge(self.brick_start(brick), BRICK_EDGE as f32 * self.cell_size)
    }

    /// World position of a logical voxel, `local` in `[-1, BRICK_EDGE]` per axis
    pub fn voxel_position(&self, brick: UVec3, local: IVec3) -> Vec3 {
        self.brick_start(brick) + (local.as_vec3() + Vec3::splat(0.5)) * self.cell_size
    }

    /// World position of a padded voxel, `padded` in `[0, PADDED_BRICK_EDGE)` per axis
    pub fn padded_voxel_position(&self, brick: UVec3, padded: UVec3) -> Vec3 {
        self.voxel_position(brick, padded.as_ivec3() - IVec3::splat(BRICK_APRON as i32))
    }

    /// Brick containing a world position, if inside the grid
    pub fn brick_at(&self, position: Vec3) -> Option<UVec3> {
        if !self.bounds().contains_point(position) {
            return None;
        }
        let cells = (position - self.origin) / self.cell_size;
        // The max face belongs to the last brick.
        let brick = (cells / BRICK_EDGE as f32).floor().as_uvec3();
        Some(brick.min(UVec3::splat(self.brick_resolution - 1)))
    }
}
