//! Optional refinement between Pass 1 and layout.
//!
//! The center-sample cull is conservative: some pending bricks have no
//! voxel inside the narrow band at all. Refinement samples pending
//! bricks voxel by voxel, stops at the first voxel within the band, and
//! demotes bricks that have none back to AIR or SOLID. The atlas layout
//! is then sized from the smaller active count.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{Result, UVec3};
use super::brick_map::{BrickIndex, BrickState, BRICK_PENDING};
use super::descriptor::GridDescriptor;
use super::field::DistanceField;
use super::PADDED_BRICK_EDGE;

/// Outcome of a refinement pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineReport {
    /// Pending bricks with at least one voxel in the narrow band
    pub kept: u32,
    /// Pending bricks demoted to AIR or SOLID
    pub demoted: u32,
}

/// Demote pending bricks that hold no narrow-band voxel
pub fn refine_bricks<F>(
    desc: &GridDescriptor,
    field: &F,
    brick_map: &mut [BrickIndex],
) -> Result<RefineReport>
where
    F: DistanceField + ?Sized,
{
    let total = desc.total_bricks() as usize;
    if brick_map.len() < total {
        return Err(Error::BufferTooSmall {
            buffer: "brick map",
            required: total,
            actual: brick_map.len(),
        });
    }

    let (kept, demoted) = brick_map[..total]
        .par_iter_mut()
        .enumerate()
        .filter(|(_, entry)| **entry == BRICK_PENDING)
        .map(|(index, entry)| {
            let brick = desc.brick_coord(index);
            if touches_band(desc, field, brick) {
                (1, 0)
            } else {
                let center_distance = field.sample(desc.brick_center(brick));
                *entry = BrickState::far_field(center_distance).encode();
                (0, 1)
            }
        })
        .reduce(|| (0u32, 0u32), |a, b| (a.0 + b.0, a.1 + b.1));

    log::debug!("Refined active bricks: {} kept, {} demoted", kept, demoted);
    Ok(RefineReport { kept, demoted })
}

fn touches_band<F>(desc: &GridDescriptor, field: &F, brick: UVec3) -> bool
where
    F: DistanceField + ?Sized,
{
    let t = desc.truncation_distance();
    for z in 0..PADDED_BRICK_EDGE {
        for y in 0..PADDED_BRICK_EDGE {
            for x in 0..PADDED_BRICK_EDGE {
                let position = desc.padded_voxel_position(brick, UVec3::new(x, y, z));
                if field.sample(position).abs() <= t {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::grid::classify::classify_bricks;
    use crate::grid::test_fields::sphere;

    #[test]
    fn test_refine_never_drops_band_bricks() {
        let desc = GridDescriptor::new(Vec3::ZERO, 0.125, 32).unwrap();
        let field = sphere(1.0);
        let mut brick_map = vec![0; 64];
        let classified = classify_bricks(&desc, &field, &mut brick_map).unwrap();
        let before = brick_map.clone();
        let report = refine_bricks(&desc, &field, &mut brick_map).unwrap();

        assert_eq!(report.kept + report.demoted, classified.active);
        for (index, (&old, &new)) in before.iter().zip(&brick_map).enumerate() {
            if old != BRICK_PENDING {
                assert_eq!(old, new);
                continue;
            }
            let brick = desc.brick_coord(index);
            assert_eq!(new == BRICK_PENDING, touches_band(&desc, &field, brick));
        }
    }

    #[test]
    fn test_refine_demotes_by_center_sign() {
        // Thin band far from every voxel: cull keeps bricks the fine pass rejects.
        let desc = GridDescriptor::with_truncation_cells(Vec3::ZERO, 0.125, 16, 0.25).unwrap();
        // Plane between voxel rows: y = 0 lies on a brick boundary, voxel
        // centers sit at +-0.0625 and beyond, band is +-0.03125.
        let field = |p: Vec3| p.y;
        let mut brick_map = vec![0; 8];
        let classified = classify_bricks(&desc, &field, &mut brick_map).unwrap();
        assert_eq!(classified.active, 8);

        let report = refine_bricks(&desc, &field, &mut brick_map).unwrap();
        assert_eq!(report, RefineReport { kept: 0, demoted: 8 });
        for (index, &raw) in brick_map.iter().enumerate() {
            let brick = desc.brick_coord(index);
            let expected = if brick.y == 0 { BrickState::Solid } else { BrickState::Air };
            assert_eq!(BrickState::decode(raw), expected);
        }
    }
}
