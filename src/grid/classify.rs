//! Pass 1: conservative brick classification.
//!
//! Each brick is sampled once at its center. For a distance field,
//! every point within `brick_radius` of the center differs from the
//! center distance by at most `brick_radius`, so a brick whose center
//! lies further than `brick_radius + truncation_distance` from the
//! surface cannot hold a single narrow-band voxel. Such bricks become
//! AIR or SOLID; the rest are marked pending for Pass 2.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use super::brick_map::{BrickIndex, BrickState};
use super::descriptor::GridDescriptor;
use super::field::DistanceField;

/// Brick counts produced by Pass 1
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyReport {
    pub air: u32,
    pub solid: u32,
    /// Bricks marked pending, i.e. needing an atlas slot
    pub active: u32,
}

impl ClassifyReport {
    /// Tally the states currently in a brick map
    pub fn tally(brick_map: &[BrickIndex]) -> Self {
        brick_map.iter().fold(Self::default(), |mut report, &raw| {
            match BrickState::decode(raw) {
                BrickState::Air => report.air += 1,
                BrickState::Solid => report.solid += 1,
                BrickState::Pending | BrickState::Slot(_) => report.active += 1,
            }
            report
        })
    }

    pub fn total(&self) -> u32 {
        self.air + self.solid + self.active
    }
}

/// Classify every brick of `desc` into `brick_map`.
///
/// `brick_map` must hold at least `desc.total_bricks()` entries; only
/// that prefix is written. Returns the per-state counts, whose `active`
/// field sizes the atlas layout.
pub fn classify_bricks<F>(
    desc: &GridDescriptor,
    field: &F,
    brick_map: &mut [BrickIndex],
) -> Result<ClassifyReport>
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
    let brick_map = &mut brick_map[..total];
    let threshold = desc.cull_threshold();

    brick_map.par_iter_mut().enumerate().for_each(|(index, entry)| {
        let brick = desc.brick_coord(index);
        let distance = field.sample(desc.brick_center(brick));

        let state = if distance.abs() > threshold {
            BrickState::far_field(distance)
        } else {
            BrickState::Pending
        };
        *entry = state.encode();
    });

    let report = ClassifyReport::tally(brick_map);
    log::debug!(
        "Classified {} bricks: {} air, {} solid, {} active (cull threshold {:.4})",
        total, report.air, report.solid, report.active, threshold
    );

    Ok(report)
}
