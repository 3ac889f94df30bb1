//! Pass 2: atlas packing and fill.
//!
//! Pending bricks get atlas slots in brick-map scan order. Every padded
//! voxel of every assigned brick is sampled once, quantized and written
//! to its slot; the brick map entry then becomes `slot + 1`.
//!
//! The atlas is filled in bands: one brick row of one atlas z-slice,
//! which is a contiguous run of `width * PADDED_BRICK_EDGE` bytes. Bands
//! never overlap, so they are filled in parallel without locking.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{Result, UVec3};
use super::brick_map::{BrickIndex, BrickState, BRICK_PENDING, MAX_ATLAS_SLOTS};
use super::descriptor::GridDescriptor;
use super::field::DistanceField;
use super::layout::AtlasLayout;
use super::quantize::SampleFormat;
use super::{PADDED_BRICK_EDGE, PADDED_BRICK_VOXELS};

/// Outcome of Pass 2
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    /// Atlas slots written
    pub slots_used: u32,
    /// Bytes of the atlas holding brick data
    pub atlas_bytes_used: usize,
}

/// Fill the atlas for every pending brick in `brick_map`.
///
/// Fails before touching any buffer if a buffer is too small or the
/// pending bricks do not fit `layout`. `materials`, when given, receives
/// the field's material id per voxel in the same layout as `atlas`.
pub fn fill_atlas<F>(
    desc: &GridDescriptor,
    field: &F,
    layout: &AtlasLayout,
    format: SampleFormat,
    brick_map: &mut [BrickIndex],
    atlas: &mut [u8],
    materials: Option<&mut [u8]>,
) -> Result<FillReport>
where
    F: DistanceField + ?Sized,
{
    let total = desc.total_bricks() as usize;
    check_len("brick map", brick_map.len(), total)?;
    let atlas_bytes = layout.atlas_bytes();
    check_len("atlas", atlas.len(), atlas_bytes)?;
    if let Some(materials) = &materials {
        check_len("material", materials.len(), atlas_bytes)?;
    }

    let brick_map = &mut brick_map[..total];

    // Slot assignment is a prefix sum over pending entries in scan order.
    let slots: Vec<u32> = brick_map
        .iter()
        .enumerate()
        .filter(|(_, entry)| **entry == BRICK_PENDING)
        .map(|(index, _)| index as u32)
        .collect();

    let capacity = layout.capacity().min(MAX_ATLAS_SLOTS);
    if slots.len() > capacity as usize {
        log::warn!(
            "Atlas overflow: {} active bricks, {:?} layout holds {}",
            slots.len(), layout.strategy(), capacity
        );
        return Err(Error::AtlasOverflow {
            required: slots.len() as u32,
            capacity,
        });
    }

    let filler = BandFiller {
        desc,
        field,
        layout,
        format,
        slots: &slots,
        inverse_truncation: 1.0 / desc.truncation_distance(),
    };

    let atlas = &mut atlas[..atlas_bytes];
    let band_len = (layout.dimensions().x * PADDED_BRICK_EDGE) as usize;
    match materials {
        Some(materials) => atlas
            .par_chunks_mut(band_len)
            .zip(materials[..atlas_bytes].par_chunks_mut(band_len))
            .enumerate()
            .for_each(|(band, (values, materials))| filler.fill_band(band, values, Some(materials))),
        None => atlas
            .par_chunks_mut(band_len)
            .enumerate()
            .for_each(|(band, values)| filler.fill_band(band, values, None)),
    }

    for (slot, &index) in slots.iter().enumerate() {
        brick_map[index as usize] = BrickState::Slot(slot as u32).encode();
        log::trace!("Brick {} -> slot {}", index, slot);
    }

    let slots_used = slots.len() as u32;
    log::debug!(
        "Filled {} of {} atlas slots ({:?}, {} bytes)",
        slots_used, layout.capacity(), layout.strategy(), atlas_bytes
    );

    Ok(FillReport {
        slots_used,
        atlas_bytes_used: slots_used as usize * PADDED_BRICK_VOXELS as usize,
    })
}

fn check_len(buffer: &'static str, actual: usize, required: usize) -> Result<()> {
    if actual < required {
        return Err(Error::BufferTooSmall { buffer, required, actual });
    }
    Ok(())
}

/// Shared read-only state for filling bands
struct BandFiller<'a, F: ?Sized> {
    desc: &'a GridDescriptor,
    field: &'a F,
    layout: &'a AtlasLayout,
    format: SampleFormat,
    /// Brick-map index for each assigned slot
    slots: &'a [u32],
    inverse_truncation: f32,
}

impl<F: DistanceField + ?Sized> BandFiller<'_, F> {
    /// Fill band `band`: brick row `band % by` of atlas slice `band / by`
    fn fill_band(&self, band: usize, values: &mut [u8], mut materials: Option<&mut [u8]>) {
        let bricks = self.layout.bricks();
        let width = (bricks.x * PADDED_BRICK_EDGE) as usize;
        let edge = PADDED_BRICK_EDGE as usize;

        let row = band as u32 % bricks.y;
        let slice = band as u32 / bricks.y;
        let layer = slice / PADDED_BRICK_EDGE;
        let local_z = slice % PADDED_BRICK_EDGE;

        for column in 0..bricks.x {
            let slot = self.layout.slot_at(UVec3::new(column, row, layer));
            let x0 = column as usize * edge;

            let Some(&brick_index) = self.slots.get(slot as usize) else {
                // Unused slot: deterministic far-outside fill
                let outside = self.format.far_outside();
                for ly in 0..edge {
                    let start = ly * width + x0;
                    values[start..start + edge].fill(outside);
                    if let Some(materials) = materials.as_deref_mut() {
                        materials[start..start + edge].fill(0);
                    }
                }
                continue;
            };

            let brick = self.desc.brick_coord(brick_index as usize);
            for local_y in 0..PADDED_BRICK_EDGE {
                let row_start = local_y as usize * width + x0;
                for local_x in 0..PADDED_BRICK_EDGE {
                    let position = self
                        .desc
                        .padded_voxel_position(brick, UVec3::new(local_x, local_y, local_z));
                    let offset = row_start + local_x as usize;

                    let distance = match materials.as_deref_mut() {
                        Some(materials) => {
                            let sample = self.field.sample_material(position);
                            materials[offset] = sample.material;
                            sample.distance
                        }
                        None => self.field.sample(position),
                    };
                    values[offset] = self.format.encode(distance, self.inverse_truncation);
                }
            }
        }
    }
}
