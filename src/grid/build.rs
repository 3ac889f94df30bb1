//! Staged grid build.
//!
//! [`GridBuild`] owns the buffers and enforces the pass order:
//!
//! ```text
//! Empty --plan--> Sized --classify--> Classified --fill--> Ready
//!   \               \                     \
//!    `---------------`---------------------`-----> Failed
//! ```
//!
//! Any error, including calling a step out of order, leaves the build
//! in `Failed`. There is no way back; start a new build instead.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use super::arena::GridArena;
use super::classify::{classify_bricks, ClassifyReport};
use super::config::{BuildConfig, PackingMode};
use super::descriptor::GridDescriptor;
use super::field::{CountingField, DistanceField};
use super::fill::{fill_atlas, FillReport};
use super::layout::{AtlasLayout, PackingStrategy};
use super::planner::{plan_capacity, CapacityPlan};
use super::refine::{refine_bricks, RefineReport};
use super::sparse_grid::SparseDistanceGrid;

/// Build progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildState {
    Empty,
    Sized,
    Classified,
    Ready,
    Failed,
}

/// Statistics gathered over one build
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub plan: CapacityPlan,
    /// Pass 1 counts, before refinement
    pub classify: ClassifyReport,
    pub refine: Option<RefineReport>,
    pub fill: FillReport,
    pub strategy: PackingStrategy,
    /// Atlas size in voxels
    pub atlas_dimensions: [u32; 3],
    /// Allocated atlas bytes (used or not)
    pub atlas_bytes: usize,
    /// Allocated material atlas bytes, 0 when disabled
    pub material_bytes: usize,
    /// Distance function evaluations over all passes
    pub sdf_invocations: u64,
    pub classify_ms: f64,
    pub refine_ms: f64,
    pub fill_ms: f64,
}

impl BuildReport {
    /// Bricks that ended up with an atlas slot
    pub fn active_bricks(&self) -> u32 {
        self.fill.slots_used
    }

    /// Fraction of allocated atlas slots holding brick data
    pub fn atlas_occupancy(&self) -> f32 {
        if self.atlas_bytes == 0 {
            return 0.0;
        }
        self.fill.atlas_bytes_used as f32 / self.atlas_bytes as f32
    }
}

/// A grid build in progress
#[derive(Debug)]
pub struct GridBuild {
    config: BuildConfig,
    state: BuildState,
    descriptor: Option<GridDescriptor>,
    layout: Option<AtlasLayout>,
    arena: GridArena,
    materials: Option<Vec<u8>>,
    active_bricks: u32,
    report: BuildReport,
}

impl GridBuild {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            state: BuildState::Empty,
            descriptor: None,
            layout: None,
            arena: GridArena::default(),
            materials: None,
            active_bricks: 0,
            report: BuildReport::default(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Brick map as it stands after the last completed step
    pub fn brick_map(&self) -> &[u16] {
        self.arena.brick_map()
    }

    /// Validate the config and allocate the brick map.
    ///
    /// Cube packing also allocates the atlas here, since its size does
    /// not depend on Pass 1.
    pub fn plan(&mut self) -> Result<&CapacityPlan> {
        self.expect_state(BuildState::Empty)?;
        let planned = self.config.validate().and_then(|()| {
            let descriptor = self.config.descriptor()?;
            let plan = plan_capacity(self.config.cell_count)?;
            let layout = match self.config.packing {
                PackingMode::RowColumn => None,
                PackingMode::Cube { bricks_per_side } => Some(AtlasLayout::cube(
                    bricks_per_side.unwrap_or(plan.atlas_bricks_per_side),
                )?),
            };
            Ok((descriptor, plan, layout))
        });
        let (descriptor, plan, layout) = self.fail_on_err(planned)?;

        let atlas_bytes = layout.map_or(0, |layout| layout.atlas_bytes());
        self.arena = GridArena::new(plan.total_bricks as usize, atlas_bytes);
        if layout.is_some() && self.config.materials {
            self.materials = Some(vec![0; atlas_bytes]);
        }

        log::debug!(
            "Planned {}^3 cells: {} bricks, brick map {} bytes, worst-case atlas {} bytes",
            plan.cell_count, plan.total_bricks, plan.brick_map_bytes, plan.atlas_bytes
        );

        self.descriptor = Some(descriptor);
        self.layout = layout;
        self.report.plan = plan;
        self.state = BuildState::Sized;
        Ok(&self.report.plan)
    }

    /// Run Pass 1 (and refinement, if configured). Returns the number of
    /// bricks that will be packed.
    pub fn classify<F>(&mut self, field: &F) -> Result<u32>
    where
        F: DistanceField + ?Sized,
    {
        self.expect_state(BuildState::Sized)?;
        let descriptor = self.descriptor()?;
        let counting = CountingField::new(field);

        let start = Instant::now();
        let classified = classify_bricks(&descriptor, &counting, self.arena.buffers_mut().brick_map);
        let classify = self.fail_on_err(classified)?;
        self.report.classify_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.report.classify = classify;
        self.active_bricks = classify.active;

        if self.config.refine_active_bricks {
            let start = Instant::now();
            let refined = refine_bricks(&descriptor, &counting, self.arena.buffers_mut().brick_map);
            let refine = self.fail_on_err(refined)?;
            self.report.refine_ms = start.elapsed().as_secs_f64() * 1000.0;
            self.report.refine = Some(refine);
            self.active_bricks = refine.kept;
        }

        self.report.sdf_invocations += counting.invocations();
        self.state = BuildState::Classified;
        Ok(self.active_bricks)
    }

    /// Run Pass 2, allocating a row/column atlas first if needed
    pub fn fill<F>(&mut self, field: &F) -> Result<&FillReport>
    where
        F: DistanceField + ?Sized,
    {
        self.expect_state(BuildState::Classified)?;
        let descriptor = self.descriptor()?;

        let layout = match self.layout {
            Some(layout) => layout,
            None => {
                let layout = AtlasLayout::row_column(self.active_bricks);
                self.arena.resize_atlas(layout.atlas_bytes());
                if self.config.materials {
                    self.materials = Some(vec![0; layout.atlas_bytes()]);
                }
                self.layout = Some(layout);
                layout
            }
        };

        let counting = CountingField::new(field);
        let start = Instant::now();
        let buffers = self.arena.buffers_mut();
        let filled = fill_atlas(
            &descriptor,
            &counting,
            &layout,
            self.config.format,
            buffers.brick_map,
            buffers.atlas,
            self.materials.as_deref_mut(),
        );
        let fill = self.fail_on_err(filled)?;

        self.report.fill_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.report.sdf_invocations += counting.invocations();
        self.report.fill = fill;
        self.report.strategy = layout.strategy();
        self.report.atlas_dimensions = layout.dimensions().to_array();
        self.report.atlas_bytes = layout.atlas_bytes();
        self.report.material_bytes = self.materials.as_ref().map_or(0, Vec::len);
        self.state = BuildState::Ready;
        Ok(&self.report.fill)
    }

    /// Hand the finished grid to its consumer
    pub fn finish(self) -> Result<SparseDistanceGrid> {
        if self.state != BuildState::Ready {
            return Err(Error::InvalidState {
                expected: BuildState::Ready,
                actual: self.state,
            });
        }
        let (Some(descriptor), Some(layout)) = (self.descriptor, self.layout) else {
            return Err(Error::InvalidState {
                expected: BuildState::Ready,
                actual: BuildState::Failed,
            });
        };
        Ok(SparseDistanceGrid::new(
            descriptor,
            layout,
            self.config.format,
            self.arena,
            self.materials,
            self.report,
        ))
    }

    fn descriptor(&mut self) -> Result<GridDescriptor> {
        match self.descriptor {
            Some(descriptor) => Ok(descriptor),
            None => {
                let actual = self.state;
                self.state = BuildState::Failed;
                Err(Error::InvalidState { expected: BuildState::Sized, actual })
            }
        }
    }

    fn expect_state(&mut self, expected: BuildState) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        let actual = self.state;
        self.state = BuildState::Failed;
        Err(Error::InvalidState { expected, actual })
    }

    fn fail_on_err<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            log::warn!("Grid build failed in {:?}: {}", self.state, err);
            self.state = BuildState::Failed;
        }
        result
    }
}

/// Plan, classify, fill and finish in one call
pub fn build_grid<F>(config: &BuildConfig, field: &F) -> Result<SparseDistanceGrid>
where
    F: DistanceField + ?Sized,
{
    let start = Instant::now();
    let mut build = GridBuild::new(config.clone());
    build.plan()?;
    build.classify(field)?;
    build.fill(field)?;
    let grid = build.finish()?;

    let report = grid.report();
    log::info!(
        "Built {}^3 grid: {} of {} bricks active, {:?} atlas {:?} ({:.1} KiB, {:.0}% used), {} samples in {:.1}ms",
        config.cell_count,
        report.active_bricks(),
        report.plan.total_bricks,
        report.strategy,
        report.atlas_dimensions,
        report.atlas_bytes as f64 / 1024.0,
        report.atlas_occupancy() * 100.0,
        report.sdf_invocations,
        start.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(grid)
}

/// Build `config.lod_levels` grids, doubling the cell size per level
pub fn build_lod_chain<F>(config: &BuildConfig, field: &F) -> Result<Vec<SparseDistanceGrid>>
where
    F: DistanceField + ?Sized,
{
    config.validate()?;
    (0..config.lod_levels)
        .map(|level| {
            log::debug!("Building LOD {} of {}", level, config.lod_levels);
            build_grid(&config.for_lod(level), field)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::grid::brick_map::BrickState;
    use crate::grid::quantize::SampleFormat;
    use crate::grid::test_fields::sphere;
    use crate::grid::PADDED_BRICK_VOXELS;

    fn unit_sphere_config() -> BuildConfig {
        BuildConfig {
            cell_count: 32,
            cell_size: 0.125,
            ..Default::default()
        }
    }

    #[test]
    fn test_state_progression() {
        let field = sphere(1.0);
        let mut build = GridBuild::new(unit_sphere_config());
        assert_eq!(build.state(), BuildState::Empty);

        assert_eq!(build.plan().unwrap().total_bricks, 64);
        assert_eq!(build.state(), BuildState::Sized);

        assert_eq!(build.classify(&field).unwrap(), 56);
        assert_eq!(build.state(), BuildState::Classified);

        assert_eq!(build.fill(&field).unwrap().slots_used, 56);
        assert_eq!(build.state(), BuildState::Ready);

        let grid = build.finish().unwrap();
        assert_eq!(grid.report().sdf_invocations, 64 + 56 * PADDED_BRICK_VOXELS as u64);
    }

    #[test]
    fn test_out_of_order_fails_build() {
        let field = sphere(1.0);
        let mut build = GridBuild::new(unit_sphere_config());
        let err = build.classify(&field).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState { expected: BuildState::Sized, actual: BuildState::Empty }
        ));
        assert_eq!(build.state(), BuildState::Failed);
        assert!(build.plan().is_err());
        assert!(build.finish().is_err());
    }

    #[test]
    fn test_invalid_config_fails_without_allocating() {
        let config = BuildConfig { cell_count: 36, ..unit_sphere_config() };
        let mut build = GridBuild::new(config);
        assert!(matches!(build.plan(), Err(Error::IndivisibleResolution { .. })));
        assert_eq!(build.state(), BuildState::Failed);
        assert!(build.brick_map().is_empty());
        assert!(build_grid(&BuildConfig { cell_count: 36, ..unit_sphere_config() }, &sphere(1.0)).is_err());
    }

    #[test]
    fn test_cube_overflow_fails_build() {
        // 3^3 = 27 slots for 56 active bricks
        let config = BuildConfig {
            packing: PackingMode::Cube { bricks_per_side: Some(3) },
            ..unit_sphere_config()
        };
        let field = sphere(1.0);
        let mut build = GridBuild::new(config);
        build.plan().unwrap();
        build.classify(&field).unwrap();
        let err = build.fill(&field).unwrap_err();
        assert!(matches!(err, Error::AtlasOverflow { required: 56, capacity: 27 }));
        assert_eq!(build.state(), BuildState::Failed);
        assert!(build.finish().is_err());
    }

    #[test]
    fn test_oversized_configs_fail_cleanly() {
        let config = BuildConfig {
            packing: PackingMode::Cube { bricks_per_side: Some(1700) },
            ..unit_sphere_config()
        };
        let mut build = GridBuild::new(config);
        assert!(matches!(build.plan(), Err(Error::InvalidLayout(_))));
        assert_eq!(build.state(), BuildState::Failed);

        let config = BuildConfig { cell_count: 13008, ..unit_sphere_config() };
        assert!(matches!(
            build_grid(&config, &sphere(1.0)),
            Err(Error::ResolutionTooLarge { cell_count: 13008 })
        ));

        let config = BuildConfig { lod_levels: 40, ..unit_sphere_config() };
        assert!(matches!(
            build_lod_chain(&config, &sphere(1.0)),
            Err(Error::InvalidLodLevels { levels: 40, .. })
        ));
    }

    #[test]
    fn test_worst_case_cube_never_overflows() {
        let config = BuildConfig {
            packing: PackingMode::Cube { bricks_per_side: None },
            ..unit_sphere_config()
        };
        let grid = build_grid(&config, &sphere(1.0)).unwrap();
        assert_eq!(grid.layout().strategy(), PackingStrategy::Cube);
        assert_eq!(grid.atlas().len(), grid.report().plan.atlas_bytes);
        assert_eq!(grid.report().active_bricks(), 56);
    }

    #[test]
    fn test_rebuild_is_bit_identical() {
        for packing in [PackingMode::RowColumn, PackingMode::Cube { bricks_per_side: None }] {
            let config = BuildConfig { packing, materials: true, ..unit_sphere_config() };
            let field = sphere(0.9);
            let a = build_grid(&config, &field).unwrap();
            let b = build_grid(&config, &field).unwrap();
            assert_eq!(a.brick_map(), b.brick_map());
            assert_eq!(a.atlas(), b.atlas());
            assert_eq!(a.materials(), b.materials());
        }
    }

    #[test]
    fn test_result_independent_of_thread_count() {
        let field = |p: Vec3| (p - Vec3::new(0.3, -0.2, 0.1)).length() - 1.1;
        let build_with = |threads: usize, packing: PackingMode| {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
            let config = BuildConfig {
                packing,
                materials: true,
                refine_active_bricks: true,
                ..unit_sphere_config()
            };
            pool.install(|| build_grid(&config, &field)).unwrap()
        };

        for packing in [PackingMode::RowColumn, PackingMode::Cube { bricks_per_side: None }] {
            let serial = build_with(1, packing);
            for threads in [2, 4, 7] {
                let parallel = build_with(threads, packing);
                assert_eq!(serial.brick_map(), parallel.brick_map());
                assert_eq!(serial.atlas(), parallel.atlas());
                assert_eq!(serial.materials(), parallel.materials());
                assert_eq!(serial.report().sdf_invocations, parallel.report().sdf_invocations);
            }
        }
    }

    #[test]
    fn test_refinement_shrinks_atlas() {
        let field = |p: Vec3| p.y;
        let base = BuildConfig {
            cell_count: 16,
            cell_size: 0.125,
            truncation_cells: 0.25,
            ..Default::default()
        };
        let plain = build_grid(&base, &field).unwrap();
        assert_eq!(plain.report().active_bricks(), 8);
        assert!(plain.report().refine.is_none());

        let refined = build_grid(&BuildConfig { refine_active_bricks: true, ..base }, &field).unwrap();
        assert_eq!(refined.report().refine, Some(RefineReport { kept: 0, demoted: 8 }));
        assert_eq!(refined.report().active_bricks(), 0);
        assert!(refined.brick_map().iter().all(|&e| !BrickState::decode(e).is_active()));
    }

    #[test]
    fn test_lod_chain() {
        let config = BuildConfig { lod_levels: 3, format: SampleFormat::Snorm8, ..unit_sphere_config() };
        let grids = build_lod_chain(&config, &sphere(1.0)).unwrap();
        assert_eq!(grids.len(), 3);
        for (level, grid) in grids.iter().enumerate() {
            assert_eq!(grid.cell_size(), 0.125 * (1 << level) as f32);
            assert_eq!(grid.brick_resolution(), 4);
            assert_eq!(grid.format(), SampleFormat::Snorm8);
        }
    }

    #[test]
    fn test_report_accounting() {
        let config = BuildConfig { materials: true, ..unit_sphere_config() };
        let grid = build_grid(&config, &sphere(1.0)).unwrap();
        let report = grid.report();
        assert_eq!(report.classify, ClassifyReport { air: 8, solid: 0, active: 56 });
        assert_eq!(report.strategy, PackingStrategy::RowColumn);
        assert_eq!(report.atlas_dimensions, [80, 70, 10]);
        assert_eq!(report.atlas_bytes, 56_000);
        assert_eq!(report.material_bytes, 56_000);
        assert_eq!(report.fill.atlas_bytes_used, 56_000);
        assert!((report.atlas_occupancy() - 1.0).abs() < 1e-6);
    }
}
