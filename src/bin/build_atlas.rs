//! Atlas builder binary: builds a sparse distance grid for a demo scene.
//!
//! Usage: cargo run --release --bin build_atlas -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>      JSON build config (flags below override it)
//!   --cells <N>          Cells per axis, multiple of 8 (default: 128)
//!   --cell-size <S>      Cell edge length (default: 0.0625)
//!   --packing <MODE>     "row" or "cube" (default: row)
//!   --lods <N>           LOD levels to build (default: 1)
//!   --materials          Store the material atlas
//!   --refine             Demote active bricks with no voxel in band
//!   --jobs <N>           Worker threads (default: all cores)
//!   --report <PATH>      Write the build reports as JSON

use std::process::ExitCode;
use std::time::Instant;

use glam::{Quat, Vec3};
use serde_json::json;

use sdfatlas::core::logging;
use sdfatlas::grid::{
    build_lod_chain, BuildConfig, DistanceField, FieldSample, PackingMode, SparseDistanceGrid,
};

/// Sphere resting on a rotated box above a ground plane
struct DemoScene {
    box_rotation: Quat,
}

const MATERIAL_GROUND: u8 = 1;
const MATERIAL_BOX: u8 = 2;
const MATERIAL_SPHERE: u8 = 3;

impl DemoScene {
    fn new() -> Self {
        Self {
            box_rotation: Quat::from_rotation_y(0.6).inverse(),
        }
    }

    fn parts(&self, p: Vec3) -> [f32; 3] {
        let ground = p.y + 1.5;

        let local = self.box_rotation * (p - Vec3::new(0.0, -0.9, 0.0));
        let q = local.abs() - Vec3::new(1.2, 0.6, 0.8);
        let cuboid = q.max(Vec3::ZERO).length() + q.max_element().min(0.0);

        let sphere = (p - Vec3::new(0.3, 0.5, 0.0)).length() - 0.8;
        [ground, cuboid, sphere]
    }
}

/// Polynomial smooth minimum
fn smin(a: f32, b: f32, k: f32) -> f32 {
    let h = (0.5 + 0.5 * (b - a) / k).clamp(0.0, 1.0);
    b + (a - b) * h - k * h * (1.0 - h)
}

impl DistanceField for DemoScene {
    fn sample(&self, p: Vec3) -> f32 {
        let [ground, cuboid, sphere] = self.parts(p);
        smin(ground, smin(cuboid, sphere, 0.2), 0.1)
    }

    fn sample_material(&self, p: Vec3) -> FieldSample {
        let [ground, cuboid, sphere] = self.parts(p);
        let material = if ground <= cuboid && ground <= sphere {
            MATERIAL_GROUND
        } else if cuboid <= sphere {
            MATERIAL_BOX
        } else {
            MATERIAL_SPHERE
        };
        FieldSample {
            distance: smin(ground, smin(cuboid, sphere, 0.2), 0.1),
            material,
        }
    }
}

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match parse_str_arg(args, "--config") {
        Some(path) => BuildConfig::from_json_file(path)?,
        None => BuildConfig::default(),
    };
    if let Some(cells) = parse_u32_arg(args, "--cells") {
        config.cell_count = cells;
    }
    if let Some(cell_size) = parse_f32_arg(args, "--cell-size") {
        config.cell_size = cell_size;
    }
    if let Some(lods) = parse_u32_arg(args, "--lods") {
        config.lod_levels = lods;
    }
    match parse_str_arg(args, "--packing").as_deref() {
        None => {}
        Some("row") => config.packing = PackingMode::RowColumn,
        Some("cube") => config.packing = PackingMode::Cube { bricks_per_side: None },
        Some(other) => return Err(format!("unknown packing mode '{other}', expected row or cube").into()),
    }
    config.materials |= args.iter().any(|a| a == "--materials");
    config.refine_active_bricks |= args.iter().any(|a| a == "--refine");
    config.validate()?;

    if let Some(jobs) = parse_usize_arg(args, "--jobs") {
        rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global()?;
    }

    println!("=== Sparse Distance Atlas Builder ===");
    println!("Cells:     {}^3 ({}^3 bricks)", config.cell_count, config.cell_count / 8);
    println!("Cell size: {}", config.cell_size);
    println!("Packing:   {:?}, {:?}", config.packing, config.format);
    println!("LODs:      {}", config.lod_levels);
    println!("Threads:   {}", rayon::current_num_threads());
    println!();

    let start = Instant::now();
    let grids = build_lod_chain(&config, &DemoScene::new())?;
    let elapsed = start.elapsed();

    for (level, grid) in grids.iter().enumerate() {
        print_summary(level, grid);
    }
    println!();
    println!("Total: {:.1}ms", elapsed.as_secs_f64() * 1000.0);

    if let Some(path) = parse_str_arg(args, "--report") {
        let reports: Vec<_> = grids
            .iter()
            .enumerate()
            .map(|(level, grid)| {
                json!({
                    "lod": level,
                    "cell_size": grid.cell_size(),
                    "report": grid.report(),
                })
            })
            .collect();
        let report = json!({ "config": config, "grids": reports });
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("Report: {}", path);
    }
    Ok(())
}

fn print_summary(level: usize, grid: &SparseDistanceGrid) {
    let report = grid.report();
    let dims = grid.atlas_dimensions();
    println!(
        "LOD {}: {} active / {} air / {} solid of {} bricks",
        level,
        report.active_bricks(),
        report.classify.air,
        report.classify.solid,
        report.plan.total_bricks,
    );
    if let Some(refine) = report.refine {
        println!("  refined: {} kept, {} demoted", refine.kept, refine.demoted);
    }
    println!(
        "  atlas {}x{}x{} ({:.1} KiB, {:.0}% used), brick map {:.1} KiB",
        dims.x,
        dims.y,
        dims.z,
        report.atlas_bytes as f64 / 1024.0,
        report.atlas_occupancy() * 100.0,
        report.plan.brick_map_bytes as f64 / 1024.0,
    );
    println!(
        "  {} samples, classify {:.1}ms, refine {:.1}ms, fill {:.1}ms",
        report.sdf_invocations, report.classify_ms, report.refine_ms, report.fill_ms,
    );
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
