//! Build configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use super::descriptor::{GridDescriptor, DEFAULT_TRUNCATION_CELLS};
use super::layout::AtlasLayout;
use super::quantize::SampleFormat;

/// Most grids `build_lod_chain` will build for one config
pub const MAX_LOD_LEVELS: u32 = 16;

/// How the atlas is provisioned
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackingMode {
    /// Allocate after Pass 1, sized to the active brick count
    #[default]
    RowColumn,
    /// Allocate before Pass 1 as an `n^3` brick cube.
    /// `None` uses the planner's worst case, which can never overflow.
    Cube { bricks_per_side: Option<u32> },
}

/// Full description of one grid build
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// World-space center of the grid
    pub center: [f32; 3],
    /// Cells per axis (multiple of the brick edge)
    pub cell_count: u32,
    /// Cell edge length in world units
    pub cell_size: f32,
    /// Narrow band half-width, in cells
    pub truncation_cells: f32,
    pub packing: PackingMode,
    pub format: SampleFormat,
    /// Store a per-voxel material atlas
    pub materials: bool,
    /// Demote pending bricks without a narrow-band voxel before packing
    pub refine_active_bricks: bool,
    /// Grids built by `build_lod_chain`; level `i` uses `cell_size * 2^i`
    pub lod_levels: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            cell_count: 128,
            cell_size: 1.0 / 16.0,
            truncation_cells: DEFAULT_TRUNCATION_CELLS,
            packing: PackingMode::RowColumn,
            format: SampleFormat::Unorm8,
            materials: false,
            refine_active_bricks: false,
            lod_levels: 1,
        }
    }
}

impl BuildConfig {
    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field that a build would reject
    pub fn validate(&self) -> Result<()> {
        self.descriptor()?;
        if let PackingMode::Cube { bricks_per_side: Some(bricks_per_side) } = self.packing {
            AtlasLayout::cube(bricks_per_side)?;
        }
        if self.lod_levels == 0 || self.lod_levels > MAX_LOD_LEVELS {
            return Err(Error::InvalidLodLevels { levels: self.lod_levels, max: MAX_LOD_LEVELS });
        }
        // The coarsest level must still have a usable cell size.
        self.for_lod(self.lod_levels - 1).descriptor()?;
        Ok(())
    }

    /// Grid descriptor for this config
    pub fn descriptor(&self) -> Result<GridDescriptor> {
        GridDescriptor::with_truncation_cells(
            Vec3::from_array(self.center),
            self.cell_size,
            self.cell_count,
            self.truncation_cells,
        )
    }

    /// Same config with the cell size scaled for LOD `level`
    pub fn for_lod(&self, level: u32) -> Self {
        Self {
            cell_size: self.cell_size * 2f32.powi(level as i32),
            lod_levels: 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = BuildConfig::default();
        config.validate().unwrap();
        let desc = config.descriptor().unwrap();
        assert_eq!(desc.brick_resolution(), 16);
        assert!((desc.truncation_distance() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = BuildConfig::from_json_str(r#"{ "cell_count": 32, "cell_size": 0.125 }"#).unwrap();
        assert_eq!(config.cell_count, 32);
        assert_eq!(config.packing, PackingMode::RowColumn);
        assert_eq!(config.lod_levels, 1);
    }

    #[test]
    fn test_json_packing_variants() {
        let json = r#"{ "packing": { "Cube": { "bricks_per_side": 4 } }, "format": "Snorm8" }"#;
        let config = BuildConfig::from_json_str(json).unwrap();
        assert_eq!(config.packing, PackingMode::Cube { bricks_per_side: Some(4) });
        assert_eq!(config.format, SampleFormat::Snorm8);
    }

    #[test]
    fn test_invalid_json_config() {
        assert!(matches!(BuildConfig::from_json_str("{ nope"), Err(Error::Config(_))));
        assert!(matches!(
            BuildConfig::from_json_str(r#"{ "cell_count": 30 }"#),
            Err(Error::IndivisibleResolution { .. })
        ));
        assert!(BuildConfig::from_json_str(r#"{ "lod_levels": 0 }"#).is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_cube() {
        let config = BuildConfig {
            packing: PackingMode::Cube { bricks_per_side: Some(1700) },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidLayout(_))));
        let config = BuildConfig {
            packing: PackingMode::Cube { bricks_per_side: Some(0) },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_lod_levels() {
        for levels in [0, MAX_LOD_LEVELS + 1, 32, 40, u32::MAX] {
            let config = BuildConfig { lod_levels: levels, ..Default::default() };
            assert!(matches!(config.validate(), Err(Error::InvalidLodLevels { .. })));
        }
        let config = BuildConfig { lod_levels: MAX_LOD_LEVELS, ..Default::default() };
        config.validate().unwrap();

        // Level 0 is fine; the coarsest cell size overflows to infinity.
        let config = BuildConfig { cell_size: 1e37, lod_levels: 8, ..Default::default() };
        config.for_lod(0).validate().unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidCellSize(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let config = BuildConfig {
            center: [1.0, 2.0, 3.0],
            cell_count: 64,
            materials: true,
            packing: PackingMode::Cube { bricks_per_side: None },
            ..Default::default()
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes()).unwrap();
        let loaded = BuildConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = BuildConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_for_lod() {
        let config = BuildConfig { lod_levels: 3, ..Default::default() };
        assert_eq!(config.for_lod(0).cell_size, config.cell_size);
        assert_eq!(config.for_lod(2).cell_size, config.cell_size * 4.0);
        assert_eq!(config.for_lod(2).cell_count, config.cell_count);
        assert_eq!(config.for_lod(40).cell_size, config.cell_size * 2f32.powi(40));
    }
}
