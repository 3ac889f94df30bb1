//! Error types for atlas builds

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("grid cell count must be non-zero")]
    ZeroResolution,

    #[error("grid cell count {cell_count} is not a multiple of the brick edge {brick_edge}")]
    IndivisibleResolution { cell_count: u32, brick_edge: u32 },

    #[error("grid cell count {cell_count} needs more than {} bricks", u32::MAX)]
    ResolutionTooLarge { cell_count: u32 },

    #[error("cell size must be finite and positive, got {0}")]
    InvalidCellSize(f32),

    #[error("truncation distance must be finite and positive, got {0}")]
    InvalidTruncation(f32),

    #[error("invalid atlas layout: {0}")]
    InvalidLayout(String),

    #[error("LOD level count must be 1..={max}, got {levels}")]
    InvalidLodLevels { levels: u32, max: u32 },

    #[error("{buffer} buffer too small: need {required} elements, got {actual}")]
    BufferTooSmall {
        buffer: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("memory block is not aligned for the brick map")]
    MisalignedBuffer,

    #[error("atlas overflow: {required} active bricks, capacity {capacity}")]
    AtlasOverflow { required: u32, capacity: u32 },

    #[error("build is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: crate::grid::BuildState,
        actual: crate::grid::BuildState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
