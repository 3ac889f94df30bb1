//! sdfatlas - sparse brick-mapped signed distance field atlas builder

pub mod core;
pub mod math;
pub mod grid;
