//! Geometric helpers for brick bounds

pub mod aabb;

pub use aabb::Aabb;
