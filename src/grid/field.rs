//! Distance field sampling interface.
//!
//! Anything that can answer "signed distance at a point" can be baked
//! into a grid. Closures work directly:
//!
//! ```
//! use sdfatlas::grid::DistanceField;
//! use glam::Vec3;
//!
//! let sphere = |p: Vec3| p.length() - 1.0;
//! assert_eq!(sphere.sample(Vec3::new(2.0, 0.0, 0.0)), 1.0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::types::Vec3;

/// Distance and material at one sample point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSample {
    pub distance: f32,
    pub material: u8,
}

/// Signed distance function over world space.
///
/// Negative inside, positive outside. Build passes call it from many
/// threads at once and in no particular order, so implementations must
/// be pure. The culling bound assumes the field is 1-Lipschitz (a true
/// or conservative distance).
pub trait DistanceField: Sync {
    /// Signed distance at `position`
    fn sample(&self, position: Vec3) -> f32;

    /// Distance plus material id at `position`.
    ///
    /// Only called when the build stores a material atlas.
    fn sample_material(&self, position: Vec3) -> FieldSample {
        FieldSample {
            distance: self.sample(position),
            material: 0,
        }
    }
}

impl<F> DistanceField for F
where
    F: Fn(Vec3) -> f32 + Sync,
{
    #[inline]
    fn sample(&self, position: Vec3) -> f32 {
        self(position)
    }
}

/// Borrows a field and counts how often it is evaluated
pub struct CountingField<'a, F: ?Sized> {
    inner: &'a F,
    invocations: AtomicU64,
}

impl<'a, F: DistanceField + ?Sized> CountingField<'a, F> {
    pub fn new(inner: &'a F) -> Self {
        Self {
            inner,
            invocations: AtomicU64::new(0),
        }
    }

    /// Evaluations so far
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}

impl<F: DistanceField + ?Sized> DistanceField for CountingField<'_, F> {
    #[inline]
    fn sample(&self, position: Vec3) -> f32 {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.inner.sample(position)
    }

    #[inline]
    fn sample_material(&self, position: Vec3) -> FieldSample {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.inner.sample_material(position)
    }
}
