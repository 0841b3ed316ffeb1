//! Collision detection: shapes, the SAT narrow phase and the uniform grid broad phase.

use crate::math as m;

pub mod shape;
pub use shape::{PlacedShape, Shape};

pub mod narrowphase;
pub use narrowphase::{AxisPenetration, Collision, NarrowPhaseError, Overlap};

pub mod grid;
pub use grid::{CellRange, Grid, GridParams};

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct AABB {
    pub min: m::Vec2,
    pub max: m::Vec2,
}

impl AABB {
    #[inline]
    pub fn zero() -> Self {
        Self {
            min: m::Vec2::zero(),
            max: m::Vec2::zero(),
        }
    }

    /// Box covering the given projections onto the X and Y axes.
    #[inline]
    pub fn from_ranges(x: Range, y: Range) -> Self {
        Self {
            min: m::Vec2::new(x.min, y.min),
            max: m::Vec2::new(x.max, y.max),
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.x.is_finite()
            && self.min.y.is_finite()
            && self.max.x.is_finite()
            && self.max.y.is_finite()
    }

    /// Closed-interval overlap test, touching boxes overlap.
    #[inline]
    pub fn overlaps(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    pub fn intersection(&self, other: &AABB) -> Option<AABB> {
        if !self.overlaps(other) {
            return None;
        }
        Some(AABB {
            min: m::Vec2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: m::Vec2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        })
    }
}

/// A closed interval, the projection of a shape onto an axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    #[inline]
    pub fn point(v: f64) -> Self {
        Self { min: v, max: v }
    }

    /// Grow the range to include `v`.
    #[inline]
    pub fn include(&mut self, v: f64) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    #[inline]
    pub fn overlaps(&self, other: &Range) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Bitmask of collision layers a body belongs to.
/// Two bodies can only collide if their masks share at least one bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    #[inline]
    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self(0b11111)
    }
}
