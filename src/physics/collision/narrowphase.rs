//! Separating axis test between pairs of placed shapes,
//! and derivation of contact points from its result.

use super::PlacedShape;
use crate::math::{self as m, Unit};
use crate::physics::body::BodyKey;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrowPhaseError {
    #[error("minimum translation vector is zero, no separation direction exists")]
    IndeterminateDirection,
    #[error("contact points have not been computed for this collision")]
    ContactsNotComputed,
}

/// Penetration of two shapes along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisPenetration {
    pub axis: Unit<m::Vec2>,
    /// Signed so that `axis * depth` points from the first shape toward the second.
    pub depth: f64,
}

impl AxisPenetration {
    /// The minimum translation vector along this axis.
    #[inline]
    pub fn mtv(&self) -> m::Vec2 {
        *self.axis * self.depth
    }
}

/// Result of a successful separating axis test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Overlap {
    /// The axis of least penetration among all tested axes.
    pub best: AxisPenetration,
    /// The axis of least penetration among the first shape's own axes.
    pub best_of_a: Option<AxisPenetration>,
    /// The axis of least penetration among the second shape's own axes.
    pub best_of_b: Option<AxisPenetration>,
}

/// An intersection between two bodies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collision {
    pub pair: [BodyKey; 2],
    /// Moving `pair[1]` by this vector (or `pair[0]` by its negation) separates the bodies.
    pub mtv: m::Vec2,
    /// Unit MTV, set by [`compute_contacts`].
    pub normal: Option<Unit<m::Vec2>>,
    /// Points of contact on each body as offsets from its center in world orientation,
    /// set by [`compute_contacts`].
    pub offsets: Option<[m::Vec2; 2]>,
}

impl Collision {
    pub fn new(pair: [BodyKey; 2], overlap: &Overlap) -> Self {
        Self {
            pair,
            mtv: overlap.best.mtv(),
            normal: None,
            offsets: None,
        }
    }
}

/// Signed penetration on one axis, or None if the projections are disjoint.
fn penetration(a: &PlacedShape, b: &PlacedShape, axis: Unit<m::Vec2>) -> Option<AxisPenetration> {
    let ra = a.project(axis);
    let rb = b.project(axis);
    if !ra.overlaps(&rb) {
        return None;
    }
    // pushing b toward -axis or toward +axis, whichever is shorter
    let p1 = rb.max - ra.min;
    let p2 = ra.max - rb.min;
    let depth = if p1.abs() < p2.abs() { -p1 } else { p2 };
    Some(AxisPenetration { axis, depth })
}

fn keep_smaller(best: &mut Option<AxisPenetration>, candidate: AxisPenetration) {
    match best {
        Some(b) if candidate.depth.abs() >= b.depth.abs() => (),
        _ => *best = Some(candidate),
    }
}

/// Test two shapes for intersection with the separating axis theorem.
///
/// Touching shapes intersect with zero depth. The returned MTV points from `a` toward `b`.
/// When neither shape contributes an axis (e.g. two points) the world axes are used.
pub fn test_pair(a: &PlacedShape, b: &PlacedShape) -> Option<Overlap> {
    // exact for points and segments, which don't supply enough axes on their own
    if !a.hull().overlaps(&b.hull()) {
        return None;
    }

    let axes_a = a.projection_axes(b);
    let axes_b = b.projection_axes(a);

    let mut best = None;
    let mut best_of_a = None;
    let mut best_of_b = None;
    for &axis in &axes_a {
        let pen = penetration(a, b, axis)?;
        keep_smaller(&mut best_of_a, pen);
        keep_smaller(&mut best, pen);
    }
    for &axis in &axes_b {
        let pen = penetration(a, b, axis)?;
        keep_smaller(&mut best_of_b, pen);
        keep_smaller(&mut best, pen);
    }
    if best.is_none() {
        for axis in [Unit::unit_x(), Unit::unit_y()] {
            keep_smaller(&mut best, penetration(a, b, axis)?);
        }
    }

    best.map(|best| Overlap {
        best,
        best_of_a,
        best_of_b,
    })
}

#[inline]
pub fn intersects(a: &PlacedShape, b: &PlacedShape) -> bool {
    test_pair(a, b).is_some()
}

/// Test two bodies' shapes and build a collision record if they intersect.
pub fn test_bodies(pair: [BodyKey; 2], a: &PlacedShape, b: &PlacedShape) -> Option<Collision> {
    test_pair(a, b).map(|overlap| Collision::new(pair, &overlap))
}

fn centroid(points: &[m::Vec2]) -> m::Vec2 {
    points.iter().fold(m::Vec2::zero(), |acc, p| acc + *p) / points.len() as f64
}

/// Derive the collision normal and one contact point per body.
///
/// `a` and `b` must be the shapes of `collision.pair[0]` and `collision.pair[1]`.
/// If either side touches at a single point, the other side's contact is placed at the
/// same world position. Otherwise each side uses the middle of its touching face.
pub fn compute_contacts(
    collision: &mut Collision,
    a: &PlacedShape,
    b: &PlacedShape,
) -> Result<[m::Vec2; 2], NarrowPhaseError> {
    let normal =
        Unit::try_new_normalize(collision.mtv).ok_or(NarrowPhaseError::IndeterminateDirection)?;
    let support_a = a.support(normal);
    let support_b = b.support(-normal);
    if support_a.is_empty() || support_b.is_empty() {
        return Err(NarrowPhaseError::IndeterminateDirection);
    }

    let offsets = match (support_a.as_slice(), support_b.as_slice()) {
        ([pa], _) => [*pa, (a.center() + *pa) - b.center()],
        (_, [pb]) => [(b.center() + *pb) - a.center(), *pb],
        (sa, sb) => [centroid(sa), centroid(sb)],
    };

    collision.normal = Some(normal);
    collision.offsets = Some(offsets);
    Ok(offsets)
}
