use super::{Range, AABB};
use crate::math::{self as m, Unit};
use itertools::Itertools;

/// Points within this distance of the best support value are all returned by `support`.
pub const SUPPORT_TOLERANCE: f64 = 1e-5;

/// The geometry of a body, defined in the body's local space.
///
/// Every variant is convex. Polygon points should wind counterclockwise,
/// although the separating axis test doesn't care about winding.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub enum Shape {
    Point { position: m::Vec2 },
    Segment { start: m::Vec2, end: m::Vec2 },
    Box { min: m::Vec2, max: m::Vec2 },
    Circle { radius: f64 },
    Polygon { points: Vec<m::Vec2> },
}

impl Shape {
    pub fn point(position: m::Vec2) -> Self {
        Shape::Point { position }
    }

    pub fn segment(start: m::Vec2, end: m::Vec2) -> Self {
        Shape::Segment { start, end }
    }

    /// Create a box with the given side lengths centered on the origin.
    pub fn rect(width: f64, height: f64) -> Self {
        let half = m::Vec2::new(width / 2.0, height / 2.0);
        Shape::Box {
            min: -half,
            max: half,
        }
    }

    pub fn circle(radius: f64) -> Self {
        Shape::Circle { radius }
    }

    pub fn polygon(points: impl IntoIterator<Item = m::Vec2>) -> Self {
        Shape::Polygon {
            points: points.into_iter().collect(),
        }
    }

    /// The points defining the shape in local space.
    ///
    /// Box corners are listed counterclockwise starting from `min`.
    /// A circle is defined by its center alone.
    pub fn local_points(&self) -> Vec<m::Vec2> {
        match self {
            Shape::Point { position } => vec![*position],
            Shape::Segment { start, end } => vec![*start, *end],
            Shape::Box { min, max } => vec![
                *min,
                m::Vec2::new(max.x, min.y),
                *max,
                m::Vec2::new(min.x, max.y),
            ],
            Shape::Circle { .. } => vec![m::Vec2::zero()],
            Shape::Polygon { points } => points.clone(),
        }
    }

    pub fn world_points(&self, global: &m::Mat3) -> Vec<m::Vec2> {
        self.local_points()
            .into_iter()
            .map(|p| m::transform_point(global, p))
            .collect()
    }

    /// Approximate moment of inertia, treating the mass as if it all sat at the
    /// farthest defining point (or the rim for circles).
    pub fn moment_of_inertia(&self, mass: f64) -> f64 {
        match self {
            Shape::Circle { radius } => mass * radius * radius,
            _ => {
                let max_dist_sq = self
                    .local_points()
                    .iter()
                    .map(|p| p.mag_sq())
                    .fold(0.0, f64::max);
                mass * max_dist_sq
            }
        }
    }

    /// Pair the shape with a global transform to get its world-space behaviour.
    #[inline]
    pub fn placed(&self, global: m::Mat3) -> PlacedShape<'_> {
        PlacedShape {
            shape: self,
            global,
        }
    }
}

/// A shape positioned in the world by a global transform.
#[derive(Clone, Copy, Debug)]
pub struct PlacedShape<'a> {
    pub shape: &'a Shape,
    pub global: m::Mat3,
}

impl<'a> PlacedShape<'a> {
    #[inline]
    pub fn center(&self) -> m::Vec2 {
        m::translation_of(&self.global)
    }

    #[inline]
    pub fn world_points(&self) -> Vec<m::Vec2> {
        self.shape.world_points(&self.global)
    }

    /// Circle radius in world units. The largest axis scale is used
    /// so the circle never pokes out of its hull.
    fn world_radius(&self, radius: f64) -> f64 {
        radius * m::max_axis_scale(&self.global)
    }

    /// Candidate separating axes this shape contributes when tested against `other`.
    pub fn projection_axes(&self, other: &PlacedShape) -> Vec<Unit<m::Vec2>> {
        match self.shape {
            Shape::Point { .. } => Vec::new(),
            Shape::Segment { .. } => {
                let pts = self.world_points();
                Unit::try_new_normalize(m::left_normal(pts[1] - pts[0]))
                    .into_iter()
                    .collect()
            }
            Shape::Box { .. } | Shape::Polygon { .. } => {
                let pts = self.world_points();
                if pts.len() < 2 {
                    return Vec::new();
                }
                pts.iter()
                    .circular_tuple_windows()
                    .filter_map(|(&p, &q)| Unit::try_new_normalize(m::left_normal(q - p)))
                    .collect()
            }
            Shape::Circle { .. } => {
                let center = self.center();
                let closest = other
                    .world_points()
                    .into_iter()
                    .min_by(|a, b| {
                        (*a - center)
                            .mag_sq()
                            .total_cmp(&(*b - center).mag_sq())
                    });
                let axis = closest
                    .and_then(|p| Unit::try_new_normalize(p - center))
                    .unwrap_or_else(Unit::unit_x);
                vec![axis]
            }
        }
    }

    /// Project the shape onto an axis.
    pub fn project(&self, axis: Unit<m::Vec2>) -> Range {
        match self.shape {
            Shape::Circle { radius } => {
                let c = self.center().dot(*axis);
                let r = self.world_radius(*radius);
                Range {
                    min: c - r,
                    max: c + r,
                }
            }
            _ => self.world_points().iter().fold(
                Range {
                    min: f64::INFINITY,
                    max: f64::NEG_INFINITY,
                },
                |mut range, p| {
                    range.include(p.dot(*axis));
                    range
                },
            ),
        }
    }

    /// The defining points farthest along `direction`, as offsets from the shape's center
    /// in world orientation. Several points come back when an edge faces `direction`.
    pub fn support(&self, direction: Unit<m::Vec2>) -> Vec<m::Vec2> {
        if let Shape::Circle { radius } = self.shape {
            return vec![*direction * self.world_radius(*radius)];
        }

        let offsets: Vec<m::Vec2> = self
            .shape
            .local_points()
            .into_iter()
            .map(|p| m::transform_vector(&self.global, p))
            .collect();
        let best = offsets
            .iter()
            .map(|o| o.dot(*direction))
            .fold(f64::NEG_INFINITY, f64::max);
        offsets
            .into_iter()
            .filter(|o| best - o.dot(*direction) <= SUPPORT_TOLERANCE)
            .collect()
    }

    /// Bounding box containing every point the shape reaches.
    pub fn hull(&self) -> AABB {
        AABB::from_ranges(self.project(Unit::unit_x()), self.project(Unit::unit_y()))
    }
}
