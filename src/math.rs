//! Types, aliases and helper operations for doing math with `ultraviolet`.
//!
//! All transforms in gridphys are 2D affine matrices stored as homogeneous 3x3 matrices
//! in column-major order, so the translation lives in the third column.
use std::f64::consts::PI;
pub use ultraviolet as uv;

pub type Vec2 = uv::DVec2;
pub type Vec3 = uv::DVec3;
/// A 2D affine transformation in homogeneous coordinates.
pub type Mat3 = uv::DMat3;

/// Determinants smaller than this are considered zero when inverting.
pub const SINGULAR_EPSILON: f64 = 1e-12;
/// Vectors shorter than this can't be normalized.
pub const DIRECTION_EPSILON: f64 = 1e-12;

/// Errors from matrix operations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum MathError {
    #[error("matrix is singular (determinant {determinant}), a scale axis has collapsed to zero")]
    SingularMatrix { determinant: f64 },
}

/// An angle in either degrees or radians.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub enum Angle {
    Rad(f64),
    Deg(f64),
}
impl Angle {
    /// Get the angle as degrees.
    #[inline]
    pub fn deg(&self) -> f64 {
        match self {
            Angle::Rad(rad) => rad * 180.0 / PI,
            Angle::Deg(deg) => *deg,
        }
    }

    /// Get the angle as radians.
    #[inline]
    pub fn rad(&self) -> f64 {
        match self {
            Angle::Rad(rad) => *rad,
            Angle::Deg(deg) => deg * PI / 180.0,
        }
    }
}
impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}

/// A wrapper type to indicate a vector should always be normalized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit<T>(T);

impl Unit<Vec2> {
    /// Normalize a vector, returning `None` if it has no meaningful direction.
    pub fn try_new_normalize(v: Vec2) -> Option<Self> {
        let mag = v.mag();
        if mag.is_finite() && mag > DIRECTION_EPSILON {
            Some(Unit(v / mag))
        } else {
            None
        }
    }

    pub const fn new_unchecked(v: Vec2) -> Self {
        Unit(v)
    }

    pub fn unit_x() -> Self {
        Unit(Vec2::unit_x())
    }

    pub fn unit_y() -> Self {
        Unit(Vec2::unit_y())
    }

    #[inline]
    pub fn into_inner(self) -> Vec2 {
        self.0
    }
}

impl<T> std::ops::Deref for Unit<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::ops::Neg for Unit<T>
where
    T: std::ops::Neg,
{
    type Output = Unit<<T as std::ops::Neg>::Output>;

    fn neg(self) -> Self::Output {
        Unit(-self.0)
    }
}

// Vec2 utils

#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

// affine utils

/// Build the matrix `translation * rotation * scale`.
pub fn affine(translation: Vec2, rotation: f64, scale: Vec2) -> Mat3 {
    let (sin, cos) = rotation.sin_cos();
    Mat3::new(
        Vec3::new(cos * scale.x, sin * scale.x, 0.0),
        Vec3::new(-sin * scale.y, cos * scale.y, 0.0),
        Vec3::new(translation.x, translation.y, 1.0),
    )
}

/// Apply an affine matrix to a point, translation included.
#[inline]
pub fn transform_point(m: &Mat3, p: Vec2) -> Vec2 {
    (*m * Vec3::new(p.x, p.y, 1.0)).xy()
}

/// Apply only the linear part of an affine matrix to a vector.
#[inline]
pub fn transform_vector(m: &Mat3, v: Vec2) -> Vec2 {
    (*m * Vec3::new(v.x, v.y, 0.0)).xy()
}

#[inline]
pub fn translation_of(m: &Mat3) -> Vec2 {
    m.cols[2].xy()
}

/// The largest factor by which the matrix stretches any axis-aligned unit vector.
#[inline]
pub fn max_axis_scale(m: &Mat3) -> f64 {
    m.cols[0].xy().mag().max(m.cols[1].xy().mag())
}

/// Determinant of the linear part of an affine matrix.
#[inline]
pub fn affine_determinant(m: &Mat3) -> f64 {
    m.cols[0].x * m.cols[1].y - m.cols[1].x * m.cols[0].y
}

/// Invert an affine matrix, failing if the linear part is singular.
pub fn try_inverse(m: &Mat3) -> Result<Mat3, MathError> {
    let det = affine_determinant(m);
    if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
        return Err(MathError::SingularMatrix { determinant: det });
    }
    let inv_det = 1.0 / det;
    let (a, b) = (m.cols[0].x, m.cols[0].y);
    let (c, d) = (m.cols[1].x, m.cols[1].y);
    let t = translation_of(m);

    let col0 = Vec2::new(d, -b) * inv_det;
    let col1 = Vec2::new(-c, a) * inv_det;
    let inv_t = -(col0 * t.x + col1 * t.y);
    Ok(Mat3::new(
        Vec3::new(col0.x, col0.y, 0.0),
        Vec3::new(col1.x, col1.y, 0.0),
        Vec3::new(inv_t.x, inv_t.y, 1.0),
    ))
}

/// Translation, rotation and scale pulled back out of an affine matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decomposed {
    pub translation: Vec2,
    pub rotation: f64,
    /// Always non-negative.
    pub scale: Vec2,
    /// The matrix contained a reflection, which can't be expressed with
    /// non-negative scale and was dropped.
    pub reflected: bool,
}

/// Split an affine matrix into translation, rotation and non-negative scale.
///
/// Shear (which appears when a non-uniformly scaled parent has a rotated child)
/// can't be represented and is lost.
pub fn decompose(m: &Mat3) -> Decomposed {
    let x_axis = m.cols[0].xy();
    let y_axis = m.cols[1].xy();
    Decomposed {
        translation: translation_of(m),
        rotation: x_axis.y.atan2(x_axis.x),
        scale: Vec2::new(x_axis.mag(), y_axis.mag()),
        reflected: affine_determinant(m) < 0.0,
    }
}

#[cfg(test)]
pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[cfg(test)]
pub(crate) fn vec_approx_eq(a: Vec2, b: Vec2) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}
