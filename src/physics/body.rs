use super::{
    collision::{LayerMask, PlacedShape, Shape, AABB},
    Velocity, World,
};
use crate::{
    math::{self as m, Angle},
    transform::TransformKey,
};
use thunderdome as td;

/// Generational handle to a body in a [`World`].
///
/// Handles stay safe to hold after the body is removed;
/// using them afterwards gives `WorldError::BodyGone` instead of touching another body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyKey(pub(crate) td::Index);

impl BodyKey {
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Mass or moment of inertia of a body, which can be infinite.
///
/// This stores both a mass value and its inverse, because the inverse
/// is what the solver actually needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mass {
    Finite { mass: f64, inverse: f64 },
    Infinite,
}

impl From<f64> for Mass {
    /// Zero, negative and non-finite values are taken to mean infinite mass.
    #[inline]
    fn from(mass: f64) -> Self {
        if mass.is_finite() && mass > 0.0 {
            Mass::Finite {
                mass,
                inverse: 1.0 / mass,
            }
        } else {
            Mass::Infinite
        }
    }
}

impl Mass {
    /// Get the inverse of the mass, which is zero if the mass is infinite.
    #[inline]
    pub fn inv(&self) -> f64 {
        match self {
            Mass::Finite { inverse, .. } => *inverse,
            Mass::Infinite => 0.0,
        }
    }

    /// The mass itself, with infinity reported as zero.
    #[inline]
    pub fn value(&self) -> f64 {
        match self {
            Mass::Finite { mass, .. } => *mass,
            Mass::Infinite => 0.0,
        }
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Mass::Infinite)
    }
}

/// Surface properties used in impulse resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct Material {
    /// Bounciness. The restitutions of two colliding bodies are multiplied together.
    pub restitution: f64,
    /// Combined with the other body's friction as `sqrt(a² + b²)`.
    pub friction: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: 1.0,
            friction: 0.0,
        }
    }
}

/// A rigid body with a shape, living in a [`World`].
#[derive(Clone, Debug)]
pub struct Body {
    shape: Shape,
    mass: Mass,
    inertia: Mass,
    hull: AABB,
    transform: TransformKey,
    pub velocity: Velocity,
    pub material: Material,
    pub layer: LayerMask,
    /// Asleep bodies are not moved, and others skip them when resolving collisions.
    pub awake: bool,
    /// Non-colliding bodies are skipped entirely by the resolve phase.
    pub colliding: bool,
    /// Bodies that still report collisions but aren't pushed or bounced by them.
    pub reactive: bool,
}

impl Body {
    pub(crate) fn new(builder: &BodyBuilder, transform: TransformKey) -> Self {
        let mut body = Self {
            shape: builder.shape.clone(),
            mass: Mass::Infinite,
            inertia: Mass::Infinite,
            hull: AABB::zero(),
            transform,
            velocity: builder.velocity,
            material: builder.material,
            layer: builder.layer,
            awake: builder.awake,
            colliding: builder.colliding,
            reactive: builder.reactive,
        };
        body.set_mass(builder.mass);
        body
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Replace the shape, recomputing inertia. The hull is stale until the owning
    /// world updates it, which `World::set_shape` does.
    pub(crate) fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
        self.set_mass(self.mass.value());
    }

    #[inline]
    pub fn mass(&self) -> Mass {
        self.mass
    }

    #[inline]
    pub fn inertia(&self) -> Mass {
        self.inertia
    }

    #[inline]
    pub fn inv_mass(&self) -> f64 {
        self.mass.inv()
    }

    #[inline]
    pub fn inv_inertia(&self) -> f64 {
        self.inertia.inv()
    }

    /// Set the mass and recompute inertia from the shape. Zero means infinite.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = Mass::from(mass);
        self.inertia = match self.mass {
            Mass::Finite { mass, .. } => Mass::from(self.shape.moment_of_inertia(mass)),
            Mass::Infinite => Mass::Infinite,
        };
    }

    /// Bounding box of the shape at the time the body was last moved.
    #[inline]
    pub fn hull(&self) -> AABB {
        self.hull
    }

    #[inline]
    pub(crate) fn set_hull(&mut self, hull: AABB) {
        self.hull = hull;
    }

    #[inline]
    pub fn transform(&self) -> TransformKey {
        self.transform
    }

    #[inline]
    pub fn placed<'a>(&'a self, global: m::Mat3) -> PlacedShape<'a> {
        self.shape.placed(global)
    }

    /// Whether the body can be pushed around by collisions and its own velocity.
    #[inline]
    pub fn is_static(&self) -> bool {
        self.mass.is_infinite()
    }
}

/// Builder for inserting bodies into a [`World`].
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct BodyBuilder {
    pub shape: Shape,
    /// Zero for an immovable body.
    pub mass: f64,
    pub material: Material,
    pub layer: LayerMask,
    pub position: [f64; 2],
    pub rotation: Angle,
    pub scale: [f64; 2],
    pub velocity: Velocity,
    pub awake: bool,
    pub colliding: bool,
    pub reactive: bool,
}

impl Default for BodyBuilder {
    fn default() -> Self {
        Self::new(Shape::point(m::Vec2::zero()))
    }
}

impl BodyBuilder {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            mass: 1.0,
            material: Material::default(),
            layer: LayerMask::default(),
            position: [0.0, 0.0],
            rotation: Angle::default(),
            scale: [1.0, 1.0],
            velocity: Velocity::default(),
            awake: true,
            colliding: true,
            reactive: true,
        }
    }

    /// A body with infinite mass, for walls and floors.
    pub fn new_static(shape: Shape) -> Self {
        Self::new(shape).with_mass(0.0)
    }

    #[inline]
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }
    #[inline]
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }
    #[inline]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.material.restitution = restitution;
        self
    }
    #[inline]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.material.friction = friction;
        self
    }
    #[inline]
    pub fn with_layer(mut self, layer: LayerMask) -> Self {
        self.layer = layer;
        self
    }
    #[inline]
    pub fn with_position(mut self, pos: impl Into<[f64; 2]>) -> Self {
        self.position = pos.into();
        self
    }
    #[inline]
    pub fn with_rotation(mut self, angle: Angle) -> Self {
        self.rotation = angle;
        self
    }
    #[inline]
    pub fn with_scale(mut self, scale: impl Into<[f64; 2]>) -> Self {
        self.scale = scale.into();
        self
    }
    #[inline]
    pub fn with_velocity(mut self, vel: Velocity) -> Self {
        self.velocity = vel;
        self
    }
    #[inline]
    pub fn asleep(mut self) -> Self {
        self.awake = false;
        self
    }
    #[inline]
    pub fn non_colliding(mut self) -> Self {
        self.colliding = false;
        self
    }
    #[inline]
    pub fn non_reactive(mut self) -> Self {
        self.reactive = false;
        self
    }

    pub(crate) fn translation(&self) -> m::Vec2 {
        m::Vec2::new(self.position[0], self.position[1])
    }

    pub(crate) fn scale_vec(&self) -> m::Vec2 {
        m::Vec2::new(self.scale[0], self.scale[1])
    }
}

/// Gameplay logic attached to a body.
///
/// Both callbacks get full mutable access to the world and may insert or remove
/// bodies, including their own. The world re-checks every handle afterwards.
pub trait Behavior {
    /// Called once per step for every body, before the body is moved.
    /// This includes static and asleep bodies, which are then left where they are.
    fn update(&mut self, _me: BodyKey, _world: &mut World, _dt: f64) {}

    /// Called when the body intersects another one,
    /// whether or not the collision is physically resolved.
    fn on_collision(&mut self, _me: BodyKey, _other: BodyKey, _world: &mut World) {}
}
