//! 2D rigid-body collision detection and resolution.
//!
//! Bodies live in a [`World`], positioned by a hierarchy of affine transforms.
//! Each step moves bodies by their velocities, finds candidate pairs with a uniform
//! grid, tests them with the separating axis theorem and resolves intersections
//! with positional correction and impulses.

/// Open a profiler span that lasts until the end of the enclosing scope.
/// Does nothing unless the `tracy` feature is enabled and a profiler is connected.
macro_rules! tracy_span {
    ($name:literal, $fn_name:literal) => {
        tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), $fn_name, file!(), line!(), 0))
    };
}

pub mod math;
pub use math::{uv, Angle, MathError, Unit, Vec2};

pub mod transform;
pub use transform::{Transform, TransformError, TransformKey, TransformTree};

pub mod physics;
pub use physics::{
    body::{Behavior, Body, BodyBuilder, BodyKey, Mass, Material},
    collision::{
        self, narrowphase, Collision, Grid, GridParams, LayerMask, NarrowPhaseError, Shape, AABB,
    },
    solver, StepReport, Velocity, World, WorldError, WorldParams,
};
