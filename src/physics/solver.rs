//! Resolution of intersections found by the narrow phase:
//! positional correction followed by a single velocity impulse with friction.

use super::{
    body::Body,
    collision::{Collision, NarrowPhaseError},
};
use crate::math::{self as m, Unit};

/// Displacements that push a pair of bodies apart by `mtv`,
/// split in proportion to their inverse masses.
///
/// The first body moves against the MTV and the second along it.
pub fn positional_correction(mtv: m::Vec2, inv_masses: [f64; 2]) -> [m::Vec2; 2] {
    let inv_sum = inv_masses[0] + inv_masses[1];
    if inv_sum <= 0.0 {
        return [m::Vec2::zero(); 2];
    }
    [
        -mtv * (inv_masses[0] / inv_sum),
        mtv * (inv_masses[1] / inv_sum),
    ]
}

/// Apply collision and friction impulses to the bodies of a collision.
///
/// Contacts must have been computed for the collision.
/// Restitutions combine as a product and frictions as `sqrt(a² + b²)`.
///
/// Unlike the plain impulse formula, nothing is applied to bodies already
/// separating along the normal (`rv · n > 0`), friction included, so a pair
/// that is still overlapping while moving apart isn't pulled back together.
/// Returns the magnitude of the normal impulse, which is zero in that case
/// or if both bodies have infinite mass.
pub fn apply_impulse(
    collision: &Collision,
    a: &mut Body,
    b: &mut Body,
) -> Result<f64, NarrowPhaseError> {
    let (inv_mass_a, inv_mass_b) = (a.inv_mass(), b.inv_mass());
    if inv_mass_a == 0.0 && inv_mass_b == 0.0 {
        return Ok(0.0);
    }
    let n = collision.normal.ok_or(NarrowPhaseError::ContactsNotComputed)?;
    let [offset_a, offset_b] = collision
        .offsets
        .ok_or(NarrowPhaseError::ContactsNotComputed)?;
    let (inv_inertia_a, inv_inertia_b) = (a.inv_inertia(), b.inv_inertia());

    let rap = m::left_normal(offset_a);
    let rbp = m::left_normal(offset_b);
    let relative_vel =
        |a: &Body, b: &Body| b.velocity.point_velocity(offset_b) - a.velocity.point_velocity(offset_a);

    let rv = relative_vel(a, b);
    let vel_along_normal = rv.dot(*n);
    if vel_along_normal > 0.0 {
        return Ok(0.0);
    }

    let e = a.material.restitution * b.material.restitution;
    let rap_n = rap.dot(*n);
    let rbp_n = rbp.dot(*n);
    let inv_sum = inv_mass_a
        + inv_mass_b
        + rap_n * rap_n * inv_inertia_a
        + rbp_n * rbp_n * inv_inertia_b;
    debug_assert!(inv_sum > 0.0 && inv_sum.is_finite());

    let apply = |a: &mut Body, b: &mut Body, impulse: m::Vec2| {
        a.velocity.linear -= impulse * inv_mass_a;
        b.velocity.linear += impulse * inv_mass_b;
        a.velocity.angular += rap.dot(-impulse) * inv_inertia_a;
        b.velocity.angular += rbp.dot(impulse) * inv_inertia_b;
    };

    let j = -(1.0 + e) * vel_along_normal / inv_sum;
    apply(a, b, *n * j);

    // friction
    let rv = relative_vel(a, b);
    if let Some(t) = Unit::try_new_normalize(rv - *n * rv.dot(*n)) {
        let mu = (a.material.friction.powi(2) + b.material.friction.powi(2)).sqrt();
        let jt = -rv.dot(*t) / inv_sum;
        apply(a, b, *t * jt * mu);
    }

    Ok(j)
}
