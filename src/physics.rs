use crate::{
    math as m,
    transform::{Transform, TransformError, TransformKey, TransformTree},
};

use std::collections::HashMap;
use thunderdome as td;

//

pub mod body;
pub use body::{Behavior, Body, BodyBuilder, BodyKey, Mass, Material};

pub mod collision;
use collision::{narrowphase, Collision, Grid, GridParams, LayerMask, NarrowPhaseError, Shape, AABB};

pub mod solver;

//

/// Velocity of an object.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct Velocity {
    /// Linear velocity in world units per second.
    pub linear: m::Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity {
            linear: m::Vec2::zero(),
            angular: 0.0,
        }
    }
}

impl Velocity {
    /// Get the linear velocity of a point offset from the center of mass.
    pub fn point_velocity(&self, offset: m::Vec2) -> m::Vec2 {
        let tangent = m::left_normal(offset) * self.angular;
        self.linear + tangent
    }
}

impl std::ops::Mul<f64> for Velocity {
    type Output = Velocity;

    fn mul(self, rhs: f64) -> Self::Output {
        Velocity {
            linear: self.linear * rhs,
            angular: self.angular * rhs,
        }
    }
}

/// Parameters for the creation of a [`World`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct WorldParams {
    pub grid: GridParams,
    /// How many bodies to initially allocate space for.
    /// More space will be allocated as needed.
    pub initial_capacity: usize,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum WorldError {
    #[error("body {0:?} no longer exists")]
    BodyGone(BodyKey),
    #[error("grid rejected a body with hull {hull:?}")]
    Rejected { hull: AABB },
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    NarrowPhase(#[from] NarrowPhaseError),
}

/// Counts of what happened during one [`World::step`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Bodies integrated in the move phase.
    pub moved: usize,
    /// Candidate pairs that passed the broad phase filters and were tested with SAT.
    pub pairs_tested: usize,
    /// Intersecting pairs, whose collision callbacks were invoked.
    pub collisions: usize,
    /// Collisions that were physically resolved.
    pub resolved: usize,
}

/// A collection of bodies with their transforms, a broad phase grid
/// and gameplay behaviors, advanced in time with [`step`][Self::step].
pub struct World {
    bodies: td::Arena<Body>,
    // insertion order, which is also the processing order in a step
    order: Vec<BodyKey>,
    transforms: TransformTree,
    // which body each transform belongs to
    owners: HashMap<TransformKey, BodyKey>,
    behaviors: HashMap<BodyKey, Box<dyn Behavior>>,
    // behaviors taken out for a callback, flagged if removal was requested meanwhile
    running_behaviors: HashMap<BodyKey, bool>,
    grid: Grid,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldParams::default())
    }
}

impl World {
    pub fn new(params: WorldParams) -> Self {
        Self {
            bodies: td::Arena::with_capacity(params.initial_capacity),
            order: Vec::with_capacity(params.initial_capacity),
            transforms: TransformTree::with_capacity(params.initial_capacity),
            owners: HashMap::with_capacity(params.initial_capacity),
            behaviors: HashMap::new(),
            running_behaviors: HashMap::new(),
            grid: Grid::new(params.grid),
        }
    }

    //
    // Bodies
    //

    /// Create a body and register it in the grid.
    ///
    /// Fails without inserting anything if the grid rejects the body's hull.
    pub fn insert_body(&mut self, builder: BodyBuilder) -> Result<BodyKey, WorldError> {
        let tr_key = self.transforms.insert(Transform::new(
            builder.translation(),
            builder.rotation.rad(),
            builder.scale_vec(),
        ));
        let key = BodyKey(self.bodies.insert(Body::new(&builder, tr_key)));

        let hull = self.update_hull(key)?;
        if !self.grid.register(key, &hull) {
            self.bodies.remove(key.0);
            self.transforms.remove(tr_key)?;
            return Err(WorldError::Rejected { hull });
        }
        self.order.push(key);
        self.owners.insert(tr_key, key);
        Ok(key)
    }

    /// Remove a body from the world, the grid and the transform hierarchy.
    ///
    /// Bodies attached to it stay where they are in the world.
    pub fn remove_body(&mut self, key: BodyKey) -> Result<Body, WorldError> {
        let body = self.bodies.remove(key.0).ok_or(WorldError::BodyGone(key))?;
        self.grid.deregister(key);
        self.order.retain(|&k| k != key);
        self.behaviors.remove(&key);
        self.owners.remove(&body.transform());
        self.transforms.remove(body.transform())?;
        Ok(body)
    }

    #[inline]
    pub fn contains(&self, key: BodyKey) -> bool {
        self.bodies.contains(key.0)
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn body(&self, key: BodyKey) -> Result<&Body, WorldError> {
        self.bodies.get(key.0).ok_or(WorldError::BodyGone(key))
    }

    /// Mutable access to a body's velocity, material, layer and flags.
    pub fn body_mut(&mut self, key: BodyKey) -> Result<&mut Body, WorldError> {
        self.bodies.get_mut(key.0).ok_or(WorldError::BodyGone(key))
    }

    /// Set the mass of a body, recomputing inertia. Zero makes it immovable.
    pub fn set_mass(&mut self, key: BodyKey, mass: f64) -> Result<(), WorldError> {
        self.body_mut(key)?.set_mass(mass);
        Ok(())
    }

    /// Replace the shape of a body.
    ///
    /// If the grid rejects the new hull the old shape is kept.
    pub fn set_shape(&mut self, key: BodyKey, shape: Shape) -> Result<(), WorldError> {
        let old_shape = self.body(key)?.shape().clone();
        self.body_mut(key)?.set_shape(shape);
        if let Err(err) = self.rebucket(key) {
            self.body_mut(key)?.set_shape(old_shape);
            self.rebucket(key)?;
            return Err(err);
        }
        Ok(())
    }

    /// All bodies in insertion order, with their current global transforms.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &Body, &m::Mat3)> + '_ {
        self.order.iter().filter_map(move |&key| {
            let body = self.bodies.get(key.0)?;
            let tr = self.transforms.get(body.transform()).ok()?;
            Some((key, body, tr.global()))
        })
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    //
    // Behaviors
    //

    /// Attach gameplay logic to a body, replacing any it had before.
    pub fn set_behavior(
        &mut self,
        key: BodyKey,
        behavior: impl Behavior + 'static,
    ) -> Result<(), WorldError> {
        self.body(key)?;
        self.behaviors.insert(key, Box::new(behavior));
        Ok(())
    }

    /// Detach a body's behavior.
    ///
    /// A behavior removing itself from one of its own callbacks gets `None` back,
    /// since it is still running. It is dropped once the callback returns.
    pub fn remove_behavior(&mut self, key: BodyKey) -> Option<Box<dyn Behavior>> {
        if let Some(removed) = self.running_behaviors.get_mut(&key) {
            *removed = true;
        }
        self.behaviors.remove(&key)
    }

    /// Run a callback of a body's behavior with access to the world.
    ///
    /// The behavior is taken out for the duration of the call and put back
    /// only if its body still exists and it wasn't removed or replaced in the meantime.
    fn with_behavior(&mut self, key: BodyKey, f: impl FnOnce(&mut dyn Behavior, &mut World)) {
        if let Some(mut behavior) = self.behaviors.remove(&key) {
            self.running_behaviors.insert(key, false);
            f(behavior.as_mut(), self);
            let removed = self.running_behaviors.remove(&key).unwrap_or(false);
            if !removed && self.contains(key) {
                self.behaviors.entry(key).or_insert(behavior);
            }
        }
    }

    //
    // Transforms
    //

    pub fn transform(&self, key: BodyKey) -> Result<&Transform, WorldError> {
        Ok(self.transforms.get(self.body(key)?.transform())?)
    }

    pub fn global_transform(&self, key: BodyKey) -> Result<m::Mat3, WorldError> {
        Ok(*self.transform(key)?.global())
    }

    /// Change a body's local translation, rotation and scale through a closure.
    /// Its hull and those of bodies attached to it are updated afterwards.
    pub fn set_pose(
        &mut self,
        key: BodyKey,
        f: impl FnOnce(&mut Transform),
    ) -> Result<(), WorldError> {
        let tr_key = self.body(key)?.transform();
        f(self.transforms.get_mut(tr_key)?);
        self.transforms.refresh(tr_key)?;
        self.rebucket_subtree(tr_key)
    }

    /// Move a body by a world-space offset.
    pub fn translate_body(&mut self, key: BodyKey, delta: m::Vec2) -> Result<(), WorldError> {
        self.displace(key, delta, 0.0)
    }

    /// Make `child` move along with `parent`, keeping its current world pose.
    pub fn attach_body(&mut self, child: BodyKey, parent: BodyKey) -> Result<(), WorldError> {
        let child_tr = self.body(child)?.transform();
        let parent_tr = self.body(parent)?.transform();
        self.transforms.attach(child_tr, parent_tr)?;
        self.rebucket_subtree(child_tr)
    }

    pub fn detach_body(&mut self, child: BodyKey) -> Result<(), WorldError> {
        let child_tr = self.body(child)?.transform();
        self.transforms.detach(child_tr)?;
        self.rebucket_subtree(child_tr)
    }

    /// Offset a body's pose by a world-space translation and a rotation.
    /// Translation is converted into the parent's frame for attached bodies.
    fn displace(&mut self, key: BodyKey, delta: m::Vec2, rotation: f64) -> Result<(), WorldError> {
        let tr_key = self.body(key)?.transform();
        let local_delta = match self.transforms.get(tr_key)?.parent() {
            Some(parent) => {
                let inv = m::try_inverse(self.transforms.get(parent)?.global())
                    .map_err(TransformError::from)?;
                m::transform_vector(&inv, delta)
            }
            None => delta,
        };
        let tr = self.transforms.get_mut(tr_key)?;
        tr.translation += local_delta;
        tr.rotation += rotation;
        self.transforms.refresh(tr_key)?;
        self.rebucket_subtree(tr_key)
    }

    //
    // Broad phase bookkeeping
    //

    /// Recompute a body's hull from its shape and current global transform.
    fn update_hull(&mut self, key: BodyKey) -> Result<AABB, WorldError> {
        let body = self.bodies.get(key.0).ok_or(WorldError::BodyGone(key))?;
        let global = *self.transforms.get(body.transform())?.global();
        let hull = body.placed(global).hull();
        self.body_mut(key)?.set_hull(hull);
        Ok(hull)
    }

    /// Update a body's hull and move it to the cells it now covers.
    fn rebucket(&mut self, key: BodyKey) -> Result<(), WorldError> {
        let hull = self.update_hull(key)?;
        if self.grid.register(key, &hull) {
            Ok(())
        } else {
            Err(WorldError::Rejected { hull })
        }
    }

    /// Rebucket the body owning `tr_key` and every body attached below it.
    fn rebucket_subtree(&mut self, tr_key: TransformKey) -> Result<(), WorldError> {
        let mut tr_keys = self.transforms.descendants(tr_key)?;
        tr_keys.push(tr_key);
        for tk in tr_keys {
            let body_key = match self.owners.get(&tk) {
                Some(&k) => k,
                None => continue,
            };
            if let Err(err) = self.rebucket(body_key) {
                // a body that outgrew the grid limits can no longer be found by others
                log::warn!("Removing {body_key:?} from the grid: {err}");
                self.grid.deregister(body_key);
            }
        }
        Ok(())
    }

    //
    // Queries
    //

    /// Find colliding bodies whose shape intersects the given shape placed at `pose`
    /// and whose layer shares a bit with `layer`. Useful for line of sight checks.
    pub fn test_shape(&self, shape: &Shape, pose: &m::Mat3, layer: LayerMask) -> Vec<BodyKey> {
        let probe = shape.placed(*pose);
        let hull = probe.hull();
        self.grid
            .query_neighbors(&hull, None)
            .into_iter()
            .filter(|&key| {
                let body = match self.bodies.get(key.0) {
                    Some(b) => b,
                    None => return false,
                };
                if !body.colliding || !body.layer.intersects(layer) {
                    return false;
                }
                match self.transforms.get(body.transform()) {
                    Ok(tr) => narrowphase::intersects(&probe, &body.placed(*tr.global())),
                    Err(_) => false,
                }
            })
            .collect()
    }

    /// Find colliding bodies containing a world-space point.
    pub fn query_point(&self, point: m::Vec2, layer: LayerMask) -> Vec<BodyKey> {
        self.test_shape(&Shape::point(point), &m::Mat3::identity(), layer)
    }

    //
    // Simulation
    //

    /// Advance the world by `dt` seconds.
    ///
    /// First every body's behavior is updated and awake dynamic bodies are moved
    /// by their velocity. Then every awake, colliding dynamic body is tested against
    /// its grid neighbors and intersections are resolved with positional correction
    /// and impulses. Behaviors may add and remove bodies at any point.
    pub fn step(&mut self, dt: f64) -> StepReport {
        let mut report = StepReport::default();

        {
            let _span = tracy_span!("move bodies", "step");
            let keys = self.order.clone();
            for key in keys {
                self.with_behavior(key, |behavior, world| behavior.update(key, world, dt));

                let vel = match self.bodies.get(key.0) {
                    Some(body) if body.awake && !body.is_static() => body.velocity,
                    _ => continue,
                };
                let delta = vel * dt;
                match self.displace(key, delta.linear, delta.angular) {
                    Ok(()) => report.moved += 1,
                    Err(err) => log::warn!("Failed to move {key:?}: {err}"),
                }
            }
        }

        {
            let _span = tracy_span!("resolve collisions", "step");
            let keys = self.order.clone();
            for key in keys {
                let hull = match self.bodies.get(key.0) {
                    Some(body) if body.awake && body.colliding && !body.is_static() => body.hull(),
                    _ => continue,
                };
                for other in self.grid.query_neighbors(&hull, Some(key)) {
                    if !self.contains(key) {
                        break;
                    }
                    if let Err(err) = self.resolve_pair(key, other, &mut report) {
                        log::warn!("Skipped resolving {key:?} against {other:?}: {err}");
                    }
                }
            }
        }

        log::trace!(
            "Step of {dt}s: moved {}, tested {} pairs, {} collisions, {} resolved",
            report.moved,
            report.pairs_tested,
            report.collisions,
            report.resolved
        );
        report
    }

    fn globals(&self, pair: [BodyKey; 2]) -> Result<[m::Mat3; 2], WorldError> {
        Ok([self.global_transform(pair[0])?, self.global_transform(pair[1])?])
    }

    /// Test one candidate pair and resolve it if it intersects.
    fn resolve_pair(
        &mut self,
        a: BodyKey,
        b: BodyKey,
        report: &mut StepReport,
    ) -> Result<(), WorldError> {
        let (body_a, body_b) = match (self.bodies.get(a.0), self.bodies.get(b.0)) {
            (Some(ba), Some(bb)) => (ba, bb),
            _ => return Ok(()),
        };
        if !body_a.layer.intersects(body_b.layer)
            || !body_b.awake
            || !body_b.colliding
            || body_a.inv_mass() + body_b.inv_mass() == 0.0
        {
            return Ok(());
        }

        report.pairs_tested += 1;
        let [ga, gb] = self.globals([a, b])?;
        let mut collision =
            match narrowphase::test_bodies([a, b], &body_a.placed(ga), &body_b.placed(gb)) {
                Some(c) => c,
                None => return Ok(()),
            };

        report.collisions += 1;
        self.with_behavior(a, |behavior, world| behavior.on_collision(a, b, world));
        self.with_behavior(b, |behavior, world| behavior.on_collision(b, a, world));

        // callbacks may have removed either body or changed its flags
        let inv_masses = match (self.bodies.get(a.0), self.bodies.get(b.0)) {
            (Some(ba), Some(bb)) if ba.reactive && bb.reactive => [ba.inv_mass(), bb.inv_mass()],
            _ => return Ok(()),
        };

        let [da, db] = solver::positional_correction(collision.mtv, inv_masses);
        if inv_masses[0] > 0.0 {
            self.translate_body(a, da)?;
        }
        if inv_masses[1] > 0.0 {
            self.translate_body(b, db)?;
        }

        let [ga, gb] = self.globals([a, b])?;
        let contacts = {
            let (body_a, body_b) = (self.body(a)?, self.body(b)?);
            narrowphase::compute_contacts(&mut collision, &body_a.placed(ga), &body_b.placed(gb))
        };
        if let Err(err) = contacts {
            // touching pairs have no depth and nothing to resolve
            log::debug!("No contacts between {a:?} and {b:?}: {err}");
            return Ok(());
        }

        match self.bodies.get2_mut(a.0, b.0) {
            (Some(body_a), Some(body_b)) => {
                solver::apply_impulse(&collision, body_a, body_b)?;
                report.resolved += 1;
            }
            _ => return Err(WorldError::BodyGone(b)),
        }
        Ok(())
    }

    /// Test a pair of bodies without resolving anything.
    pub fn test_bodies(&self, a: BodyKey, b: BodyKey) -> Result<Option<Collision>, WorldError> {
        let [ga, gb] = self.globals([a, b])?;
        Ok(narrowphase::test_bodies(
            [a, b],
            &self.body(a)?.placed(ga),
            &self.body(b)?.placed(gb),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, Vec2};
    use std::{cell::RefCell, rc::Rc};

    fn falling_box(world: &mut World, pos: [f64; 2], vel: Vec2) -> BodyKey {
        world
            .insert_body(
                BodyBuilder::new(Shape::rect(20.0, 20.0))
                    .with_position(pos)
                    .with_restitution(0.0)
                    .with_velocity(Velocity {
                        linear: vel,
                        angular: 0.0,
                    }),
            )
            .unwrap()
    }

    #[test]
    fn box_comes_to_rest_on_floor() {
        let mut world = World::default();
        let floor = world
            .insert_body(
                BodyBuilder::new_static(Shape::rect(400.0, 20.0))
                    .with_position([300.0, 100.0])
                    .with_restitution(0.0),
            )
            .unwrap();
        let bx = falling_box(&mut world, [300.0, 140.0], Vec2::new(0.0, -600.0));

        for _ in 0..60 {
            world.step(1.0 / 60.0);
            // gravity
            world.body_mut(bx).unwrap().velocity.linear.y -= 10.0;
        }

        let pos = world.transform(bx).unwrap().position();
        assert!(pos.y >= 119.0 && pos.y <= 121.0, "box ended up at {pos:?}");
        assert!(approx_eq(pos.x, 300.0));
        assert_eq!(world.transform(floor).unwrap().position(), Vec2::new(300.0, 100.0));
    }

    #[test]
    fn stale_handles_are_reported() {
        let mut world = World::default();
        let key = falling_box(&mut world, [50.0, 50.0], Vec2::zero());
        let removed = world.remove_body(key).unwrap();
        assert_eq!(removed.shape(), &Shape::rect(20.0, 20.0));

        assert!(!world.contains(key));
        assert!(!world.grid().is_registered(key));
        assert_eq!(world.remove_body(key).err(), Some(WorldError::BodyGone(key)));
        assert_eq!(world.set_mass(key, 2.0), Err(WorldError::BodyGone(key)));
        assert!(matches!(world.body(key), Err(WorldError::BodyGone(_))));

        let reused = falling_box(&mut world, [50.0, 50.0], Vec2::zero());
        assert_ne!(key, reused);
        assert!(world.body(key).is_err());
    }

    #[test]
    fn contained_body_is_pushed_out_the_near_side() {
        let mut world = World::default();
        world
            .insert_body(BodyBuilder::new_static(Shape::rect(100.0, 100.0)).with_position([300.0, 300.0]))
            .unwrap();
        let inner = falling_box(&mut world, [335.0, 300.0], Vec2::zero());

        let report = world.step(0.0);
        assert_eq!(report.collisions, 1);
        // the 20 wide box ends up against the wall's right face at 350
        let pos = world.transform(inner).unwrap().position();
        assert!(approx_eq(pos.x, 360.0) && approx_eq(pos.y, 300.0), "{pos:?}");
    }

    #[test]
    fn rejected_bodies_are_not_inserted() {
        let mut world = World::default();
        let huge = world.insert_body(BodyBuilder::new(Shape::rect(10_000.0, 10.0)));
        assert!(matches!(huge, Err(WorldError::Rejected { .. })));
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.bodies().count(), 0);
    }

    struct Suicidal {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Behavior for Suicidal {
        fn update(&mut self, me: BodyKey, world: &mut World, _dt: f64) {
            self.log.borrow_mut().push("update");
            world.remove_body(me).unwrap();
        }
    }

    struct Spawner {
        spawned: Rc<RefCell<Option<BodyKey>>>,
    }

    impl Behavior for Spawner {
        fn update(&mut self, _me: BodyKey, world: &mut World, _dt: f64) {
            if self.spawned.borrow().is_none() {
                let key = world
                    .insert_body(BodyBuilder::new(Shape::circle(5.0)).with_position([500.0, 500.0]))
                    .unwrap();
                *self.spawned.borrow_mut() = Some(key);
            }
        }
    }

    #[test]
    fn behaviors_can_remove_and_insert_mid_step() {
        let mut world = World::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let spawned = Rc::new(RefCell::new(None));

        let doomed = falling_box(&mut world, [100.0, 100.0], Vec2::new(10.0, 0.0));
        let spawner = falling_box(&mut world, [300.0, 300.0], Vec2::zero());
        world.set_behavior(doomed, Suicidal { log: log.clone() }).unwrap();
        world
            .set_behavior(spawner, Spawner { spawned: spawned.clone() })
            .unwrap();

        let report = world.step(0.1);
        assert_eq!(*log.borrow(), vec!["update"]);
        assert!(!world.contains(doomed));
        // only the spawner moved, the new body joins next step
        assert_eq!(report.moved, 1);
        let new_body = spawned.borrow().unwrap();
        assert!(world.contains(new_body));

        let report = world.step(0.1);
        assert_eq!(report.moved, 2);
        assert_eq!(*log.borrow(), vec!["update"]);
    }

    struct OneShot(Rc<RefCell<usize>>);

    impl Behavior for OneShot {
        fn update(&mut self, me: BodyKey, world: &mut World, _dt: f64) {
            *self.0.borrow_mut() += 1;
            assert!(world.remove_behavior(me).is_none());
        }
    }

    struct Handoff(Rc<RefCell<usize>>);

    impl Behavior for Handoff {
        fn update(&mut self, me: BodyKey, world: &mut World, _dt: f64) {
            world.remove_behavior(me);
            world.set_behavior(me, OneShot(self.0.clone())).unwrap();
        }
    }

    #[test]
    fn behaviors_can_remove_themselves() {
        let mut world = World::default();
        let runs = Rc::new(RefCell::new(0));
        let key = falling_box(&mut world, [100.0, 100.0], Vec2::zero());
        world.set_behavior(key, OneShot(runs.clone())).unwrap();

        for _ in 0..3 {
            world.step(0.1);
        }
        assert_eq!(*runs.borrow(), 1);
        assert!(world.remove_behavior(key).is_none());
        assert!(world.contains(key));

        // removing and then replacing itself leaves the replacement attached
        world.set_behavior(key, Handoff(runs.clone())).unwrap();
        world.step(0.1);
        assert_eq!(*runs.borrow(), 1);
        for _ in 0..3 {
            world.step(0.1);
        }
        assert_eq!(*runs.borrow(), 2);
        assert!(world.remove_behavior(key).is_none());
    }

    #[test]
    fn static_and_asleep_bodies_are_updated() {
        let mut world = World::default();
        let runs = Rc::new(RefCell::new(0));
        let wall = world
            .insert_body(BodyBuilder::new_static(Shape::rect(20.0, 20.0)).with_position([100.0, 100.0]))
            .unwrap();
        let sleeper = world
            .insert_body(
                BodyBuilder::new(Shape::rect(20.0, 20.0))
                    .with_position([300.0, 100.0])
                    .asleep(),
            )
            .unwrap();
        world.set_behavior(wall, OneShot(runs.clone())).unwrap();
        world.set_behavior(sleeper, OneShot(runs.clone())).unwrap();

        let report = world.step(0.1);
        assert_eq!(*runs.borrow(), 2);
        assert_eq!(report.moved, 0);
    }

    struct CountHits(Rc<RefCell<usize>>);

    impl Behavior for CountHits {
        fn on_collision(&mut self, _me: BodyKey, _other: BodyKey, _world: &mut World) {
            *self.0.borrow_mut() += 1;
        }
    }

    #[test]
    fn non_reactive_bodies_report_but_pass_through() {
        let mut world = World::default();
        let hits = Rc::new(RefCell::new(0));
        let sensor = world
            .insert_body(
                BodyBuilder::new(Shape::rect(40.0, 40.0))
                    .with_position([200.0, 200.0])
                    .non_reactive(),
            )
            .unwrap();
        world.set_behavior(sensor, CountHits(hits.clone())).unwrap();
        let bx = falling_box(&mut world, [210.0, 200.0], Vec2::zero());

        let report = world.step(0.0);
        assert_eq!(report.collisions, 2);
        assert_eq!(report.resolved, 0);
        assert_eq!(*hits.borrow(), 2);
        assert_eq!(world.transform(bx).unwrap().position(), Vec2::new(210.0, 200.0));
    }

    #[test]
    fn layers_filter_queries() {
        let mut world = World::default();
        let wall = world
            .insert_body(
                BodyBuilder::new_static(Shape::rect(10.0, 100.0))
                    .with_position([200.0, 200.0])
                    .with_layer(LayerMask(0b01)),
            )
            .unwrap();
        let glass = world
            .insert_body(
                BodyBuilder::new_static(Shape::rect(10.0, 100.0))
                    .with_position([150.0, 200.0])
                    .with_layer(LayerMask(0b10)),
            )
            .unwrap();

        let sight = Shape::segment(Vec2::new(100.0, 200.0), Vec2::new(300.0, 200.0));
        let identity = m::Mat3::identity();
        itertools::assert_equal(world.test_shape(&sight, &identity, LayerMask(0b01)), [wall]);
        let mut both = world.test_shape(&sight, &identity, LayerMask::ALL);
        both.sort_by_key(|k| k.index().slot());
        let mut expected = vec![wall, glass];
        expected.sort_by_key(|k| k.index().slot());
        assert_eq!(both, expected);

        assert_eq!(world.query_point(Vec2::new(152.0, 240.0), LayerMask::ALL), vec![glass]);
        assert!(world.query_point(Vec2::new(175.0, 200.0), LayerMask::ALL).is_empty());
    }

    #[test]
    fn moving_a_parent_rebuckets_children() {
        let mut world = World::default();
        let parent = falling_box(&mut world, [50.0, 50.0], Vec2::zero());
        let child = world
            .insert_body(BodyBuilder::new(Shape::circle(5.0)).with_position([60.0, 50.0]))
            .unwrap();
        world.attach_body(child, parent).unwrap();

        world.translate_body(parent, Vec2::new(400.0, 0.0)).unwrap();
        let child_pos = world.transform(child).unwrap().position();
        assert!(approx_eq(child_pos.x, 460.0) && approx_eq(child_pos.y, 50.0));
        assert_eq!(world.query_point(Vec2::new(463.0, 50.0), LayerMask::ALL), vec![child]);
        assert!(world.grid().bucket(0, 0).is_empty());

        world.detach_body(child).unwrap();
        world.translate_body(parent, Vec2::new(-400.0, 0.0)).unwrap();
        let child_pos = world.transform(child).unwrap().position();
        assert!(approx_eq(child_pos.x, 460.0));
    }

    #[test]
    fn set_shape_keeps_old_shape_on_rejection() {
        let mut world = World::default();
        let key = falling_box(&mut world, [50.0, 50.0], Vec2::zero());
        assert!(matches!(
            world.set_shape(key, Shape::circle(1000.0)),
            Err(WorldError::Rejected { .. })
        ));
        assert_eq!(world.body(key).unwrap().shape(), &Shape::rect(20.0, 20.0));
        assert!(world.grid().is_registered(key));

        world.set_shape(key, Shape::circle(30.0)).unwrap();
        assert!(approx_eq(world.body(key).unwrap().hull().width(), 60.0));
    }
}
