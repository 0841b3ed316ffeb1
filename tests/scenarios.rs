use gridphys::{
    Behavior, BodyBuilder, BodyKey, LayerMask, Shape, Vec2, Velocity, World, WorldParams,
};
use rand::{distributions::Uniform, prelude::*};
use std::{cell::RefCell, rc::Rc};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn random_bodies_are_found_where_they_are() {
    let mut world = World::default();
    let mut rng = StdRng::seed_from_u64(200);
    let pos = Uniform::new(100.0, 2780.0);
    let size = Uniform::new(2.0, 150.0);

    let keys: Vec<BodyKey> = (0..200)
        .map(|_| {
            world
                .insert_body(
                    BodyBuilder::new(Shape::rect(rng.sample(size), rng.sample(size)))
                        .with_position([rng.sample(pos), rng.sample(pos)]),
                )
                .unwrap()
        })
        .collect();
    assert_eq!(world.body_count(), 200);

    let grid = world.grid();
    for &key in &keys {
        let body = world.body(key).unwrap();
        let range = grid.cell_range(&body.hull());
        assert_eq!(grid.registered_range(key), Some(range));
        for ((i, j), bucket) in grid.populated_cells() {
            assert_eq!(bucket.contains(&key), range.contains(i, j));
        }

        let center = world.transform(key).unwrap().position();
        assert!(world.query_point(center, LayerMask::ALL).contains(&key));
    }

    itertools::assert_equal(world.bodies().map(|(k, _, _)| k), keys.iter().copied());
}

#[test]
fn head_on_collision_exchanges_velocities() {
    let mut world = World::default();
    let moving = |x: f64, vx: f64| {
        BodyBuilder::new(Shape::rect(20.0, 20.0))
            .with_position([x, 300.0])
            .with_velocity(Velocity {
                linear: Vec2::new(vx, 0.0),
                angular: 0.0,
            })
    };
    // one unit of overlap after the move phase
    let a = world.insert_body(moving(100.0, 60.0)).unwrap();
    let b = world.insert_body(moving(121.0, -60.0)).unwrap();

    let report = world.step(1.0 / 60.0);
    assert!(report.resolved >= 1);

    let va = world.body(a).unwrap().velocity;
    let vb = world.body(b).unwrap().velocity;
    assert!(approx(va.linear.x, -60.0) && approx(va.linear.y, 0.0), "{va:?}");
    assert!(approx(vb.linear.x, 60.0) && approx(vb.linear.y, 0.0), "{vb:?}");
    assert!(approx(va.angular, 0.0) && approx(vb.angular, 0.0));

    // pushed apart until touching
    let gap = world.transform(b).unwrap().position().x - world.transform(a).unwrap().position().x;
    assert!(approx(gap, 20.0), "gap {gap}");
}

struct Projectile {
    hits: Rc<RefCell<Vec<BodyKey>>>,
}

impl Behavior for Projectile {
    fn on_collision(&mut self, me: BodyKey, other: BodyKey, world: &mut World) {
        self.hits.borrow_mut().push(other);
        if world.contains(me) {
            world.remove_body(me).unwrap();
        }
    }
}

#[test]
fn projectile_removes_itself_on_impact() {
    let mut world = World::default();
    let wall = world
        .insert_body(BodyBuilder::new_static(Shape::rect(20.0, 200.0)).with_position([400.0, 300.0]))
        .unwrap();
    let bullet = world
        .insert_body(
            BodyBuilder::new(Shape::circle(3.0))
                .with_mass(0.1)
                .with_position([300.0, 300.0])
                .with_velocity(Velocity {
                    linear: Vec2::new(1200.0, 0.0),
                    angular: 0.0,
                }),
        )
        .unwrap();
    let hits = Rc::new(RefCell::new(Vec::new()));
    world
        .set_behavior(bullet, Projectile { hits: hits.clone() })
        .unwrap();

    for _ in 0..10 {
        world.step(1.0 / 60.0);
    }

    assert!(!world.contains(bullet));
    assert_eq!(*hits.borrow(), vec![wall]);
    assert!(world.contains(wall));
    assert!(!world.grid().is_registered(bullet));
    assert_eq!(world.transform(wall).unwrap().position(), Vec2::new(400.0, 300.0));
}

#[test]
fn asleep_and_static_bodies_stay_put() {
    let mut world = World::default();
    let vel = Velocity {
        linear: Vec2::new(100.0, 100.0),
        angular: 1.0,
    };
    let sleeper = world
        .insert_body(
            BodyBuilder::new(Shape::rect(10.0, 10.0))
                .with_position([100.0, 100.0])
                .with_velocity(vel)
                .asleep(),
        )
        .unwrap();
    let rock = world
        .insert_body(
            BodyBuilder::new_static(Shape::rect(10.0, 10.0))
                .with_position([500.0, 100.0])
                .with_velocity(vel),
        )
        .unwrap();

    let report = world.step(0.5);
    assert_eq!(report.moved, 0);
    for key in [sleeper, rock] {
        let tr = world.transform(key).unwrap();
        assert_eq!(tr.rotation, 0.0);
    }
    assert_eq!(world.transform(sleeper).unwrap().position(), Vec2::new(100.0, 100.0));

    world.body_mut(sleeper).unwrap().awake = true;
    let report = world.step(0.5);
    assert_eq!(report.moved, 1);
    let pos = world.transform(sleeper).unwrap().position();
    assert!(approx(pos.x, 150.0) && approx(pos.y, 150.0));
    assert!(approx(world.transform(sleeper).unwrap().rotation, 0.5));
}

#[cfg(feature = "serde-types")]
#[test]
fn params_and_bodies_load_from_ron() {
    let params: WorldParams = ron::from_str(
        "(grid: (node_size: 64.0, i_length: 10, j_length: 12, max_span_cells: 2), initial_capacity: 8)",
    )
    .unwrap();
    assert_eq!(params.grid.node_size, 64.0);
    assert_eq!(params.grid.j_length, 12);
    assert_eq!(params.initial_capacity, 8);

    let mut world = World::new(params);
    let builder: BodyBuilder = ron::from_str(
        "(shape: Circle(radius: 10.0), mass: 2.0, position: (100.0, 50.0), layer: LayerMask(4))",
    )
    .unwrap();
    let key = world.insert_body(builder).unwrap();
    assert_eq!(world.body(key).unwrap().layer, LayerMask(4));
    assert_eq!(world.body(key).unwrap().inv_mass(), 0.5);
    // cells are 64 units, so the circle covers columns 1..2 and row 0
    assert_eq!(world.grid().bucket(0, 1), &[key]);

    // wider than two cells
    let too_big: BodyBuilder = ron::from_str("(shape: Circle(radius: 70.0))").unwrap();
    assert!(world.insert_body(too_big).is_err());
    assert_eq!(world.body_count(), 1);
}
