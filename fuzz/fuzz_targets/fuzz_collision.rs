#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vera_physics::{collision, BodyOptions, Engine, EngineOptions, Vector, World};

#[derive(Debug, Arbitrary)]
struct CollisionInput {
    /// Two bodies' positions (close together to force collision)
    x1: i8,
    y1: i8,
    x2: i8,
    y2: i8,
    /// Rotation of the second body, scaled down
    angle: i8,
    /// Steps to run
    steps: u8,
}

// Fuzz the SAT narrow phase by placing bodies close together, including
// fully overlapping ones. Must never panic.
fuzz_target!(|input: CollisionInput| {
    let mut world = World::new();
    let root = world.root();

    let square = |x: f64, y: f64, angle: f64| BodyOptions {
        position: Vector::new(x, y),
        angle,
        ..BodyOptions::default()
    };

    let a = world
        .create_body(square(input.x1 as f64, input.y1 as f64, 0.0))
        .expect("valid body");
    let b = world
        .create_body(square(
            input.x2 as f64,
            input.y2 as f64,
            input.angle as f64 / 40.0,
        ))
        .expect("valid body");
    let _ = world.add_body(root, a);
    let _ = world.add_body(root, b);

    // direct narrow phase on the raw pair
    {
        let body_a = world.bodies.get(a).expect("just created");
        let body_b = world.bodies.get(b).expect("just created");
        if let Some(collision) = collision::collides(body_a, body_b) {
            assert!(collision.support_count >= 1 && collision.support_count <= 2);
            assert!(!collision.depth.is_nan());
        }
    }

    // then the full pipeline around it
    let mut engine = Engine::with_world(world, EngineOptions::default());
    let steps = (input.steps as usize).min(64);
    for _ in 0..steps {
        engine.update(None);
    }
});
