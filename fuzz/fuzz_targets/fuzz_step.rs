#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vera_physics::{BodyOptions, Engine, Vector};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Number of bodies to add (capped)
    body_count: u8,
    /// Position components (i16 to keep values reasonable)
    positions: Vec<(i16, i16)>,
    /// Box sizes (> 0 after clamping)
    sizes: Vec<u8>,
    /// Which bodies are static
    static_flags: Vec<bool>,
    /// Number of simulation steps (capped)
    step_count: u8,
}

// Fuzz the engine: add random boxes and step.
// Must never panic regardless of input.
fuzz_target!(|input: FuzzInput| {
    let mut engine = Engine::default();
    let root = engine.world.root();

    let body_count = (input.body_count as usize).min(16);
    for i in 0..body_count {
        let (px, py) = input.positions.get(i).copied().unwrap_or((0, 0));
        let size = input.sizes.get(i).copied().unwrap_or(40).max(1) as f64;
        let is_static = input.static_flags.get(i).copied().unwrap_or(false);

        let id = engine
            .world
            .create_body(BodyOptions {
                vertices: vec![
                    Vector::new(0.0, 0.0),
                    Vector::new(size, 0.0),
                    Vector::new(size, size),
                    Vector::new(0.0, size),
                ],
                position: Vector::new(px as f64, py as f64),
                is_static,
                ..BodyOptions::default()
            })
            .expect("a square is always a valid body");
        let _ = engine.world.add_body(root, id);
    }

    let steps = (input.step_count as usize).min(32);
    for _ in 0..steps {
        engine.update(None);
    }
});
