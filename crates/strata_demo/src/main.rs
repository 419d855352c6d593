//! Strata demo
//!
//! A ring of ships drifting around the origin and firing inward. Bullets
//! expire after a while and damage any other ship they pass through.
//!
//! Run with: cargo run -p strata_demo [config.toml]

mod systems;

use std::error::Error;
use std::f32::consts::TAU;
use strata_ecs::{EcsConfig, World};
use systems::{Collision, Expiry, Guns, Movement, Position, Ship, Velocity};

const SHIP_COUNT: usize = 12;
const RING_RADIUS: f32 = 40.0;
const PASSES: usize = 600;
const REPORT_INTERVAL: usize = 100;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    if let Err(e) = run() {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

fn load_config() -> Result<EcsConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading config from: {}", path);
            let content = std::fs::read_to_string(&path)?;
            Ok(EcsConfig::from_toml_str(&content)?)
        }
        None => Ok(EcsConfig::default()),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut world = World::with_config(load_config()?)?;

    for i in 0..SHIP_COUNT {
        let angle = TAU * i as f32 / SHIP_COUNT as f32;
        let (sin, cos) = angle.sin_cos();
        world.create_entity((
            Position { x: cos * RING_RADIUS, y: sin * RING_RADIUS },
            Velocity { x: -sin * 0.1, y: cos * 0.1 },
            Ship { hull: 3, cooldown: i as u32 },
        ))?;
    }

    world.register_system(Movement)?;
    world.register_system(Guns)?;
    world.register_system(Expiry)?;
    world.register_custom_system(Collision::default());

    log::info!(
        "Spawned {} ships, running {} passes with systems {:?}",
        SHIP_COUNT,
        PASSES,
        world.scheduler().names().collect::<Vec<_>>()
    );

    for pass in 1..=PASSES {
        world.run()?;

        if pass % REPORT_INTERVAL == 0 {
            log::info!(
                "Pass {}: {} entities in {} archetypes",
                pass,
                world.entity_count(),
                world.archetype_count()
            );
        }
    }

    let stats = world.memory_stats();
    log::info!(
        "Done: {} entities, {} KiB committed of {} KiB reserved",
        world.entity_count(),
        stats.committed_bytes / 1024,
        stats.reserved_bytes / 1024
    );
    Ok(())
}
