//! Headless gravity driver.
//!
//! Spawns a scenario as ECS entities, registers them with a gravity session and
//! runs the fixed-step loop with floating-origin recentering.

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use engine_core::{
    AppliedForce, DVec3, Entity, FloatingOrigin, GravityBody, RenderScale, SimClock, Velocity, World, WorldPosition,
};
use gravity::{BubbleState, HealthStatus, UnifiedGravitySystem};
use procgen::{circular_binary, random_cluster, BodySpawn, StarSystem};

use config::{default_config_path, ScenarioKind, SimConfig};

fn spawns_for(config: &SimConfig) -> Vec<BodySpawn> {
    match config.scenario {
        ScenarioKind::Cluster => random_cluster(config.seed, config.body_count, config.half_extent, config.mass_range),
        ScenarioKind::EarthMoon => {
            circular_binary(("Earth", 5.97e24, 6.371e6), ("Moon", 7.35e22, 1.737e6), 384_400_000.0).to_vec()
        }
        ScenarioKind::StarSystem => {
            let system = StarSystem::generate(config.seed);
            log::info!(
                "Generated {} ({:?}, {} planets)",
                system.name,
                system.star.star_type,
                system.planets.len()
            );
            system.spawns()
        }
    }
}

fn spawn_entities(world: &mut World, spawns: &[BodySpawn]) {
    for s in spawns {
        world.spawn((
            GravityBody::new(s.name.clone(), s.mass, s.radius),
            WorldPosition(s.position),
            Velocity::new(s.velocity),
            AppliedForce::default(),
            RenderScale::default(),
        ));
    }
}

/// Entity the observer rides with: the named body, else the heaviest.
fn pick_focus(world: &World, follow: Option<&str>) -> Option<Entity> {
    let mut query = world.query::<&GravityBody>();
    let bodies: Vec<(Entity, String, f64)> = query.iter().map(|(e, b)| (e, b.name.clone(), b.mass)).collect();
    if let Some(name) = follow {
        if let Some((e, ..)) = bodies.iter().find(|(_, n, _)| n == name) {
            return Some(*e);
        }
        log::warn!("No body named '{}' to follow, using the heaviest", name);
    }
    bodies
        .into_iter()
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(e, ..)| e)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                            GravSim                               ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║  Distance-scaled N-body gravity, headless driver                 ║");
    println!("║  Usage: gravsim [config.ron] [--write-default]                   ║");
    println!("║  RUST_LOG=debug shows bubble transitions and registrations       ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");

    let mut path = default_config_path();
    let mut write_default = false;
    for arg in std::env::args().skip(1) {
        if arg == "--write-default" {
            write_default = true;
        } else {
            path = PathBuf::from(arg);
        }
    }

    if write_default {
        SimConfig::default().save(&path);
        log::info!("Wrote default config to {:?}", path);
        return Ok(());
    }

    let config = SimConfig::load(&path);
    if !(config.tick_rate.is_finite() && config.tick_rate > 0.0) {
        bail!("tick_rate must be positive, got {}", config.tick_rate);
    }
    log::info!(
        "Scenario {:?}, seed {}, {} Hz x{} for {} s",
        config.scenario,
        config.seed,
        config.tick_rate,
        config.time_scale,
        config.duration
    );

    let mut world = World::new();
    let spawns = spawns_for(&config);
    spawn_entities(&mut world, &spawns);

    let mut gravity = UnifiedGravitySystem::new(config.gravity.clone());
    gravity.subscribe(|t| {
        if t.new_state == BubbleState::OutOfBubble {
            log::debug!("{} left the bubble", t.body);
        }
    });
    let registered = gravity.auto_register_all(&mut world);
    if registered == 0 {
        bail!("scenario produced no registrable bodies");
    }

    let focus = pick_focus(&world, config.follow.as_deref()).context("no body to follow")?;
    let mut origin = FloatingOrigin::new(config.origin_threshold);
    let mut clock = SimClock::with_rate(config.tick_rate);
    let frame = Duration::from_secs_f64(1.0 / config.tick_rate);
    let step = config.step_seconds();
    let frames = (config.duration * config.tick_rate).ceil() as u64;

    for _ in 0..frames {
        let steps = clock.advance_by(frame);
        for _ in 0..steps {
            let observer = world.get::<&WorldPosition>(focus).map(|p| p.0).unwrap_or(DVec3::ZERO);
            if let Some(offset) = origin.check(observer) {
                log::debug!("Recentering by {:?} (total {:?})", offset, origin.total_offset());
                gravity.translate_all(offset);
                for (_, position) in world.query_mut::<&mut WorldPosition>() {
                    position.translate(offset);
                }
            }
            gravity.set_observer_position(world.get::<&WorldPosition>(focus).map(|p| p.0).unwrap_or(DVec3::ZERO));
            gravity.update(step);
            gravity.write_back(&mut world);

            if config.report_every > 0 && gravity.tick_count() % config.report_every == 0 {
                log::info!("\n{}", gravity.get_debug_string());
            }
        }
    }

    let report = gravity.run_full_validation();
    log::info!("\n{}", gravity.get_debug_string());
    log::info!(
        "Ran {} ticks ({:.1} simulated s), origin shifted by {:.0} m",
        clock.step_count(),
        gravity.sim_time(),
        origin.total_offset().length()
    );

    if gravity.health() == HealthStatus::Failed {
        bail!("gravity health failed (max error {:.3e})", report.max_error());
    }
    Ok(())
}
