//! Headless симуляция WILDRUN
//!
//! Один олень в лесу с прудом, охотник медленно подкрадывается.
//! Печатает смену состояний и эффекты; для проверки конфигов и детерминизма.

use bevy::prelude::*;
use clap::Parser;
use std::path::PathBuf;

use wildlife_simulation::{
    create_headless_app, run_fixed_tick, set_log_level, spawn_wild_agent, AgentEffect, AgentStateChanged,
    BehaviorConfig, EffectCue, LogLevel, SandboxWorld, ThreatSource, WildAgent, WildlifePlugin, WorldSurface,
};

#[derive(Parser, Debug)]
#[command(name = "wildlife_simulation", about = "Headless deer behavior runner")]
struct Args {
    /// JSON с BehaviorConfig (по умолчанию профиль оленя)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Сколько fixed тиков (60Hz)
    #[arg(long, default_value_t = 3600)]
    ticks: u32,

    /// debug | info | warning | error
    #[arg(long, default_value = "info")]
    log_level: String,
}

const DT: f32 = 1.0 / 60.0;

fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match BehaviorConfig::load(path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("❌ {}", error);
                std::process::exit(1);
            }
        },
        None => BehaviorConfig::deer(),
    };

    println!("Starting WILDRUN headless simulation (seed: {})", args.seed);

    let mut app = create_headless_app(args.seed);
    if let Some(level) = LogLevel::parse(&args.log_level) {
        set_log_level(level);
    }

    let world = SandboxWorld::forest(60.0, 12.0).with_pond(Vec3::new(20.0, 0.0, -15.0), 6.0);
    app.add_plugins(WildlifePlugin)
        .insert_resource(WorldSurface::new(world))
        .insert_resource(ThreatSource {
            position: Vec3::new(0.0, 0.0, 90.0),
            ..default()
        });

    let deer = spawn_wild_agent(app.world_mut(), config, Vec3::ZERO, 0.0);

    let mut state_reader = app.world().resource::<Events<AgentStateChanged>>().get_cursor();
    let mut effect_reader = app.world().resource::<Events<AgentEffect>>().get_cursor();

    for tick in 0..args.ticks {
        // Охотник идёт к оленю ~1 m/s, последние 10 секунд стоит
        if tick + 600 < args.ticks {
            let mut threat = app.world_mut().resource_mut::<ThreatSource>();
            let approach = Vec3::new(0.0, 0.0, -1.0) * DT;
            threat.position += approach;
        }

        run_fixed_tick(&mut app, DT);

        let world = app.world();
        for change in state_reader.read(world.resource::<Events<AgentStateChanged>>()) {
            println!("Tick {}: {} → {}", tick, change.from, change.to);
        }
        for effect in effect_reader.read(world.resource::<Events<AgentEffect>>()) {
            match effect.cue {
                EffectCue::Alert => println!("Tick {}: 🔔 alert snort", tick),
                EffectCue::Flee => println!("Tick {}: 💨 flee", tick),
                EffectCue::Wound(point) => println!("Tick {}: 🩸 blood at {:?}", tick, point),
                EffectCue::Footstep { .. } => {}
            }
        }

        if tick % 600 == 0 {
            if let Some(wild) = world.get::<WildAgent>(deer) {
                let pose = wild.agent.pose();
                println!(
                    "Tick {}: {} at ({:.1}, {:.1}) speed {:.1}",
                    tick,
                    wild.agent.state(),
                    pose.position.x,
                    pose.position.z,
                    pose.velocity
                );
            }
        }
    }

    println!("Simulation complete!");
}
