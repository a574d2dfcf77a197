//! Headless stage runner
//!
//! Drives the fixed-step loop a game host would: feed frame deltas into
//! the clock, consume whole steps, hand each step's events to the audio
//! router. Runs flat out by default; `--realtime` paces it against the
//! wall clock.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use talon_sim::{AudioRouter, SimClock, SimEvent, Simulation};
use talon_stage::Stage;
use talon_template::TemplateBank;

pub struct RunArgs {
    pub stage: String,
    pub templates: String,
    pub duration: f64,
    pub rate: f64,
    pub retries: u32,
    pub events: bool,
    pub realtime: bool,
}

enum Outcome {
    Cleared,
    Defeated,
    TimedOut,
}

pub fn run(args: RunArgs) -> Result<()> {
    let bank = load_bank(&args.templates)?;
    bank.validate().context("template validation failed")?;

    let mut stage = Stage::load_file(&args.stage)
        .with_context(|| format!("failed to load stage {}", args.stage))?;
    let mut sim = Simulation::new(Arc::new(bank));

    let mut audio = AudioRouter::new();
    audio.alarm_sound = stage.alarm_sound().map(str::to_string);

    println!(
        "Running stage '{}' at {:.0} steps/s for up to {:.0} simulated seconds",
        stage.name(),
        args.rate,
        args.duration
    );
    stage.start(&mut sim)?;
    let fielded_players = !sim.player_ids().is_empty();

    let mut clock = SimClock::with_fixed_timestep(args.rate);
    let frame = clock.fixed_timestep;
    let mut retries_left = args.retries;
    let mut last = Instant::now();

    let mut outcome = Outcome::TimedOut;
    'frames: while clock.total_time < args.duration {
        if args.realtime {
            std::thread::sleep(Duration::from_secs_f64(frame));
            let now = Instant::now();
            clock.advance(now.duration_since(last).as_secs_f64());
            last = now;
        } else {
            clock.advance(frame);
        }

        while clock.should_step() {
            let dt = clock.consume_step();
            let events = stage.tick(&mut sim, dt);

            for command in audio.process_events(&events, sim.pool()) {
                tracing::debug!(?command, "audio");
            }
            for event in &events {
                if args.events {
                    println!("[{:9.3}] {:?}", clock.total_time, event);
                }
                if matches!(event, SimEvent::StageEnd) {
                    outcome = Outcome::Cleared;
                    break 'frames;
                }
            }

            if fielded_players && sim.player_ids().is_empty() {
                if retries_left == 0 {
                    outcome = Outcome::Defeated;
                    break 'frames;
                }
                retries_left -= 1;
                println!(
                    "[{:9.3}] players down, restarting from checkpoint ({} retr{} left)",
                    clock.total_time,
                    retries_left,
                    if retries_left == 1 { "y" } else { "ies" }
                );
                stage
                    .restart_from_checkpoint(&mut sim)
                    .context("checkpoint restart failed")?;
            }
        }
    }

    match outcome {
        Outcome::Cleared => println!("Stage cleared at {:.2}s", clock.total_time),
        Outcome::Defeated => println!("Players down at {:.2}s, no retries left", clock.total_time),
        Outcome::TimedOut => println!("Gave up after {:.2} simulated seconds", clock.total_time),
    }
    println!("Score: {}", sim.score());
    println!(
        "Pool: {} active, {} spare",
        sim.pool().active_count(),
        sim.pool().spare_count()
    );
    Ok(())
}

fn load_bank(path: &str) -> Result<TemplateBank> {
    if Path::new(path).is_dir() {
        TemplateBank::load_from_directory(path)
            .with_context(|| format!("failed to load templates from {path}"))
    } else {
        let mut bank = TemplateBank::new();
        bank.load_file(path)
            .with_context(|| format!("failed to load templates from {path}"))?;
        Ok(bank)
    }
}
