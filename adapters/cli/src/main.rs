#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for previewing and simulating procedural waves.

mod scenario;
mod simulate;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use horde_core::WaveIndex;
use horde_system_placement::PlacementContext;
use horde_system_preview::{preview_runtime_wave, preview_wave, WavePreview};
use tracing_subscriber::EnvFilter;

use crate::{
    scenario::{Scenario, DEFAULT_PROFILE_PATH},
    simulate::{simulate, SimulationReport, SimulationSettings},
};

#[derive(Debug, Parser)]
#[command(name = "horde", about = "Procedural wave generation and pacing", version)]
struct CliArgs {
    /// Scenario file describing the profile, placement and scheduler options.
    #[arg(long, global = true, default_value = DEFAULT_PROFILE_PATH)]
    profile: PathBuf,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Shows what a wave would contain without running it.
    Preview {
        /// Wave to preview.
        #[arg(long, default_value_t = 1)]
        wave: u32,
        /// Number of consecutive waves to preview.
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Seed; defaults to the scenario's scheduler seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Treats the seed as a scheduler base seed and derives the per-wave seed.
        #[arg(long)]
        runtime: bool,
        /// Prints JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Runs waves headlessly against the reference world.
    Simulate {
        /// Number of waves to complete.
        #[arg(long, default_value_t = 5)]
        waves: u32,
        /// Overrides the scenario's scheduler seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Seconds each enemy stays alive before it is defeated.
        #[arg(long, default_value_t = 3.0)]
        defeat_after: f64,
    },
}

/// Entry point for the horde command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let mut scenario = Scenario::load(&args.profile)?;

    match args.command {
        CliCommand::Preview {
            wave,
            count,
            seed,
            runtime,
            json,
        } => {
            let seed = seed.unwrap_or(scenario.options.seed);
            let context = PlacementContext {
                anchor: scenario.anchor,
                viewpoint: scenario.viewpoint.as_ref(),
                navigation: None,
            };
            let placement = Some((&scenario.placement, &context));
            let previews: Vec<WavePreview> = (0..count.max(1))
                .map(|offset| {
                    let wave = WaveIndex::new(wave.saturating_add(offset));
                    if runtime {
                        preview_runtime_wave(&scenario.profile, wave, seed, placement)
                    } else {
                        preview_wave(&scenario.profile, wave, seed, placement)
                    }
                })
                .collect();

            if json {
                let rendered =
                    serde_json::to_string_pretty(&previews).context("failed to encode preview")?;
                println!("{rendered}");
            } else {
                for preview in &previews {
                    print_preview(preview);
                }
            }
        }
        CliCommand::Simulate {
            waves,
            seed,
            defeat_after,
        } => {
            if let Some(seed) = seed {
                scenario.options.seed = seed;
            }
            let defeat_after = Duration::try_from_secs_f64(defeat_after)
                .context("--defeat-after must be a non-negative number of seconds")?;
            let report = simulate(
                &scenario,
                SimulationSettings {
                    waves: waves.max(1),
                    defeat_after,
                },
            )?;
            print_report(&report);
        }
    }

    Ok(())
}

fn print_preview(preview: &WavePreview) {
    let concurrency = preview
        .concurrency_cap
        .map_or_else(|| "unbounded".to_owned(), |cap| cap.to_string());
    println!(
        "wave {} ({}) seed {}",
        preview.wave, preview.archetype, preview.seed
    );
    println!(
        "  duration {:.1}s  budget {}  rate {:.2}/s  cap {}  concurrency {}  elite {:.2}  bias {:+.2}",
        preview.duration,
        preview.budget,
        preview.spawn_rate,
        preview.population_cap,
        concurrency,
        preview.elite_chance,
        preview.cost_bias
    );
    println!(
        "  pools normal {} elite {}  boss wave {} included {}  estimate {}",
        preview.available_normal,
        preview.available_elite,
        preview.is_boss_wave,
        preview.boss_included,
        preview.estimated_count_by_min_cost
    );
    let sequence: Vec<String> = preview
        .sequence
        .iter()
        .map(|template| template.get().to_string())
        .collect();
    println!(
        "  sequence ({}): {}",
        sequence.len(),
        sequence.join(" ")
    );
    println!("  leftover budget {}", preview.leftover_budget);
    for warning in &preview.warnings {
        println!("  warning: {warning}");
    }
}

fn print_report(report: &SimulationReport) {
    for summary in &report.waves {
        let at = |time: Option<Duration>| {
            time.map_or_else(|| "-".to_owned(), |time| format!("{:.2}s", time.as_secs_f32()))
        };
        println!(
            "wave {:>3}  spawned {:>4}  started {:.2}s  cleared {}  ended {}",
            summary.wave,
            summary.spawned,
            summary.started_at.as_secs_f32(),
            at(summary.cleared_at),
            at(summary.ended_at)
        );
    }
    println!("simulated {:.2}s", report.elapsed.as_secs_f32());
}
