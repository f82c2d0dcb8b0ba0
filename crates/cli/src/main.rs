//! QA Agent CLI - progress curves and simulated backend calls.

mod render;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use qaagent_core::{Checkpoint, CurvePreset, EstimatorConfig, Phase, ProgressCurve};
use qaagent_progress::{track, ProgressEstimator};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::render::{bar_style, format_elapsed, status_message};

#[derive(Parser)]
#[command(name = "qaagent")]
#[command(about = "QA Agent progress estimator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in curves
    Presets,
    /// Print a curve sampled at a fixed step
    Curve {
        /// Built-in curve
        #[arg(long, default_value = "ten-minute")]
        preset: CurvePreset,
        /// JSON config file (overrides --preset)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seconds between samples
        #[arg(long, default_value = "30")]
        step: f64,
    },
    /// Shadow a simulated backend call with a live progress bar
    Simulate {
        /// Built-in curve
        #[arg(long, default_value = "ten-minute")]
        preset: CurvePreset,
        /// JSON config file (overrides --preset)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seconds until the simulated call returns
        #[arg(long, default_value = "10")]
        duration: f64,
        /// Label shown next to the bar
        #[arg(long, default_value = "Analysing story")]
        label: String,
        /// Curve time compression factor
        #[arg(long, default_value = "1")]
        speed: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Presets => {
            for preset in CurvePreset::ALL {
                let curve = preset.curve();
                let points: Vec<String> = curve
                    .checkpoints()
                    .iter()
                    .map(|c| format!("({}, {})", format_elapsed(c.offset), c.percentage))
                    .collect();
                println!("{:<12} {}", preset.as_str(), points.join(" "));
            }
        }
        Commands::Curve { preset, config, step } => {
            if !(step.is_finite() && step > 0.0) {
                bail!("--step must be a positive number of seconds");
            }
            let config = load_config(preset, config.as_ref())?;
            let curve = &config.checkpoints;
            let end = curve.horizon().as_secs_f64() * 1.1;

            let mut t = 0.0;
            while t <= end {
                let elapsed = Duration::from_secs_f64(t);
                println!("{:>6} {:>5.1}%", format_elapsed(elapsed), curve.percentage_at(elapsed));
                t += step;
            }
        }
        Commands::Simulate {
            preset,
            config,
            duration,
            label,
            speed,
        } => {
            let duration = Duration::try_from_secs_f64(duration)
                .context("--duration must be a non-negative number of seconds")?;
            let mut config = load_config(preset, config.as_ref())?;
            config.checkpoints = compress(&config.checkpoints, speed)?;

            let estimator = ProgressEstimator::new(config)?.with_on_done(|snapshot| {
                info!("Progress finished after {}", format_elapsed(snapshot.elapsed));
            });

            let bar = ProgressBar::new(100);
            bar.set_style(bar_style()?);
            let mut updates = estimator.subscribe();
            let renderer = tokio::spawn(async move {
                while updates.changed().await.is_ok() {
                    let snapshot = updates.borrow_and_update().clone();
                    match snapshot.phase {
                        Phase::Idle => {
                            if bar.position() == 0 {
                                bar.finish_and_clear();
                            } else {
                                bar.finish();
                            }
                            break;
                        }
                        Phase::Done => {
                            bar.set_position(100);
                            bar.set_message(status_message(&snapshot));
                            bar.finish();
                            break;
                        }
                        Phase::Running | Phase::Completing => {
                            bar.set_position(snapshot.percentage.floor() as u64);
                            bar.set_message(status_message(&snapshot));
                        }
                    }
                }
            });

            track(&estimator, label, tokio::time::sleep(duration)).await?;
            renderer.await.context("progress renderer failed")?;
            println!("Simulated call returned after {}", format_elapsed(duration));
        }
    }

    Ok(())
}

fn load_config(preset: CurvePreset, path: Option<&PathBuf>) -> Result<EstimatorConfig> {
    match path {
        Some(path) => EstimatorConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EstimatorConfig::from_preset(preset)),
    }
}

/// Divide every checkpoint offset by `speed`.
fn compress(curve: &ProgressCurve, speed: f64) -> Result<ProgressCurve> {
    if !(speed.is_finite() && speed > 0.0) {
        bail!("--speed must be a positive number");
    }
    let checkpoints = curve
        .checkpoints()
        .iter()
        .map(|c| -> Result<Checkpoint> {
            let offset = Duration::try_from_secs_f64(c.offset.as_secs_f64() / speed)
                .with_context(|| format!("offset {:?} overflows at speed {}", c.offset, speed))?;
            Ok(Checkpoint::new(offset, c.percentage))
        })
        .collect::<Result<Vec<_>>>()?;
    ProgressCurve::new(checkpoints).context("curve collapsed at this speed")
}
