//! A potato-powered satellite.
//!
//! Simulates a small plan, edits it, and re-simulates incrementally, printing the resource profiles
//! of the edited plan.

mod activities;
mod model;

use crate::activities::{Downlink, Pass, RechargePotato};
use clap::Parser;
use config::{Config, Environment, File};
use hifitime::{TimeScale, TimeUnits};
use kestrel::{Duration, Plan, Result, SimulationConfig, SimulationResults, Time};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// A TOML file with simulation settings. `POTATO_SAT__*` environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation horizon in seconds, overriding the configuration.
    #[arg(long)]
    horizon: Option<f64>,

    /// Print the final results as JSON.
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
    let mut builder = Config::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(File::from(path.as_path()));
    }
    let mut config: SimulationConfig = builder
        .add_source(Environment::with_prefix("POTATO_SAT").separator("__"))
        .build()?
        .try_deserialize()?;
    if let Some(seconds) = args.horizon {
        config.horizon = Duration::from_seconds(seconds);
    }
    Ok(config)
}

fn print_results(results: &SimulationResults) -> Result<()> {
    for (name, profile) in &results.profiles {
        println!("{name}");
        for segment in profile {
            let time = results.start + segment.start;
            println!("  {time}  {}", serde_json::to_string(&segment.value)?);
        }
    }
    println!("activities");
    for span in &results.spans {
        let end = span
            .end
            .map_or_else(|| "unfinished".to_string(), |end| end.to_string());
        println!("  {:<24} {:<16} {} .. {end}", span.key.to_string(), span.name, span.start);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        horizon = %config.horizon,
        evaluator = ?config.evaluator,
        incremental = config.incremental,
        "configuration loaded"
    );

    let (model, sat) = model::build(config.evaluator);
    let start = Time::from_gregorian_utc_at_midnight(2025, 1, 31).to_time_scale(TimeScale::TAI);
    let mut plan = Plan::new(Arc::new(model), start, config);

    let recharge = plan.insert(
        start + 10.minutes(),
        RechargePotato::new(&sat, 3, 2.hours()),
    )?;
    plan.insert(start + 3.hours(), Pass::new(&sat, vec![40.0, 25.0]))?;
    plan.insert(start + 20.hours(), Downlink::new(&sat, 120.0))?;

    let base = plan.simulate()?;
    info!(commits = base.timeline.len(), "simulated the base plan");

    plan.move_to(recharge, start + 4.hours())?;
    plan.insert(start + 12.hours(), RechargePotato::new(&sat, 1, 1.hours()))?;
    let edited = plan.simulate()?;
    info!(commits = edited.timeline.len(), "re-simulated the edited plan");

    if args.json {
        println!("{}", serde_json::to_string_pretty(edited)?);
    } else {
        print_results(edited)?;
    }
    Ok(())
}
