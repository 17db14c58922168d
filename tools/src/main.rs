//! sim-runner: headless runner for the mitosis simulation.
//!
//! Usage:
//!   sim-runner --seed 12345 --initial random --db runs.db
//!   sim-runner --set N=4 --set dt=10 --set span=2000 --report-step 100
//!   sim-runner --pool 40 --db pool.db
//!   sim-runner --db runs.db --load run-42-...

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mitosim_core::{
    calibration::reduce_params,
    config::{InitialCondition, MeasureSet, ParameterSet},
    engine::SimEngine,
    pool::{run_pool, PoolSummary},
    progress::ProgressReporter,
    store::SimStore,
    trajectory::{Ablation, TrajectoryRecord},
    types::Sister,
};
use std::path::Path;

/// Resolution of the progress bar.
const BAR_LENGTH: u64 = 1000;

#[derive(Parser, Debug)]
#[command(version, about = "Stochastic simulation of chromosome segregation in mitosis")]
struct Cli {
    /// Directory holding params.json and measures.json.
    #[arg(long, default_value = "./data", value_name = "DIR")]
    data_dir: String,

    /// Override a parameter (repeatable), e.g. --set N=4
    #[arg(long = "set", value_name = "NAME=VALUE")]
    overrides: Vec<String>,

    /// Seed of the run, or master seed of a pool.
    #[arg(long)]
    seed: Option<u64>,

    /// Initial attachment: null, amphitelic, random, monotelic, syntelic, merotelic.
    #[arg(long, default_value = "random")]
    initial: String,

    /// Derive parameters from the measures before running.
    #[arg(long)]
    reduce: bool,

    /// Parameter kept as given by --reduce (repeatable).
    #[arg(long = "force", value_name = "NAME")]
    forced: Vec<String>,

    /// SQLite database to save into.
    #[arg(long, default_value = ":memory:", value_name = "PATH")]
    db: String,

    /// Run a pool of this many simulations instead of a single one.
    #[arg(long, value_name = "N")]
    pool: Option<usize>,

    /// Laser ablation, as STEP:POSITION (um).
    #[arg(long, value_name = "STEP:POS")]
    ablate: Option<String>,

    /// Snapshot to print a report of; defaults to the last one.
    #[arg(long, value_name = "STEP")]
    report_step: Option<usize>,

    /// Print the runs saved in --db and exit.
    #[arg(long)]
    list: bool,

    /// Load a saved run from --db and report on it instead of simulating.
    #[arg(long, value_name = "RUN_ID")]
    load: Option<String>,

    /// Log run milestones at info level.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let store = SimStore::open(&cli.db)?;
    store.migrate()?;

    if cli.list {
        return list_runs(&store);
    }
    if let Some(run_id) = &cli.load {
        let record = store.load_trajectory(run_id)?;
        print_summary(run_id, &record, cli.report_step);
        return Ok(());
    }

    let (mut params, measures) = load_inputs(&cli.data_dir)?;
    for item in &cli.overrides {
        let (name, value) = parse_override(item)?;
        params.set(name, value)?;
    }
    if let Some(seed) = cli.seed {
        params.set("seed", seed as f64)?;
    }
    if cli.reduce {
        let forced: Vec<&str> = cli.forced.iter().map(String::as_str).collect();
        for (name, old, new) in reduce_params(&mut params, &measures, &forced)? {
            println!("  reduced {name:<12} {old:>10.4} -> {new:.4}");
        }
    }
    let initial: InitialCondition = cli.initial.parse()?;
    let seed = params.get("seed")? as u64;

    println!("mitosim sim-runner");
    println!("  seed:      {seed}");
    println!("  initial:   {initial}");
    println!("  db:        {}", cli.db);
    println!("  data_dir:  {}", cli.data_dir);
    println!();

    let bar = ProgressBar::new(BAR_LENGTH).with_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% [{elapsed_precise}<{eta_precise}]")
            .map_err(|e| anyhow!("bad progress template: {e}"))?,
    );
    let bar_handle = bar.clone();
    let progress = ProgressReporter::with_callback(Box::new(move |fraction| {
        bar_handle.set_position((fraction * BAR_LENGTH as f64) as u64);
    }));

    if let Some(size) = cli.pool {
        let records = run_pool(&params, &measures, initial, size, &progress)?;
        bar.finish_and_clear();
        let pool_id = format!("pool-{seed}-{}", uuid::Uuid::new_v4().simple());
        store.save_pool(&pool_id, seed, initial, &records)?;
        print_pool_summary(&pool_id, &PoolSummary::from_records(&records));
        return Ok(());
    }

    let mut engine = SimEngine::new(&params, &measures, initial, cli.verbose)?;
    if let Some(arg) = &cli.ablate {
        engine = engine.with_ablation(parse_ablation(arg)?)?;
    }
    let outcome = engine.run_with_progress(&progress).map(|_| ());
    bar.finish_and_clear();

    let run_id = format!("run-{seed}-{}", uuid::Uuid::new_v4().simple());
    let record = engine.into_record();
    // A failed run still leaves a valid partial record worth keeping.
    store.save_trajectory(&run_id, &record)?;
    print_summary(&run_id, &record, cli.report_step);
    outcome.context("simulation stopped early")?;
    Ok(())
}

fn load_inputs(data_dir: &str) -> Result<(ParameterSet, MeasureSet)> {
    let params_path = Path::new(data_dir).join("params.json");
    let measures_path = Path::new(data_dir).join("measures.json");
    let params = if params_path.exists() {
        ParameterSet::load(&params_path.to_string_lossy())?
    } else {
        log::warn!("{} not found, using built-in parameters", params_path.display());
        ParameterSet::default_params()
    };
    let measures = if measures_path.exists() {
        MeasureSet::load(&measures_path.to_string_lossy())?
    } else {
        log::warn!("{} not found, using built-in measures", measures_path.display());
        MeasureSet::default_measures()
    };
    Ok((params, measures))
}

fn parse_override(item: &str) -> Result<(&str, f64)> {
    let (name, value) = item
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{item}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("bad value for {name}"))?;
    Ok((name.trim(), value))
}

fn parse_ablation(arg: &str) -> Result<Ablation> {
    let Some((step, position)) = arg.split_once(':') else {
        bail!("expected STEP:POSITION, got '{arg}'");
    };
    Ok(Ablation {
        step:     step.trim().parse().context("bad ablation step")?,
        position: position.trim().parse().context("bad ablation position")?,
    })
}

fn list_runs(store: &SimStore) -> Result<()> {
    let runs = store.list_runs()?;
    if runs.is_empty() {
        println!("No saved runs.");
        return Ok(());
    }
    for run in runs {
        let onset = run
            .anaphase_onset
            .map(|s| format!("onset at step {s}"))
            .unwrap_or_else(|| "no onset".to_string());
        println!(
            "{:<48} seed {:>16}  N={:<3} {:<10} {:>6} steps  {:<20} {}",
            run.run_id, run.seed, run.n_chromosomes, run.initial_condition, run.span, onset, run.final_phase
        );
    }
    Ok(())
}

fn print_summary(run_id: &str, record: &TrajectoryRecord, report_step: Option<usize>) {
    let meta = &record.metadata;
    println!("=== {run_id} ===");
    println!("  steps run:        {} of {}", record.len(), meta.span);
    println!("  final phase:      {}", record.final_phase().name());
    match (meta.anaphase_onset, meta.anaphase_delay, meta.merotelic_at_onset) {
        (Some(step), Some(delay), Some(mero)) => {
            println!("  anaphase onset:   step {step} (t = {:.1} s)", step as f64 * meta.dt);
            println!("  anaphase delay:   {delay:.1} s");
            println!("  merotelic links:  {mero} at onset");
            for chromosome in 0..record.topology.n_chromosomes {
                let arrivals: Vec<String> = [Sister::A, Sister::B]
                    .into_iter()
                    .map(|sister| {
                        record
                            .time_of_arrival(chromosome, sister, 0.1)
                            .map(|t| format!("{t:.0} s"))
                            .unwrap_or_else(|| "-".to_string())
                    })
                    .collect();
                println!("  chromosome {chromosome} reaches the poles after {}", arrivals.join(" / "));
            }
        }
        _ => println!("  anaphase onset:   none"),
    }
    if let Some(ablation) = meta.ablation {
        println!("  ablation:         step {} at {} um", ablation.step, ablation.position);
    }
    println!();

    let index = report_step.unwrap_or(record.len());
    print!("{}", record.report(index));
    if let Ok(json) = serde_json::to_string(&meta) {
        log::debug!("metadata: {json}");
    }
}

fn print_pool_summary(pool_id: &str, summary: &PoolSummary) {
    let fmt = |v: Option<f64>| v.map(|x| format!("{x:.1}")).unwrap_or_else(|| "-".to_string());
    println!("=== {pool_id} ===");
    println!("  runs:               {}", summary.size);
    println!("  reached anaphase:   {}", summary.reached_anaphase);
    println!("  mean onset time:    {} s", fmt(summary.mean_onset_time));
    println!("  mean delay:         {} s", fmt(summary.mean_delay));
    println!("  mean merotelic:     {} links at onset", fmt(summary.mean_merotelic));
    println!("  final bioriented:   {:.2}", summary.mean_final_biorientation);
}
