//! # Strainfield CLI Application
//!
//! Reduces an experiment description (peak fits and sample logs per run, per
//! direction) into strain and stress fields and prints them.
//!
//! ```text
//! stress_cli experiment.json                  # every direction, as tables
//! stress_cli experiment.json --selection 11   # one direction
//! stress_cli experiment.json --selection 1320 # strain of one run
//! stress_cli experiment.json --json           # machine-readable output
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use stress_core::peaks::{PeakCollection, SampleLogs};
use stress_core::{
    Direction, ElasticConstants, FieldError, FieldResult, FieldSettings, ScalarFieldSample,
    Selection, StrainField, StrainFieldSingle, StressFacade, StressField, StressType,
};

#[derive(Parser, Debug)]
#[command(name = "stress_cli", version, about = "Reduce diffraction peak fits into stress fields")]
struct Args {
    /// Experiment description (JSON)
    experiment: PathBuf,

    /// Direction ("11", "22", "33") or run number to report
    #[arg(short, long)]
    selection: Option<String>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Also print the consensus reference spacing
    #[arg(long)]
    d_reference: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// One run: its peak fits and its sample logs
#[derive(Debug, Deserialize)]
struct RunInput {
    peaks: PeakCollection,
    logs: SampleLogs,
}

/// Experiment description loaded from JSON
#[derive(Debug, Deserialize)]
struct Experiment {
    stress_type: StressType,
    youngs_modulus: f64,
    poisson_ratio: f64,
    #[serde(default)]
    settings: FieldSettings,
    /// Runs per direction, keyed by "11", "22", "33"
    directions: BTreeMap<String, Vec<RunInput>>,
}

/// Fields reported for one selection
#[derive(Debug, Serialize)]
struct SelectionReport {
    selection: String,
    runs: Vec<String>,
    strain: ScalarFieldSample,
    stress: Option<ScalarFieldSample>,
}

fn load_experiment(path: &Path) -> FieldResult<Experiment> {
    let location = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .map_err(|e| FieldError::invalid_input("experiment", &location, e.to_string()))?;
    serde_json::from_str(&text)
        .map_err(|e| FieldError::invalid_input("experiment", &location, e.to_string()))
}

fn build_strain(runs: Vec<RunInput>, settings: &FieldSettings) -> FieldResult<StrainField> {
    let singles = runs
        .into_iter()
        .map(|run| StrainFieldSingle::new(run.peaks, &run.logs, settings))
        .collect::<FieldResult<Vec<_>>>()?;
    StrainField::new(singles)
}

fn build_facade(experiment: Experiment) -> FieldResult<StressFacade> {
    let Experiment {
        stress_type,
        youngs_modulus,
        poisson_ratio,
        settings,
        directions,
    } = experiment;
    settings.validate()?;
    let constants = ElasticConstants::new(youngs_modulus, poisson_ratio)?;

    let mut strains: BTreeMap<Direction, StrainField> = BTreeMap::new();
    for (token, runs) in directions {
        let direction: Direction = token.parse()?;
        debug!("direction {}: {} runs", direction, runs.len());
        strains.insert(direction, build_strain(runs, &settings)?);
    }

    let mut take = |direction: Direction| {
        strains
            .remove(&direction)
            .ok_or_else(|| FieldError::missing_direction(direction.as_str(), stress_type.as_str()))
    };
    let strain11 = take(Direction::D11)?;
    let strain22 = take(Direction::D22)?;
    let strain33 = take(Direction::D33).ok();

    let stress = StressField::with_settings(
        strain11,
        strain22,
        strain33,
        stress_type,
        constants,
        settings,
    )?;
    info!("{} common points across directions", stress.len());
    Ok(StressFacade::new(stress))
}

fn report(facade: &mut StressFacade, choice: &str) -> FieldResult<SelectionReport> {
    facade.set_selection(choice)?;
    let direction = match facade.selection() {
        Some(Selection::Direction(direction)) => Some(*direction),
        _ => None,
    };
    let runs = match direction {
        Some(direction) => facade.runs(direction),
        None => vec![choice.to_string()],
    };
    let strain = facade.strain()?.clone();
    let stress = match direction {
        Some(_) => Some(facade.stress()?.clone()),
        None => None,
    };
    Ok(SelectionReport {
        selection: choice.to_string(),
        runs,
        strain,
        stress,
    })
}

fn print_field(field: &ScalarFieldSample) {
    println!("  {:>10} {:>10} {:>10} {:>14} {:>14}", "vx", "vy", "vz", field.name(), "error");
    for (i, point) in field.point_list().iter().enumerate() {
        println!(
            "  {:>10.3} {:>10.3} {:>10.3} {:>14.6e} {:>14.6e}",
            point.vx,
            point.vy,
            point.vz,
            field.values()[i],
            field.errors()[i]
        );
    }
}

fn print_report(report: &SelectionReport) {
    println!("═══════════════════════════════════════");
    println!("  SELECTION {}  (runs: {})", report.selection, report.runs.join(", "));
    println!("═══════════════════════════════════════");
    println!();
    println!("Strain ({} points):", report.strain.len());
    print_field(&report.strain);
    if let Some(stress) = &report.stress {
        println!();
        println!("Stress ({} points):", stress.len());
        print_field(stress);
    }
    println!();
}

fn run(args: &Args) -> FieldResult<()> {
    let experiment = load_experiment(&args.experiment)?;
    let mut facade = build_facade(experiment)?;

    let choices: Vec<String> = match &args.selection {
        Some(choice) => vec![choice.clone()],
        None => Direction::ALL.iter().map(|d| d.as_str().to_string()).collect(),
    };

    let mut reports = Vec::with_capacity(choices.len());
    for choice in &choices {
        reports.push(report(&mut facade, choice)?);
    }
    let d_reference = if args.d_reference {
        Some(facade.d_reference()?.clone())
    } else {
        None
    };

    if args.json {
        let output = serde_json::json!({
            "stress_type": facade.stress_field().stress_type(),
            "youngs_modulus": facade.youngs_modulus(),
            "poisson_ratio": facade.poisson_ratio(),
            "selections": reports,
            "d_reference": d_reference,
        });
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| FieldError::internal(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Strainfield - Diffraction Stress Reduction");
    println!("==========================================");
    println!();
    println!(
        "Stress type: {}   E = {}   nu = {}",
        facade.stress_field().stress_type(),
        facade.youngs_modulus(),
        facade.poisson_ratio()
    );
    println!();
    for report in &reports {
        print_report(report);
    }
    if let Some(d_reference) = &d_reference {
        println!("Consensus reference spacing ({} points):", d_reference.len());
        print_field(d_reference);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Ok(json) = serde_json::to_string_pretty(&e) {
                eprintln!();
                eprintln!("Error JSON:");
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}
