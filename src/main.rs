use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use degree_progress::{
    loader, report, ExhaustiveSolver, GradeSolver, HypotheticalPlan, ProgressEngine,
    RequirementsCatalog,
};

#[derive(Parser)]
#[command(name = "degree-progress")]
#[command(about = "Degree progress tracker for university transcripts", long_about = None)]
struct Cli {
    /// Requirements catalog JSON; the built-in catalog is used when absent
    #[arg(long, global = true, env = "DEGREE_PROGRESS_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ViewArgs {
    /// Transcript CSV
    #[arg(long, env = "DEGREE_PROGRESS_CSV")]
    csv: PathBuf,
    /// Tracks to include; all tracks when omitted
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    tracks: Option<Vec<String>>,
    /// Main specialisation track
    #[arg(long = "main", env = "DEGREE_PROGRESS_MAIN")]
    main_specialization: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or write the active requirements catalog
    Catalog {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a transcript CSV
    Check {
        #[arg(long, env = "DEGREE_PROGRESS_CSV")]
        csv: PathBuf,
    },
    /// Print progress metrics for a transcript
    Summary {
        #[command(flatten)]
        view: ViewArgs,
        /// Emit the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown progress report
    Report {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Find grades for upcoming modules that reach a target CGPA
    Plan {
        #[arg(long, env = "DEGREE_PROGRESS_CSV")]
        csv: PathBuf,
        #[arg(long)]
        target: f64,
        #[arg(long, default_value_t = 5)]
        modules: usize,
        #[arg(long, default_value_t = 4)]
        units: u32,
    },
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<RequirementsCatalog> {
    match path {
        Some(path) => RequirementsCatalog::from_path(path)
            .with_context(|| format!("failed to load catalog from {}", path.display())),
        None => RequirementsCatalog::builtin().context("built-in catalog is invalid"),
    }
}

fn build_engine<'a>(
    catalog: &'a RequirementsCatalog,
    view: &ViewArgs,
) -> anyhow::Result<ProgressEngine<'a>> {
    let records = loader::load_csv(&view.csv, catalog)
        .with_context(|| format!("failed to read transcript {}", view.csv.display()))?;
    let mut engine = ProgressEngine::load(catalog, records)?;
    engine.set_main_specialization(view.main_specialization.as_deref())?;
    if let Some(tracks) = &view.tracks {
        engine.apply_filter(tracks.iter().cloned())?;
    }
    Ok(engine)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "degree_progress=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let catalog = load_catalog(cli.catalog.as_deref())?;

    match cli.command {
        Commands::Catalog { out } => {
            let json = catalog.to_json_pretty()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Catalog written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Check { csv } => {
            let records = loader::load_csv(&csv, &catalog)
                .with_context(|| format!("failed to read transcript {}", csv.display()))?;
            let engine = ProgressEngine::load(&catalog, records)?;
            println!(
                "{} modules across {} tracks: {}.",
                engine.raw().len(),
                engine.track_tags().len(),
                engine.track_tags().join(", ")
            );
            let options = engine.specialization_options();
            if !options.is_empty() {
                println!("Specialisations available: {}.", options.join(", "));
            }
        }
        Commands::Summary { view, json } => {
            let engine = build_engine(&catalog, &view)?;
            let Some(snapshot) = engine.snapshot() else {
                println!("No data available for the current track selection.");
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(snapshot)?);
            } else {
                print!("{}", report::format_summary(snapshot, catalog.graduation_credits));
            }
        }
        Commands::Report { view, out } => {
            let engine = build_engine(&catalog, &view)?;
            let report = report::build_report(&engine, Utc::now().date_naive());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Plan {
            csv,
            target,
            modules,
            units,
        } => {
            let records = loader::load_csv(&csv, &catalog)
                .with_context(|| format!("failed to read transcript {}", csv.display()))?;
            let plan = HypotheticalPlan {
                target_cgpa: target,
                modules,
                units_per_module: units,
            };
            match ExhaustiveSolver::default().solve(&records, &plan) {
                Some(assignment) => {
                    let grades: Vec<String> =
                        assignment.grades.iter().map(ToString::to_string).collect();
                    println!(
                        "Grades needed across {} modules: {} (projected CGPA {:.2}).",
                        modules,
                        grades.join(", "),
                        assignment.projected_cgpa
                    );
                }
                None => println!("A CGPA of {target:.2} is out of reach with {modules} more modules."),
            }
        }
    }

    Ok(())
}
