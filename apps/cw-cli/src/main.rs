use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use cw_app::{
    AppResult, PipelineDriver, PipelineReport, RunProgressEvent, StageSelection,
};
use cw_core::timing::format_seconds;
use cw_project::RoutingMode;

#[derive(Parser)]
#[command(name = "cw-cli")]
#[command(about = "CrossWater CLI - basin-scale micropollutant load modelling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Populate the catchment store from the input tables
    Import {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Run the transfer model over every catchment in the store
    Transfer {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Route transfer results to the selected outlets
    Route {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Override the routing mode from the project file
        #[arg(long)]
        mode: Option<ModeArg>,
    },
    /// Run import, transfer, and routing in sequence
    Run {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Aggregate,
    ExportModel,
}

impl From<ModeArg> for RoutingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Aggregate => RoutingMode::Aggregate,
            ModeArg::ExportModel => RoutingMode::ExportModel,
        }
    }
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Import { project_path } => {
            cmd_stage(&project_path, None, StageSelection::ImportOnly)
        }
        Commands::Transfer { project_path } => {
            cmd_stage(&project_path, None, StageSelection::TransferOnly)
        }
        Commands::Route { project_path, mode } => {
            cmd_stage(&project_path, mode, StageSelection::RouteOnly)
        }
        Commands::Run { project_path } => cmd_stage(&project_path, None, StageSelection::Full),
    }
}

fn cmd_validate(project_path: &Path) -> AppResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = cw_project::load_yaml(project_path)?;
    println!(
        "✓ Project '{}' is valid ({} substances, {} outlets, {} steps)",
        project.name,
        project.substances.len(),
        project.routing.outlets.len(),
        project.period.steps
    );
    Ok(())
}

fn cmd_stage(
    project_path: &Path,
    mode_override: Option<ModeArg>,
    selection: StageSelection,
) -> AppResult<()> {
    let mut project = cw_project::load_yaml(project_path)?;
    if let Some(mode) = mode_override {
        project.routing.mode = mode.into();
    }

    let mut driver = PipelineDriver::new(project);
    let mut last_stage = String::new();
    let report = driver.run(
        selection,
        Some(&mut |event: RunProgressEvent| {
            let label = event.stage.label().to_string();
            if label != last_stage {
                println!("[{}] {}", format_seconds(event.elapsed_wall_s), label);
                last_stage = label;
            }
        }),
    )?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    if let Some(import) = &report.import {
        println!(
            "✓ Imported {} catchments ({} filtered out, {} time steps)",
            import.imported, import.skipped, import.steps
        );
    }
    if let Some(transfer) = &report.transfer {
        for substance in &transfer.substances {
            println!(
                "✓ Transfer '{}': {} completed, {} convergence failures",
                substance.substance,
                substance.completed,
                substance.failed_convergence.len()
            );
            if !substance.failed_convergence.is_empty() {
                let ids: Vec<String> = substance
                    .failed_convergence
                    .iter()
                    .map(|id| id.to_string())
                    .collect();
                println!("  failed catchments: {}", ids.join(", "));
            }
        }
    }
    if let Some(route) = &report.route {
        println!("✓ Routing wrote {} file(s):", route.outputs.len());
        for path in &route.outputs {
            println!("  {}", path.display());
        }
        if !route.missing.is_empty() {
            println!(
                "  {} catchment(s) contributed no data (treated as zero)",
                route.missing.len()
            );
        }
    }
}
