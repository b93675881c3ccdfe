use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info};

use simple_flow2d::{
    FlowResult,
    initialization::{initialize_case, initialize_params, initialize_solver},
    io::{self, mesh_import::ImportedMesh, write_to_csv, write_to_vtu},
    solver::LogReporter,
};

/// Steady incompressible SIMPLE solver on a two-block step grid
#[derive(Parser)]
#[command(name = "simple-flow2d")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a case to convergence or the iteration limit
    Run {
        #[arg(default_value = "inputs/solverparam.json")]
        case: String,
        /// Output directory; defaults to outputs/<timestamp>
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse and validate a case without running it
    Validate {
        #[arg(default_value = "inputs/solverparam.json")]
        case: String,
    },
    /// Import a Gmsh .msh file or an OpenFOAM polyMesh directory and summarise it
    Mesh { path: PathBuf },
}

fn run(case_path: &str, output: Option<PathBuf>) -> FlowResult<()> {
    let params = initialize_params(case_path)?;
    let case = initialize_case(&params)?;
    let mut solver = initialize_solver(&case)?;
    let mut reporter = LogReporter {
        interval: params.output.log_interval,
    };
    let report = solver.run(&mut reporter)?;

    let output = output.or_else(|| params.output.directory.clone());
    let dir = io::prepare_output_dir(output.as_deref())?;
    if params.output.write_csv {
        write_to_csv::write_fields(dir.join("fields.csv"), &case.geometry, &solver.field)?;
        write_to_csv::write_residual_history(dir.join("residuals.csv"), &report.history)?;
    }
    if params.output.write_vtu {
        write_to_vtu::write_fields(dir.join("fields.vtu"), &case.geometry, &solver.field)?;
    }
    info!("results written to {}", dir.display());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let result = match cli.command {
        Commands::Run { case, output } => run(&case, output),
        Commands::Validate { case: case_path } => initialize_params(&case_path)
            .and_then(|params| initialize_case(&params))
            .map(|case| {
                info!(
                    "{case_path}: valid, {}x{} grid with {} active cells",
                    case.geometry.nx,
                    case.geometry.ny,
                    case.geometry.active_count()
                )
            }),
        Commands::Mesh { path } => ImportedMesh::load(&path).map(|mesh| {
            println!("Mesh loaded successfully!");
            println!("{}", mesh.summary());
        }),
    };
    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }
}

