//! score-aca CLI - Bicep manifests from provisioning state
//!
//! Commands: workloads, convert, inspect
//! Manifests go to stdout (or files), logs go to stderr
//! Returns 2 when any workload fails to convert

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use scoreaca_core::{ConversionPipeline, ConvertedManifest, State};

#[derive(Parser)]
#[command(name = "score-aca")]
#[command(about = "score-aca - Score workloads to Azure Container Apps Bicep")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the provisioning state (YAML or JSON)
    #[arg(short, long, global = true, default_value = ".score-aca/state.yaml")]
    state: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List workloads in the state
    Workloads,

    /// Convert workloads into Bicep manifests
    Convert {
        /// Only convert this workload
        #[arg(short, long)]
        workload: Option<String>,

        /// Write `<workload>.bicep` files here instead of printing
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show findings and digests for one workload as JSON
    Inspect {
        /// Workload name
        #[arg(short, long)]
        workload: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let state = match State::load(&cli.state) {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let pipeline = ConversionPipeline::new();

    match cli.command {
        Commands::Workloads => {
            let names: Vec<_> = state.workload_names().collect();
            print_json(&serde_json::json!(names))
        }

        Commands::Convert { workload, output_dir } => {
            let results = match workload {
                Some(name) => vec![pipeline.convert_workload(&state, &name)],
                None => pipeline.convert_all(&state),
            };

            let mut failed = false;
            for result in results {
                let written = match result {
                    Ok(converted) => emit(&converted, output_dir.as_deref()),
                    Err(e) => Err(e.to_string()),
                };
                if let Err(message) = written {
                    error!("{message}");
                    failed = true;
                }
            }

            if failed {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }

        Commands::Inspect { workload } => match pipeline.convert_workload(&state, &workload) {
            Ok(converted) => print_json(&serde_json::json!({
                "workload": converted.workload_name,
                "engineVersion": converted.engine_version,
                "manifestHash": converted.manifest_hash,
                "inputHash": converted.input_hash,
                "findings": converted.findings,
            })),
            Err(e) => {
                error!("{e}");
                ExitCode::from(2)
            }
        },
    }
}

fn emit(converted: &ConvertedManifest, output_dir: Option<&Path>) -> Result<(), String> {
    let Some(dir) = output_dir else {
        print!("{}", converted.manifest);
        return Ok(());
    };

    let path = dir.join(format!("{}.bicep", converted.workload_name));
    fs::create_dir_all(dir)
        .and_then(|_| fs::write(&path, &converted.manifest))
        .map_err(|e| format!("failed to write '{}': {e}", path.display()))?;
    info!(workload = %converted.workload_name, path = %path.display(), "wrote manifest");
    Ok(())
}

fn print_json(value: &serde_json::Value) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("failed to encode output: {e}");
            ExitCode::FAILURE
        }
    }
}
