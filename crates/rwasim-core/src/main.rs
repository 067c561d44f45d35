//! RWASim CLI: compare RWA strategies on an optical mesh network.

use clap::{Parser, Subcommand};
use rwasim_algorithms::{RoutingKind, WavelengthKind};
use rwasim_core::config::SimConfig;
use rwasim_core::metrics::{self, RunMetrics};
use rwasim_core::{FatalError, ProbeStyle};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "rwasim",
    about = "Simulate routing and wavelength assignment in optical networks",
    version
)]
struct Cli {
    /// Log per-connection and per-run diagnostics.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every run planned by a configuration file.
    Run {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker threads (defaults to `simulation.threads`).
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Compare routing and wavelength strategies with all workstations active.
    Compare {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated routing algorithm names (default: all).
        #[arg(short = 'R', long, value_delimiter = ',')]
        routing: Vec<String>,
        /// Comma-separated wavelength strategy names (default: FF).
        #[arg(short = 'W', long, value_delimiter = ',')]
        wavelength: Vec<String>,
        /// Probe style: single, serial or parallel.
        #[arg(short, long, default_value = "single")]
        style: String,
        /// Reject lightpaths below the Q-factor threshold.
        #[arg(short, long)]
        quality_aware: bool,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the run plan without executing it.
    Plan {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List available algorithms.
    ListAlgorithms,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Run {
            config,
            output,
            threads,
        } => {
            let sim_config = load_config(&config);
            let threads = threads.unwrap_or(sim_config.simulation.threads);
            let results = rwasim_core::run_simulation(&sim_config, threads)
                .unwrap_or_else(|e| exit_fatal(e));

            for result in &results {
                println!("{}", metrics::format_table(result));
            }
            if results.len() > 1 {
                println!("{}", metrics::format_comparison_table(&results));
            }
            write_output(output.as_deref(), &results);
        }
        Commands::Compare {
            config,
            routing,
            wavelength,
            style,
            quality_aware,
            output,
        } => {
            let sim_config = load_config(&config);
            let routing: Vec<RoutingKind> = if routing.is_empty() {
                RoutingKind::ALL.to_vec()
            } else {
                routing
                    .iter()
                    .map(|name| {
                        RoutingKind::from_name(name).unwrap_or_else(|| {
                            eprintln!(
                                "Unknown routing algorithm: {}. Available: {:?}",
                                name,
                                rwasim_algorithms::available_routing()
                            );
                            std::process::exit(1);
                        })
                    })
                    .collect()
            };
            let wavelength: Vec<WavelengthKind> = if wavelength.is_empty() {
                vec![WavelengthKind::FirstFit]
            } else {
                wavelength
                    .iter()
                    .map(|name| {
                        WavelengthKind::from_name(name).unwrap_or_else(|| {
                            eprintln!(
                                "Unknown wavelength strategy: {}. Available: {:?}",
                                name,
                                rwasim_algorithms::available_wavelength()
                            );
                            std::process::exit(1);
                        })
                    })
                    .collect()
            };
            let style = ProbeStyle::from_name(&style).unwrap_or_else(|| {
                eprintln!("Unknown probe style: {}. Use single, serial or parallel.", style);
                std::process::exit(1);
            });

            let results = rwasim_core::compare_algorithms(
                &sim_config,
                &routing,
                &wavelength,
                style,
                quality_aware,
            )
            .unwrap_or_else(|e| exit_fatal(e));
            println!("{}", metrics::format_comparison_table(&results));
            write_output(output.as_deref(), &results);
        }
        Commands::Plan { config } => {
            let sim_config = load_config(&config);
            let runs = rwasim_core::plan(&sim_config).unwrap_or_else(|e| {
                eprintln!("Error planning runs: {}", e);
                std::process::exit(1);
            });
            println!(
                "{} runs on topology '{}' ({} workstations, {} threads):",
                runs.len(),
                sim_config.topology.name,
                sim_config.topology.workstation_count(),
                sim_config.simulation.threads
            );
            for run in &runs {
                println!(
                    "  {:>3}  {:<7} {:<7} {:<9} {:<3} ws={}",
                    run.index,
                    run.routing.name(),
                    run.wavelength.name(),
                    run.probe_style.name(),
                    if run.quality_aware { "QA" } else { "" },
                    run.workstations
                );
            }
        }
        Commands::ListAlgorithms => {
            println!("Available routing algorithms:");
            for name in rwasim_algorithms::available_routing() {
                println!("  - {}", name);
            }
            println!("Available wavelength strategies:");
            for name in rwasim_algorithms::available_wavelength() {
                println!("  - {}", name);
            }
            println!("Probe styles:");
            for style in ProbeStyle::ALL {
                println!("  - {}", style.name());
            }
        }
    }
}

fn load_config(path: &Path) -> SimConfig {
    SimConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    })
}

fn exit_fatal(e: FatalError) -> ! {
    log::error!("simulation aborted: {}", e);
    std::process::exit(e.code());
}

fn write_output(path: Option<&Path>, results: &[RunMetrics]) {
    let Some(output_path) = path else {
        return;
    };
    let json = serde_json::to_string_pretty(results).unwrap_or_else(|e| {
        eprintln!("Error serializing results: {}", e);
        std::process::exit(1);
    });
    std::fs::write(output_path, json).unwrap_or_else(|e| {
        eprintln!("Error writing output: {}", e);
        std::process::exit(1);
    });
    println!("Results written to {}", output_path.display());
}
