use clap::{Parser, Subcommand};
use rcv_tabulator::{config::ContestConfig, model::CastVoteRecord, tabulator};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a contest configuration file without tabulating anything.
    Validate {
        /// Path to a ContestConfig JSON file.
        config: PathBuf,
    },
    /// Tabulate a contest and print the result as JSON.
    Tabulate {
        /// Path to a ContestConfig JSON file.
        config: PathBuf,
        /// Path to a JSON array of CastVoteRecord values.
        cvrs: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Result<ContestConfig, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("parsing {}: {e}", path.display()))
}

fn load_cvrs(path: &PathBuf) -> Result<Vec<CastVoteRecord>, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("parsing {}: {e}", path.display()))
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    match opts.command {
        Command::Validate { config } => {
            let config = match load_config(&config) {
                Ok(c) => c,
                Err(e) => {
                    rcv_tabulator::log_error!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            match config.validate() {
                Ok(()) => {
                    rcv_tabulator::log_info!("configuration is valid");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    rcv_tabulator::log_error!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Tabulate { config, cvrs } => {
            let config = match load_config(&config) {
                Ok(c) => c,
                Err(e) => {
                    rcv_tabulator::log_error!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            let cvrs = match load_cvrs(&cvrs) {
                Ok(c) => c,
                Err(e) => {
                    rcv_tabulator::log_error!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            match tabulator::run(&config, cvrs, || false) {
                Ok(result) => {
                    let winners: Vec<String> = result.winner_to_round.keys().map(|c| c.to_string()).collect();
                    rcv_tabulator::log_info!("winners: {}", winners.join(", "));
                    match serde_json::to_string_pretty(&result.round_tallies) {
                        Ok(json) => {
                            println!("{json}");
                            ExitCode::SUCCESS
                        }
                        Err(e) => {
                            rcv_tabulator::log_error!("serializing result: {e}");
                            ExitCode::FAILURE
                        }
                    }
                }
                Err(e) => {
                    rcv_tabulator::log_error!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
