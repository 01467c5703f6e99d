//! Chesslab engine - drive UCI chess engines and collect multi-PV analysis.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chesslab_engine::config::ConfigLoader;
use chesslab_engine::display;
use chesslab_engine::engine::{analyse_once, EngineProcess};

#[derive(Parser)]
#[command(
    name = "chesslab-engine",
    about = "Drive a UCI chess engine and report ranked candidate lines",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to load instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Engine binary (overrides config and STOCKFISH_PATH).
    #[arg(long, global = true)]
    engine: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a position and print the ranked lines.
    Analyse {
        /// Position in FEN.
        fen: String,
        /// Search depth in plies.
        #[arg(short, long, conflicts_with = "movetime")]
        depth: Option<u32>,
        /// Search time in milliseconds.
        #[arg(short, long)]
        movetime: Option<u64>,
        /// Number of ranked lines to request.
        #[arg(short = 'n', long)]
        multipv: Option<u32>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check that the engine starts and completes the handshake.
    Probe,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path)
        .binary(cli.engine);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Analyse {
            fen,
            depth,
            movetime,
            multipv,
            json,
        } => {
            let request = config.request(&fen, depth, movetime, multipv);
            tracing::info!(
                fen = %request.fen,
                limit = ?request.limit,
                multipv = request.multipv,
                binary = %config.binary,
                "Starting analysis"
            );

            match analyse_once(&config, &request).await {
                Ok(results) if json => match serde_json::to_string_pretty(&results) {
                    Ok(out) => {
                        println!("{out}");
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        display::print_error(&e.to_string());
                        ExitCode::FAILURE
                    }
                },
                Ok(results) => {
                    display::print_results(&fen, &results);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    display::print_error(&e.to_string());
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Probe => match EngineProcess::start(&config).await {
            Ok(mut engine) => {
                display::print_probe(&config.binary, true);
                if let Err(e) = engine.shutdown().await {
                    tracing::warn!(error = %e, "Engine shutdown failed");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                display::print_probe(&config.binary, false);
                display::print_error(&e.to_string());
                ExitCode::FAILURE
            }
        },
    }
}
