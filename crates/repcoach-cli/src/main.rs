//! RepCoach CLI
//!
//! Serves a live counting session over HTTP/WebSocket, or replays a recorded
//! landmark stream and prints the counts.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use repcoach_core::{
    create_router, AppState, Config, ExerciseId, FrameResult, ReplaySummary, Replayer,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// RepCoach - repetition counting from pose landmarks
///
/// Classifies pose-landmark frames into exercise repetitions and gives
/// form feedback for squats, lunges, dumbbell curls and shoulder presses.
#[derive(Parser, Debug)]
#[command(name = "repcoach")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: repcoach.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP/WebSocket bridge for a live pose producer and renderer
    Serve {
        /// Interface to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Exercise selected at startup (overrides defaultExercise)
        #[arg(short, long)]
        exercise: Option<ExerciseId>,
    },

    /// Replay a JSON-lines landmark recording ("-" reads stdin)
    Replay {
        /// Recording to replay
        #[arg(value_name = "FILE")]
        input: String,

        /// Exercise selected before the first frame (overrides defaultExercise)
        #[arg(short, long)]
        exercise: Option<ExerciseId>,

        /// Print each frame result and the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr so replay output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    let result = match args.command {
        Command::Serve {
            host,
            port,
            exercise,
        } => run_serve(args.config.as_deref(), host, port, exercise).await,
        Command::Replay {
            input,
            exercise,
            json,
        } => run_replay(args.config.as_deref(), &input, exercise, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the live bridge until Ctrl+C.
async fn run_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    exercise: Option<ExerciseId>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(exercise) = exercise {
        config.default_exercise = exercise;
    }
    config.validate()?;
    print_config(&config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            anyhow::anyhow!(
                "Invalid bind address '{}:{}': {e}\n\nSuggestion: Use an IP address for --host",
                config.server.host,
                config.server.port
            )
        })?;

    let state = AppState::new(config.clone())?;
    state.session.select_exercise(config.default_exercise).await;
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("RepCoach running on http://{addr}");
    println!("  POST /api/exercise  select an exercise");
    println!("  POST /api/frame     submit a landmark frame");
    println!("  GET  /api/status    session snapshot");
    println!("  GET  /ws            event stream");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    println!("Stopped");
    Ok(())
}

/// Replays a recording and prints per-frame results plus a summary.
fn run_replay(
    config_path: Option<&Path>,
    input: &str,
    exercise: Option<ExerciseId>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let exercise = exercise.unwrap_or(config.default_exercise);
    let replayer = Replayer::new(&config, exercise)?;

    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(input).map_err(|e| {
            anyhow::anyhow!("Cannot open recording '{input}': {e}\n\nSuggestion: Check the path")
        })?;
        Box::new(BufReader::new(file))
    };

    let mut frame_index = 0u64;
    let summary = replayer.run(reader, |result| {
        frame_index += 1;
        if json {
            match serde_json::to_string(result) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize frame result"),
            }
        } else {
            print_frame(frame_index, result);
        }
    })?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Loads configuration from `config_path` or the working directory.
fn load_config(config_path: Option<&Path>) -> anyhow::Result<Config> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Exercise: {}", config.default_exercise);
    println!("  Feedback duration: {}ms", config.feedback_duration_ms);
    println!(
        "  Calibration band: [{}, {}]",
        config.calibration.center_min, config.calibration.center_max
    );
    println!("  Min visibility: {}", config.min_visibility);
    println!("  Side: {:?}", config.side);
}

fn print_frame(index: u64, result: &FrameResult) {
    if result.stale {
        println!("#{index:<5} stale");
        return;
    }
    let feedback = result
        .feedback
        .as_ref()
        .map(|event| format!("[{}] {}", event.tier, event.text))
        .unwrap_or_default();
    let marker = if result.counted { " +1" } else { "" };
    let signal = if result.signal { "" } else { " (no signal)" };
    println!(
        "#{index:<5} {:<14} {:<4} reps={}{marker}{signal} {feedback}",
        result.exercise.to_string(),
        result.state.to_string(),
        result.rep_count
    );
}

fn print_summary(summary: &ReplaySummary) {
    println!();
    println!("Replay summary:");
    for segment in &summary.segments {
        println!(
            "  {}: {} reps, calibrated={}, frames={}, without signal={}",
            segment.exercise,
            segment.reps,
            segment.calibrated,
            segment.frames_processed,
            segment.frames_without_signal
        );
    }
    println!("  Total frames: {}", summary.frames_processed());
}
