//! Aethermind Perception CLI
//!
//! Chunks recorded sessions, emits event seeds and scores events.

use aethermind_perception::{
    config::Config,
    media::FfmpegBackend,
    session::{merge_vectors_file, RunOptions, SessionInputs, SessionRunner},
    VERSION,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aethermind-perception")]
#[command(version = VERSION)]
#[command(about = "Temporal alignment and event-seed emission for recorded sessions", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a session, emit seeds and score events
    Run {
        /// Folder holding the .mp4, .wav, *actions.jsonl and optional session.json
        #[arg(long)]
        folder: Option<PathBuf>,

        /// Video file (overrides --folder)
        #[arg(long)]
        video: Option<PathBuf>,

        /// Audio file (overrides --folder)
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Action log (overrides --folder)
        #[arg(long)]
        actions: Option<PathBuf>,

        /// Window length in seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Root output directory
        #[arg(long)]
        out: Option<PathBuf>,

        /// Epoch seconds of the first video frame
        #[arg(long)]
        stream_start: Option<f64>,

        /// Scoring worker threads
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Re-score an existing session directory
    Score {
        /// Session output directory containing session.json
        session_dir: PathBuf,
    },

    /// Join external feature vectors onto chunks by midpoint time
    MergeVectors {
        /// session_events.json, chunks.json or session.json
        #[arg(long)]
        chunks: PathBuf,

        /// JSONL of {t, x} records
        #[arg(long)]
        vectors: PathBuf,

        /// Where to write the merged document
        #[arg(long)]
        output: PathBuf,

        /// Seconds added to each vector's t (defaults to clock.vector_offset_secs)
        #[arg(long)]
        offset: Option<f64>,
    },

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            folder,
            video,
            audio,
            actions,
            duration,
            out,
            stream_start,
            workers,
        } => load_config(cli.config.as_deref()).and_then(|mut config| {
            if let Some(secs) = duration {
                config.chunk_duration = Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .with_context(|| format!("invalid --duration {secs}"))?;
            }
            if let Some(out) = out {
                config.output_dir = out;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            cmd_run(config, folder, video, audio, actions, stream_start)
        }),
        Commands::Score { session_dir } => {
            load_config(cli.config.as_deref()).and_then(|config| cmd_score(config, &session_dir))
        }
        Commands::MergeVectors {
            chunks,
            vectors,
            output,
            offset,
        } => load_config(cli.config.as_deref())
            .and_then(|config| cmd_merge_vectors(config, &chunks, &vectors, &output, offset)),
        Commands::Config => cmd_config(cli.config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("Failed to load configuration")
}

fn cmd_run(
    config: Config,
    folder: Option<PathBuf>,
    video: Option<PathBuf>,
    audio: Option<PathBuf>,
    actions: Option<PathBuf>,
    stream_start: Option<f64>,
) -> Result<()> {
    println!("Aethermind Perception v{VERSION}");
    println!();

    let inputs = SessionInputs::resolve(folder.as_deref(), video, audio, actions)
        .context("Could not resolve session inputs")?;
    println!("  Video:   {}", inputs.video.display());
    println!("  Audio:   {}", inputs.audio.display());
    println!("  Actions: {}", inputs.actions.display());
    println!("  Window duration: {}s", config.chunk_duration.as_secs_f64());
    println!();

    let backend = FfmpegBackend::default();
    let runner = SessionRunner::new(config, &backend);
    let options = RunOptions {
        stream_start,
        session_id: None,
    };
    let report = runner.run(&inputs, &options).context("Session run failed")?;

    println!("Session {}", report.session_id);
    println!("  Output:  {}", report.output_dir.display());
    println!("  Seeds:   {}", report.seeds_path.display());
    println!(
        "  Chunks:  {} ({} events detected)",
        report.summary.chunks, report.summary.events
    );
    println!("  Run id:  {}", report.run_id);
    Ok(())
}

fn cmd_score(config: Config, session_dir: &Path) -> Result<()> {
    let backend = FfmpegBackend::default();
    let runner = SessionRunner::new(config, &backend);
    let chunks = runner
        .score_session(session_dir)
        .with_context(|| format!("Failed to score {}", session_dir.display()))?;

    let events = chunks.iter().filter(|c| c.is_event).count();
    println!(
        "Event detection complete. {} of {} chunks are events.",
        events,
        chunks.len()
    );
    Ok(())
}

fn cmd_merge_vectors(
    config: Config,
    chunks: &Path,
    vectors: &Path,
    output: &Path,
    offset: Option<f64>,
) -> Result<()> {
    let offset = offset.unwrap_or(config.clock.vector_offset_secs);
    let attached = merge_vectors_file(chunks, vectors, output, offset)
        .context("Failed to merge vectors")?;
    println!("Attached {attached} vectors → {}", output.display());
    Ok(())
}

fn cmd_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!(
        "Config file: {:?}",
        path.map(Path::to_path_buf).unwrap_or_else(Config::config_path)
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
