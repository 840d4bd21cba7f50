use std::path::PathBuf;
use std::time::Instant;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use narration_sync::config::NarrationConfig;
use narration_sync::media::{Ffmpeg, MediaProcessor};
use narration_sync::notification::{CompositeProgressObserver, ConsoleProgressObserver, LogProgressObserver};
use narration_sync::script::{split_into_chunks, NarrationSegments, NarrationSource};
use narration_sync::topics::TopicTable;
use narration_sync::utils::logger::init_logger;
use narration_sync::{NarrationOutcome, NarrationPipeline, ProgressTracker};

#[derive(Parser)]
#[command(name = "narration-sync")]
#[command(about = "Narrate rendered videos with ElevenLabs and ffmpeg", long_about = None)]
struct Cli {
    /// JSON config file (defaults to environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Force-regenerate narration for scenes from a topic table
    Regen {
        /// Topic table (JSON)
        #[arg(short, long, env = "NARRATION_TOPICS")]
        topics: PathBuf,

        /// Scene keys (all scenes when empty)
        scenes: Vec<String>,
    },

    /// Narrate a single video
    Narrate {
        /// Input video
        #[arg(long)]
        video: PathBuf,

        /// Plain-text script
        #[arg(long, conflicts_with = "segments", required_unless_present = "segments")]
        script: Option<PathBuf>,

        /// Six-segment narration (JSON)
        #[arg(long)]
        segments: Option<PathBuf>,

        /// Delete existing output first
        #[arg(long)]
        force: bool,
    },

    /// Show how a script would be chunked
    Split {
        #[arg(long)]
        script: PathBuf,

        #[arg(long, default_value_t = narration_sync::config::DEFAULT_MAX_CHUNK_CHARS)]
        max_chars: usize,
    },

    /// Print media durations
    Probe {
        files: Vec<PathBuf>,

        #[arg(long, env = "NARRATION_FFPROBE", default_value = "ffprobe")]
        ffprobe: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<NarrationConfig> {
    let config = match path {
        Some(path) => NarrationConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => NarrationConfig::from_env().context("Failed to read configuration from environment")?,
    };
    Ok(config)
}

fn tracker_for(label: &str) -> ProgressTracker {
    let mut observers = CompositeProgressObserver::new();
    observers.add_observer(Box::new(ConsoleProgressObserver::with_prefix(format!("[{}] ", label))));
    observers.add_observer(Box::new(LogProgressObserver));

    let mut tracker = ProgressTracker::new();
    tracker.add_observer(Box::new(observers));
    tracker
}

async fn regen(config: NarrationConfig, topics: PathBuf, scenes: Vec<String>) -> Result<()> {
    let table = TopicTable::load(&topics)?;
    let scenes = if scenes.is_empty() {
        table.keys().map(str::to_string).collect()
    } else {
        scenes
    };
    let pipeline = NarrationPipeline::from_config(config)?;
    match pipeline.media().version().await {
        Ok(version) => log::info!("Using {}", version),
        Err(e) => log::warn!("Could not read ffmpeg version: {}", e),
    }

    for key in &scenes {
        println!("{}", "=".repeat(60));
        let topic = table.get(key)?;
        let video = topic.ensure_video()?;
        let source = topic.load_source()?;
        println!("Scene: {} ({})", key, topic.title);
        println!("Video: {}", video.display());
        println!("Script: {} words", source.word_count());

        let started = Instant::now();
        let tracker = tracker_for(key);
        let outcome = pipeline
            .regenerate_with_progress(video, &source, Some(&tracker))
            .await
            .with_context(|| format!("Narration failed for {}", key))?;

        let size = tokio::fs::metadata(&outcome.path)
            .await
            .with_context(|| format!("Failed to stat {}", outcome.path.display()))?
            .len();
        for line in describe_outcome(&outcome, size, started.elapsed().as_secs_f64()) {
            println!("{}", line);
        }
    }

    println!("Regenerated {} scene(s)", scenes.len());
    Ok(())
}

fn describe_outcome(outcome: &NarrationOutcome, size_bytes: u64, elapsed_secs: f64) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(probe) = outcome.probe {
        lines.push(format!(
            "Audio: {:.1}s, video: {:.1}s (diff {:+.1}s)",
            probe.audio_secs,
            probe.video_secs,
            probe.diff()
        ));
    }
    lines.push(format!(
        "Done in {:.1}s: {} ({:.1} MB, {} chunks, {})",
        elapsed_secs,
        outcome.path.display(),
        size_bytes as f64 / (1024.0 * 1024.0),
        outcome.chunks,
        outcome.strategy.map(|s| s.as_str()).unwrap_or("cached")
    ));
    lines
}

async fn narrate(
    config: NarrationConfig,
    video: PathBuf,
    script: Option<PathBuf>,
    segments: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let source = match (script, segments) {
        (_, Some(path)) => NarrationSource::Segments(NarrationSegments::from_file(&path)?),
        (Some(path), None) => NarrationSource::Script(
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        (None, None) => bail!("Either --script or --segments is required"),
    };

    let pipeline = NarrationPipeline::from_config(config)?;
    let label = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let tracker = tracker_for(&label);

    let outcome = if force {
        pipeline.regenerate_with_progress(&video, &source, Some(&tracker)).await?
    } else {
        pipeline.narrate_with_progress(&video, &source, Some(&tracker)).await?
    };

    if outcome.cache_hit {
        println!("Cached: {}", outcome.path.display());
    } else {
        println!("Narrated: {}", outcome.path.display());
    }
    Ok(())
}

fn split(script: PathBuf, max_chars: usize) -> Result<()> {
    if max_chars == 0 {
        bail!("--max-chars must be greater than zero");
    }
    let text = std::fs::read_to_string(&script)
        .with_context(|| format!("Failed to read {}", script.display()))?;
    let chunks = split_into_chunks(&text, max_chars);

    println!("{} chunk(s)", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        println!("  chunk{}: {} chars", i + 1, chunk.chars().count());
    }
    Ok(())
}

async fn probe(files: Vec<PathBuf>, ffprobe: PathBuf) -> Result<()> {
    let config = NarrationConfig {
        probe_tool_path: ffprobe,
        ..NarrationConfig::new(".", "", "")
    };
    let media = Ffmpeg::from_config(&config);

    for file in &files {
        match media.probe_duration(file).await {
            Ok(secs) => println!("{}\t{:.3}", file.display(), secs),
            Err(e) => println!("{}\terror: {}", file.display(), e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Regen { topics, scenes } => {
            let config = load_config(cli.config.as_ref())?;
            regen(config, topics, scenes).await
        }
        Commands::Narrate { video, script, segments, force } => {
            let config = load_config(cli.config.as_ref())?;
            narrate(config, video, script, segments, force).await
        }
        Commands::Split { script, max_chars } => split(script, max_chars),
        Commands::Probe { files, ffprobe } => probe(files, ffprobe).await,
    }
}
