//! Основной файл библиотеки narration-sync
//!
//! Библиотека озвучивает готовые видео: текст делится на фрагменты,
//! каждый синтезируется через ElevenLabs, фрагменты склеиваются в одну
//! дорожку, а затем дорожка сводится с видео с учётом разницы длительностей.
//! Результат кэшируется по имени видео.

pub mod background;
pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod notification;
pub mod pipeline;
pub mod progress;
pub mod script;
pub mod topics;
pub mod tts;
pub mod utils;

use std::path::{Path, PathBuf};

pub use crate::background::{lookup_or_spawn, spawn_narration, BackgroundNarration, NarrationLookup, NarrationStatus};
pub use crate::config::NarrationConfig;
pub use crate::error::{NarrationError, Result};
pub use crate::media::{DurationProbe, Ffmpeg, MediaProcessor, MergeStrategy};
pub use crate::pipeline::{NarrationOutcome, NarrationPipeline};
pub use crate::progress::{JobStage, ProgressObserver, ProgressTracker};
pub use crate::script::{NarrationSegments, NarrationSource};
pub use crate::tts::{ElevenLabsClient, SpeechSynthesizer};

/// Озвучить видео цельным сценарием с ElevenLabs и ffmpeg
pub async fn narrate_script(
    video_path: impl AsRef<Path>,
    script: impl Into<String>,
    config: NarrationConfig,
) -> Result<PathBuf> {
    let pipeline = NarrationPipeline::from_config(config)?;
    let outcome = pipeline
        .narrate(video_path.as_ref(), &NarrationSource::Script(script.into()))
        .await?;
    Ok(outcome.path)
}

/// Озвучить видео шестью сегментами с отслеживанием прогресса
pub async fn narrate_segments_with_progress(
    video_path: impl AsRef<Path>,
    segments: NarrationSegments,
    config: NarrationConfig,
    observer: Box<dyn ProgressObserver>,
) -> Result<PathBuf> {
    let pipeline = NarrationPipeline::from_config(config)?;
    let mut tracker = ProgressTracker::new();
    tracker.add_observer(observer);

    let outcome = pipeline
        .narrate_with_progress(
            video_path.as_ref(),
            &NarrationSource::Segments(segments),
            Some(&tracker),
        )
        .await?;
    Ok(outcome.path)
}
