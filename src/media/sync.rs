//! Модуль для синхронизации озвучки с видео
//!
//! Сравнивает длительности аудио и видео и выбирает способ сведения:
//! замедление видео, дополнение аудио тишиной или прямое наложение.

use std::path::Path;
use crate::error::{NarrationError, Result};
use crate::media::MediaProcessor;

/// Измеренные длительности, в секундах
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationProbe {
    pub audio_secs: f64,
    pub video_secs: f64,
}

impl DurationProbe {
    /// Расхождение `audio - video`
    pub fn diff(&self) -> f64 {
        self.audio_secs - self.video_secs
    }
}

/// Способ сведения аудио и видео
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergeStrategy {
    /// Аудио заметно длиннее: видео замедляется в `ratio` раз
    SlowVideo { ratio: f64 },
    /// Аудио заметно короче: дополняется тишиной до `target_secs`
    PadAudio { target_secs: f64 },
    /// Длительности близки
    Direct,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlowVideo { .. } => "slow-video",
            Self::PadAudio { .. } => "pad-audio",
            Self::Direct => "direct",
        }
    }
}

/// Выбрать стратегию сведения
///
/// Границы строгие: расхождение ровно в `threshold` секунд даёт `Direct`.
/// Нулевая длительность видео после неудачного измерения даёт бесконечный
/// коэффициент, такое сведение отвергается в [`apply_strategy`].
pub fn select_strategy(probe: DurationProbe, threshold: f64) -> MergeStrategy {
    let diff = probe.diff();

    if diff > threshold {
        MergeStrategy::SlowVideo {
            ratio: probe.audio_secs / probe.video_secs,
        }
    } else if diff < -threshold {
        MergeStrategy::PadAudio {
            target_secs: probe.video_secs,
        }
    } else {
        MergeStrategy::Direct
    }
}

async fn probe_or_zero<M>(media: &M, path: &Path, strict: bool) -> Result<f64>
where
    M: MediaProcessor + ?Sized,
{
    match media.probe_duration(path).await {
        Ok(secs) => Ok(secs),
        Err(e) if strict => Err(e),
        Err(e) => {
            log::warn!("[probe] {}: {}, assuming 0s", path.display(), e);
            Ok(0.0)
        }
    }
}

/// Измерить длительности аудио и видео
///
/// Без строгого режима ошибка измерения превращается в 0 с предупреждением.
pub async fn measure_durations<M>(media: &M, audio: &Path, video: &Path, strict: bool) -> Result<DurationProbe>
where
    M: MediaProcessor + ?Sized,
{
    let audio_secs = probe_or_zero(media, audio, strict).await?;
    let video_secs = probe_or_zero(media, video, strict).await?;
    Ok(DurationProbe { audio_secs, video_secs })
}

/// Свести аудио с видео заранее выбранным способом
///
/// `padded` используется только для дополнения тишиной и удаляется после
/// успешного сведения.
pub async fn apply_strategy<M>(
    media: &M,
    strategy: MergeStrategy,
    video: &Path,
    audio: &Path,
    padded: &Path,
    output: &Path,
) -> Result<()>
where
    M: MediaProcessor + ?Sized,
{
    match strategy {
        MergeStrategy::SlowVideo { ratio } => {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(NarrationError::Mux(format!(
                    "Cannot slow video by ratio {} (video duration unknown)",
                    ratio
                )));
            }
            log::info!("[merge] slowing video by {:.4}x", ratio);
            media.stretch_merge(video, audio, output, ratio).await?;
        }
        MergeStrategy::PadAudio { target_secs } => {
            log::info!("[merge] padding audio to {:.1}s", target_secs);
            media.pad_audio(audio, padded, target_secs).await?;
            media.direct_merge(video, padded, output).await?;
            if let Err(e) = tokio::fs::remove_file(padded).await {
                log::warn!("Failed to remove {}: {}", padded.display(), e);
            }
        }
        MergeStrategy::Direct => {
            media.direct_merge(video, audio, output).await?;
        }
    }
    Ok(())
}

/// Записать в журнал измерения и выбранную стратегию
pub fn log_decision(probe: DurationProbe, strategy: MergeStrategy) {
    log::info!(
        "[merge] audio={:.1}s video={:.1}s diff={:+.1}s -> {}",
        probe.audio_secs,
        probe.video_secs,
        probe.diff(),
        strategy.as_str()
    );
}
