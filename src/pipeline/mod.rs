//! Конвейер озвучки видео
//!
//! Одно задание выполняется последовательно:
//! разбиение текста, синтез фрагментов, склейка, измерение длительностей,
//! сведение с видео, очистка. Любая ошибка прерывает задание, временные
//! файлы при этом остаются для диагностики.
//!
//! Задания для разных видео могут идти параллельно. Два задания с одним
//! базовым именем выполняются по очереди: второе дожидается первого и
//! находит готовый результат в кэше.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use crate::config::NarrationConfig;
use crate::error::{NarrationError, Result};
use crate::job::{AudioChunk, NarrationJob};
use crate::media::audio::concat_or_copy;
use crate::media::sync::{apply_strategy, log_decision, measure_durations, select_strategy};
use crate::media::{DurationProbe, Ffmpeg, MediaProcessor, MergeStrategy};
use crate::progress::{JobStage, ProgressTracker};
use crate::script::NarrationSource;
use crate::tts::{ElevenLabsClient, SpeechSynthesizer};

#[cfg(test)]
mod tests;

/// Результат задания озвучки
#[derive(Debug, Clone)]
pub struct NarrationOutcome {
    /// Абсолютный путь к озвученному видео
    pub path: PathBuf,
    /// Результат взят из кэша, ничего не синтезировалось
    pub cache_hit: bool,
    /// Количество синтезированных фрагментов
    pub chunks: usize,
    pub probe: Option<DurationProbe>,
    pub strategy: Option<MergeStrategy>,
}

impl NarrationOutcome {
    fn cached(path: PathBuf) -> Self {
        Self {
            path,
            cache_hit: true,
            chunks: 0,
            probe: None,
            strategy: None,
        }
    }
}

/// Конвейер озвучки с подключаемыми синтезатором и медиа-процессором
pub struct NarrationPipeline<S, M> {
    config: NarrationConfig,
    synthesizer: S,
    media: M,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Блокировка базового имени, взятая из общей карты
///
/// При удалении (в том числе при отмене задания) запись убирается из карты,
/// если её больше никто не держит.
struct NameLock<'a> {
    locks: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    base_name: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for NameLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // в карте и у нас
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.base_name);
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

impl NarrationPipeline<ElevenLabsClient, Ffmpeg> {
    /// Конвейер с ElevenLabs и ffmpeg из конфигурации
    ///
    /// Наличие инструментов в `PATH` проверяется только когда задание
    /// не нашлось в кэше.
    pub fn from_config(config: NarrationConfig) -> Result<Self> {
        let synthesizer = ElevenLabsClient::new(&config);
        let media = Ffmpeg::from_config(&config);
        Ok(Self::new(config, synthesizer, media))
    }
}

impl<S, M> NarrationPipeline<S, M>
where
    S: SpeechSynthesizer,
    M: MediaProcessor,
{
    pub fn new(config: NarrationConfig, synthesizer: S, media: M) -> Self {
        Self {
            config,
            synthesizer,
            media,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &NarrationConfig {
        &self.config
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Путь к озвученному видео, если он уже есть в кэше
    pub fn cached_output(&self, video: &Path) -> Result<Option<PathBuf>> {
        let narrated = NarrationJob::new(&self.config, video)?.narrated_path();
        Ok(narrated.is_file().then_some(narrated))
    }

    /// Озвучить видео; готовый результат берётся из кэша
    pub async fn narrate(&self, video: &Path, source: &NarrationSource) -> Result<NarrationOutcome> {
        self.narrate_with_progress(video, source, None).await
    }

    pub async fn narrate_with_progress(
        &self,
        video: &Path,
        source: &NarrationSource,
        progress: Option<&ProgressTracker>,
    ) -> Result<NarrationOutcome> {
        self.run(video, source, progress, false).await
    }

    /// Озвучить видео заново, удалив прежний результат
    pub async fn regenerate(&self, video: &Path, source: &NarrationSource) -> Result<NarrationOutcome> {
        self.run(video, source, None, true).await
    }

    pub async fn regenerate_with_progress(
        &self,
        video: &Path,
        source: &NarrationSource,
        progress: Option<&ProgressTracker>,
    ) -> Result<NarrationOutcome> {
        self.run(video, source, progress, true).await
    }

    fn lock_for(&self, base_name: &str) -> NameLock<'_> {
        let lock = self
            .locks
            .lock()
            .entry(base_name.to_string())
            .or_default()
            .clone();
        NameLock {
            locks: &self.locks,
            base_name: base_name.to_string(),
            lock,
        }
    }

    async fn run(
        &self,
        video: &Path,
        source: &NarrationSource,
        progress: Option<&ProgressTracker>,
        force: bool,
    ) -> Result<NarrationOutcome> {
        let job = NarrationJob::new(&self.config, video)?;
        let name_lock = self.lock_for(job.base_name());

        let result = {
            let _guard = name_lock.lock.lock().await;
            self.run_locked(&job, video, source, progress, force).await
        };
        drop(name_lock);

        if let Err(e) = &result {
            if e.is_tool_failure() {
                log::error!("[narrate] media tool failed for {}: {}", job.base_name(), e);
            } else {
                log::error!("[narrate] {} failed: {}", job.base_name(), e);
            }
            if let Some(tracker) = progress {
                tracker.fail(e.to_string());
            }
        }
        result
    }

    async fn run_locked(
        &self,
        job: &NarrationJob,
        video: &Path,
        source: &NarrationSource,
        progress: Option<&ProgressTracker>,
        force: bool,
    ) -> Result<NarrationOutcome> {
        let narrated = job.narrated_path();

        if force {
            match tokio::fs::remove_file(&narrated).await {
                Ok(()) => log::info!("[narrate] deleted {}", narrated.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        } else if is_file(&narrated).await {
            log::info!("[narrate] cache hit: {}", job.base_name());
            if let Some(t) = progress {
                t.complete("cache hit");
            }
            return Ok(NarrationOutcome::cached(narrated));
        }

        self.config.validate()?;
        self.media.prepare().await?;

        if !is_file(video).await {
            let error = format!("Input video not found: {}", video.display());
            log::error!("{}", error);
            return Err(NarrationError::FileNotFound(error));
        }

        tokio::fs::create_dir_all(job.output_directory()).await?;
        job.sweep_stale_artifacts().await?;

        if let Some(t) = progress {
            t.set_stage(JobStage::Split);
        }
        let planned = source.plan(self.config.max_chunk_chars);
        if planned.is_empty() {
            log::error!("[narrate] nothing to narrate for {}", job.base_name());
            return Err(NarrationError::NoNarration);
        }
        log::info!("[narrate] {}: {} chunks", job.base_name(), planned.len());

        if let Some(t) = progress {
            t.set_stage(JobStage::Synthesize);
        }
        let total = planned.len();
        let mut chunks = Vec::with_capacity(total);
        for (i, planned_chunk) in planned.into_iter().enumerate() {
            let chunk = AudioChunk {
                index: i + 1,
                path: job.chunk_path(&planned_chunk.file_suffix),
                label: planned_chunk.label,
                text: planned_chunk.text,
            };
            log::info!(
                "[narrate] {} ({}/{}) {} chars",
                chunk.label,
                chunk.index,
                total,
                chunk.text.chars().count()
            );
            let audio = self.synthesizer.synthesize(&chunk.text).await?;
            tokio::fs::write(&chunk.path, &audio).await?;

            if let Some(t) = progress {
                t.update_stage_progress(
                    chunk.index as f32 / total as f32 * 100.0,
                    Some(format!("{} ({}/{})", chunk.label, chunk.index, total)),
                );
            }
            chunks.push(chunk);
        }

        if let Some(t) = progress {
            t.set_stage(JobStage::Concatenate);
        }
        let combined = job.audio_path();
        let inputs: Vec<PathBuf> = chunks.iter().map(|c| c.path.clone()).collect();
        concat_or_copy(&self.media, &inputs, &job.concat_list_path(), &combined).await?;

        if let Some(t) = progress {
            t.set_stage(JobStage::Probe);
        }
        let probe = measure_durations(&self.media, &combined, video, self.config.strict_probe).await?;
        let strategy = select_strategy(probe, self.config.duration_threshold_seconds);
        log_decision(probe, strategy);

        if let Some(t) = progress {
            t.set_stage(JobStage::Mux);
            t.update_stage_progress(0.0, Some(strategy.as_str().to_string()));
        }
        let partial = job.partial_path();
        apply_strategy(
            &self.media,
            strategy,
            video,
            &combined,
            &job.padded_audio_path(),
            &partial,
        )
        .await?;

        tokio::fs::rename(&partial, &narrated).await?;

        if let Some(t) = progress {
            t.set_stage(JobStage::Cleanup);
        }
        if self.config.cleanup_temp_files {
            job.cleanup(&chunks).await;
        }

        log::info!("[narrate] done: {}", narrated.display());
        if let Some(t) = progress {
            t.complete(format!("{} ({})", narrated.display(), strategy.as_str()));
        }

        Ok(NarrationOutcome {
            path: narrated,
            cache_hit: false,
            chunks: chunks.len(),
            probe: Some(probe),
            strategy: Some(strategy),
        })
    }
}
