//! Фоновая озвучка
//!
//! Вызывающий код сразу получает немое видео, а озвучка готовится в
//! отдельной задаче. Состояние задачи наблюдается через `watch` канал,
//! ошибка дополнительно передаётся в функцию обратного вызова.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use crate::error::{NarrationError, Result};
use crate::media::MediaProcessor;
use crate::pipeline::NarrationPipeline;
use crate::script::NarrationSource;
use crate::tts::SpeechSynthesizer;

/// Состояние фоновой озвучки
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationStatus {
    Pending,
    /// Путь к озвученному видео
    Ready(PathBuf),
    /// Текст ошибки
    Failed(String),
}

impl NarrationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Дескриптор фоновой задачи озвучки
pub struct BackgroundNarration {
    status: watch::Receiver<NarrationStatus>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundNarration {
    /// Уже готовый результат (например, из кэша)
    pub fn ready(path: PathBuf) -> Self {
        let (_tx, rx) = watch::channel(NarrationStatus::Ready(path));
        Self { status: rx, handle: None }
    }

    /// Текущее состояние
    pub fn status(&self) -> NarrationStatus {
        self.status.borrow().clone()
    }

    /// Отдельный получатель состояния, например для другого обработчика
    pub fn subscribe(&self) -> watch::Receiver<NarrationStatus> {
        self.status.clone()
    }

    /// Дождаться завершения задачи
    pub async fn wait(&mut self) -> NarrationStatus {
        loop {
            let current = self.status.borrow().clone();
            if !current.is_pending() {
                return current;
            }
            if self.status.changed().await.is_err() {
                let last = self.status.borrow().clone();
                return match last {
                    NarrationStatus::Pending => {
                        NarrationStatus::Failed("narration task ended without result".to_string())
                    }
                    other => other,
                };
            }
        }
    }

    /// Прервать задачу
    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

/// Запустить озвучку в отдельной задаче
///
/// `on_failure` вызывается один раз, если задание завершилось ошибкой.
pub fn spawn_narration<S, M, F>(
    pipeline: Arc<NarrationPipeline<S, M>>,
    video: PathBuf,
    source: NarrationSource,
    on_failure: F,
) -> BackgroundNarration
where
    S: SpeechSynthesizer + 'static,
    M: MediaProcessor + 'static,
    F: FnOnce(&NarrationError) + Send + 'static,
{
    let (tx, rx) = watch::channel(NarrationStatus::Pending);

    let handle = tokio::spawn(async move {
        let status = match pipeline.narrate(&video, &source).await {
            Ok(outcome) => {
                log::info!("[narrated] {}", outcome.path.display());
                NarrationStatus::Ready(outcome.path)
            }
            Err(e) => {
                log::error!("[narrate] background job for {} failed: {}", video.display(), e);
                on_failure(&e);
                NarrationStatus::Failed(e.to_string())
            }
        };
        let _ = tx.send(status);
    });

    BackgroundNarration {
        status: rx,
        handle: Some(handle),
    }
}

/// Результат поиска озвучки
pub enum NarrationLookup {
    /// Озвучка уже готова
    Cached(PathBuf),
    /// Озвучка запущена в фоне
    Started(BackgroundNarration),
}

/// Вернуть готовую озвучку или запустить её в фоне
pub fn lookup_or_spawn<S, M, F>(
    pipeline: Arc<NarrationPipeline<S, M>>,
    video: PathBuf,
    source: NarrationSource,
    on_failure: F,
) -> Result<NarrationLookup>
where
    S: SpeechSynthesizer + 'static,
    M: MediaProcessor + 'static,
    F: FnOnce(&NarrationError) + Send + 'static,
{
    if let Some(path) = pipeline.cached_output(&video)? {
        return Ok(NarrationLookup::Cached(path));
    }
    Ok(NarrationLookup::Started(spawn_narration(pipeline, video, source, on_failure)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use crate::config::NarrationConfig;

    struct EchoSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for EchoSynthesizer {
        async fn synthesize(&self, text: &str) -> Result<Bytes> {
            Ok(Bytes::from(text.to_string()))
        }
    }

    struct CopyMedia;

    #[async_trait]
    impl MediaProcessor for CopyMedia {
        async fn probe_duration(&self, _path: &Path) -> Result<f64> {
            Ok(10.0)
        }

        async fn concat_audio(&self, _inputs: &[PathBuf], _list: &Path, _output: &Path) -> Result<()> {
            Err(NarrationError::Concatenation("not expected".to_string()))
        }

        async fn pad_audio(&self, _input: &Path, _output: &Path, _target_secs: f64) -> Result<()> {
            Ok(())
        }

        async fn stretch_merge(&self, _v: &Path, _a: &Path, _o: &Path, _ratio: f64) -> Result<()> {
            Ok(())
        }

        async fn direct_merge(&self, _video: &Path, audio: &Path, output: &Path) -> Result<()> {
            tokio::fs::copy(audio, output).await?;
            Ok(())
        }
    }

    fn pipeline(output: &Path) -> Arc<NarrationPipeline<EchoSynthesizer, CopyMedia>> {
        let config = NarrationConfig::new(output, "key", "voice");
        Arc::new(NarrationPipeline::new(config, EchoSynthesizer, CopyMedia))
    }

    #[tokio::test]
    async fn test_background_narration_becomes_ready() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("LimitScene.mp4");
        std::fs::write(&video, b"video").unwrap();
        let pipeline = pipeline(&dir.path().join("narrated"));

        let lookup = lookup_or_spawn(
            pipeline.clone(),
            video.clone(),
            NarrationSource::Script("A limit asks where a function is heading.".to_string()),
            |_| panic!("should not fail"),
        )
        .unwrap();

        let mut handle = match lookup {
            NarrationLookup::Started(handle) => handle,
            NarrationLookup::Cached(_) => panic!("nothing was cached yet"),
        };
        let expected = dir.path().join("narrated/LimitScene_narrated.mp4");
        assert_eq!(handle.wait().await, NarrationStatus::Ready(expected.clone()));
        assert_eq!(handle.status(), NarrationStatus::Ready(expected.clone()));

        // второй запрос отдаёт готовый файл сразу
        match lookup_or_spawn(pipeline, video, NarrationSource::Script(String::new()), |_| {}).unwrap() {
            NarrationLookup::Cached(path) => assert_eq!(path, expected),
            NarrationLookup::Started(_) => panic!("expected cache hit"),
        }
    }

    #[tokio::test]
    async fn test_failure_invokes_callback() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("Blank.mp4");
        std::fs::write(&video, b"video").unwrap();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();

        let mut handle = spawn_narration(
            pipeline(&dir.path().join("narrated")),
            video,
            NarrationSource::Script("   ".to_string()),
            move |e| sink.lock().push(e.to_string()),
        );

        assert_eq!(
            handle.wait().await,
            NarrationStatus::Failed("All narration segments were empty".to_string())
        );
        assert_eq!(*failures.lock(), vec!["All narration segments were empty".to_string()]);
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let mut handle = BackgroundNarration::ready(PathBuf::from("/narrated/a_narrated.mp4"));
        assert!(!handle.status().is_pending());
        assert_eq!(
            handle.wait().await,
            NarrationStatus::Ready(PathBuf::from("/narrated/a_narrated.mp4"))
        );
    }
}
