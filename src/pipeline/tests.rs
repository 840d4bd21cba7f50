use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use crate::notification::MemoryProgressObserver;
use crate::script::NarrationSegments;

/// Синтезатор, возвращающий текст фрагмента как «аудио»
#[derive(Default)]
struct FakeSynthesizer {
    texts: Mutex<Vec<String>>,
    delay: Option<Duration>,
    fail_on: Option<usize>,
}

impl FakeSynthesizer {
    fn calls(&self) -> usize {
        self.texts.lock().len()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let call = {
            let mut texts = self.texts.lock();
            texts.push(text.to_string());
            texts.len()
        };
        if self.fail_on == Some(call) {
            return Err(NarrationError::Provider {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(Bytes::from(format!("[{}]", text)))
    }
}

/// Медиа-процессор без ffmpeg: склейка и сведение пишут файлы сами
struct FakeMedia {
    audio_secs: f64,
    video_secs: f64,
    fail_mux: bool,
    missing_tools: bool,
    concat_calls: AtomicUsize,
    mux_calls: Mutex<Vec<String>>,
}

impl FakeMedia {
    fn new(audio_secs: f64, video_secs: f64) -> Self {
        Self {
            audio_secs,
            video_secs,
            fail_mux: false,
            missing_tools: false,
            concat_calls: AtomicUsize::new(0),
            mux_calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_mux() -> Self {
        Self {
            fail_mux: true,
            ..Self::new(120.0, 120.0)
        }
    }

    fn mux_calls(&self) -> Vec<String> {
        self.mux_calls.lock().clone()
    }

    async fn merge(&self, what: String, audio: &Path, output: &Path) -> Result<()> {
        self.mux_calls.lock().push(what);
        if self.fail_mux {
            tokio::fs::write(output, b"half-written").await?;
            return Err(NarrationError::Mux("exit code Some(1): broken pipe".to_string()));
        }
        let audio = tokio::fs::read(audio).await?;
        tokio::fs::write(output, [b"VIDEO+".as_slice(), audio.as_slice()].concat()).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaProcessor for FakeMedia {
    async fn prepare(&self) -> Result<()> {
        if self.missing_tools {
            return Err(NarrationError::Configuration("ffmpeg not found in PATH".to_string()));
        }
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let is_audio = path.extension().map_or(false, |ext| ext == "mp3");
        Ok(if is_audio { self.audio_secs } else { self.video_secs })
    }

    async fn concat_audio(&self, inputs: &[PathBuf], _list_file: &Path, output: &Path) -> Result<()> {
        self.concat_calls.fetch_add(1, Ordering::SeqCst);
        let mut joined = Vec::new();
        for input in inputs {
            joined.extend(tokio::fs::read(input).await?);
        }
        tokio::fs::write(output, joined).await?;
        Ok(())
    }

    async fn pad_audio(&self, input: &Path, output: &Path, _target_secs: f64) -> Result<()> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn stretch_merge(&self, _video: &Path, audio: &Path, output: &Path, ratio: f64) -> Result<()> {
        self.merge(format!("stretch {:.4}", ratio), audio, output).await
    }

    async fn direct_merge(&self, _video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.merge("direct".to_string(), audio, output).await
    }
}

struct Fixture {
    _dir: TempDir,
    video: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let videos = dir.path().join("videos");
        std::fs::create_dir_all(&videos).unwrap();
        let video = videos.join("EigenvectorScene.mp4");
        std::fs::write(&video, b"video").unwrap();
        let output = dir.path().join("narrated");
        Self { _dir: dir, video, output }
    }

    fn config(&self) -> NarrationConfig {
        NarrationConfig::new(&self.output, "test-key", "voice")
    }

    fn pipeline(&self, media: FakeMedia) -> NarrationPipeline<FakeSynthesizer, FakeMedia> {
        NarrationPipeline::new(self.config(), FakeSynthesizer::default(), media)
    }

    fn file(&self, name: &str) -> PathBuf {
        self.output.join(name)
    }

    fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.output)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

fn script(text: &str) -> NarrationSource {
    NarrationSource::Script(text.to_string())
}

#[tokio::test]
async fn test_script_narration_end_to_end() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::new(123.0, 120.0));

    let outcome = pipeline
        .narrate(&fx.video, &script("Eigenvectors keep direction. Eigenvalues scale them."))
        .await
        .unwrap();

    assert!(!outcome.cache_hit);
    assert_eq!(outcome.chunks, 1);
    assert_eq!(outcome.path, fx.file("EigenvectorScene_narrated.mp4"));
    assert!(outcome.path.is_absolute());
    assert_eq!(outcome.strategy, Some(MergeStrategy::Direct));
    assert_eq!(
        outcome.probe,
        Some(DurationProbe { audio_secs: 123.0, video_secs: 120.0 })
    );

    // один фрагмент копируется без склейки
    assert_eq!(pipeline.media().concat_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        fx.output_files(),
        vec!["EigenvectorScene_audio.mp3", "EigenvectorScene_narrated.mp4"]
    );
}

#[tokio::test]
async fn test_chunks_are_synthesized_in_order() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.max_chunk_chars = 12;
    let pipeline = NarrationPipeline::new(config, FakeSynthesizer::default(), FakeMedia::new(130.0, 120.0));

    let outcome = pipeline
        .narrate(&fx.video, &script("First one. Second one. Third one."))
        .await
        .unwrap();

    assert_eq!(outcome.chunks, 3);
    assert_eq!(
        *pipeline.synthesizer.texts.lock(),
        vec!["First one.", "Second one.", "Third one."]
    );
    assert_eq!(pipeline.media().concat_calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.media().mux_calls(), vec!["stretch 1.0833"]);

    let narrated = std::fs::read_to_string(&outcome.path).unwrap();
    assert_eq!(narrated, "VIDEO+[First one.][Second one.][Third one.]");
}

#[tokio::test]
async fn test_second_run_is_cache_hit() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::new(120.0, 120.0));
    let source = script("Hello there. General idea.");

    let first = pipeline.narrate(&fx.video, &source).await.unwrap();
    let synth_calls = pipeline.synthesizer.calls();
    let mux_calls = pipeline.media().mux_calls().len();

    let second = pipeline.narrate(&fx.video, &source).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.path, first.path);
    assert_eq!(pipeline.synthesizer.calls(), synth_calls);
    assert_eq!(pipeline.media().mux_calls().len(), mux_calls);
}

#[tokio::test]
async fn test_cache_hit_needs_no_api_key() {
    let fx = Fixture::new();
    std::fs::create_dir_all(&fx.output).unwrap();
    std::fs::write(fx.file("EigenvectorScene_narrated.mp4"), b"done").unwrap();

    let mut config = fx.config();
    config.provider_api_key = String::new();
    let pipeline = NarrationPipeline::new(config, FakeSynthesizer::default(), FakeMedia::new(1.0, 1.0));

    let outcome = pipeline.narrate(&fx.video, &script("Text.")).await.unwrap();
    assert!(outcome.cache_hit);

    let result = pipeline.regenerate(&fx.video, &script("Text.")).await;
    assert!(matches!(result, Err(NarrationError::Configuration(_))));
}

#[tokio::test]
async fn test_regenerate_replaces_output_and_sweeps_stale_files() {
    let fx = Fixture::new();
    std::fs::create_dir_all(&fx.output).unwrap();
    for name in [
        "EigenvectorScene_narrated.mp4",
        "EigenvectorScene_chunk7.mp3",
        "EigenvectorScene_seg2.mp3",
        "EigenvectorScene_narrated.partial-0b6f2d1e-54f0-4a8e-9d62-1f0c2d3e4f50.mp4",
        "OtherScene_narrated.mp4",
    ] {
        std::fs::write(fx.file(name), b"old").unwrap();
    }
    let pipeline = fx.pipeline(FakeMedia::new(110.0, 120.0));

    let outcome = pipeline.regenerate(&fx.video, &script("Fresh narration.")).await.unwrap();

    assert!(!outcome.cache_hit);
    assert_eq!(outcome.strategy, Some(MergeStrategy::PadAudio { target_secs: 120.0 }));
    assert_eq!(std::fs::read_to_string(&outcome.path).unwrap(), "VIDEO+[Fresh narration.]");
    assert_eq!(
        fx.output_files(),
        vec![
            "EigenvectorScene_audio.mp3",
            "EigenvectorScene_narrated.mp4",
            "OtherScene_narrated.mp4",
        ]
    );
}

#[tokio::test]
async fn test_blank_segments_are_skipped() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::new(60.0, 60.0));
    let segments = NarrationSegments {
        hook: "What stays put under a transformation?".to_string(),
        intuition: "  ".to_string(),
        example: "Take a shear.".to_string(),
        summary: "Eigenvectors stay on their span.".to_string(),
        ..NarrationSegments::default()
    };

    let outcome = pipeline
        .narrate(&fx.video, &NarrationSource::Segments(segments))
        .await
        .unwrap();

    assert_eq!(outcome.chunks, 3);
    assert_eq!(
        *pipeline.synthesizer.texts.lock(),
        vec![
            "What stays put under a transformation?",
            "Take a shear.",
            "Eigenvectors stay on their span.",
        ]
    );
}

#[tokio::test]
async fn test_segment_files_kept_when_cleanup_disabled() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.cleanup_temp_files = false;
    let pipeline = NarrationPipeline::new(config, FakeSynthesizer::default(), FakeMedia::new(60.0, 60.0));
    let segments = NarrationSegments {
        hook: "Hook.".to_string(),
        insight: "Insight.".to_string(),
        ..NarrationSegments::default()
    };

    pipeline
        .narrate(&fx.video, &NarrationSource::Segments(segments))
        .await
        .unwrap();

    let files = fx.output_files();
    assert!(files.contains(&"EigenvectorScene_seg1.mp3".to_string()));
    assert!(files.contains(&"EigenvectorScene_seg5.mp3".to_string()));
    assert!(files.contains(&"EigenvectorScene_audio.mp3".to_string()));
}

#[tokio::test]
async fn test_all_blank_segments_fail() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::new(60.0, 60.0));

    let result = pipeline
        .narrate(&fx.video, &NarrationSource::Segments(NarrationSegments::default()))
        .await;

    match result {
        Err(e @ NarrationError::NoNarration) => {
            assert_eq!(e.to_string(), "All narration segments were empty")
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(pipeline.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_blank_script_fails() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::new(60.0, 60.0));
    let result = pipeline.narrate(&fx.video, &script(" \n\t ")).await;
    assert!(matches!(result, Err(NarrationError::NoNarration)));
}

#[tokio::test]
async fn test_missing_video_is_reported() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::new(60.0, 60.0));
    let result = pipeline
        .narrate(&fx.video.with_file_name("Missing.mp4"), &script("Text."))
        .await;
    assert!(matches!(result, Err(NarrationError::FileNotFound(_))));
}

#[tokio::test]
async fn test_failed_mux_never_produces_canonical_output() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::failing_mux());

    let result = pipeline.narrate(&fx.video, &script("Some text.")).await;
    assert!(matches!(result, Err(NarrationError::Mux(_))));
    assert!(!fx.file("EigenvectorScene_narrated.mp4").exists());

    // артефакты остаются для диагностики
    let files = fx.output_files();
    assert!(files.contains(&"EigenvectorScene_chunk1.mp3".to_string()));
    assert!(files.iter().any(|f| f.starts_with("EigenvectorScene_narrated.partial-")));

    // следующий запуск не считает частичный файл готовым результатом
    assert!(pipeline.cached_output(&fx.video).unwrap().is_none());
}

#[tokio::test]
async fn test_synthesis_failure_aborts_job() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.max_chunk_chars = 10;
    let synthesizer = FakeSynthesizer {
        fail_on: Some(2),
        ..FakeSynthesizer::default()
    };
    let pipeline = NarrationPipeline::new(config, synthesizer, FakeMedia::new(60.0, 60.0));

    let result = pipeline
        .narrate(&fx.video, &script("One here. Two here. Three here."))
        .await;

    assert!(matches!(result, Err(NarrationError::Provider { status: 500, .. })));
    assert_eq!(pipeline.synthesizer.calls(), 2);
    assert!(pipeline.media().mux_calls().is_empty());
}

#[tokio::test]
async fn test_same_base_name_jobs_are_serialized() {
    let fx = Fixture::new();
    let synthesizer = FakeSynthesizer {
        delay: Some(Duration::from_millis(50)),
        ..FakeSynthesizer::default()
    };
    let pipeline = Arc::new(NarrationPipeline::new(fx.config(), synthesizer, FakeMedia::new(60.0, 60.0)));
    let source = script("Only one synthesis should happen.");

    let (a, b) = tokio::join!(
        pipeline.narrate(&fx.video, &source),
        pipeline.narrate(&fx.video, &source)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(pipeline.synthesizer.calls(), 1);
    assert!(a.cache_hit != b.cache_hit);
    assert_eq!(a.path, b.path);
    assert!(pipeline.locks.lock().is_empty());
}

#[tokio::test]
async fn test_progress_is_reported() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::new(60.0, 60.0));
    let memory = MemoryProgressObserver::new();
    let mut tracker = ProgressTracker::new();
    tracker.add_observer(Box::new(memory.clone()));

    pipeline
        .narrate_with_progress(&fx.video, &script("Progress matters."), Some(&tracker))
        .await
        .unwrap();

    let history = memory.history();
    let last = history.last().unwrap();
    assert_eq!(last.total_progress, 100.0);
    assert!(history.iter().any(|p| p.step == JobStage::Synthesize.as_str()));
    assert!(history.iter().any(|p| p.step == JobStage::Mux.as_str()));
}

#[tokio::test]
async fn test_cache_hit_does_not_need_media_tools() {
    let fx = Fixture::new();
    std::fs::create_dir_all(&fx.output).unwrap();
    std::fs::write(fx.file("EigenvectorScene_narrated.mp4"), b"done").unwrap();
    let media = FakeMedia {
        missing_tools: true,
        ..FakeMedia::new(1.0, 1.0)
    };
    let pipeline = fx.pipeline(media);

    let outcome = pipeline.narrate(&fx.video, &script("Text.")).await.unwrap();
    assert!(outcome.cache_hit);

    let result = pipeline.regenerate(&fx.video, &script("Text.")).await;
    assert!(matches!(result, Err(NarrationError::Configuration(_))));
    assert_eq!(pipeline.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_job_releases_name_lock() {
    let fx = Fixture::new();
    let synthesizer = FakeSynthesizer {
        delay: Some(Duration::from_millis(500)),
        ..FakeSynthesizer::default()
    };
    let pipeline = NarrationPipeline::new(fx.config(), synthesizer, FakeMedia::new(60.0, 60.0));
    let source = script("This one never finishes.");

    let result = tokio::time::timeout(Duration::from_millis(50), pipeline.narrate(&fx.video, &source)).await;
    assert!(result.is_err());
    assert!(pipeline.locks.lock().is_empty());

    // имя снова свободно
    let outcome = tokio::time::timeout(Duration::from_secs(5), pipeline.narrate(&fx.video, &source))
        .await
        .unwrap()
        .unwrap();
    assert!(!outcome.cache_hit);
    assert!(pipeline.locks.lock().is_empty());
}

#[tokio::test]
async fn test_unknown_video_duration_fails_mux() {
    let fx = Fixture::new();
    let pipeline = fx.pipeline(FakeMedia::new(40.0, 0.0));

    let result = pipeline.narrate(&fx.video, &script("Audio without a measurable video.")).await;

    assert!(matches!(result, Err(NarrationError::Mux(_))));
    assert!(pipeline.media().mux_calls().is_empty());
    assert!(!fx.file("EigenvectorScene_narrated.mp4").exists());
}

#[tokio::test]
async fn test_progress_details_count_chunks() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.max_chunk_chars = 12;
    let pipeline = NarrationPipeline::new(config, FakeSynthesizer::default(), FakeMedia::new(60.0, 60.0));
    let memory = MemoryProgressObserver::new();
    let mut tracker = ProgressTracker::new();
    tracker.add_observer(Box::new(memory.clone()));

    pipeline
        .narrate_with_progress(&fx.video, &script("First one. Second one. Third one."), Some(&tracker))
        .await
        .unwrap();

    let details: Vec<String> = memory
        .history()
        .into_iter()
        .filter(|p| p.step == JobStage::Synthesize.as_str())
        .filter_map(|p| p.details)
        .collect();
    assert_eq!(details, vec!["chunk1 (1/3)", "chunk2 (2/3)", "chunk3 (3/3)"]);
}
