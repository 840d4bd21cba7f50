//! Модуль с реализациями наблюдателей прогресса
//!
//! Консоль, журнал `log`, память, файл, канал tokio, функция обратного
//! вызова и комбинированный наблюдатель.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use crate::progress::{ProgressInfo, ProgressObserver};

fn format_progress(progress: &ProgressInfo) -> String {
    let mut line = format!(
        "{}: {:.1}% (total {:.1}%)",
        progress.step, progress.step_progress, progress.total_progress
    );
    if let Some(details) = progress.details.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(" - ");
        line.push_str(details);
    }
    line
}

/// Наблюдатель, выводящий прогресс в консоль
pub struct ConsoleProgressObserver {
    prefix: Option<String>,
}

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Наблюдатель с префиксом строки, например именем сцены
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }
}

impl Default for ConsoleProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        println!("{}{}", prefix, format_progress(&progress));
    }
}

/// Наблюдатель, пишущий прогресс в журнал через `log`
#[derive(Default)]
pub struct LogProgressObserver;

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        log::info!("[progress] {}", format_progress(&progress));
    }
}

/// Наблюдатель, сохраняющий историю прогресса в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// История обновлений
    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Наблюдатель, дописывающий прогресс в файл
pub struct FileProgressObserver {
    file_path: PathBuf,
}

impl FileProgressObserver {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl ProgressObserver for FileProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let entry = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            format_progress(&progress)
        );

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));

        if let Err(e) = result {
            log::warn!("Failed to write progress to {}: {}", self.file_path.display(), e);
        }
    }
}

/// Наблюдатель, пересылающий прогресс в канал tokio
///
/// Если получатель не успевает, обновление отбрасывается.
pub struct ChannelProgressObserver {
    sender: mpsc::Sender<ProgressInfo>,
}

impl ChannelProgressObserver {
    pub fn new(sender: mpsc::Sender<ProgressInfo>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        if let Err(e) = self.sender.try_send(progress) {
            log::debug!("Dropped progress update: {}", e);
        }
    }
}

/// Наблюдатель, вызывающий функцию при каждом обновлении
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}

/// Комбинированный наблюдатель
#[derive(Default)]
pub struct CompositeProgressObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_format_progress() {
        let info = ProgressInfo::new("Synthesizing speech", 50.0, 32.5, Some("S2-Intuition".to_string()));
        assert_eq!(
            format_progress(&info),
            "Synthesizing speech: 50.0% (total 32.5%) - S2-Intuition"
        );
        let bare = ProgressInfo::new("Cleaning up", 0.0, 95.0, None);
        assert_eq!(format_progress(&bare), "Cleaning up: 0.0% (total 95.0%)");
    }

    #[test]
    fn test_memory_observer() {
        let observer = MemoryProgressObserver::new();
        observer.on_progress_update(ProgressInfo::new("Step 1", 50.0, 25.0, None));
        observer.on_progress_update(ProgressInfo::new("Step 1", 100.0, 50.0, None));
        observer.on_progress_update(ProgressInfo::new("Step 2", 50.0, 75.0, None));

        let history = observer.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].step, "Step 1");
        assert_eq!(history[1].step_progress, 100.0);
        assert_eq!(history[2].total_progress, 75.0);

        observer.clear_history();
        assert!(observer.history().is_empty());
    }

    #[test]
    fn test_file_observer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.log");

        let observer = FileProgressObserver::new(&path);
        observer.on_progress_update(ProgressInfo::new("Merging audio and video", 50.0, 25.0, Some("pad-audio".to_string())));
        observer.on_progress_update(ProgressInfo::new("Cleaning up", 100.0, 100.0, None));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("Merging audio and video: 50.0% (total 25.0%) - pad-audio"));
    }

    #[tokio::test]
    async fn test_channel_observer() {
        let (tx, mut rx) = mpsc::channel(4);
        let observer = ChannelProgressObserver::new(tx);
        observer.on_progress_update(ProgressInfo::new("Probing durations", 100.0, 75.0, None));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.step, "Probing durations");
    }

    #[test]
    fn test_composite_observer() {
        let memory = MemoryProgressObserver::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let mut composite = CompositeProgressObserver::new();
        composite.add_observer(Box::new(memory.clone()));
        composite.add_observer(Box::new(CallbackProgressObserver::new(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })));
        composite.add_observer(Box::new(LogProgressObserver));
        assert_eq!(composite.len(), 3);

        composite.on_progress_update(ProgressInfo::new("Step 1", 50.0, 25.0, None));

        assert_eq!(memory.history().len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
