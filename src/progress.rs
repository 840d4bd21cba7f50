//! Модуль для отслеживания прогресса задания озвучки
//!
//! Реализация паттерна Observer: конвейер сообщает о смене этапов и
//! прогрессе внутри этапа, наблюдатели получают [`ProgressInfo`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения задания
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения задания (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    /// Создает новый экземпляр ProgressInfo
    pub fn new(step: impl Into<String>, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Наблюдатель, получающий уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Объект, рассылающий уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя
    ///
    /// Возвращает идентификатор, по которому наблюдателя можно удалить.
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Синхронный репортер: наблюдатели вызываются в потоке конвейера
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Количество подключённых наблюдателей
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        let observers = self.observers.read();
        for observer in observers.values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Этапы задания озвучки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    /// Разбиение текста на фрагменты
    Split,
    /// Синтез речи по фрагментам
    Synthesize,
    /// Склейка фрагментов
    Concatenate,
    /// Измерение длительностей
    Probe,
    /// Сведение аудио и видео
    Mux,
    /// Удаление временных файлов
    Cleanup,
}

impl JobStage {
    pub const ALL: [JobStage; 6] = [
        JobStage::Split,
        JobStage::Synthesize,
        JobStage::Concatenate,
        JobStage::Probe,
        JobStage::Mux,
        JobStage::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Split => "Splitting script",
            Self::Synthesize => "Synthesizing speech",
            Self::Concatenate => "Concatenating audio",
            Self::Probe => "Probing durations",
            Self::Mux => "Merging audio and video",
            Self::Cleanup => "Cleaning up",
        }
    }

    /// Вес этапа в процентах от всего задания
    pub fn weight(&self) -> f32 {
        match self {
            Self::Split => 5.0,
            Self::Synthesize => 55.0,
            Self::Concatenate => 10.0,
            Self::Probe => 5.0,
            Self::Mux => 20.0,
            Self::Cleanup => 5.0,
        }
    }
}

struct TrackerState {
    stage: JobStage,
    stage_progress: f32,
    total_progress: f32,
    completed: HashMap<JobStage, f32>,
}

/// Трекер прогресса одного задания
pub struct ProgressTracker {
    reporter: Option<Box<dyn ProgressReporter>>,
    state: RwLock<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            reporter: None,
            state: RwLock::new(TrackerState {
                stage: JobStage::Split,
                stage_progress: 0.0,
                total_progress: 0.0,
                completed: HashMap::new(),
            }),
        }
    }

    /// Создать трекер с репортером
    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        let mut tracker = Self::new();
        tracker.reporter = Some(reporter);
        tracker
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    /// Добавить наблюдателя (создаёт репортер по умолчанию, если его нет)
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.reporter
            .get_or_insert_with(|| Box::new(DefaultProgressReporter::new()))
            .add_observer(observer)
    }

    /// Текущий этап
    pub fn stage(&self) -> JobStage {
        self.state.read().stage
    }

    /// Общий прогресс (0.0 - 100.0)
    pub fn total_progress(&self) -> f32 {
        self.state.read().total_progress
    }

    /// Перейти к этапу; предыдущий считается завершённым
    pub fn set_stage(&self, stage: JobStage) {
        {
            let mut state = self.state.write();
            if state.stage == stage {
                return;
            }
            let previous = state.stage;
            state.completed.insert(previous, 100.0);
            state.stage = stage;
            state.stage_progress = 0.0;
            Self::recalculate(&mut state);
        }
        self.report(None);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_stage_progress(&self, progress: f32, details: Option<String>) {
        {
            let mut state = self.state.write();
            state.stage_progress = progress.clamp(0.0, 100.0);
            Self::recalculate(&mut state);
        }
        self.report(details);
    }

    fn recalculate(state: &mut TrackerState) {
        let total_weight: f32 = JobStage::ALL.iter().map(JobStage::weight).sum();
        let mut done: f32 = state
            .completed
            .iter()
            .filter(|(stage, _)| **stage != state.stage)
            .map(|(stage, progress)| stage.weight() * progress / 100.0)
            .sum();
        done += state.stage.weight() * state.stage_progress / 100.0;
        state.total_progress = (done / total_weight * 100.0).clamp(0.0, 100.0);
    }

    fn report(&self, details: Option<String>) {
        if let Some(reporter) = &self.reporter {
            let info = {
                let state = self.state.read();
                ProgressInfo::new(state.stage.as_str(), state.stage_progress, state.total_progress, details)
            };
            reporter.notify_progress(info);
        }
    }

    /// Отметить успешное завершение задания
    pub fn complete(&self, details: impl Into<String>) {
        {
            let mut state = self.state.write();
            let stage = state.stage;
            state.completed.insert(stage, 100.0);
            state.stage_progress = 100.0;
            state.total_progress = 100.0;
        }
        self.report(Some(details.into()));
    }

    /// Сообщить об ошибке без изменения прогресса
    pub fn fail(&self, message: impl Into<String>) {
        self.report(Some(format!("Failed: {}", message.into())));
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
