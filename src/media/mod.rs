//! Модуль для работы с медиафайлами
//!
//! Все обращения к ffmpeg/ffprobe проходят через трейт [`MediaProcessor`].
//! Логика выбора стратегии и объединения фрагментов от него не зависит.

pub mod tool;
pub mod ffmpeg;
pub mod audio;
pub mod sync;

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use crate::error::Result;

pub use ffmpeg::Ffmpeg;
pub use sync::{DurationProbe, MergeStrategy};

/// Примитивы обработки медиа, необходимые конвейеру озвучки
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Убедиться, что инструменты доступны; вызывается только перед настоящей работой
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Длительность файла в секундах
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Склеить аудиофайлы без перекодирования
    async fn concat_audio(&self, inputs: &[PathBuf], list_file: &Path, output: &Path) -> Result<()>;

    /// Дополнить аудио тишиной до `target_secs`
    async fn pad_audio(&self, input: &Path, output: &Path, target_secs: f64) -> Result<()>;

    /// Замедлить видео в `ratio` раз и наложить аудио
    async fn stretch_merge(&self, video: &Path, audio: &Path, output: &Path, ratio: f64) -> Result<()>;

    /// Наложить аудио на видео без изменения потоков
    async fn direct_merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}
