//! Файлы одного задания озвучки
//!
//! Все артефакты задания лежат в каталоге вывода и называются от базового
//! имени видео (имя файла без расширения).

use std::path::{Path, PathBuf};
use regex::Regex;
use walkdir::WalkDir;
use crate::config::NarrationConfig;
use crate::error::{NarrationError, Result};
use crate::utils::paths::absolutize;

/// Синтезированный фрагмент озвучки
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Порядковый номер, начиная с 1
    pub index: usize,
    pub label: String,
    pub text: String,
    pub path: PathBuf,
}

/// Пути к артефактам задания для одного видео
#[derive(Debug, Clone)]
pub struct NarrationJob {
    base_name: String,
    output_directory: PathBuf,
    audio_extension: String,
    video_extension: String,
}

impl NarrationJob {
    /// Описать задание для видео
    pub fn new(config: &NarrationConfig, video: &Path) -> Result<Self> {
        let base_name = video
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| NarrationError::Other(format!("Invalid video path: {}", video.display())))?;

        Ok(Self {
            base_name,
            output_directory: absolutize(&config.output_directory)?,
            audio_extension: config.audio_extension.clone(),
            video_extension: config.video_extension.clone(),
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    fn file(&self, suffix: &str, extension: &str) -> PathBuf {
        self.output_directory
            .join(format!("{}_{}.{}", self.base_name, suffix, extension))
    }

    /// Итоговое видео `{base}_narrated.{ext}`
    pub fn narrated_path(&self) -> PathBuf {
        self.file("narrated", &self.video_extension)
    }

    /// Уникальный путь для незавершённого сведения
    pub fn partial_path(&self) -> PathBuf {
        let suffix = format!("narrated.partial-{}", uuid::Uuid::new_v4());
        self.file(&suffix, &self.video_extension)
    }

    /// Склеенная дорожка `{base}_audio.{ext}`
    pub fn audio_path(&self) -> PathBuf {
        self.file("audio", &self.audio_extension)
    }

    pub fn concat_list_path(&self) -> PathBuf {
        self.file("audio_concatlist", "txt")
    }

    pub fn padded_audio_path(&self) -> PathBuf {
        self.file("audio_padded", &self.audio_extension)
    }

    /// Файл фрагмента, например `{base}_chunk3.mp3` или `{base}_seg2_1.mp3`
    pub fn chunk_path(&self, file_suffix: &str) -> PathBuf {
        self.file(file_suffix, &self.audio_extension)
    }

    fn artifact_pattern(&self) -> Result<Regex> {
        let pattern = format!(
            r"^{}_(narrated|audio|audio_concatlist|audio_padded|chunk\d+|seg\d+(_\d+)?|narrated\.partial-[0-9a-f-]+)\.[A-Za-z0-9]+$",
            regex::escape(&self.base_name)
        );
        Regex::new(&pattern).map_err(|e| NarrationError::Other(format!("Invalid artifact pattern: {}", e)))
    }

    /// Найти все артефакты этого задания в каталоге вывода
    pub fn existing_artifacts(&self) -> Result<Vec<PathBuf>> {
        if !self.output_directory.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = self.artifact_pattern()?;
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.output_directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| NarrationError::Other(format!("Failed to list output directory: {}", e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if pattern.is_match(&entry.file_name().to_string_lossy()) {
                found.push(entry.into_path());
            }
        }
        Ok(found)
    }

    /// Удалить все артефакты предыдущих запусков
    pub async fn sweep_stale_artifacts(&self) -> Result<usize> {
        let job = self.clone();
        let stale = tokio::task::spawn_blocking(move || job.existing_artifacts())
            .await
            .map_err(|e| NarrationError::Other(format!("Artifact scan failed: {}", e)))??;
        for path in &stale {
            tokio::fs::remove_file(path).await?;
            log::debug!("Deleted stale {}", path.display());
        }
        if !stale.is_empty() {
            log::info!("[narrate] removed {} stale files for {}", stale.len(), self.base_name);
        }
        Ok(stale.len())
    }

    /// Удалить фрагменты и список склейки после успешного задания
    ///
    /// Склеенная дорожка остаётся рядом с итоговым видео.
    pub async fn cleanup(&self, chunks: &[AudioChunk]) {
        let temp_files = chunks
            .iter()
            .map(|chunk| chunk.path.clone())
            .chain(std::iter::once(self.concat_list_path()));

        for path in temp_files {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}
