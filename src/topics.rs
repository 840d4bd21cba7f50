//! Таблица тем: ключ сцены → видео и текст озвучки
//!
//! Таблица хранится в JSON рядом с данными приложения:
//!
//! ```json
//! {
//!   "videos_root": "../manim/output/videos",
//!   "topics": {
//!     "eigen": {
//!       "video": "la_16_eigen/480p15/EigenScene.mp4",
//!       "topic": "Eigenvalues and Eigenvectors",
//!       "script_file": "scripts/eigen.txt"
//!     }
//!   }
//! }
//! ```
//!
//! Относительные пути считаются от каталога файла таблицы.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::error::{NarrationError, Result};
use crate::script::{NarrationSegments, NarrationSource};
use crate::utils::paths::resolve_against;

#[derive(Debug, Deserialize)]
struct TopicTableFile {
    #[serde(default)]
    videos_root: Option<PathBuf>,
    topics: BTreeMap<String, TopicEntry>,
}

/// Запись таблицы в том виде, как она лежит в JSON
#[derive(Debug, Clone, Deserialize)]
pub struct TopicEntry {
    /// Путь к видео относительно `videos_root`
    pub video: PathBuf,
    /// Название темы
    pub topic: String,
    /// Текст сценария
    #[serde(default)]
    pub script: Option<String>,
    /// Файл со сценарием
    #[serde(default)]
    pub script_file: Option<PathBuf>,
    /// Файл с шестью сегментами (JSON)
    #[serde(default)]
    pub segments_file: Option<PathBuf>,
}

/// Тема с разрешёнными путями
#[derive(Debug, Clone)]
pub struct Topic {
    pub key: String,
    pub title: String,
    pub video: PathBuf,
    script: Option<String>,
    script_file: Option<PathBuf>,
    segments_file: Option<PathBuf>,
}

impl Topic {
    /// Проверить, что видео существует
    pub fn ensure_video(&self) -> Result<&Path> {
        if self.video.is_file() {
            Ok(&self.video)
        } else {
            Err(NarrationError::FileNotFound(format!(
                "Video for {} not found: {}",
                self.key,
                self.video.display()
            )))
        }
    }

    /// Загрузить текст озвучки
    pub fn load_source(&self) -> Result<NarrationSource> {
        if let Some(path) = &self.segments_file {
            return Ok(NarrationSource::Segments(NarrationSegments::from_file(path)?));
        }
        if let Some(path) = &self.script_file {
            let script = std::fs::read_to_string(path).map_err(|e| {
                NarrationError::FileNotFound(format!("Script for {} ({}): {}", self.key, path.display(), e))
            })?;
            return Ok(NarrationSource::Script(script));
        }
        if let Some(script) = &self.script {
            return Ok(NarrationSource::Script(script.clone()));
        }
        Err(NarrationError::Configuration(format!(
            "No script configured for {}",
            self.key
        )))
    }
}

/// Таблица тем, загруженная при старте
#[derive(Debug, Clone, Default)]
pub struct TopicTable {
    topics: BTreeMap<String, Topic>,
}

impl TopicTable {
    /// Загрузить таблицу из JSON файла
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NarrationError::FileNotFound(format!("Topic table {}: {}", path.display(), e))
        })?;
        let file: TopicTableFile = serde_json::from_str(&content)?;

        let table_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let videos_root = match &file.videos_root {
            Some(root) => resolve_against(table_dir, root),
            None => table_dir.to_path_buf(),
        };

        let topics = file
            .topics
            .into_iter()
            .map(|(key, entry)| {
                let topic = Topic {
                    key: key.clone(),
                    title: entry.topic,
                    video: resolve_against(&videos_root, &entry.video),
                    script: entry.script,
                    script_file: entry.script_file.map(|p| resolve_against(table_dir, &p)),
                    segments_file: entry.segments_file.map(|p| resolve_against(table_dir, &p)),
                };
                (key, topic)
            })
            .collect::<BTreeMap<_, _>>();

        log::debug!("Loaded {} topics from {}", topics.len(), path.display());
        Ok(Self { topics })
    }

    /// Найти тему по ключу
    pub fn get(&self, key: &str) -> Result<&Topic> {
        self.topics.get(key).ok_or_else(|| {
            NarrationError::UnknownTopic(format!(
                "{} (available: {})",
                key,
                self.keys().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Найти тему по названию без учёта регистра
    pub fn find_by_title(&self, title: &str) -> Option<&Topic> {
        let wanted = title.trim().to_lowercase();
        self.topics
            .values()
            .find(|topic| topic.title.to_lowercase() == wanted)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
