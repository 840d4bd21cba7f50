//! Шесть размеченных сегментов лекции
//!
//! Видео делится на шесть разделов, каждому соответствует свой сегмент
//! текста. Порядок сегментов фиксирован.

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Порядок сегментов: ключ и метка для логов
pub const SEGMENT_ORDER: [(&str, &str); 6] = [
    ("hook", "S1-Hook"),
    ("intuition", "S2-Intuition"),
    ("notation", "S3-Notation"),
    ("example", "S4-Example"),
    ("insight", "S5-Insight"),
    ("summary", "S6-Summary"),
];

/// Текст озвучки, разбитый на шесть разделов
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSegments {
    pub hook: String,
    pub intuition: String,
    pub notation: String,
    pub example: String,
    pub insight: String,
    pub summary: String,
}

impl NarrationSegments {
    /// Получить сегмент по ключу
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "hook" => Some(&self.hook),
            "intuition" => Some(&self.intuition),
            "notation" => Some(&self.notation),
            "example" => Some(&self.example),
            "insight" => Some(&self.insight),
            "summary" => Some(&self.summary),
            _ => None,
        }
    }

    /// Загрузить сегменты из JSON файла
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Все ли сегменты пусты
    pub fn is_blank(&self) -> bool {
        SEGMENT_ORDER
            .iter()
            .all(|(key, _)| self.get(key).map_or(true, |text| text.trim().is_empty()))
    }

    /// Общее количество слов во всех сегментах
    pub fn word_count(&self) -> usize {
        SEGMENT_ORDER
            .iter()
            .filter_map(|(key, _)| self.get(key))
            .map(|text| text.split_whitespace().count())
            .sum()
    }
}
