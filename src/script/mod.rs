//! Модуль для подготовки текста озвучки
//!
//! Источник текста задаёт вызывающий слой: либо цельный сценарий, либо
//! шесть размеченных сегментов лекции. Здесь источник превращается в
//! упорядоченный список фрагментов для синтеза речи.

pub mod splitter;
pub mod segments;

pub use segments::{NarrationSegments, SEGMENT_ORDER};
pub use splitter::split_into_chunks;

/// Источник текста озвучки
#[derive(Debug, Clone)]
pub enum NarrationSource {
    /// Цельный сценарий, который делится на фрагменты `_chunk{N}`
    Script(String),
    /// Шесть размеченных сегментов, файлы `_seg{N}`
    Segments(NarrationSegments),
}

/// Запланированный фрагмент текста для одного запроса TTS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChunk {
    /// Метка для логов (например, `chunk3` или `S2-Intuition`)
    pub label: String,
    /// Суффикс имени файла после `{base}_`
    pub file_suffix: String,
    /// Текст фрагмента
    pub text: String,
}

impl NarrationSource {
    /// Количество слов в тексте озвучки
    pub fn word_count(&self) -> usize {
        match self {
            Self::Script(script) => script.split_whitespace().count(),
            Self::Segments(segments) => segments.word_count(),
        }
    }

    /// Разложить источник на фрагменты в порядке озвучки
    ///
    /// Пустые сегменты пропускаются с предупреждением. Сегмент длиннее
    /// предела дополнительно делится на части `_seg{N}_{K}`.
    pub fn plan(&self, max_chars: usize) -> Vec<PlannedChunk> {
        match self {
            Self::Script(script) => split_into_chunks(script, max_chars)
                .into_iter()
                .enumerate()
                .map(|(i, text)| PlannedChunk {
                    label: format!("chunk{}", i + 1),
                    file_suffix: format!("chunk{}", i + 1),
                    text,
                })
                .collect(),
            Self::Segments(segments) => {
                let mut planned = Vec::new();
                for (i, (key, label)) in SEGMENT_ORDER.iter().enumerate() {
                    let text = segments.get(key).unwrap_or("");
                    if text.trim().is_empty() {
                        log::warn!("{} is empty, skipping", label);
                        continue;
                    }

                    let parts = split_into_chunks(text, max_chars);
                    let single = parts.len() == 1;
                    for (k, part) in parts.into_iter().enumerate() {
                        let file_suffix = if single {
                            format!("seg{}", i + 1)
                        } else {
                            format!("seg{}_{}", i + 1, k + 1)
                        };
                        planned.push(PlannedChunk {
                            label: label.to_string(),
                            file_suffix,
                            text: part,
                        });
                    }
                }
                planned
            }
        }
    }
}
