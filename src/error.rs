//! Модуль обработки ошибок библиотеки narration-sync
//!
//! Все шаги конвейера озвучки возвращают [`NarrationError`]. Любая ошибка
//! прерывает задание целиком: повторных попыток нет.

use thiserror::Error;

/// Ошибки библиотеки narration-sync
#[derive(Debug, Error)]
pub enum NarrationError {
    /// Ошибка конфигурации (например, отсутствует API ключ)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// В синтез речи передан пустой текст
    #[error("Empty text passed to TTS")]
    EmptyInput,

    /// Провайдер TTS отклонил запрос
    #[error("TTS provider returned {status}: {body}")]
    Provider {
        /// HTTP статус ответа
        status: u16,
        /// Тело ответа, обрезанное для диагностики
        body: String,
    },

    /// Провайдер вернул подозрительно маленький аудиофайл
    #[error("TTS provider returned tiny audio ({bytes} bytes, expected at least {min})")]
    MalformedOutput {
        /// Размер полученных данных
        bytes: usize,
        /// Минимально допустимый размер
        min: usize,
    },

    /// Ошибка объединения аудиофрагментов
    #[error("Audio concatenation failed: {0}")]
    Concatenation(String),

    /// Ошибка сведения аудио и видео
    #[error("Mux failed: {0}")]
    Mux(String),

    /// Ошибка измерения длительности (только в строгом режиме)
    #[error("Duration probe failed for {path}: {reason}")]
    Probe {
        /// Путь к файлу
        path: String,
        /// Причина
        reason: String,
    },

    /// Внешний инструмент не уложился в отведённое время
    #[error("{tool} timed out after {secs}s")]
    Timeout {
        /// Имя инструмента
        tool: String,
        /// Предел в секундах
        secs: u64,
    },

    /// Все сегменты озвучки оказались пустыми
    #[error("All narration segments were empty")]
    NoNarration,

    /// Файл не найден
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Неизвестная тема
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl NarrationError {
    /// Является ли ошибка отказом внешнего инструмента (ffmpeg/ffprobe)
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::Concatenation(_) | Self::Mux(_) | Self::Probe { .. } | Self::Timeout { .. }
        )
    }
}

impl From<&str> for NarrationError {
    fn from(s: &str) -> Self {
        NarrationError::Other(s.to_string())
    }
}

impl From<String> for NarrationError {
    fn from(s: String) -> Self {
        NarrationError::Other(s)
    }
}

/// Тип Result для библиотеки narration-sync
pub type Result<T> = std::result::Result<T, NarrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message() {
        let err = NarrationError::Provider {
            status: 401,
            body: "invalid api key".to_string(),
        };
        assert_eq!(err.to_string(), "TTS provider returned 401: invalid api key");
        assert!(!err.is_tool_failure());
    }

    #[test]
    fn test_tool_failures() {
        assert!(NarrationError::Mux("boom".into()).is_tool_failure());
        assert!(NarrationError::Timeout { tool: "ffmpeg".into(), secs: 600 }.is_tool_failure());
        assert!(!NarrationError::NoNarration.is_tool_failure());
    }
}
