//! Модуль конфигурации библиотеки narration-sync
//!
//! Конфигурация передаётся в конвейер явно при создании. Пути, зависящие от
//! окружения (каталог вывода), не имеют значений по умолчанию; инструменты
//! по умолчанию ищутся в `PATH` по имени программы.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{NarrationError, Result};

/// Модель ElevenLabs по умолчанию
pub const DEFAULT_MODEL_ID: &str = "eleven_turbo_v2_5";
/// Безопасный предел символов на один запрос ElevenLabs
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 2400;
/// Порог расхождения длительностей, после которого меняется стратегия сведения
pub const DEFAULT_THRESHOLD_SECS: f64 = 5.0;

/// Параметры голоса, передаваемые провайдеру
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VoiceSettings {
    /// Стабильность голоса (0.0 - 1.0)
    pub stability: f32,
    /// Похожесть на исходный голос (0.0 - 1.0)
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.45,
            similarity_boost: 0.80,
        }
    }
}

/// Пределы времени выполнения внешних инструментов, в секундах
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolTimeouts {
    pub probe_secs: u64,
    pub concat_secs: u64,
    pub pad_secs: u64,
    pub mux_secs: u64,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            probe_secs: 30,
            concat_secs: 180,
            pad_secs: 120,
            mux_secs: 600,
        }
    }
}

impl ToolTimeouts {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn concat(&self) -> Duration {
        Duration::from_secs(self.concat_secs)
    }

    pub fn pad(&self) -> Duration {
        Duration::from_secs(self.pad_secs)
    }

    pub fn mux(&self) -> Duration {
        Duration::from_secs(self.mux_secs)
    }
}

/// Конфигурация конвейера озвучки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    /// Путь к ffmpeg (или имя программы в `PATH`)
    #[serde(default = "default_media_tool")]
    pub media_tool_path: PathBuf,
    /// Путь к ffprobe (или имя программы в `PATH`)
    #[serde(default = "default_probe_tool")]
    pub probe_tool_path: PathBuf,
    /// API ключ ElevenLabs
    #[serde(default)]
    pub provider_api_key: String,
    /// Идентификатор голоса
    pub voice_id: String,
    /// Идентификатор модели
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Параметры голоса
    #[serde(default)]
    pub voice_settings: VoiceSettings,
    /// Базовый URL API провайдера
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Каталог для промежуточных и итоговых файлов
    pub output_directory: PathBuf,
    /// Порог расхождения длительностей аудио и видео
    #[serde(default = "default_threshold")]
    pub duration_threshold_seconds: f64,
    /// Максимальная длина фрагмента текста для одного запроса TTS
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// Минимальный правдоподобный размер аудио от провайдера
    #[serde(default = "default_min_audio_bytes")]
    pub min_audio_bytes: usize,
    /// Расширение аудиофайлов
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,
    /// Расширение итогового видео
    #[serde(default = "default_video_extension")]
    pub video_extension: String,
    /// Пределы времени для ffmpeg/ffprobe
    #[serde(default)]
    pub timeouts: ToolTimeouts,
    /// Считать ошибку измерения длительности фатальной
    #[serde(default)]
    pub strict_probe: bool,
    /// Удалять временные файлы после успешного завершения
    #[serde(default = "default_true")]
    pub cleanup_temp_files: bool,
}

fn default_media_tool() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_probe_tool() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_api_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD_SECS
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}

fn default_min_audio_bytes() -> usize {
    500
}

fn default_audio_extension() -> String {
    "mp3".to_string()
}

fn default_video_extension() -> String {
    "mp4".to_string()
}

fn default_true() -> bool {
    true
}

impl NarrationConfig {
    /// Создать конфигурацию с обязательными параметрами и настройками по умолчанию
    pub fn new(
        output_directory: impl Into<PathBuf>,
        provider_api_key: impl Into<String>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            media_tool_path: default_media_tool(),
            probe_tool_path: default_probe_tool(),
            provider_api_key: provider_api_key.into(),
            voice_id: voice_id.into(),
            model_id: default_model_id(),
            voice_settings: VoiceSettings::default(),
            api_base_url: default_api_base_url(),
            output_directory: output_directory.into(),
            duration_threshold_seconds: default_threshold(),
            max_chunk_chars: default_max_chunk_chars(),
            min_audio_bytes: default_min_audio_bytes(),
            audio_extension: default_audio_extension(),
            video_extension: default_video_extension(),
            timeouts: ToolTimeouts::default(),
            strict_probe: false,
            cleanup_temp_files: true,
        }
    }

    /// Загрузить конфигурацию из JSON файла
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NarrationError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Загрузить конфигурацию из переменных окружения
    ///
    /// `NARRATION_OUTPUT_DIR` и `NARRATION_VOICE_ID` обязательны. Ключ
    /// `ELEVENLABS_API_KEY` проверяется позже, в [`NarrationConfig::validate`],
    /// чтобы попадание в кэш работало и без него.
    pub fn from_env() -> Result<Self> {
        let output_directory = require_env("NARRATION_OUTPUT_DIR")?;
        let voice_id = require_env("NARRATION_VOICE_ID")?;
        let api_key = std::env::var("ELEVENLABS_API_KEY").unwrap_or_default();

        let mut config = Self::new(output_directory, api_key, voice_id);

        if let Ok(model) = std::env::var("NARRATION_MODEL_ID") {
            config.model_id = model;
        }
        if let Ok(ffmpeg) = std::env::var("NARRATION_FFMPEG") {
            config.media_tool_path = PathBuf::from(ffmpeg);
        }
        if let Ok(ffprobe) = std::env::var("NARRATION_FFPROBE") {
            config.probe_tool_path = PathBuf::from(ffprobe);
        }
        if let Ok(url) = std::env::var("NARRATION_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(threshold) = parse_env::<f64>("NARRATION_THRESHOLD_SECS")? {
            config.duration_threshold_seconds = threshold;
        }
        if let Some(max_chars) = parse_env::<usize>("NARRATION_MAX_CHUNK_CHARS")? {
            config.max_chunk_chars = max_chars;
        }
        if let Some(strict) = parse_env::<bool>("NARRATION_STRICT_PROBE")? {
            config.strict_probe = strict;
        }

        Ok(config)
    }

    /// Проверить конфигурацию перед началом работы
    pub fn validate(&self) -> Result<()> {
        if self.provider_api_key.trim().is_empty() {
            return Err(NarrationError::Configuration(
                "ElevenLabs API key is not set".to_string(),
            ));
        }
        if self.voice_id.trim().is_empty() {
            return Err(NarrationError::Configuration("Voice id is not set".to_string()));
        }
        if self.max_chunk_chars == 0 {
            return Err(NarrationError::Configuration(
                "max_chunk_chars must be greater than zero".to_string(),
            ));
        }
        if !self.duration_threshold_seconds.is_finite() || self.duration_threshold_seconds < 0.0 {
            return Err(NarrationError::Configuration(format!(
                "Invalid duration threshold: {}",
                self.duration_threshold_seconds
            )));
        }
        Ok(())
    }
}

/// Найти программу в `PATH`, если задано только её имя
pub(crate) fn resolve_tool(tool: &Path) -> Result<PathBuf> {
    if tool.components().count() > 1 {
        return Ok(tool.to_path_buf());
    }
    which::which(tool).map_err(|e| {
        NarrationError::Configuration(format!("{} not found in PATH: {}", tool.display(), e))
    })
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(NarrationError::Configuration(format!("{} is not set", name))),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| NarrationError::Configuration(format!("Invalid value for {}: {}", name, raw))),
        Err(_) => Ok(None),
    }
}
