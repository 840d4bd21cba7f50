//! Модуль для интеграции с ElevenLabs API
//!
//! Один запрос на фрагмент, без повторных попыток и без запасного голоса.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use crate::config::{NarrationConfig, VoiceSettings};
use crate::error::{NarrationError, Result};
use crate::tts::SpeechSynthesizer;
use crate::utils::text::truncate_chars;

/// Сколько символов тела ошибки сохраняется для диагностики
const ERROR_BODY_LIMIT: usize = 300;

/// Тело запроса к ElevenLabs
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// Клиент ElevenLabs text-to-speech
pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    voice_settings: VoiceSettings,
    base_url: String,
    min_audio_bytes: usize,
}

impl ElevenLabsClient {
    /// Создать клиент на основе конфигурации конвейера
    pub fn new(config: &NarrationConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.provider_api_key.clone(),
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            voice_settings: config.voice_settings,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            min_audio_bytes: config.min_audio_bytes,
        }
    }

    /// Адрес эндпоинта для выбранного голоса
    pub fn endpoint(&self) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        if self.api_key.trim().is_empty() {
            log::error!("ElevenLabs API key is empty");
            return Err(NarrationError::Configuration(
                "ElevenLabs API key is required for TTS generation".to_string(),
            ));
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(NarrationError::EmptyInput);
        }

        log::info!("[TTS] {} chars -> ElevenLabs ({})", trimmed.chars().count(), self.voice_id);

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "audio/mpeg")
            .json(&SpeechRequest {
                text: trimmed,
                model_id: &self.model_id,
                voice_settings: self.voice_settings,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("Failed to read error response: {}", e),
            };
            log::error!("ElevenLabs API error (status {}): {}", status, error_text);
            return Err(NarrationError::Provider {
                status: status.as_u16(),
                body: truncate_chars(&error_text, ERROR_BODY_LIMIT),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.len() < self.min_audio_bytes {
            log::error!("ElevenLabs returned tiny audio ({} bytes)", bytes.len());
            return Err(NarrationError::MalformedOutput {
                bytes: bytes.len(),
                min: self.min_audio_bytes,
            });
        }

        log::info!("[TTS] OK - {} bytes", bytes.len());
        Ok(bytes)
    }
}
