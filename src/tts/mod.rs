//! Модуль для работы с TTS
//!
//! Синтез речи скрыт за трейтом [`SpeechSynthesizer`], чтобы конвейер не
//! зависел от конкретного провайдера.

pub mod elevenlabs;

use async_trait::async_trait;
use bytes::Bytes;
use crate::error::Result;

pub use elevenlabs::ElevenLabsClient;

/// Синтезатор речи: текст на входе, байты аудио на выходе
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Синтезировать речь для непустого текста
    async fn synthesize(&self, text: &str) -> Result<Bytes>;
}
