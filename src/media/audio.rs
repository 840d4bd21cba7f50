//! Модуль для работы с аудио
//!
//! Объединение синтезированных фрагментов в одну дорожку.

use std::path::{Path, PathBuf};
use crate::error::{NarrationError, Result};
use crate::media::MediaProcessor;

/// Экранировать путь для списка concat demuxer
///
/// Внутри одинарных кавычек ffmpeg не понимает экранирование, поэтому
/// кавычка закрывается, экранируется и открывается снова.
pub fn escape_concat_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    normalized.replace('\'', r"'\''")
}

/// Содержимое файла со списком для concat demuxer
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| format!("file '{}'", escape_concat_path(path)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Записать файл со списком для concat demuxer
pub async fn write_concat_list(inputs: &[PathBuf], list_file: &Path) -> Result<()> {
    tokio::fs::write(list_file, concat_list(inputs)).await?;
    Ok(())
}

/// Объединить фрагменты в одну дорожку
///
/// Один фрагмент просто копируется, без вызова ffmpeg.
pub async fn concat_or_copy<M>(
    media: &M,
    inputs: &[PathBuf],
    list_file: &Path,
    output: &Path,
) -> Result<()>
where
    M: MediaProcessor + ?Sized,
{
    for input in inputs {
        let metadata = tokio::fs::metadata(input).await.map_err(|_| {
            NarrationError::Concatenation(format!("Input not found: {}", input.display()))
        })?;
        if metadata.len() == 0 {
            return Err(NarrationError::Concatenation(format!(
                "Input is empty: {}",
                input.display()
            )));
        }
    }

    match inputs {
        [] => Err(NarrationError::Concatenation("No audio files to concatenate".to_string())),
        [single] => {
            log::info!("[concat] single chunk, copying {}", single.display());
            tokio::fs::copy(single, output).await?;
            Ok(())
        }
        _ => {
            log::info!("[concat] concatenating {} chunks", inputs.len());
            media.concat_audio(inputs, list_file, output).await
        }
    }
}
