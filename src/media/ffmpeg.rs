//! Реализация [`MediaProcessor`] поверх ffmpeg и ffprobe

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use crate::config::{resolve_tool, NarrationConfig, ToolTimeouts};
use crate::error::{NarrationError, Result};
use crate::media::audio::write_concat_list;
use crate::media::tool::{run_tool, tool_name, ToolOutput};
use crate::media::MediaProcessor;
use crate::utils::text::tail_chars;

/// Сколько символов stderr сохраняется при ошибке склейки
const CONCAT_STDERR_LIMIT: usize = 400;
/// Сколько символов stderr сохраняется при ошибке сведения
const MUX_STDERR_LIMIT: usize = 600;
/// Сколько символов stderr сохраняется при ошибке дополнения тишиной
const PAD_STDERR_LIMIT: usize = 300;
const PROBE_STDERR_LIMIT: usize = 200;

/// ffmpeg/ffprobe с пределами времени из конфигурации
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeouts: ToolTimeouts,
}

impl Ffmpeg {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>, timeouts: ToolTimeouts) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeouts,
        }
    }

    pub fn from_config(config: &NarrationConfig) -> Self {
        Self::new(&config.media_tool_path, &config.probe_tool_path, config.timeouts)
    }

    /// Получение версии ffmpeg
    pub async fn version(&self) -> Result<String> {
        let output = run_tool(&self.ffmpeg, ["-version"], self.timeouts.probe()).await?;
        if !output.success {
            return Err(NarrationError::Other("Failed to get FFmpeg version".to_string()));
        }
        Ok(output.stdout.lines().next().unwrap_or("").to_string())
    }
}

fn os(value: impl Into<OsString>) -> OsString {
    value.into()
}

/// Аргументы ffprobe для чтения длительности контейнера
pub fn probe_args(path: &Path) -> Vec<OsString> {
    vec![
        os("-v"), os("error"),
        os("-show_entries"), os("format=duration"),
        os("-of"), os("default=noprint_wrappers=1:nokey=1"),
        os(path),
    ]
}

/// Аргументы склейки через concat demuxer без перекодирования
pub fn concat_args(list_file: &Path, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-f"), os("concat"),
        os("-safe"), os("0"),
        os("-i"), os(list_file),
        os("-c"), os("copy"),
        os(output),
    ]
}

/// Аргументы дополнения аудио тишиной до заданной длительности
pub fn pad_args(input: &Path, output: &Path, target_secs: f64) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"), os(input),
        os("-af"), os(format!("apad=whole_dur={:.3}", target_secs)),
        os(output),
    ]
}

/// Аргументы сведения с замедлением видео
pub fn stretch_args(video: &Path, audio: &Path, output: &Path, ratio: f64) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"), os(video),
        os("-i"), os(audio),
        os("-map"), os("0:v:0"),
        os("-map"), os("1:a:0"),
        os("-filter:v"), os(format!("setpts={:.6}*PTS", ratio)),
        os("-c:a"), os("aac"),
        os("-shortest"),
        os(output),
    ]
}

/// Аргументы прямого сведения: видео копируется, аудио кодируется в AAC
pub fn direct_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"), os(video),
        os("-i"), os(audio),
        os("-map"), os("0:v:0"),
        os("-map"), os("1:a:0"),
        os("-c:v"), os("copy"),
        os("-c:a"), os("aac"),
        os("-shortest"),
        os(output),
    ]
}

/// Разобрать вывод ffprobe в секунды
pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

fn failure_details(output: &ToolOutput, limit: usize) -> String {
    format!("exit code {:?}: {}", output.code, tail_chars(output.stderr.trim(), limit))
}

impl Ffmpeg {
    async fn run_mux(&self, args: Vec<OsString>, limit: std::time::Duration, what: &str) -> Result<()> {
        let output = run_tool(&self.ffmpeg, args, limit).await?;
        if !output.success {
            let details = failure_details(&output, MUX_STDERR_LIMIT);
            log::error!("[merge] {} failed: {}", what, details);
            return Err(NarrationError::Mux(details));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaProcessor for Ffmpeg {
    async fn prepare(&self) -> Result<()> {
        let ffmpeg = resolve_tool(&self.ffmpeg)?;
        let ffprobe = resolve_tool(&self.ffprobe)?;
        log::debug!("Using media tools: {} / {}", ffmpeg.display(), ffprobe.display());
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = run_tool(&self.ffprobe, probe_args(path), self.timeouts.probe()).await?;

        if !output.success {
            return Err(NarrationError::Probe {
                path: path.display().to_string(),
                reason: failure_details(&output, PROBE_STDERR_LIMIT),
            });
        }

        parse_duration(&output.stdout).ok_or_else(|| NarrationError::Probe {
            path: path.display().to_string(),
            reason: format!("unparsable {} output: {:?}", tool_name(&self.ffprobe), output.stdout.trim()),
        })
    }

    async fn concat_audio(&self, inputs: &[PathBuf], list_file: &Path, output: &Path) -> Result<()> {
        write_concat_list(inputs, list_file).await?;

        let result = run_tool(&self.ffmpeg, concat_args(list_file, output), self.timeouts.concat()).await?;
        if !result.success {
            let details = failure_details(&result, CONCAT_STDERR_LIMIT);
            log::error!("[concat] ffmpeg failed: {}", details);
            return Err(NarrationError::Concatenation(details));
        }

        log::info!("[concat] {} files -> {}", inputs.len(), output.display());
        Ok(())
    }

    async fn pad_audio(&self, input: &Path, output: &Path, target_secs: f64) -> Result<()> {
        let result = run_tool(&self.ffmpeg, pad_args(input, output, target_secs), self.timeouts.pad()).await?;
        if !result.success {
            let details = failure_details(&result, PAD_STDERR_LIMIT);
            log::error!("[merge] pad failed: {}", details);
            return Err(NarrationError::Mux(format!("pad: {}", details)));
        }
        Ok(())
    }

    async fn stretch_merge(&self, video: &Path, audio: &Path, output: &Path, ratio: f64) -> Result<()> {
        self.run_mux(stretch_args(video, audio, output, ratio), self.timeouts.mux(), "slow-video merge")
            .await
    }

    async fn direct_merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.run_mux(direct_args(video, audio, output), self.timeouts.mux(), "direct merge")
            .await
    }
}
