//! Запуск внешних инструментов (ffmpeg, ffprobe)
//!
//! Инструмент вызывается напрямую со списком аргументов, stdout и stderr
//! перехватываются. Каждый вызов ограничен по времени; по истечении предела
//! процесс убивается.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use crate::error::{NarrationError, Result};

/// Результат выполнения внешнего инструмента
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Завершился ли процесс с нулевым кодом
    pub success: bool,
    /// Код возврата (None, если процесс убит сигналом)
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Имя инструмента для сообщений об ошибках
pub fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| program.display().to_string())
}

/// Запустить инструмент и дождаться завершения не дольше `limit`
///
/// Ненулевой код возврата не считается ошибкой на этом уровне: вызывающий
/// код сам решает, какой вариант ошибки вернуть.
pub async fn run_tool<I, S>(program: &Path, args: I, limit: Duration) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    log::debug!("Executing: {:?}", cmd);

    let output = match timeout(limit, cmd.output()).await {
        Ok(result) => result?,
        Err(_) => {
            let tool = tool_name(program);
            log::error!("{} timed out after {}s", tool, limit.as_secs());
            return Err(NarrationError::Timeout {
                tool,
                secs: limit.as_secs(),
            });
        }
    };

    let result = ToolOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    log::debug!("{} exited with {:?}", tool_name(program), result.code);
    Ok(result)
}
