//! Нормализация путей

use std::path::{Path, PathBuf};
use path_clean::PathClean;
use crate::error::Result;

/// Абсолютный нормализованный путь (без обращения к файловой системе)
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(joined.clean())
}

/// Путь относительно каталога `base`, если он не абсолютный
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        base.join(path).clean()
    }
}
