//! Вспомогательные функции для диагностических строк

/// Первые `limit` символов строки
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Последние `limit` символов строки
///
/// ffmpeg пишет причину ошибки в конец stderr, поэтому для диагностики
/// сохраняется хвост вывода.
pub fn tail_chars(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    text.chars().skip(count - limit).collect()
}
