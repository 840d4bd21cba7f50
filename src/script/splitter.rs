//! Разбиение текста озвучки на фрагменты по границам предложений
//!
//! Провайдер TTS ограничивает длину одного запроса, поэтому сценарий
//! делится на фрагменты не длиннее заданного предела. Разрыв допускается
//! только после знака конца предложения, за которым следует пробельный
//! символ или конец текста.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Один или несколько терминаторов и ровно один пробельный символ (или конец текста)
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]+(?:\s|$)").unwrap();
}

/// Разбить текст на предложения, сохраняя весь исходный текст
///
/// Пробельный символ после терминатора остаётся в конце предложения.
/// Хвост без терминатора возвращается последним элементом.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        sentences.push(&text[start..m.end()]);
        start = m.end();
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

/// Разбить сценарий на фрагменты длиной не более `max_chars` символов
///
/// Предложение, которое само по себе длиннее предела, становится отдельным
/// фрагментом без дальнейшего деления. Пустой сценарий даёт пустой список.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len > max_chars && current_len > 0 {
            push_trimmed(&mut chunks, &current);
            current.clear();
            current_len = 0;
        }

        current.push_str(sentence);
        current_len += sentence_len;
    }

    push_trimmed(&mut chunks, &current);
    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
