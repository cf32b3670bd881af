//! Reply chunking and truncation for chat messages
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Character-count truncation for reminder tasks
//! - 1.0.0: Message chunking shared by listings and notifications

/// Discord message content limit
pub const MESSAGE_LIMIT: usize = 2000;

/// Split text into pieces of at most `max_size` bytes.
///
/// Breaks between lines where possible; a line that is too long by itself is
/// cut on character boundaries.
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.len() + line.len() > max_size {
            flush(&mut chunks, &mut current);
        }
        if line.len() <= max_size {
            current.push_str(line);
            continue;
        }
        for ch in line.chars() {
            if current.len() + ch.len_utf8() > max_size {
                flush(&mut chunks, &mut current);
            }
            current.push(ch);
        }
    }
    flush(&mut chunks, &mut current);

    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let chunk = current.trim_end_matches('\n');
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
    current.clear();
}

/// Chunk text for message content
pub fn chunk_for_message(text: &str) -> Vec<String> {
    chunk_text(text, MESSAGE_LIMIT)
}

/// Cut text down to the message limit, ending with an ellipsis when cut
pub fn truncate_for_message(text: &str) -> String {
    if text.len() <= MESSAGE_LIMIT {
        return text.to_string();
    }

    let end = text
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= MESSAGE_LIMIT - 3)
        .last()
        .unwrap_or(0);
    format!("{}...", &text[..end])
}

/// Keep at most `max_chars` characters, ending with an ellipsis when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
