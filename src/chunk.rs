//! Sentence-boundary text chunker.
//!
//! Splits free text into bounded-length segments that respect sentence
//! boundaries where possible, with a hard character split as the last
//! resort for a single oversized sentence. Chunk boundaries are
//! deterministic: downstream staleness checks compare chunk counts
//! between a corpus and its persisted embedding store, so the same
//! input must always produce the same chunks.
//!
//! Lengths are measured in characters, not bytes; the knowledge bases
//! this serves are Vietnamese-heavy and a byte cut could land inside a
//! multi-byte codepoint.

/// Split text into non-empty segments of at most `max_chars` characters.
///
/// Whitespace is normalized, the text is split on sentence-like
/// delimiters (`.`, `!`, `?`, `…`, and line breaks), and sentences are
/// greedily packed into each chunk. Empty or whitespace-only input
/// yields an empty list.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();

        // A single sentence over the bound gets hard-split on its own.
        if sentence_chars > max_chars {
            if !buf.is_empty() {
                chunks.push(std::mem::take(&mut buf));
                buf_chars = 0;
            }
            chunks.extend(hard_split(&sentence, max_chars));
            continue;
        }

        let would_be = if buf.is_empty() {
            sentence_chars
        } else {
            buf_chars + 1 + sentence_chars // +1 for the joining space
        };

        if would_be > max_chars && !buf.is_empty() {
            chunks.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }

        if !buf.is_empty() {
            buf.push(' ');
            buf_chars += 1;
        }
        buf.push_str(&sentence);
        buf_chars += sentence_chars;
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }

    chunks
}

/// Split into whitespace-normalized sentences, keeping terminal
/// punctuation attached. Line breaks also terminate a sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        match c {
            '.' | '!' | '?' | '…' => {
                current.push(c);
                push_normalized(&mut sentences, &current);
                current.clear();
            }
            '\n' => {
                push_normalized(&mut sentences, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_normalized(&mut sentences, &current);

    sentences
}

fn push_normalized(sentences: &mut Vec<String>, raw: &str) {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        sentences.push(normalized);
    }
}

/// Cut a single oversized sentence at fixed character offsets.
fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|piece| piece.iter().collect::<String>().trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}
