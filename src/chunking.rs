//! Splits long selections into speakable chunks on word boundaries.
//!
//! Lengths are counted in Unicode scalar values. Chunks are filled greedily
//! up to `max_len`; a word longer than `max_len` becomes its own chunk and is
//! never broken. When the final chunk would come out shorter than `min_len`,
//! trailing words of the previous chunk are moved into it until it reaches
//! `min_len` or the previous chunk would itself drop below `min_len`.
//!
//! `max_len` wins over `min_len`: a chunk before the last one is closed as
//! soon as the next word would overflow it, even if that leaves it shorter
//! than `min_len`.

use crate::ConfigError;

/// Length bounds for [`chunk_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBounds {
    max_len: usize,
    min_len: usize,
}

impl ChunkBounds {
    pub fn new(max_len: usize, min_len: usize) -> Result<Self, ConfigError> {
        if min_len == 0 || max_len < min_len {
            return Err(ConfigError::ChunkBounds {
                max: max_len,
                min: min_len,
            });
        }
        Ok(Self { max_len, min_len })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }
}

/// Split `text` into chunks joined by single spaces.
///
/// Empty or all-whitespace input yields no chunks.
pub fn chunk_text(text: &str, bounds: ChunkBounds) -> Vec<String> {
    let mut chunks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = char_len(word);
        if current.is_empty() {
            current.push(word);
            current_len = word_len;
            continue;
        }

        if current_len + 1 + word_len <= bounds.max_len {
            current.push(word);
            current_len += 1 + word_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        if let Some(previous) = chunks.last_mut() {
            rebalance_tail(previous, &mut current, bounds);
        }
        chunks.push(current);
    }

    log::debug!("Split {} chars into {} chunks", char_len(text), chunks.len());
    chunks.into_iter().map(|words| words.join(" ")).collect()
}

/// Move words from the end of `previous` to the front of `tail` while the
/// tail is short and both sides stay within bounds.
fn rebalance_tail<'a>(previous: &mut Vec<&'a str>, tail: &mut Vec<&'a str>, bounds: ChunkBounds) {
    let mut tail_len = words_len(tail);
    let mut previous_len = words_len(previous);

    while tail_len < bounds.min_len && previous.len() > 1 {
        let Some(&word) = previous.last() else {
            break;
        };
        let word_len = char_len(word);
        let new_previous_len = previous_len - word_len - 1;
        let new_tail_len = tail_len + 1 + word_len;
        if new_previous_len < bounds.min_len || new_tail_len > bounds.max_len {
            break;
        }
        previous.pop();
        tail.insert(0, word);
        previous_len = new_previous_len;
        tail_len = new_tail_len;
    }
}

fn words_len(words: &[&str]) -> usize {
    let chars: usize = words.iter().map(|w| char_len(w)).sum();
    chars + words.len().saturating_sub(1)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
