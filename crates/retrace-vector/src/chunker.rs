//! Content-to-passage chunking.
//!
//! Splits extracted article text into quality-scored passages: sentence
//! segmentation at strong boundaries, greedy aggregation up to a word
//! cap with early close at paragraph starts, then a quality filter.
//! Pure functions, no I/O.

use retrace_core::config::ChunkingConfig;
use retrace_core::types::Passage;

/// A sentence with its position context within the source text.
#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    word_count: usize,
    /// True if this sentence opens a new paragraph (blank-line boundary).
    starts_paragraph: bool,
}

/// Truncate text to at most `max_chars` characters on a char boundary.
pub fn truncate_content(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Split extracted page text into passages.
///
/// Inputs below the configured size floor produce an empty vector, not
/// an error: a too-short page is simply not indexable. Oversized text is
/// truncated to `max_content_chars` before chunking. Passages come back
/// in source order with dense 0-based positions and no embeddings.
pub fn chunk(text: &str, config: &ChunkingConfig) -> Vec<Passage> {
    let text = truncate_content(text, config.max_content_chars);

    let trimmed = text.trim();
    if trimmed.chars().count() < config.min_chars
        || trimmed.split_whitespace().count() < config.min_words
    {
        return Vec::new();
    }

    let sentences = split_sentences(trimmed);
    let raw = aggregate(&sentences, config);

    let mut passages = Vec::new();
    for text in raw {
        if passages.len() >= config.max_passages_per_page {
            break;
        }
        let word_count = text.split_whitespace().count();
        let quality = passage_quality(&text, word_count);
        if quality < config.min_passage_quality {
            continue;
        }
        let position = passages.len() as u32;
        passages.push(Passage {
            id: position,
            text,
            word_count,
            position,
            quality,
            embedding: None,
        });
    }
    passages
}

/// Split text into sentences at strong boundaries: `.` `!` `?` followed
/// by whitespace, and newline groups. Blank-line groups additionally
/// mark a paragraph start on the following sentence.
fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();

    for (par_index, paragraph) in text.split("\n\n").enumerate() {
        let mut first_in_paragraph = par_index > 0;

        for line in paragraph.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut current = String::new();
            let mut chars = line.chars().peekable();
            while let Some(ch) = chars.next() {
                current.push(ch);
                let at_terminator = matches!(ch, '.' | '!' | '?');
                let next_is_break = chars.peek().map(|c| c.is_whitespace()).unwrap_or(true);
                if at_terminator && next_is_break {
                    push_sentence(&mut sentences, &current, &mut first_in_paragraph);
                    current.clear();
                }
            }
            // Line end is a strong boundary even without punctuation.
            push_sentence(&mut sentences, &current, &mut first_in_paragraph);
        }
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<Sentence>, raw: &str, first_in_paragraph: &mut bool) {
    let text = raw.trim();
    if text.is_empty() {
        return;
    }
    sentences.push(Sentence {
        text: text.to_string(),
        word_count: text.split_whitespace().count(),
        starts_paragraph: std::mem::take(first_in_paragraph),
    });
}

/// Greedy sentence aggregation.
///
/// Appends sentences until the next one would exceed the word cap. A
/// passage that has reached `sibling_merge_threshold` of the cap also
/// closes early when the next sentence starts a new paragraph, so
/// passages prefer semantic boundaries over raw size.
fn aggregate(sentences: &[Sentence], config: &ChunkingConfig) -> Vec<String> {
    let close_at = (config.max_words_per_passage as f64 * config.sibling_merge_threshold) as usize;

    let mut passages = Vec::new();
    let mut current = String::new();
    let mut current_words = 0usize;

    for sentence in sentences {
        let overflow =
            current_words > 0 && current_words + sentence.word_count > config.max_words_per_passage;
        let paragraph_close = current_words >= close_at && sentence.starts_paragraph;

        if overflow || paragraph_close {
            passages.push(std::mem::take(&mut current));
            current_words = 0;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence.text);
        current_words += sentence.word_count;
    }

    if !current.is_empty() {
        passages.push(current);
    }
    passages
}

/// Quality score in [0, 1] for a candidate passage.
///
/// Word count (peak near 50-150 words) and sentence-boundary alignment
/// form the base score; the alphabetic-character ratio scales it, so
/// digit- or symbol-dominated spans fall below the keep threshold no
/// matter how long they are. Passages under 5 words score 0 and are
/// always dropped.
fn passage_quality(text: &str, word_count: usize) -> f64 {
    if word_count < 5 {
        return 0.0;
    }

    let word_score = if word_count < 50 {
        word_count as f64 / 50.0
    } else if word_count <= 150 {
        1.0
    } else {
        (1.0 - (word_count as f64 - 150.0) / 200.0).max(0.5)
    };

    let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let alpha_ratio = if visible.is_empty() {
        0.0
    } else {
        visible.iter().filter(|c| c.is_alphabetic()).count() as f64 / visible.len() as f64
    };

    let boundary_score = match text.trim_end().chars().last() {
        Some('.') | Some('!') | Some('?') | Some('"') | Some('\'') | Some(')') => 1.0,
        _ => 0.6,
    };

    (alpha_ratio * (0.6 * word_score + 0.4 * boundary_score)).clamp(0.0, 1.0)
}
