//! Splitting narrative text into one narration segment per image.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TabiError};

/// Closing line appended after every segmentation.
///
/// Kept in Chinese regardless of the configured narration language.
pub const CLOSING_LINE: &str = "这次旅程真是令人难忘，下次还想再来！";

/// Sentence separators. The ASCII full stop is left out so decimals survive.
const SEPARATORS: &[char] = &['，', ',', '。', '！', '!', '？', '?', '…'];

/// A 1-indexed unit of narration text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub text: String,
}

impl Segment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self { index, text: text.into() }
    }
}

/// Split on sentence punctuation, trimming and dropping empty fragments
pub fn split_fragments(text: &str) -> Vec<String> {
    text.split(|c: char| SEPARATORS.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Produce exactly `image_count + 1` segments from `text`.
///
/// Surplus fragments are dropped; a shortfall is filled with random picks
/// from the existing fragments. The closing line is always last.
pub fn segment<R: Rng + ?Sized>(text: &str, image_count: usize, rng: &mut R) -> Result<Vec<Segment>> {
    let mut fragments = split_fragments(text);

    if fragments.is_empty() {
        return Err(TabiError::Precondition(
            "Input text contains no narratable sentence".to_string(),
        ));
    }

    if fragments.len() >= image_count {
        fragments.truncate(image_count);
    } else {
        let pool = fragments.clone();
        while fragments.len() < image_count {
            // pool is non-empty, checked above
            if let Some(pick) = pool.choose(rng) {
                fragments.push(pick.clone());
            }
        }
    }

    fragments.push(CLOSING_LINE.to_string());

    Ok(fragments
        .into_iter()
        .enumerate()
        .map(|(i, text)| Segment::new(i + 1, text))
        .collect())
}
