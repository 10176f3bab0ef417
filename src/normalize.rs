//! Text normalization: lowercase, keep only `[a-z]` and whitespace,
//! split into tokens and drop stop words.

use fnv::FnvHashSet;
use itertools::Itertools;

/// Stop words removed when no other set is configured.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "of", "to", "in", "a", "is", "it", "that", "with",
];

// ASCII whitespace including vertical tab, same as the `\s` class.
#[inline]
fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

/// Turns raw lines into normalized tokens.
///
/// Holds no state between calls; the same line always yields the same tokens.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stop_words: FnvHashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_WORDS.iter().copied())
    }
}

impl Normalizer {
    /// Creates a normalizer with the given stop words (matched lowercase).
    pub fn new<I, S>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stop_words = stop_words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        Self { stop_words }
    }

    #[inline]
    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    /// Lazily yields the normalized tokens of `line`. Never yields empty tokens.
    pub fn normalize(&self, line: &str) -> Tokens<'_> {
        let cleaned = line
            .chars()
            .flat_map(char::to_lowercase)
            .filter(|&c| c.is_ascii_lowercase() || is_separator(c))
            .collect();
        Tokens {
            cleaned,
            pos: 0,
            normalizer: self,
        }
    }

    /// The normalized tokens of `line` joined by single spaces.
    pub fn normalize_to_string(&self, line: &str) -> String {
        self.normalize(line).join(" ")
    }
}

/// Adjacent word pairs of `text` as `w1_w2`.
///
/// Words are split on whitespace, lowercased and stripped to `[a-z]`. A word
/// that strips to nothing pairs with neither neighbour. Stop words are kept.
pub fn bigrams(text: &str) -> Vec<String> {
    text.split(is_separator)
        .filter(|word| !word.is_empty())
        .map(|word| {
            word.chars()
                .flat_map(char::to_lowercase)
                .filter(char::is_ascii_lowercase)
                .collect::<String>()
        })
        .tuple_windows()
        .filter(|(first, second)| !first.is_empty() && !second.is_empty())
        .map(|(first, second)| format!("{}_{}", first, second))
        .collect()
}

/// Iterator over the tokens of one normalized line, see [`Normalizer::normalize`].
#[derive(Debug)]
pub struct Tokens<'a> {
    cleaned: String,
    pos: usize,
    normalizer: &'a Normalizer,
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let rest = &self.cleaned[self.pos..];
            let token = rest.trim_start_matches(is_separator);
            if token.is_empty() {
                self.pos = self.cleaned.len();
                return None;
            }
            let start = self.pos + (rest.len() - token.len());
            let end = token
                .find(is_separator)
                .map_or(self.cleaned.len(), |i| start + i);
            self.pos = end;

            let token = &self.cleaned[start..end];
            if !self.normalizer.is_stop_word(token) {
                return Some(token.to_string());
            }
        }
    }
}
