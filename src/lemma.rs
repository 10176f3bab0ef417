//! The seam to the lemmatization service.
//!
//! Lemma-frequency counting only needs something that turns text into
//! lemmas, sentence by sentence. [`DictionaryLemmatizer`] is a deterministic
//! local stand-in: it maps word forms through a `form<TAB>lemma` table and
//! keeps unknown forms as they are.

use crate::utils;
use anyhow::{Context, Result};
use fnv::FnvHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// A lemmatization service.
///
/// Must be deterministic: identical text yields identical lemmas.
pub trait Lemmatizer: Send + Sync {
    /// The lemmas of `text`, one list per sentence.
    fn lemmatize(&self, text: &str) -> Vec<Vec<String>>;
}

/// Splits text into sentences at line ends and sentences into whitespace
/// separated words. Blank lines produce no sentence.
pub fn sentences(text: &str) -> impl Iterator<Item = Vec<&str>> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|words| !words.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct DictionaryLemmatizer {
    forms: FnvHashMap<String, String>,
}

impl DictionaryLemmatizer {
    /// A lemmatizer with an empty table, which returns every word lowercased.
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn from_entries<I, F, L>(entries: I) -> Self
    where
        I: IntoIterator<Item = (F, L)>,
        F: AsRef<str>,
        L: AsRef<str>,
    {
        let forms = entries
            .into_iter()
            .map(|(form, lemma)| (form.as_ref().to_lowercase(), lemma.as_ref().to_lowercase()))
            .collect();
        Self { forms }
    }

    /// Parses `form<TAB>lemma` lines. Lines without exactly two fields, or
    /// that are not UTF-8, are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut forms = FnvHashMap::default();
        for entry in utils::utf8_lines(reader, "dictionary") {
            let (line_no, line) = entry?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t').map(str::trim);
            match (fields.next(), fields.next(), fields.next()) {
                (Some(form), Some(lemma), None) if !form.is_empty() && !lemma.is_empty() => {
                    forms.insert(form.to_lowercase(), lemma.to_lowercase());
                }
                _ => warn!(line = line_no, "skipping malformed dictionary entry: {:?}", line),
            }
        }
        Ok(Self { forms })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open lemma dictionary {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to read lemma dictionary {}", path.display()))
    }

    /// Loads the dictionary at `source`. Falls back to [`passthrough`] when
    /// it cannot be read.
    ///
    /// [`passthrough`]: DictionaryLemmatizer::passthrough
    pub fn load(source: Option<&Path>) -> Self {
        let Some(path) = source else {
            return Self::passthrough();
        };
        match Self::open(path) {
            Ok(dictionary) => {
                info!(
                    path = %path.display(),
                    entries = dictionary.len(),
                    "loaded lemma dictionary"
                );
                dictionary
            }
            Err(err) => {
                warn!("{:#}; lemmatizing without a dictionary", err);
                Self::passthrough()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    fn lemma_of(&self, word: &str) -> String {
        let form = word.to_lowercase();
        match self.forms.get(&form) {
            Some(lemma) => lemma.clone(),
            None => form,
        }
    }
}

impl Lemmatizer for DictionaryLemmatizer {
    fn lemmatize(&self, text: &str) -> Vec<Vec<String>> {
        sentences(text)
            .map(|words| words.into_iter().map(|word| self.lemma_of(word)).collect())
            .collect()
    }
}
