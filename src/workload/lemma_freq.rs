//! Stage 2: lemma frequencies per book.
//!
//! Reads preprocessing output (`book_id,title,year<TAB>text`), lemmatizes
//! the text and counts each lemma per `(book_id, lemma, year)`. Output lines
//! read `book_id<TAB>lemma<TAB>year<TAB>count`.

use crate::keys::LemmaKey;
use crate::lemma::{DictionaryLemmatizer, Lemmatizer};
use crate::normalize;
use crate::record::ParsedRecord;
use crate::*;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(no_binary_name = true)]
struct Args {
    /// `form<TAB>lemma` dictionary used for lemmatization
    #[clap(long)]
    dictionary: Option<PathBuf>,

    /// Count adjacent word pairs (`w1_w2`) instead of lemmas
    #[clap(long)]
    bigrams: bool,
}

/// Only alphabetic lemmas longer than one character are counted.
pub fn is_countable(lemma: &str) -> bool {
    lemma.len() > 1 && lemma.bytes().all(|b| b.is_ascii_alphabetic())
}

pub struct LemmaFrequency {
    lemmatizer: Arc<dyn Lemmatizer>,
    bigrams: bool,
}

impl Default for LemmaFrequency {
    fn default() -> Self {
        Self::new(Arc::new(DictionaryLemmatizer::passthrough()))
    }
}

impl LemmaFrequency {
    pub fn new(lemmatizer: Arc<dyn Lemmatizer>) -> Self {
        Self {
            lemmatizer,
            bigrams: false,
        }
    }

    /// Counts bigrams of the cleaned text in place of lemmas.
    pub fn bigrams() -> Self {
        Self {
            bigrams: true,
            ..Self::default()
        }
    }

    pub fn from_aux(aux: &Bytes) -> Result<Self> {
        let args: Args = utils::parse_aux(aux)?;
        if args.bigrams {
            return Ok(Self::bigrams());
        }
        let dictionary = DictionaryLemmatizer::load(args.dictionary.as_deref());
        Ok(Self::new(Arc::new(dictionary)))
    }

    fn terms(&self, text: &str) -> Vec<String> {
        if self.bigrams {
            return normalize::bigrams(text);
        }
        self.lemmatizer
            .lemmatize(text)
            .into_iter()
            .flatten()
            .filter(|lemma| is_countable(lemma))
            .map(|lemma| lemma.to_ascii_lowercase())
            .collect()
    }

    fn map_line(&self, line: &str) -> Vec<Result<(LemmaKey, u64)>> {
        let (book_id, year, text) = match ParsedRecord::parse(line) {
            ParsedRecord::Preprocessed {
                book_id, year, text, ..
            } => (book_id, year, text),
            _ => return vec![Err(anyhow!("not a preprocessed record: {:?}", line))],
        };
        self.terms(text)
            .into_iter()
            .map(|term| Ok((LemmaKey::new(book_id, term, year), 1)))
            .collect()
    }
}

impl Workload for LemmaFrequency {
    const NAME: &'static str = "lemma-freq";
    type Key = LemmaKey;
    type Value = u64;
    type Acc = u64;

    fn map(&self, input: KeyValue, _partition: usize) -> MapOutput<LemmaKey, u64> {
        let content = String::from_utf8_lossy(&input.value);
        let records = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .flat_map(|line| self.map_line(line))
            .collect::<Vec<_>>();
        Ok(Box::new(records.into_iter()))
    }

    fn combine(&self, value: u64) -> u64 {
        value
    }

    fn merge(&self, acc: &mut u64, other: u64) {
        *acc += other;
    }

    fn reduce(&self, _key: &LemmaKey, acc: u64) -> Result<String> {
        Ok(acc.to_string())
    }
}
