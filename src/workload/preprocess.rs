//! Stage 1: clean raw book text.
//!
//! Each partition is scanned line by line for the book's id, title and
//! release year. Once all three are known, every line is normalized and
//! keyed by `(book_id, title, year)`; the reducer concatenates a book's
//! lines in document order.
//!
//! Metadata comes from the Project Gutenberg header:
//!
//! ```text
//! Title: Moby Dick; Or, The Whale
//! Release date: June 1, 2001 [eBook #2701]
//! ```
//!
//! or from a file named `ID_Title_Year.txt`, where hyphens in the title
//! stand for spaces. Scan state belongs to one partition; a header split
//! across partitions is not recovered.

use crate::keys::BookKey;
use crate::normalize::{Normalizer, DEFAULT_STOP_WORDS};
use crate::*;
use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(no_binary_name = true)]
struct Args {
    /// Keep lines seen before the metadata is complete and emit them once it is
    #[clap(long)]
    buffer_pending: bool,

    /// Comma separated stop words replacing the default set
    #[clap(long, value_delimiter = ',')]
    stop_words: Option<Vec<String>>,
}

/// Where a line sits in the job's input: `(partition, line)`.
pub type Position = (usize, usize);

/// One normalized line and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub position: Position,
    pub text: String,
}

/// Progress of the metadata scan, named by the first missing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    AwaitingId,
    AwaitingTitle,
    AwaitingYear,
    Complete,
}

/// Book metadata collected while scanning one partition.
#[derive(Debug, Default)]
pub struct BookScanner {
    book_id: Option<String>,
    title: Option<String>,
    year: Option<i32>,
    pending: Vec<Fragment>,
}

impl BookScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scanner seeded from a file named `ID_Title_Year[.ext]`. Names that do
    /// not follow the convention seed nothing.
    pub fn from_file_name(name: &str) -> Self {
        let mut scanner = Self::new();
        let stem = Path::new(name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some((book_id, rest)) = stem.split_once('_') {
            if let Some((title, year)) = rest.rsplit_once('_') {
                if let (false, false, Ok(year)) =
                    (book_id.is_empty(), title.is_empty(), year.parse::<i32>())
                {
                    scanner.book_id = Some(book_id.to_string());
                    scanner.title = Some(title.replace('-', " "));
                    scanner.year = Some(year);
                }
            }
        }
        scanner
    }

    pub fn with_book_id(mut self, book_id: impl Into<String>) -> Self {
        self.book_id = Some(book_id.into());
        self
    }

    pub fn state(&self) -> ScanState {
        match (&self.book_id, &self.title, &self.year) {
            (None, _, _) => ScanState::AwaitingId,
            (_, None, _) => ScanState::AwaitingTitle,
            (_, _, None) => ScanState::AwaitingYear,
            _ => ScanState::Complete,
        }
    }

    /// Picks up any metadata field on `line` that is still missing.
    pub fn observe(&mut self, line: &str) {
        if self.book_id.is_none() {
            self.book_id = extract_book_id(line);
            if let Some(book_id) = &self.book_id {
                debug!(book_id = %book_id, "found book id");
            }
        }
        if self.title.is_none() {
            self.title = extract_title(line);
            if let Some(title) = &self.title {
                debug!(title = %title, "found title");
            }
        }
        if self.year.is_none() {
            self.year = extract_year(line);
            if let Some(year) = self.year {
                debug!(year, "found release year");
            }
        }
    }

    /// The key of the book being scanned, once the metadata is complete.
    pub fn key(&self) -> Option<BookKey> {
        match (&self.book_id, &self.title, self.year) {
            (Some(book_id), Some(title), Some(year)) => {
                Some(BookKey::new(book_id.as_str(), title.as_str(), year))
            }
            _ => None,
        }
    }

    fn hold(&mut self, fragment: Fragment) {
        self.pending.push(fragment);
    }

    fn take_pending(&mut self) -> Vec<Fragment> {
        std::mem::take(&mut self.pending)
    }
}

/// The id following `eBook #`, e.g. `2701` from `[eBook #2701]`.
pub fn extract_book_id(line: &str) -> Option<String> {
    let (_, rest) = line.split_once("eBook #")?;
    let id = rest
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric());
    (!id.is_empty()).then(|| id.to_string())
}

/// The text after `Title:`, cut at the first `(` and the first `,`.
pub fn extract_title(line: &str) -> Option<String> {
    let (_, title) = line.split_once("Title:")?;
    let title = title.split('(').next().unwrap_or_default();
    let title = title.split(',').next().unwrap_or_default().trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// The first four-digit token on a `Release date:` line.
pub fn extract_year(line: &str) -> Option<i32> {
    if !line.contains("Release date:") {
        return None;
    }
    line.split_whitespace()
        .map(|token| token.trim_matches(&['[', ']', '(', ')', ',', '.', ';', ':'][..]))
        .find(|token| token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|token| token.parse().ok())
}

/// The preprocessing stage.
#[derive(Debug, Clone, Default)]
pub struct Preprocessing {
    normalizer: Normalizer,
    buffer_pending: bool,
}

impl Preprocessing {
    pub fn new(normalizer: Normalizer, buffer_pending: bool) -> Self {
        Self {
            normalizer,
            buffer_pending,
        }
    }

    pub fn from_aux(aux: &Bytes) -> Result<Self> {
        let args: Args = utils::parse_aux(aux)?;
        let normalizer = match args.stop_words {
            Some(words) => Normalizer::new(words),
            None => Normalizer::new(DEFAULT_STOP_WORDS.iter().copied()),
        };
        Ok(Self::new(normalizer, args.buffer_pending))
    }
}

impl Workload for Preprocessing {
    const NAME: &'static str = "preprocess";
    type Key = BookKey;
    type Value = Fragment;
    type Acc = Vec<Fragment>;

    fn map(&self, input: KeyValue, partition: usize) -> MapOutput<BookKey, Fragment> {
        let name = String::from_utf8_lossy(&input.key).into_owned();
        let content = String::from_utf8_lossy(&input.value);
        let mut scanner = BookScanner::from_file_name(&name);
        let mut records: Vec<Result<(BookKey, Fragment)>> = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in content.lines().enumerate() {
            scanner.observe(line);
            let fragment = Fragment {
                position: (partition, line_no),
                text: self.normalizer.normalize_to_string(line),
            };
            match scanner.key() {
                Some(key) => {
                    for held in scanner.take_pending() {
                        records.push(Ok((key.clone(), held)));
                    }
                    records.push(Ok((key, fragment)));
                }
                None if self.buffer_pending => scanner.hold(fragment),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(
                partition = %name,
                skipped,
                state = ?scanner.state(),
                "skipped lines before book metadata"
            );
        }
        let unresolved = scanner.take_pending().len();
        if scanner.key().is_none() {
            warn!(
                partition = %name,
                state = ?scanner.state(),
                lines = skipped + unresolved,
                "book metadata never completed, partition produced no text"
            );
        }
        Ok(Box::new(records.into_iter()))
    }

    fn combine(&self, value: Fragment) -> Vec<Fragment> {
        vec![value]
    }

    fn merge(&self, acc: &mut Vec<Fragment>, other: Vec<Fragment>) {
        acc.extend(other);
    }

    fn reduce(&self, _key: &BookKey, mut acc: Vec<Fragment>) -> Result<String> {
        acc.sort_unstable_by_key(|fragment| fragment.position);
        let text = acc
            .iter()
            .map(|fragment| fragment.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(text)
    }
}
