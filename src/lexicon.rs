//! Sentiment lexicon: an immutable word → weight table.
//!
//! Loaded once per worker from a `word<TAB>score` file. When the file is
//! missing, unreadable or has no usable entries, the built-in
//! [`FALLBACK_LEXICON`] is used instead, so a [`Lexicon`] is never empty.

use crate::utils;
use anyhow::{Context, Result};
use fnv::FnvHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Words and weights used when no lexicon file can be loaded.
pub const FALLBACK_LEXICON: &[(&str, f64)] = &[
    ("good", 2.0),
    ("great", 3.0),
    ("excellent", 3.0),
    ("happy", 2.0),
    ("love", 3.0),
    ("wonderful", 3.0),
    ("joy", 2.0),
    ("success", 2.0),
    ("beautiful", 2.0),
    ("best", 3.0),
    ("bad", -2.0),
    ("awful", -3.0),
    ("terrible", -3.0),
    ("sad", -2.0),
    ("hate", -3.0),
    ("poor", -2.0),
    ("fail", -2.0),
    ("failure", -2.0),
    ("worst", -3.0),
    ("angry", -2.0),
    // modifiers
    ("very", 0.5),
    ("not", -1.0),
    ("no", -1.0),
];

/// Where the entries of a [`Lexicon`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexiconSource {
    File(PathBuf),
    Reader,
    Builtin,
}

#[derive(Debug, Clone)]
pub struct Lexicon {
    scores: FnvHashMap<String, f64>,
    source: LexiconSource,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Lexicon {
    /// The built-in fallback table.
    pub fn builtin() -> Self {
        let scores = FALLBACK_LEXICON
            .iter()
            .map(|&(word, score)| (word.to_string(), score))
            .collect();
        Self {
            scores,
            source: LexiconSource::Builtin,
        }
    }

    /// Builds a lexicon from explicit entries. Words are lowercased and
    /// non-finite weights are ignored.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let scores = entries
            .into_iter()
            .filter(|(_, score)| score.is_finite())
            .map(|(word, score)| (word.as_ref().trim().to_lowercase(), score))
            .collect();
        Self {
            scores,
            source: LexiconSource::Reader,
        }
    }

    /// Parses `word<TAB>score` lines. Malformed lines, including lines that
    /// are not UTF-8, are skipped with a warning; only I/O errors are returned.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut scores = FnvHashMap::default();
        for entry in utils::utf8_lines(reader, "lexicon") {
            let (line_no, line) = entry?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_entry(&line) {
                Some((word, score)) => {
                    scores.insert(word, score);
                }
                None => warn!(line = line_no, "skipping malformed lexicon entry: {:?}", line),
            }
        }
        Ok(Self {
            scores,
            source: LexiconSource::Reader,
        })
    }

    /// Reads a lexicon file. The file is closed before this returns.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open lexicon {}", path.display()))?;
        let mut lexicon = Self::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to read lexicon {}", path.display()))?;
        lexicon.source = LexiconSource::File(path.to_path_buf());
        Ok(lexicon)
    }

    /// Loads the lexicon at `source`, falling back to [`Lexicon::builtin`]
    /// when there is no source, it cannot be read, or it has no entries.
    pub fn load(source: Option<&Path>) -> Self {
        let Some(path) = source else {
            debug!("no lexicon configured, using built-in table");
            return Self::builtin();
        };
        match Self::open(path) {
            Ok(lexicon) if !lexicon.is_empty() => {
                info!(path = %path.display(), entries = lexicon.len(), "loaded sentiment lexicon");
                lexicon
            }
            Ok(_) => {
                warn!(
                    path = %path.display(),
                    "lexicon has no usable entries, using built-in table"
                );
                Self::builtin()
            }
            Err(err) => {
                warn!("{:#}; using built-in table", err);
                Self::builtin()
            }
        }
    }

    /// The weight of `word`, case-insensitively. Unknown words score `0.0`.
    pub fn score(&self, word: &str) -> f64 {
        let score = if word.chars().any(char::is_uppercase) {
            self.scores.get(&word.to_lowercase())
        } else {
            self.scores.get(word)
        };
        score.copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn source(&self) -> &LexiconSource {
        &self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == LexiconSource::Builtin
    }
}

fn parse_entry(line: &str) -> Option<(String, f64)> {
    let (word, score) = line.split_once('\t')?;
    if score.contains('\t') {
        return None;
    }
    let word = word.trim().to_lowercase();
    let score: f64 = score.trim().parse().ok()?;
    (!word.is_empty() && score.is_finite()).then_some((word, score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::{Cursor, Write};

    #[test]
    fn parses_tab_separated_entries_and_skips_bad_lines() {
        let input = "abandon\t-2\nGreat\t3.5\nno-tab-here\nfoo\tbar\nx\t1\t2\n\nbig\tinf\n";
        let lexicon = Lexicon::from_reader(Cursor::new(input)).unwrap();
        assert_eq!(lexicon.len(), 2);
        assert_eq!(lexicon.score("abandon"), -2.0);
        assert_eq!(lexicon.score("great"), 3.5);
        assert_eq!(lexicon.score("foo"), 0.0);
        assert_eq!(lexicon.score("big"), 0.0);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let lexicon = Lexicon::builtin();
        assert_eq!(lexicon.score("GREAT"), 3.0);
        assert_eq!(lexicon.score("Worst"), -3.0);
        assert_eq!(lexicon.score("whale"), 0.0);
    }

    #[test]
    fn builtin_table_is_complete() {
        let lexicon = Lexicon::builtin();
        assert_eq!(lexicon.len(), 23);
        assert!(lexicon.is_fallback());
        assert_eq!(lexicon.score("very"), 0.5);
        assert_eq!(lexicon.score("not"), -1.0);
    }

    #[test]
    fn load_falls_back_when_source_is_missing() {
        assert!(Lexicon::load(None).is_fallback());
        let missing = Lexicon::load(Some(Path::new("/definitely/not/here/afinn.txt")));
        assert!(missing.is_fallback());
        assert_eq!(missing.score("great"), 3.0);
    }

    #[test]
    fn load_falls_back_when_file_has_no_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "garbage line").unwrap();
        assert!(Lexicon::load(Some(file.path())).is_fallback());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "whale\t1.5").unwrap();
        writeln!(file, "storm\t-2").unwrap();
        let lexicon = Lexicon::load(Some(file.path()));
        assert_eq!(lexicon.source(), &LexiconSource::File(file.path().to_path_buf()));
        assert_eq!(lexicon.score("whale"), 1.5);
        assert_eq!(lexicon.score("great"), 0.0);
    }

    #[test]
    fn latin1_line_does_not_discard_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"whale\t1.5\ncaf\xe9\t2\nstorm\t-2\n").unwrap();
        let lexicon = Lexicon::load(Some(file.path()));
        assert!(!lexicon.is_fallback());
        assert_eq!(lexicon.len(), 2);
        assert_eq!(lexicon.score("whale"), 1.5);
        assert_eq!(lexicon.score("storm"), -2.0);
    }

    proptest! {
        #[test]
        fn score_is_total_and_finite(word in "\\PC{0,24}") {
            let score = Lexicon::builtin().score(&word);
            prop_assert!(score.is_finite());
        }
    }
}
