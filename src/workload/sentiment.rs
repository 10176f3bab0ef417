//! Stage 3: sentiment score per book and year.
//!
//! Accepts either preprocessing output (the text is scored word by word) or
//! lemma-frequency rows (the lemma is scored), detected per line. Every word
//! with a nonzero weight emits its weight, and a line with a nonzero total
//! emits that total once more. The reducer sums everything into
//! `(book_id,year)<TAB>score`.

use crate::fixed::Fixed;
use crate::keys::BookYearKey;
use crate::lexicon::Lexicon;
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
    /// `word<TAB>score` lexicon, e.g. AFINN. Defaults to a small built-in table
    #[clap(long)]
    lexicon: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct SentimentScoring {
    lexicon: Arc<Lexicon>,
}

impl SentimentScoring {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    pub fn from_aux(aux: &Bytes) -> Result<Self> {
        let args: Args = utils::parse_aux(aux)?;
        Ok(Self::new(Arc::new(Lexicon::load(args.lexicon.as_deref()))))
    }

    /// Per-word scores of `text` followed by the line total, zeros omitted.
    /// Weights are taken to the nearest billionth.
    pub fn scores(&self, text: &str) -> Vec<Fixed> {
        let mut scores: Vec<Fixed> = text
            .split_whitespace()
            .filter_map(|token| Fixed::from_f64(self.lexicon.score(token)))
            .filter(|score| !score.is_zero())
            .collect();
        let total: Fixed = scores.iter().copied().sum();
        if !total.is_zero() {
            scores.push(total);
        }
        scores
    }

    fn map_line(&self, line: &str) -> Vec<Result<(BookYearKey, Fixed)>> {
        let (book_id, year, text) = match ParsedRecord::parse(line) {
            ParsedRecord::Preprocessed {
                book_id, year, text, ..
            } => (book_id, year, text),
            ParsedRecord::Lemma {
                book_id,
                lemma,
                year,
                ..
            } => (book_id, year, lemma),
            ParsedRecord::Unrecognized => {
                return vec![Err(anyhow!("unrecognized record: {:?}", line))]
            }
        };
        let key = BookYearKey::new(book_id, year);
        self.scores(text)
            .into_iter()
            .map(|score| Ok((key.clone(), score)))
            .collect()
    }
}

impl Workload for SentimentScoring {
    const NAME: &'static str = "sentiment";
    type Key = BookYearKey;
    type Value = Fixed;
    type Acc = Fixed;

    fn map(&self, input: KeyValue, _partition: usize) -> MapOutput<BookYearKey, Fixed> {
        let content = String::from_utf8_lossy(&input.value);
        let records = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .flat_map(|line| self.map_line(line))
            .collect::<Vec<_>>();
        Ok(Box::new(records.into_iter()))
    }

    fn combine(&self, value: Fixed) -> Fixed {
        value
    }

    fn merge(&self, acc: &mut Fixed, other: Fixed) {
        *acc += other;
    }

    fn reduce(&self, _key: &BookYearKey, acc: Fixed) -> Result<String> {
        Ok(acc.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standalone::engine::aggregate;
    use proptest::prelude::*;

    fn great_only() -> SentimentScoring {
        SentimentScoring::new(Arc::new(Lexicon::from_entries([("great", 3.0)])))
    }

    fn score(value: f64) -> Fixed {
        Fixed::from_f64(value).unwrap()
    }

    fn partition(content: &str) -> KeyValue {
        KeyValue::new(Bytes::from_static(b"in"), Bytes::from(content.to_string()))
    }

    fn mapped(stage: &SentimentScoring, content: &str) -> Vec<(BookYearKey, Fixed)> {
        stage
            .map(partition(content), 0)
            .unwrap()
            .filter_map(|record| record.ok())
            .collect()
    }

    fn output(stage: &SentimentScoring, partitions: &[&str]) -> Vec<String> {
        let inputs = partitions.iter().map(|content| partition(content)).collect();
        aggregate(stage, inputs, 3)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn scores_token_then_total() {
        let records = mapped(&great_only(), "(PG2701,1851)\twhale great whale\n");
        let key = BookYearKey::new("PG2701", 1851);
        assert_eq!(records, vec![(key.clone(), score(3.0)), (key, score(3.0))]);
    }

    #[test]
    fn neutral_text_emits_nothing() {
        assert!(mapped(&great_only(), "(PG2701,1851)\twhale sea ship\n").is_empty());
    }

    #[test]
    fn accepts_both_upstream_formats_and_skips_the_rest() {
        let content = "\
2701,Moby Dick,1851\tgreat whale
PG2701\tgreat\t1851\t4
PG2701 great 1851
";
        let records = mapped(&great_only(), content);
        assert_eq!(
            records,
            vec![
                (BookYearKey::new("2701", 1851), score(3.0)),
                (BookYearKey::new("2701", 1851), score(3.0)),
                (BookYearKey::new("PG2701", 1851), score(3.0)),
                (BookYearKey::new("PG2701", 1851), score(3.0)),
            ]
        );
    }

    #[test]
    fn sums_per_book_and_year() {
        let content = "\
(PG2701,1851)\tgreat whale
(PG2701,1851)\tterrible storm
(PG1342,1813)\tvery happy
";
        // great: 3 + 3, terrible: -3 + -3, very happy: 0.5 + 2 + 2.5
        assert_eq!(
            output(&SentimentScoring::default(), &[content]),
            vec!["(PG1342,1813)\t5", "(PG2701,1851)\t0"]
        );
    }

    #[test]
    fn decimal_weights_sum_the_same_however_split() {
        let lexicon = Lexicon::from_entries([("a", 0.1), ("b", 0.2), ("c", 0.3)]);
        let stage = SentimentScoring::new(Arc::new(lexicon));
        let whole = output(&stage, &["(x,1900)\ta\n(x,1900)\tb\n(x,1900)\tc\n"]);
        let split = output(&stage, &["(x,1900)\tc\n", "(x,1900)\tb\n(x,1900)\ta\n"]);
        assert_eq!(whole, vec!["(x,1900)\t1.2"]);
        assert_eq!(split, whole);
    }

    proptest! {
        #[test]
        fn output_does_not_depend_on_partitioning(
            weights in prop::collection::vec(-100.0f64..100.0, 1..20),
            split in 0usize..20,
        ) {
            let lexicon = Lexicon::from_entries(
                weights.iter().enumerate().map(|(i, &w)| (format!("w{}", i), w)),
            );
            let stage = SentimentScoring::new(Arc::new(lexicon));
            let lines: Vec<String> = (0..weights.len())
                .map(|i| format!("(b,1900)\tw{}\n", i))
                .collect();
            let split = split.min(lines.len());

            let whole = output(&stage, &[lines.concat().as_str()]);
            let left = lines[..split].concat();
            let right: String = lines[split..].iter().rev().map(String::as_str).collect();
            let parted = output(&stage, &[right.as_str(), left.as_str()]);
            prop_assert_eq!(parted, whole);
        }
    }
}
