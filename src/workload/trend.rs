//! Stage 4: decade trends.
//!
//! Buckets sentiment scores (or lemma frequencies) by decade and reports
//! `value<TAB>count<TAB>min<TAB>max` per decade and, optionally, per book
//! within the decade.

use crate::fixed::Fixed;
use crate::keys::{decade_of, TrendKey};
use crate::record::ParsedRecord;
use crate::*;
use anyhow::{anyhow, bail, ensure, Result};
use bytes::Bytes;
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(no_binary_name = true)]
struct Args {
    /// Emit a `(book_id,decade)` record per book
    #[clap(long, action = ArgAction::Set, default_value_t = true)]
    book: bool,

    /// Emit a `decade` record over all books
    #[clap(long, action = ArgAction::Set, default_value_t = true)]
    overall: bool,

    /// Report the mean instead of the sum
    #[clap(long, action = ArgAction::Set, default_value_t = true)]
    average: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendOptions {
    pub include_book_level: bool,
    pub include_overall_level: bool,
    pub use_average: bool,
}

impl Default for TrendOptions {
    fn default() -> Self {
        Self {
            include_book_level: true,
            include_overall_level: true,
            use_average: true,
        }
    }
}

impl From<Args> for TrendOptions {
    fn from(args: Args) -> Self {
        Self {
            include_book_level: args.book,
            include_overall_level: args.overall,
            use_average: args.average,
        }
    }
}

/// Running statistics of one trend key. Sum, minimum and maximum are exact,
/// so merged partials match a single pass over all values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendStats {
    pub sum: Fixed,
    pub count: u64,
    pub min: Fixed,
    pub max: Fixed,
}

impl Default for TrendStats {
    fn default() -> Self {
        Self {
            sum: Fixed::ZERO,
            count: 0,
            min: Fixed::MAX,
            max: Fixed::MIN,
        }
    }
}

impl TrendStats {
    pub fn of(value: Fixed) -> Self {
        Self {
            sum: value,
            count: 1,
            min: value,
            max: value,
        }
    }

    pub fn merge(&mut self, other: TrendStats) {
        self.sum += other.sum;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// `value<TAB>count<TAB>min<TAB>max`, numbers with two decimals. The
    /// value is the mean or the sum. `None` when no value was seen.
    pub fn render(&self, use_average: bool) -> Option<String> {
        if self.count == 0 {
            return None;
        }
        let value = if use_average {
            self.sum.format_div(self.count, 2)
        } else {
            self.sum.format_div(1, 2)
        };
        Some(format!(
            "{}\t{}\t{}\t{}",
            value,
            self.count,
            self.min.format_div(1, 2),
            self.max.format_div(1, 2)
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendAggregation {
    options: TrendOptions,
}

impl TrendAggregation {
    pub fn new(options: TrendOptions) -> Result<Self> {
        ensure!(
            options.include_book_level || options.include_overall_level,
            "trend stage needs at least one of --book and --overall"
        );
        Ok(Self { options })
    }

    pub fn from_aux(aux: &Bytes) -> Result<Self> {
        let args: Args = utils::parse_aux(aux)?;
        Self::new(args.into())
    }

    pub fn options(&self) -> TrendOptions {
        self.options
    }

    /// Book id, year and value of one upstream line.
    fn parse_line(line: &str) -> Result<(&str, i32, Fixed)> {
        let (book_id, year, value) = match ParsedRecord::parse(line) {
            ParsedRecord::Preprocessed {
                book_id, year, text, ..
            } => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| anyhow!("score `{}` is not a number", text))?;
                (book_id, year, value)
            }
            ParsedRecord::Lemma {
                book_id,
                year,
                frequency: Some(frequency),
                ..
            } => (book_id, year, frequency as f64),
            ParsedRecord::Lemma { .. } => bail!("lemma row without a frequency: {:?}", line),
            ParsedRecord::Unrecognized => bail!("unrecognized record: {:?}", line),
        };
        let value = Fixed::from_f64(value)
            .ok_or_else(|| anyhow!("value out of range in {:?}", line))?;
        Ok((book_id, year, value))
    }

    fn map_line(&self, line: &str) -> Vec<Result<(TrendKey, Fixed)>> {
        let (book_id, year, value) = match Self::parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => return vec![Err(e)],
        };
        let Some(decade) = decade_of(year) else {
            return vec![Err(anyhow!("year {} has no decade", year))];
        };
        let mut records = Vec::with_capacity(2);
        if self.options.include_book_level {
            records.push(Ok((TrendKey::book(book_id, decade), value)));
        }
        if self.options.include_overall_level {
            records.push(Ok((TrendKey::overall(decade), value)));
        }
        records
    }
}

impl Workload for TrendAggregation {
    const NAME: &'static str = "trend";
    type Key = TrendKey;
    type Value = Fixed;
    type Acc = TrendStats;

    fn map(&self, input: KeyValue, _partition: usize) -> MapOutput<TrendKey, Fixed> {
        let content = String::from_utf8_lossy(&input.value);
        let records = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .flat_map(|line| self.map_line(line))
            .collect::<Vec<_>>();
        Ok(Box::new(records.into_iter()))
    }

    fn combine(&self, value: Fixed) -> TrendStats {
        TrendStats::of(value)
    }

    fn merge(&self, acc: &mut TrendStats, other: TrendStats) {
        acc.merge(other);
    }

    fn reduce(&self, key: &TrendKey, acc: TrendStats) -> Result<String> {
        acc.render(self.options.use_average)
            .ok_or_else(|| anyhow!("no values for trend key {}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standalone::engine::aggregate;
    use proptest::prelude::*;

    fn run(stage: &TrendAggregation, content: &str) -> Vec<String> {
        let input = vec![KeyValue::new(
            Bytes::from_static(b"part-all"),
            Bytes::from(content.to_string()),
        )];
        aggregate(stage, input, 4)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn averages_a_decade_and_its_books() {
        let lines = run(
            &TrendAggregation::default(),
            "(PG2701,1851)\t3.0\n(PG2701,1855)\t-2.0\n",
        );
        assert_eq!(
            lines,
            vec![
                "1850s\t0.50\t2\t-2.00\t3.00",
                "(PG2701,1850s)\t0.50\t2\t-2.00\t3.00",
            ]
        );
    }

    #[test]
    fn decade_summary_precedes_its_books() {
        let content = "\
(b,1861)\t1
(a,1869)\t2
(a,1852)\t4
(c,1860)\t-1
";
        let lines = run(&TrendAggregation::default(), content);
        assert_eq!(
            lines,
            vec![
                "1850s\t4.00\t1\t4.00\t4.00",
                "(a,1850s)\t4.00\t1\t4.00\t4.00",
                "1860s\t0.67\t3\t-1.00\t2.00",
                "(a,1860s)\t2.00\t1\t2.00\t2.00",
                "(b,1860s)\t1.00\t1\t1.00\t1.00",
                "(c,1860s)\t-1.00\t1\t-1.00\t-1.00",
            ]
        );
    }

    #[test]
    fn sums_lemma_frequencies_without_book_level() {
        let stage = TrendAggregation::new(TrendOptions {
            include_book_level: false,
            include_overall_level: true,
            use_average: false,
        })
        .unwrap();
        let content = "\
2701\twhale\t1851\t3
1342\tgreat\t1813\t1
2701\tgreat\t1851\t1
2701\tsea\t1851
(x,1851)\tnot-a-number
(x,1851)\tinf
";
        let lines = run(&stage, content);
        assert_eq!(
            lines,
            vec!["1810s\t1.00\t1\t1.00\t1.00", "1850s\t4.00\t2\t1.00\t3.00"]
        );
    }

    #[test]
    fn year_without_decade_is_dropped() {
        let lines = run(
            &TrendAggregation::default(),
            "(b,-2147483648)\t1\n(b,-2147483640)\t2\n",
        );
        assert_eq!(
            lines,
            vec![
                "-2147483640s\t2.00\t1\t2.00\t2.00",
                "(b,-2147483640s)\t2.00\t1\t2.00\t2.00",
            ]
        );
    }

    #[test]
    fn all_negative_group_reports_real_maximum() {
        let lines = run(
            &TrendAggregation::default(),
            "(b,1900)\t-3\n(b,1901)\t-1.5\n",
        );
        assert_eq!(lines[0], "1900s\t-2.25\t2\t-3.00\t-1.50");
    }

    #[test]
    fn needs_some_output_level() {
        assert!(TrendAggregation::new(TrendOptions {
            include_book_level: false,
            include_overall_level: false,
            use_average: true,
        })
        .is_err());
    }

    #[test]
    fn options_from_arguments() {
        let aux = utils::serialize_args(&["--book".into(), "false".into()]).unwrap();
        let stage = TrendAggregation::from_aux(&aux).unwrap();
        assert_eq!(
            stage.options(),
            TrendOptions {
                include_book_level: false,
                ..TrendOptions::default()
            }
        );
        assert_eq!(
            TrendAggregation::from_aux(&Bytes::new()).unwrap().options(),
            TrendOptions::default()
        );
    }

    #[test]
    fn rounding_boundary_is_stable_across_partitions() {
        let stage = TrendAggregation::new(TrendOptions {
            include_book_level: false,
            use_average: false,
            ..TrendOptions::default()
        })
        .unwrap();
        let partitions = |parts: &[&str]| -> Vec<String> {
            let inputs = parts
                .iter()
                .map(|content| {
                    KeyValue::new(Bytes::from_static(b"in"), Bytes::from(content.to_string()))
                })
                .collect();
            aggregate(&stage, inputs, 2)
                .unwrap()
                .iter()
                .map(ToString::to_string)
                .collect()
        };
        let whole = partitions(&["(x,1900)\t0.1\n(x,1900)\t0.2\n(x,1900)\t-0.295\n"]);
        let split = partitions(&["(x,1900)\t-0.295\n", "(x,1900)\t0.2\n(x,1900)\t0.1\n"]);
        assert_eq!(whole, vec!["1900s\t0.01\t3\t-0.30\t0.20"]);
        assert_eq!(split, whole);
    }

    proptest! {
        #[test]
        fn stats_merge_is_associative(
            values in prop::collection::vec(-1000.0f64..1000.0, 1..30),
            split in 0usize..30,
        ) {
            let values: Vec<Fixed> = values
                .into_iter()
                .filter_map(Fixed::from_f64)
                .collect();
            let split = split.min(values.len() - 1) + 1;
            let stage = TrendAggregation::default();
            let key = TrendKey::overall(1900);

            let direct = stage.reduce_values(&key, values.clone()).unwrap();
            let fold = |part: &[Fixed]| {
                part.iter().fold(TrendStats::default(), |mut acc, &v| {
                    acc.merge(TrendStats::of(v));
                    acc
                })
            };
            let mut right = fold(&values[split..]);
            stage.merge(&mut right, fold(&values[..split]));
            prop_assert_eq!(stage.reduce(&key, right).unwrap(), direct);
        }
    }
}
