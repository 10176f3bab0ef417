//! Converts pipeline stage names to the stage implementations.
//!
//! # Example
//!
//! ```
//! # use anyhow::Result;
//! use booktrends::workload::{self, Stage};
//! # fn main() -> Result<()> {
//! let stage = workload::named("sentiment")?;
//! assert_eq!(stage, Stage::Sentiment);
//! assert!(workload::named("wc").is_err());
//! # Ok(())
//! # }
//! ```

use crate::standalone::{engine, Job};
use crate::{utils, Workload};
use anyhow::{bail, Result};
use tracing::info;

pub mod lemma_freq;
pub mod preprocess;
pub mod sentiment;
pub mod trend;

pub use lemma_freq::LemmaFrequency;
pub use preprocess::Preprocessing;
pub use sentiment::SentimentScoring;
pub use trend::{TrendAggregation, TrendOptions};

/// The pipeline stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocess,
    LemmaFrequency,
    Sentiment,
    Trend,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Preprocess,
        Stage::LemmaFrequency,
        Stage::Sentiment,
        Stage::Trend,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Preprocess => Preprocessing::NAME,
            Stage::LemmaFrequency => LemmaFrequency::NAME,
            Stage::Sentiment => SentimentScoring::NAME,
            Stage::Trend => TrendAggregation::NAME,
        }
    }
}

/// Gets the [`Stage`] named `name`.
///
/// Returns [`None`] if no stage with the given name was found.
pub fn try_named(name: &str) -> Option<Stage> {
    Stage::ALL.into_iter().find(|stage| stage.name() == name)
}

/// Gets the [`Stage`] named `name`.
///
/// Returns an [`anyhow::Error`] if no stage with the given name was found.
pub fn named(name: &str) -> Result<Stage> {
    match try_named(name) {
        Some(stage) => Ok(stage),
        None => bail!("No stage named `{}` found.", name),
    }
}

/// Builds the stage named by `job` from its arguments and runs it.
///
/// Returns the number of records written.
pub fn run(job: &Job) -> Result<usize> {
    let stage = named(&job.workload)?;
    let aux = utils::serialize_args(&job.args)?;
    info!(stage = stage.name(), args = ?job.args, "configuring stage");
    match stage {
        Stage::Preprocess => engine::run_job(job, &Preprocessing::from_aux(&aux)?),
        Stage::LemmaFrequency => engine::run_job(job, &LemmaFrequency::from_aux(&aux)?),
        Stage::Sentiment => engine::run_job(job, &SentimentScoring::from_aux(&aux)?),
        Stage::Trend => engine::run_job(job, &TrendAggregation::from_aux(&aux)?),
    }
}
