//! A four-stage batch analytics pipeline over a corpus of digitized books.
//!
//! Every stage is a MapReduce-style [`Workload`]: it extracts a composite key
//! and a value from each input record, the engine groups values by key, and
//! the workload reduces each group into one output line. The stages are
//! preprocessing, lemma frequency, sentiment scoring and decade trends, see
//! [`workload`]. Execution is local and parallel, see [`standalone`].

use bytes::Bytes;
use std::hash::Hasher;

pub mod fixed;
pub mod keys;
pub mod lemma;
pub mod lexicon;
pub mod normalize;
pub mod record;
pub mod standalone;
pub mod utils;
pub mod workload;

use keys::CompositeKey;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of a workload's map function over one input partition.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that make the whole partition unusable.
/// The inner layer accounts for errors in single records, which the
/// engine logs and drops without aborting the partition.
pub type MapOutput<K, V> = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<(K, V)>>>>;

/// A map reduce application.
///
/// `map` turns one input partition into keyed values. The reduction is split
/// the way a combiner needs it: `combine` lifts a single value into an
/// accumulator, `merge` folds two accumulators for the same key, and
/// `reduce` renders the final accumulator. `merge` must be associative and
/// commutative, since partial accumulators built on different partitions
/// are merged in no particular order.
pub trait Workload: Send + Sync {
    /// Name used in logs and on the command line.
    const NAME: &'static str;

    type Key: CompositeKey;
    type Value: Send;
    type Acc: Send + Sync;

    /// Maps one input partition. `input.key` is the partition name (a file
    /// path), `input.value` its raw content. `partition` is the ordinal of the
    /// partition within the job.
    fn map(&self, input: KeyValue, partition: usize) -> MapOutput<Self::Key, Self::Value>;

    fn combine(&self, value: Self::Value) -> Self::Acc;

    fn merge(&self, acc: &mut Self::Acc, other: Self::Acc);

    /// Renders the output value for `key`.
    fn reduce(&self, key: &Self::Key, acc: Self::Acc) -> anyhow::Result<String>;

    /// Reduces a whole group of values directly, without partial accumulation.
    ///
    /// Returns an error if `values` is empty.
    fn reduce_values<I>(&self, key: &Self::Key, values: I) -> anyhow::Result<String>
    where
        I: IntoIterator<Item = Self::Value>,
    {
        let acc = values
            .into_iter()
            .map(|value| self.combine(value))
            .reduce(|mut acc, other| {
                self.merge(&mut acc, other);
                acc
            });
        match acc {
            Some(acc) => self.reduce(key, acc),
            None => anyhow::bail!("no values for key `{}`", key),
        }
    }
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,
    /// The value.
    pub value: Bytes,
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}

/// Hashes an intermediate key. Compute a reduce bucket for a given key
/// by calculating `ihash(key) % n_reduce`.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    // masked to 31 bits, always fits
    (hasher.finish() & 0x7fff_ffff) as u32
}
