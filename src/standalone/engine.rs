use anyhow::{bail, ensure, Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use fnv::FnvHashMap;
use glob::glob;
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Job;
use crate::keys::CompositeKey;
use crate::*;

// types related to this engine
pub type BucketIndex = u32;
pub type Buckets<K, A> = DashMap<BucketIndex, Combiner<K, A>>;

/// Reduced output per bucket; records within a bucket are in ascending key order.
pub type Reduced<K> = Vec<(BucketIndex, Vec<Emitted<K>>)>;

/// Partial accumulators by key.
///
/// Each partition folds its records into its own combiner; combiners are
/// then merged into the reduce buckets. Since [`Workload::merge`] is
/// associative and commutative, the result does not depend on how records
/// were split across partitions or in which order combiners merge.
#[derive(Debug)]
pub struct Combiner<K, A> {
    table: FnvHashMap<K, A>,
}

impl<K, A> Default for Combiner<K, A> {
    fn default() -> Self {
        Self {
            table: FnvHashMap::default(),
        }
    }
}

impl<K: CompositeKey, A> Combiner<K, A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<W>(&mut self, workload: &W, key: K, value: W::Value)
    where
        W: Workload<Key = K, Acc = A>,
    {
        self.merge_acc(workload, key, workload.combine(value));
    }

    pub fn merge_acc<W>(&mut self, workload: &W, key: K, acc: A)
    where
        W: Workload<Key = K, Acc = A>,
    {
        match self.table.entry(key) {
            Entry::Occupied(mut entry) => workload.merge(entry.get_mut(), acc),
            Entry::Vacant(entry) => {
                entry.insert(acc);
            }
        }
    }

    /// Merges every partial accumulator of `other` into this combiner.
    pub fn absorb<W>(&mut self, workload: &W, other: Self)
    where
        W: Workload<Key = K, Acc = A>,
    {
        for (key, acc) in other.table {
            self.merge_acc(workload, key, acc);
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Consumes the combiner, returning its entries in ascending key order.
    pub fn into_sorted(self) -> Vec<(K, A)> {
        let mut entries: Vec<(K, A)> = self.table.into_iter().collect();
        // keys are unique, so an unstable sort is deterministic
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl<K, A> IntoIterator for Combiner<K, A> {
    type Item = (K, A);
    type IntoIter = std::collections::hash_map::IntoIter<K, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

/// One output record: `key<TAB>value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted<K> {
    pub key: K,
    pub value: String,
}

impl<K: fmt::Display> fmt::Display for Emitted<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.value)
    }
}

/// Reads every file matching `pattern` into a `<path, content>` pair.
///
/// Fails if the pattern is invalid, a file cannot be read, or nothing matches.
pub fn read_inputs(pattern: &str) -> Result<Vec<KeyValue>> {
    let input_files = glob(pattern).with_context(|| format!("invalid input glob `{}`", pattern))?;
    let mut inputs = Vec::new();
    for pathspec in input_files.flatten().filter(|path| path.is_file()) {
        let mut buf = Vec::new();
        {
            // a scope so that the file is closed right after reading
            let mut file = File::open(&pathspec)
                .with_context(|| format!("failed to open {}", pathspec.display()))?;
            file.read_to_end(&mut buf)?;
        }
        let filename = pathspec.to_string_lossy().into_owned();
        inputs.push(KeyValue {
            key: Bytes::from(filename),
            value: Bytes::from(buf),
        });
    }
    if inputs.is_empty() {
        bail!("no input files match `{}`", pattern);
    }
    Ok(inputs)
}

fn map_partition<W: Workload>(
    workload: &W,
    input_kv: KeyValue,
    partition: usize,
) -> Combiner<W::Key, W::Acc> {
    let name = String::from_utf8_lossy(&input_kv.key).into_owned();
    let mut local = Combiner::new();
    let records = match workload.map(input_kv, partition) {
        Ok(records) => records,
        Err(err) => {
            warn!(workload = W::NAME, partition = %name, "skipping partition: {:#}", err);
            return local;
        }
    };

    let (mut kept, mut dropped) = (0usize, 0usize);
    for item in records {
        match item {
            Ok((key, value)) => {
                local.insert(workload, key, value);
                kept += 1;
            }
            Err(err) => {
                debug!(workload = W::NAME, partition = %name, "dropping record: {:#}", err);
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        warn!(workload = W::NAME, partition = %name, dropped, "dropped unusable records");
    }
    debug!(workload = W::NAME, partition = %name, kept, keys = local.len(), "mapped partition");
    local
}

/// Maps every input partition in parallel and shuffles the partial
/// accumulators into `num_reduce_worker` buckets by `ihash(key) % n`.
pub fn perform_map<W: Workload>(
    inputs: Vec<KeyValue>,
    workload: &W,
    num_reduce_worker: u32,
) -> Result<Buckets<W::Key, W::Acc>> {
    ensure!(num_reduce_worker > 0, "at least one reduce bucket is required");
    let buckets: Buckets<W::Key, W::Acc> = Buckets::new();
    inputs
        .into_par_iter()
        .enumerate()
        .for_each(|(partition, input_kv)| {
            let local = map_partition(workload, input_kv, partition);
            for (key, acc) in local {
                let bucket_no = ihash(&key.to_bytes()) % num_reduce_worker;
                buckets
                    .entry(bucket_no)
                    .or_default()
                    .merge_acc(workload, key, acc);
            }
        });
    Ok(buckets)
}

fn reduce_bucket<W: Workload>(workload: &W, bkt: Combiner<W::Key, W::Acc>) -> Vec<Emitted<W::Key>> {
    bkt.into_sorted()
        .into_iter()
        .filter_map(|(key, acc)| match workload.reduce(&key, acc) {
            Ok(value) => Some(Emitted { key, value }),
            Err(err) => {
                warn!(workload = W::NAME, key = %key, "dropping key: {:#}", err);
                None
            }
        })
        .collect()
}

/// Reduces every bucket in parallel. Buckets come back ordered by index,
/// records within a bucket ordered by key.
pub fn perform_reduce<W: Workload>(
    workload: &W,
    buckets: Buckets<W::Key, W::Acc>,
) -> Reduced<W::Key> {
    let mut reduced: Reduced<W::Key> = buckets
        .into_par_iter()
        .map(|(reduce_id, bkt)| (reduce_id, reduce_bucket(workload, bkt)))
        .collect();
    reduced.sort_unstable_by_key(|(reduce_id, _)| *reduce_id);
    reduced
}

/// Merges the sorted buckets into one stream in ascending key order.
pub fn merge_sorted<K: Ord>(reduced: Reduced<K>) -> Vec<Emitted<K>> {
    reduced
        .into_iter()
        .map(|(_, bkt)| bkt)
        .kmerge_by(|a, b| a.key < b.key)
        .collect()
}

/// Runs map and reduce in memory and returns the output in key order.
pub fn aggregate<W: Workload>(
    workload: &W,
    inputs: Vec<KeyValue>,
    num_reduce_worker: u32,
) -> Result<Vec<Emitted<W::Key>>> {
    let buckets = perform_map(inputs, workload, num_reduce_worker)?;
    Ok(merge_sorted(perform_reduce(workload, buckets)))
}

fn write_lines<'a, K>(path: &Path, records: impl Iterator<Item = &'a Emitted<K>>) -> Result<usize>
where
    K: fmt::Display + 'a,
{
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
    let mut count = 0;
    {
        // a scope so that the file is flushed and closed before the rename
        let mut out_file = BufWriter::new(
            File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?,
        );
        for record in records {
            writeln!(out_file, "{}", record)?;
            count += 1;
        }
        out_file.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(count)
}

/// Writes one `mr-out-<bucket>` file per bucket and a `part-all` file with
/// every record in key order. Returns the number of records written.
pub fn write_output<K>(output_dir: &Path, reduced: &Reduced<K>) -> Result<usize>
where
    K: Ord + fmt::Display,
{
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    for (reduce_id, bkt) in reduced {
        let out_pathspec = output_dir.join(format!("mr-out-{}", reduce_id));
        write_lines(&out_pathspec, bkt.iter())?;
    }
    let merged = reduced
        .iter()
        .map(|(_, bkt)| bkt.iter())
        .kmerge_by(|a, b| a.key < b.key);
    write_lines(&output_dir.join("part-all"), merged)
}

/// Reads the job's input, runs `workload` over it and writes the output.
pub fn run_job<W: Workload>(job: &Job, workload: &W) -> Result<usize> {
    let inputs = read_inputs(&job.input)?;
    info!(
        workload = W::NAME,
        partitions = inputs.len(),
        reducers = job.reducers,
        "starting map phase"
    );
    let buckets = perform_map(inputs, workload, job.reducers)?;
    let reduced = perform_reduce(workload, buckets);
    let written = write_output(Path::new(&job.output), &reduced)?;
    info!(workload = W::NAME, records = written, output = %job.output, "job complete");
    Ok(written)
}
