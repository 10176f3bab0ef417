//! Utility functions shared by the workloads and the driver.
//!

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use std::io::BufRead;
use tracing::warn;

/// Reads `reader` line by line, decoding each line on its own.
///
/// Yields `(line_no, line)` with 1-based line numbers and the line ending
/// stripped. Lines that are not valid UTF-8 are skipped with a warning
/// naming `source`; I/O errors are passed through.
pub fn utf8_lines<R: BufRead>(
    reader: R,
    source: &'static str,
) -> impl Iterator<Item = Result<(usize, String)>> {
    reader
        .split(b'\n')
        .enumerate()
        .filter_map(move |(index, line)| {
            let line_no = index + 1;
            let mut bytes = match line {
                Ok(bytes) => bytes,
                Err(err) => return Some(Err(err.into())),
            };
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            match String::from_utf8(bytes) {
                Ok(line) => Some(Ok((line_no, line))),
                Err(_) => {
                    warn!(line = line_no, "skipping {} line that is not UTF-8", source);
                    None
                }
            }
        })
}

/// Serializes auxiliary stage arguments the way workloads expect them.
pub fn serialize_args(args: &[String]) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(args)?))
}

/// Parses auxiliary stage arguments (a JSON list of strings) with the
/// stage's own argument parser. Empty input means no arguments.
pub fn parse_aux<A: Parser>(aux: &[u8]) -> Result<A> {
    let args: Vec<String> = if aux.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice(aux).context("stage arguments are not a JSON list of strings")?
    };
    Ok(A::try_parse_from(args)?)
}
