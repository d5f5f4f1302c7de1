// Trace loading: one `<prefix>_proc<i>.trace` file per core, one
// `R <addr>` or `W <addr>` reference per line.

use std::fs::File;
use std::io::{BufRead, BufReader};

use log::{info, warn};

use crate::commons::{MemRef, NUM_CORES};
use crate::error::SimError;

/// Reads the four per-core trace files for `prefix`.
///
/// Addresses are `0x`-prefixed hexadecimal or decimal. Blank and
/// unparseable lines are skipped.
pub fn load_traces(prefix: &str) -> Result<Vec<Vec<MemRef>>, SimError> {
    let mut traces = Vec::with_capacity(NUM_CORES);
    for core in 0..NUM_CORES {
        let path = format!("{prefix}_proc{core}.trace");
        let file = File::open(&path).map_err(|source| SimError::TraceOpen {
            path: path.clone().into(),
            source,
        })?;
        let refs = parse_trace(BufReader::new(file))?;
        info!("loaded {} references from {path}", refs.len());
        traces.push(refs);
    }
    Ok(traces)
}

fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<MemRef>, SimError> {
    let mut refs = Vec::new();
    let mut skipped = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(mem_ref) => refs.push(mem_ref),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("skipped {skipped} malformed trace lines");
    }
    Ok(refs)
}

// `R`/`W` followed by the address; anything else is malformed. Extra
// trailing tokens are tolerated.
fn parse_line(line: &str) -> Option<MemRef> {
    let mut parts = line.split_whitespace();
    let is_write = match parts.next()? {
        "R" => false,
        "W" => true,
        _ => return None,
    };
    let addr_str = parts.next()?;
    let address = match addr_str.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => addr_str.parse().ok()?,
    };
    Some(MemRef { is_write, address })
}
