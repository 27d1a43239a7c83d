//! The calibrator: searches a `(seed, bucket_count)` grid until every
//! pattern fits into a bucket of at most [`BUCKET_CAPACITY`] slots.

use ahash::AHashSet;

use crate::error::Error;
use crate::preprocessor::Pattern;
use crate::primitives::{fold_one_label_left, suffix_hash_two_labels, FastMod, BUCKET_CAPACITY};

/// Growth-schedule constants governing the calibration search. Exposed so
/// callers can see (and, in tests, shrink) the search space rather than
/// relying on buried literals — the same role
/// `k2rule`'s `CachedReaderConfig` plays for its cache sizing knobs.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationLimits {
    /// Number of times the bucket count is allowed to grow before giving up.
    pub max_growth_steps: u32,
    /// Distinct seeds tried at each bucket count before growing.
    pub seeds_per_step: u32,
}

impl Default for CalibrationLimits {
    fn default() -> Self {
        CalibrationLimits {
            max_growth_steps: 60,
            seeds_per_step: 100,
        }
    }
}

/// Where one pattern landed after a successful calibration.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub bucket: u32,
    pub tag: u16,
    /// Number of label chunks folded into the hash for this pattern,
    /// counting the initial two-label span as one. Always >= 1.
    pub scans_for_p: u16,
}

/// The result of a successful calibration: enough to build bucket records,
/// but not yet materialized into bytes (that's [`crate::database`]'s job).
pub struct Calibration {
    pub buckets: u32,
    pub hash_seed: u64,
    pub fastmod: FastMod,
    /// Parallel to the `patterns` slice passed to [`calibrate`].
    pub placements: Vec<Placement>,
    /// Pattern indices assigned to each bucket, in placement order.
    pub bucket_members: Vec<Vec<usize>>,
    pub bucket_max_scans: Vec<u16>,
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

fn grow_buckets(buckets: u32) -> u32 {
    let grown = (buckets as u64 * 21).div_ceil(20) as u32;
    grown.max(buckets + 1)
}

/// Attempts one `(seed, buckets)` placement. Returns `None` if any bucket
/// would overflow [`BUCKET_CAPACITY`].
fn try_place(
    patterns: &[Pattern],
    popular: &AHashSet<Vec<u8>>,
    seed: u64,
    buckets: u32,
) -> Option<Calibration> {
    let fastmod = FastMod::new(buckets);
    let mut bucket_members: Vec<Vec<usize>> = vec![Vec::new(); buckets as usize];
    let mut bucket_max_scans = vec![0u16; buckets as usize];
    let mut placements = Vec::with_capacity(patterns.len());

    for (idx, pattern) in patterns.iter().enumerate() {
        let bytes = pattern.as_bytes();
        let (mut h, mut start) = suffix_hash_two_labels(bytes, seed);

        // Popular-suffix extension: keep widening the span left as long as
        // the current suffix is itself a popular suffix. This does not count
        // towards `scans`: the query path performs this same extension
        // before its bucket-scan loop even starts (see query.rs), so the
        // bucket's `max_scans` bound must only cover what the scan loop
        // itself folds.
        while start > 0 && popular.contains(&bytes[start..]) {
            let (new_h, new_start) = fold_one_label_left(bytes, start, h);
            h = new_h;
            start = new_start;
        }

        let bucket = fastmod.reduce(h as u32);

        // Continue folding the remaining labels into a separate running
        // hash to derive the tag; this does not affect bucket choice. This
        // is the same continuation the query-time bucket scan performs, so
        // `scans` (1 plus the folds here) is what bounds `max_scans`.
        let mut h_f = h;
        let mut start_f = start;
        let mut scans: u16 = 1;
        while start_f > 0 {
            let (new_h, new_start) = fold_one_label_left(bytes, start_f, h_f);
            h_f = new_h;
            start_f = new_start;
            scans += 1;
        }
        let tag = (h_f >> 48) as u16;

        let b = bucket as usize;
        if bucket_members[b].len() >= BUCKET_CAPACITY {
            return None;
        }
        bucket_members[b].push(idx);
        bucket_max_scans[b] = bucket_max_scans[b].max(scans);
        placements.push(Placement {
            bucket,
            tag,
            scans_for_p: scans,
        });
    }

    Some(Calibration {
        buckets,
        hash_seed: seed,
        fastmod,
        placements,
        bucket_members,
        bucket_max_scans,
    })
}

/// Runs the growth-schedule search described in spec §4.4 and returns the
/// first viable `(seed, buckets)` placement.
pub fn calibrate(
    patterns: &[Pattern],
    popular: &[Vec<u8>],
    limits: &CalibrationLimits,
) -> Result<Calibration, Error> {
    let popular_set: AHashSet<Vec<u8>> = popular.iter().cloned().collect();
    let mut buckets = (ceil_div(patterns.len(), BUCKET_CAPACITY) + 1) as u32;

    for step in 0..limits.max_growth_steps {
        log::debug!(
            "calibration step {step}: trying {} seeds at {buckets} buckets",
            limits.seeds_per_step
        );
        for seed_i in 0..limits.seeds_per_step {
            // Stays well within u32 (<= max_growth_steps * seeds_per_step),
            // since the serialized header stores hash_seed as a u32.
            let seed = (step * limits.seeds_per_step + seed_i) as u64;
            if let Some(cal) = try_place(patterns, &popular_set, seed, buckets) {
                return Ok(cal);
            }
        }
        buckets = grow_buckets(buckets);
    }

    log::warn!(
        "calibration exhausted {} growth steps without a viable placement",
        limits.max_growth_steps
    );
    Err(Error::FailedToCalibrate)
}

/// A conservative upper bound on the bucket count any successful
/// calibration of `n_patterns` patterns could land on, by replaying the
/// growth schedule to its limit. Used to size compile buffers without
/// actually running the search (see [`crate::database::db_place_size`]).
pub fn max_buckets_bound(n_patterns: usize, limits: &CalibrationLimits) -> u32 {
    let mut buckets = (ceil_div(n_patterns, BUCKET_CAPACITY) + 1) as u32;
    for _ in 0..limits.max_growth_steps {
        buckets = grow_buckets(buckets);
    }
    buckets
}
