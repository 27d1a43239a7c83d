//! Leaf-level byte and hash primitives shared by every other module.
//!
//! Nothing here allocates and nothing here knows about buckets, records, or
//! the on-disk format — those live in [`crate::record`], [`crate::calibrate`]
//! and [`crate::query`].

use crate::error::Error;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Capacity of a single bucket or popular record: at most this many patterns
/// may share a record.
pub const BUCKET_CAPACITY: usize = 16;

/// Hard cap on the number of distinct popular suffixes a compile may produce.
pub const MAX_POPULAR: usize = 256;

/// Longest accepted pattern or query, in bytes (trailing dots already trimmed).
pub const MAX_LEN: usize = 253;

/// Validates `src` is ASCII over `[A-Za-z0-9._-]` and writes its lowercased
/// form into `dst`. `src` and `dst` must be the same length.
///
/// Non-alphabetic bytes, including `_`, pass through unchanged; `A..=Z` are
/// folded to `a..=z` with `|0x20`, matching plain ASCII case folding.
pub fn domain_to_lower(src: &[u8], dst: &mut [u8]) -> Result<(), Error> {
    debug_assert_eq!(src.len(), dst.len());
    for (i, &b) in src.iter().enumerate() {
        let ok = b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-';
        if !ok {
            return Err(Error::BadValue(format!("invalid byte 0x{b:02x} in domain")));
        }
        dst[i] = if b.is_ascii_uppercase() { b | 0x20 } else { b };
    }
    Ok(())
}

/// Validates and lowercases `src` in place, returning an owned `Vec<u8>`.
/// Convenience wrapper around [`domain_to_lower`] for callers that don't
/// need to manage their own buffer (i.e. everywhere but the `find` hot path).
pub fn domain_to_lower_owned(src: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = vec![0u8; src.len()];
    domain_to_lower(src, &mut out)?;
    Ok(out)
}

/// XXH3-64 over `bytes` with the given seed. No case folding is performed;
/// callers must have already lowercased.
#[inline]
pub fn hash64_span_ci(bytes: &[u8], seed: u64) -> u64 {
    xxh3_64_with_seed(bytes, seed)
}

/// Hashes the last two labels of `pattern` as a single span, seeded with
/// `seed` (normally the database's `hash_seed`). Returns `(hash,
/// suffix_start)` where `suffix_start` is the byte offset the suffix began
/// at. If `pattern` has fewer than two labels, the whole pattern is used.
///
/// This is the chain's starting point at both calibration and query time —
/// everything further left is folded one label at a time via
/// [`fold_one_label_left`].
pub fn suffix_hash_two_labels(pattern: &[u8], seed: u64) -> (u64, usize) {
    let suffix_start = cut_two_last_labels(pattern, 0, pattern.len());
    let h = hash64_span_ci(&pattern[suffix_start..], seed);
    (h, suffix_start)
}

/// Folds the single label immediately to the left of `current_start` into
/// `h`, returning `(new_hash, new_start)`. Panics if `current_start == 0`
/// (callers must stop extending once the start of the pattern is reached).
pub fn fold_one_label_left(pattern: &[u8], current_start: usize, h: u64) -> (u64, usize) {
    debug_assert!(current_start > 0);
    let label_start = cut_last_label(pattern, 0, current_start - 1);
    let new_h = hash64_span_ci(&pattern[label_start..current_start - 1], h);
    (new_h, label_start)
}

/// Computes the full chained hash of `pattern` from scratch: the last two
/// labels hashed as one span, then every remaining label folded in
/// one-at-a-time moving left. Mathematically identical to the `h_f` a
/// calibration placement or a query would arrive at after exhausting every
/// label of this pattern, since the chain only depends on the labels
/// already folded, never on surrounding context. Used to derive a pattern's
/// tag, and to derive a popular suffix's tag from its own bytes.
pub fn full_chain_hash(pattern: &[u8], seed: u64) -> u64 {
    let (mut h, mut start) = suffix_hash_two_labels(pattern, seed);
    while start > 0 {
        let (new_h, new_start) = fold_one_label_left(pattern, start, h);
        h = new_h;
        start = new_start;
    }
    h
}

/// Returns the offset, within `buf[start..end)`, of the start of the last
/// label — i.e. one past the rightmost `.` in that span, or `start` if there
/// is no `.`.
pub fn cut_last_label(buf: &[u8], start: usize, end: usize) -> usize {
    match buf[start..end].iter().rposition(|&b| b == b'.') {
        Some(i) => start + i + 1,
        None => start,
    }
}

/// Convenience form of [`cut_last_label`] over the whole of `buf`. Exposed
/// for tests and bindings that don't otherwise need the `(start, end)`
/// windowed form the query path uses internally.
pub fn cut_last_label_offset(buf: &[u8]) -> usize {
    cut_last_label(buf, 0, buf.len())
}

/// Returns the offset, within `buf[start..end)`, of the start of the last
/// *two* labels (i.e. skips back past up to two `.`-separated labels), or
/// `start` if the span has fewer than two labels.
pub fn cut_two_last_labels(buf: &[u8], start: usize, end: usize) -> usize {
    let one = cut_last_label(buf, start, end);
    if one == start {
        return start;
    }
    // one > start, so one - 1 is the separating '.'
    cut_last_label(buf, start, one - 1)
}

/// Lemire's fastmod32: precomputed magic number letting `reduce` avoid a
/// hardware division on the hot path.
#[derive(Debug, Clone, Copy)]
pub struct FastMod {
    m: u64,
    d: u32,
}

impl FastMod {
    /// `d` must be nonzero.
    pub fn new(d: u32) -> Self {
        debug_assert!(d > 0);
        let m = (u64::MAX / d as u64).wrapping_add(1);
        FastMod { m, d }
    }

    /// The raw 64-bit magic constant, stored verbatim in the serialized header.
    pub fn magic(&self) -> u64 {
        self.m
    }

    /// Reconstructs a `FastMod` from a previously computed magic constant and
    /// divisor, as read back from a serialized header.
    pub fn from_parts(m: u64, d: u32) -> Self {
        FastMod { m, d }
    }

    /// `a mod d`, computed via the precomputed magic number.
    #[inline]
    pub fn reduce(&self, a: u32) -> u32 {
        // lowbits = (M * a) mod 2^64, i.e. a plain wrapping u64 multiply.
        let lowbits = self.m.wrapping_mul(a as u64);
        (((lowbits as u128) * self.d as u128) >> 64) as u32
    }

    pub fn divisor(&self) -> u32 {
        self.d
    }
}
