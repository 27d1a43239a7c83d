//! The `find` hot path: lowercases and validates a query, skips past any
//! popular suffix, selects a bucket, then scans it one label-extension at a
//! time up to that bucket's calibrated `max_scans` bound.
//!
//! This module implements only the scalar fallback described in the design
//! notes ("SIMD is an optimization, not a contract") — tag pre-filtering and
//! string comparison are plain slice operations, bit-identical to what a
//! vectorized path would produce.

use crate::database::Database;
use crate::primitives::{domain_to_lower, fold_one_label_left, suffix_hash_two_labels, MAX_LEN};
use crate::Lookup;

/// Left-pad width reserved ahead of the query content, matching the layout a
/// vectorized backwards `.` scan would need to read one vector before the
/// first byte without faulting.
const LEFT_PAD: usize = 32;
/// Right-pad width reserved after the query content, wide enough for an
/// aligned 32-byte SIMD equality compare to run past `n` safely.
const RIGHT_PAD: usize = 32;
/// Total stack buffer size: left pad + max query length + right pad. This is
/// the only buffer `find` touches; there is no heap allocation on this path.
const QUERY_BUF_LEN: usize = LEFT_PAD + MAX_LEN + RIGHT_PAD;

fn trim_trailing_dots(q: &[u8]) -> &[u8] {
    let mut end = q.len();
    while end > 0 && q[end - 1] == b'.' {
        end -= 1;
    }
    &q[..end]
}

fn slot_matches(blob: &[u8], off: usize, needle: &[u8]) -> bool {
    let end = off + needle.len();
    match blob.get(off..end) {
        Some(s) if s == needle => blob.get(end) == Some(&0u8),
        _ => false,
    }
}

/// Returns `true` if `pop_tag`/`suffix` is present in the popular table.
fn popular_contains<B: AsRef<[u8]>>(db: &Database<B>, pop_tag: u16, suffix: &[u8]) -> bool {
    let bytes = db.bytes();
    let blob = db.blob();
    for i in 0..db.popular_record_count() {
        let rec = db.read_popular_record(bytes, i);
        for lane in 0..rec.used as usize {
            if rec.tags[lane] == pop_tag {
                let off = rec.slot_byte_offset(lane) as usize;
                if slot_matches(blob, off, suffix) {
                    return true;
                }
            }
        }
    }
    false
}

/// Looks up `query_bytes` against `db`. See spec §4.5 for the full
/// algorithm; this is a direct transcription.
pub fn find<B: AsRef<[u8]>>(db: &Database<B>, query_bytes: &[u8]) -> Lookup {
    let trimmed = trim_trailing_dots(query_bytes);
    if trimmed.is_empty() || trimmed.len() > MAX_LEN {
        return Lookup::InvalidInput;
    }

    // Stack buffer only: [left pad | query content | right pad]. Both pads
    // are zeroed by the array literal; a SIMD lowercase/scan implementation
    // could read into either without faulting or producing a spurious match.
    let mut buf = [0u8; QUERY_BUF_LEN];
    let content = &mut buf[LEFT_PAD..LEFT_PAD + trimmed.len()];
    if domain_to_lower(trimmed, content).is_err() {
        return Lookup::InvalidInput;
    }
    let lowered = &buf[LEFT_PAD..LEFT_PAD + trimmed.len()];

    let (mut h, mut suffix_start) = suffix_hash_two_labels(lowered, db.hash_seed_u64());

    // Popular extension: widen the span left past every popular suffix.
    while suffix_start > 0 {
        let pop_tag = (h >> 48) as u16;
        if !popular_contains(db, pop_tag, &lowered[suffix_start..]) {
            break;
        }
        let (new_h, new_start) = fold_one_label_left(&lowered, suffix_start, h);
        h = new_h;
        suffix_start = new_start;
    }

    let bucket = db.fastmod().reduce(h as u32);
    let bytes = db.bytes();
    let rec = db.read_main_record(bytes, bucket as usize);
    let blob = db.blob();

    let mut scan: u16 = 0;
    loop {
        scan += 1;
        let tag = (h >> 48) as u16;
        for lane in 0..rec.used as usize {
            if rec.tags[lane] == tag {
                let off = rec.slot_byte_offset(lane) as usize;
                if slot_matches(blob, off, &lowered[suffix_start..]) {
                    return Lookup::Found;
                }
            }
        }
        if scan >= rec.max_scans || suffix_start == 0 {
            return Lookup::NotFound;
        }
        let (new_h, new_start) = fold_one_label_left(&lowered, suffix_start, h);
        h = new_h;
        suffix_start = new_start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::CalibrationLimits;
    use crate::database::Database;
    use crate::Lookup;

    #[test]
    fn trims_and_rejects_empty() {
        assert_eq!(trim_trailing_dots(b"a.b..."), b"a.b");
        assert_eq!(trim_trailing_dots(b"..."), b"");
    }

    #[test]
    fn dot_only_queries_are_invalid_input() {
        let db = Database::compile(["example.com"], &CalibrationLimits::default()).unwrap();
        assert_eq!(db.find(b"."), Lookup::InvalidInput);
        assert_eq!(db.find(b".."), Lookup::InvalidInput);
    }

    #[test]
    fn case_insensitive() {
        let db = Database::compile(["Example.com"], &CalibrationLimits::default()).unwrap();
        assert_eq!(db.find(b"EXAMPLE.COM"), Lookup::Found);
        assert_eq!(db.find(b"eXaMpLe.CoM"), Lookup::Found);
    }

    #[test]
    fn trailing_dots_are_equivalent() {
        let db = Database::compile(["example.com"], &CalibrationLimits::default()).unwrap();
        assert_eq!(db.find(b"example.com"), db.find(b"example.com."));
        assert_eq!(db.find(b"example.com"), db.find(b"example.com...."));
    }

    #[test]
    fn adversarial_long_label_chain_terminates() {
        let mut pattern = String::new();
        for _ in 0..60 {
            pattern.push_str("a.");
        }
        pattern.push_str("match.example");
        let db = Database::compile([pattern.as_str()], &CalibrationLimits::default()).unwrap();
        assert_eq!(db.find(pattern.as_bytes()), Lookup::Found);
    }
}
