//! Popular-suffix discovery: finds label suffixes shared by more patterns
//! than a single bucket can hold, so the query path can skip past them
//! before bucket selection and keep probe depth bounded.

use ahash::AHashMap;

use crate::error::Error;
use crate::preprocessor::Pattern;
use crate::primitives::{cut_last_label, BUCKET_CAPACITY, MAX_POPULAR};

/// Byte offset, within `pattern`, of the start of its last `k` labels — or
/// `0` if `pattern` has fewer than `k` labels (the whole pattern is used).
fn last_k_labels_start(pattern: &[u8], k: usize) -> usize {
    let mut end = pattern.len();
    let mut start = 0;
    for _ in 0..k {
        let pos = cut_last_label(pattern, 0, end);
        start = pos;
        if pos == 0 {
            break;
        }
        end = pos - 1;
    }
    start
}

/// Discovers popular suffixes among `patterns`. Returns them sorted and
/// deduplicated. Fails with [`Error::TooManyPopular`] if more than
/// [`MAX_POPULAR`] are found.
pub fn discover_popular(patterns: &[Pattern]) -> Result<Vec<Vec<u8>>, Error> {
    let mut popular: AHashMap<Vec<u8>, ()> = AHashMap::new();
    let mut frontier: Vec<usize> = (0..patterns.len()).collect();
    let mut k = 2usize;

    loop {
        let mut groups: AHashMap<Vec<u8>, Vec<usize>> = AHashMap::new();
        for &idx in &frontier {
            let bytes = patterns[idx].as_bytes();
            let start = last_k_labels_start(bytes, k);
            groups.entry(bytes[start..].to_vec()).or_default().push(idx);
        }

        let mut next_frontier = Vec::new();
        for (suffix, members) in groups {
            if members.len() > BUCKET_CAPACITY {
                popular.insert(suffix, ());
                next_frontier.extend(members);
            }
        }

        if next_frontier.is_empty() {
            break;
        }
        if popular.len() > MAX_POPULAR {
            return Err(Error::TooManyPopular(popular.len()));
        }
        frontier = next_frontier;
        k += 1;
    }

    if popular.len() > MAX_POPULAR {
        return Err(Error::TooManyPopular(popular.len()));
    }

    let mut out: Vec<Vec<u8>> = popular.into_keys().collect();
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::preprocess;

    #[test]
    fn no_popular_suffix_under_capacity() {
        let raw = ["a.example.com", "b.example.com", "c.example.com"];
        let patterns = preprocess(raw).unwrap();
        let popular = discover_popular(&patterns).unwrap();
        assert!(popular.is_empty());
    }

    #[test]
    fn finds_shared_suffix_over_capacity() {
        let raw: Vec<String> = (0..20).map(|i| format!("x{i}.a.b.c")).collect();
        let patterns = preprocess(raw).unwrap();
        let popular = discover_popular(&patterns).unwrap();
        assert!(popular.iter().any(|s| s == b"a.b.c"));
    }

    #[test]
    fn too_many_popular_fails() {
        // 300 distinct two-label suffix groups, each with 17 members sharing
        // a common long tail, so the frontier keeps expanding past 256
        // distinct popular suffixes.
        let mut raw = Vec::new();
        for g in 0..300 {
            for m in 0..17 {
                raw.push(format!("leaf{m}.group{g}.example{g}.net"));
            }
        }
        let patterns = preprocess(raw).unwrap();
        let err = discover_popular(&patterns).unwrap_err();
        assert!(matches!(err, Error::TooManyPopular(_)));
    }

    #[test]
    fn last_k_labels_start_handles_short_patterns() {
        assert_eq!(last_k_labels_start(b"a.b", 2), 0);
        assert_eq!(last_k_labels_start(b"a.b", 5), 0);
        assert_eq!(last_k_labels_start(b"w.a.b.c", 2), 4);
    }
}
