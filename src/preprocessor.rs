//! Validates, lowercases and prunes the raw pattern list before it reaches
//! popular-suffix discovery and calibration.

use crate::error::Error;
use crate::primitives::{domain_to_lower, MAX_LEN};

/// One validated, lowercased pattern surviving preprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern(pub Vec<u8>);

impl Pattern {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Strips trailing `.`, validates character set and length, and rejects
/// top-level (dot-less) patterns. Does not prune subdomains — see
/// [`prune_subdomains`] for that pass.
fn normalize_one(raw: &str) -> Result<Pattern, Error> {
    let trimmed = raw.trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(Error::BadValue("empty pattern after trimming dots".into()));
    }
    if trimmed.len() > MAX_LEN {
        return Err(Error::BadValue(format!(
            "pattern exceeds {MAX_LEN} bytes: {trimmed}"
        )));
    }
    if !trimmed.as_bytes().contains(&b'.') {
        return Err(Error::TopLevelDomain(trimmed.to_string()));
    }
    let mut lowered = vec![0u8; trimmed.len()];
    domain_to_lower(trimmed.as_bytes(), &mut lowered)?;
    Ok(Pattern(lowered))
}

/// Reversed-lexicographic comparison: compares two byte strings from the
/// right. Under this order, a domain sorts immediately before (and
/// contiguously with) all of its subdomains, which is what lets
/// [`prune_subdomains`] dedup with a single running "last kept" comparison.
fn reversed_cmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.iter().rev().cmp(b.iter().rev())
}

/// `sub` is a proper or improper whole-label subdomain of `base`: either
/// equal, or ending in `"." + base`.
fn is_subdomain_of(sub: &[u8], base: &[u8]) -> bool {
    if sub == base {
        return true;
    }
    if sub.len() <= base.len() {
        return false;
    }
    let split = sub.len() - base.len();
    sub[split..] == *base && sub[split - 1] == b'.'
}

/// Sorts (reversed-lex) and drops any pattern that is equal to, or a
/// subdomain of, the most recently kept pattern.
fn prune_subdomains(mut patterns: Vec<Pattern>) -> Vec<Pattern> {
    patterns.sort_by(|a, b| reversed_cmp(&a.0, &b.0));
    let mut kept: Vec<Pattern> = Vec::with_capacity(patterns.len());
    for p in patterns {
        if let Some(last) = kept.last() {
            if is_subdomain_of(&p.0, &last.0) {
                continue;
            }
        }
        kept.push(p);
    }
    kept
}

/// Validates, lowercases and prunes `raw_patterns`, returning the set that
/// should actually be placed in the hash table.
pub fn preprocess<I, S>(raw_patterns: I) -> Result<Vec<Pattern>, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized = Vec::new();
    for raw in raw_patterns {
        normalized.push(normalize_one(raw.as_ref())?);
    }
    if normalized.is_empty() {
        return Err(Error::NoPatterns);
    }
    Ok(prune_subdomains(normalized))
}
