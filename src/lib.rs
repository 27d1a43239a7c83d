//! Hipermap static domain set.
//!
//! A precompiled, read-only container answering "is this hostname, or any
//! of its whole-label suffixes, in the set?" in roughly one cache miss per
//! query. Patterns are validated and pruned ahead of time, heavily shared
//! subtrees are factored into a "popular suffix" table to bound probe
//! depth, and the result is a calibrated two-stage hash table where no
//! bucket ever holds more than [`primitives::BUCKET_CAPACITY`] entries.
//!
//! # Quick Start
//!
//! ```ignore
//! use hipermap_domainset::{CalibrationLimits, Database, Lookup};
//!
//! let db = Database::compile(
//!     ["example.com", "images.google.com"],
//!     &CalibrationLimits::default(),
//! )?;
//!
//! assert_eq!(db.find(b"api.example.com"), Lookup::Found);
//! assert_eq!(db.find(b"not-listed.org"), Lookup::NotFound);
//! # Ok::<(), hipermap_domainset::Error>(())
//! ```
//!
//! # Serialization
//!
//! A compiled database can be serialized to a contiguous byte buffer and
//! later reloaded (e.g. via a memory-mapped file) without recompiling:
//!
//! ```ignore
//! use hipermap_domainset::{CalibrationLimits, Database, deserialize};
//!
//! let db = Database::compile(["example.com"], &CalibrationLimits::default())?;
//! let mut out = vec![0u8; db.serialized_len()];
//! db.serialize(&mut out)?;
//!
//! let reloaded = deserialize(&out)?;
//! assert_eq!(db.find(b"example.com"), reloaded.find(b"example.com"));
//! # Ok::<(), hipermap_domainset::Error>(())
//! ```
//!
//! # Non-goals
//!
//! IDN/Punycode conversion, wildcard or regex matching, mutability after
//! compile, and concurrent writers are all out of scope — see the design
//! notes in this repository's `SPEC_FULL.md`.

mod calibrate;
mod database;
mod error;
mod popular;
mod preprocessor;
mod primitives;
mod query;
mod record;

pub use calibrate::CalibrationLimits;
pub use database::{
    db_place_size, db_place_size_from_serialized, deserialize, deserialize_into, header_bytes,
    open_mmap, Database,
};
pub use error::{Error, Lookup, Result};
pub use primitives::{
    cut_last_label, cut_last_label_offset, hash64_span_ci, BUCKET_CAPACITY, MAX_LEN, MAX_POPULAR,
};
