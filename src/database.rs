//! Builds, serializes and deserializes a compiled [`Database`] — the
//! contiguous, read-only byte arena a query runs against.

use crate::calibrate::{calibrate, max_buckets_bound, CalibrationLimits};
use crate::error::Error;
use crate::popular::discover_popular;
use crate::preprocessor::preprocess;
use crate::primitives::{full_chain_hash, hash64_span_ci, FastMod, BUCKET_CAPACITY};
use crate::query;
use crate::record::{Record, RECORD_SIZE};
use crate::Lookup;

const MAGIC: u32 = 0x5344_4D48; // "HMDS" little-endian
const HEADER_SIZE: usize = 64;
const PREAMBLE_SIZE: usize = 4 + HEADER_SIZE;
const BLOB_ALIGN: usize = 16;
const BLOB_TAIL_PAD: usize = 256;

fn round_up(n: usize, align: usize) -> usize {
    (n + align - 1) / align * align
}

/// Header fields, independent of their serialized byte layout.
struct Header {
    fastmod_m: u64,
    buckets: u32,
    hash_seed: u32,
    popular_records: u32,
    popular_count: u32,
    domains_blob_size: u64,
}

impl Header {
    fn write_to(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), HEADER_SIZE);
        out[0..8].copy_from_slice(&self.fastmod_m.to_le_bytes());
        out[8..12].copy_from_slice(&self.buckets.to_le_bytes());
        out[12..16].copy_from_slice(&self.hash_seed.to_le_bytes());
        out[16..24].fill(0); // domains_table_ptr, ignored on read
        out[24..32].fill(0); // popular_table_ptr, ignored on read
        out[32..36].copy_from_slice(&self.popular_records.to_le_bytes());
        out[36..40].copy_from_slice(&self.popular_count.to_le_bytes());
        out[40..48].fill(0); // domains_blob_ptr, ignored on read
        out[48..56].copy_from_slice(&self.domains_blob_size.to_le_bytes());
        out[56..64].fill(0); // reserved
    }

    fn read_from(buf: &[u8]) -> Header {
        debug_assert_eq!(buf.len(), HEADER_SIZE);
        Header {
            fastmod_m: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            buckets: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            hash_seed: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            popular_records: u32::from_le_bytes(buf[32..36].try_into().unwrap()),
            popular_count: u32::from_le_bytes(buf[36..40].try_into().unwrap()),
            domains_blob_size: u64::from_le_bytes(buf[48..56].try_into().unwrap()),
        }
    }
}

fn blob_entry_span(content_len: usize) -> usize {
    round_up(content_len + 1, BLOB_ALIGN)
}

/// Appends `s` (NUL-terminated, 16-byte padded) to `blob` and returns its
/// starting offset.
fn push_blob(blob: &mut Vec<u8>, s: &[u8]) -> u32 {
    let start = blob.len() as u32;
    blob.extend_from_slice(s);
    blob.push(0);
    let span = blob_entry_span(s.len());
    blob.resize(start as usize + span, 0);
    start
}

/// Size in bytes of the fixed preamble (magic + header) common to every
/// compiled or serialized database, regardless of pattern count.
pub fn header_bytes() -> usize {
    PREAMBLE_SIZE
}

/// An upper bound, in bytes, on the buffer [`Database::compile`] will need
/// for `patterns`. Deliberately loose: it replays the calibration growth
/// schedule to its limit rather than actually calibrating, and assumes every
/// pattern is [`crate::primitives::MAX_LEN`] bytes long.
pub fn db_place_size<S: AsRef<str>>(patterns: &[S], limits: &CalibrationLimits) -> usize {
    use crate::primitives::MAX_POPULAR;

    let n = patterns.len();
    let buckets = max_buckets_bound(n, limits) as usize;
    let popular_records = MAX_POPULAR.div_ceil(BUCKET_CAPACITY);
    let max_span = blob_entry_span(crate::primitives::MAX_LEN);
    // The blob holds both the pattern strings (one per input, worst case) and
    // the popular-suffix strings (up to MAX_POPULAR), so both must be
    // accounted for, not just the patterns.
    let blob = n.saturating_add(MAX_POPULAR).saturating_mul(max_span) + BLOB_TAIL_PAD;
    PREAMBLE_SIZE + popular_records * RECORD_SIZE + buckets * RECORD_SIZE + blob
}

/// A compiled, read-only static domain set.
///
/// `B` is the backing storage: `Vec<u8>` for an in-process compile or
/// deserialize, or any other `AsRef<[u8]>` (e.g. a memory-mapped file) for
/// zero-copy loading of a previously serialized database.
pub struct Database<B: AsRef<[u8]>> {
    buf: B,
    buckets: u32,
    hash_seed: u32,
    fastmod: FastMod,
    popular_count: u32,
    popular_table_off: usize,
    main_table_off: usize,
    blob_off: usize,
    blob_len: usize,
}

impl<B: AsRef<[u8]>> Database<B> {
    pub fn buckets(&self) -> u32 {
        self.buckets
    }

    pub fn popular_count(&self) -> u32 {
        self.popular_count
    }

    pub fn hash_seed(&self) -> u64 {
        self.hash_seed as u64
    }

    /// Byte size of the main bucket table (`buckets() * RECORD_SIZE`).
    pub fn table_bytes(&self) -> usize {
        self.buckets as usize * RECORD_SIZE
    }

    /// Byte size of the popular-suffix table.
    pub fn popular_bytes(&self) -> usize {
        self.popular_record_count() * RECORD_SIZE
    }

    /// Byte size of the domains blob (pattern strings, NULs and padding).
    pub fn blob_bytes(&self) -> usize {
        self.blob_len
    }

    pub fn used_total(&self) -> usize {
        let bytes = self.buf.as_ref();
        (0..self.buckets as usize)
            .map(|b| self.read_main_record(bytes, b).used as usize)
            .sum()
    }

    pub(crate) fn read_main_record(&self, bytes: &[u8], bucket: usize) -> Record {
        let off = self.main_table_off + bucket * RECORD_SIZE;
        Record::read_from(&bytes[off..off + RECORD_SIZE])
    }

    pub(crate) fn read_popular_record(&self, bytes: &[u8], idx: usize) -> Record {
        let off = self.popular_table_off + idx * RECORD_SIZE;
        Record::read_from(&bytes[off..off + RECORD_SIZE])
    }

    pub(crate) fn popular_record_count(&self) -> usize {
        (self.popular_count as usize).div_ceil(BUCKET_CAPACITY)
    }

    pub(crate) fn blob(&self) -> &[u8] {
        &self.buf.as_ref()[self.blob_off..self.blob_off + self.blob_len]
    }

    pub(crate) fn fastmod(&self) -> &FastMod {
        &self.fastmod
    }

    pub(crate) fn hash_seed_u64(&self) -> u64 {
        self.hash_seed as u64
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Looks up `query_bytes` in the set. See [`crate::query`] for the
    /// hot-path algorithm.
    pub fn find(&self, query_bytes: &[u8]) -> Lookup {
        query::find(self, query_bytes)
    }

    /// The serialized byte length of this database.
    pub fn serialized_len(&self) -> usize {
        self.blob_off + self.blob_len
    }

    /// Writes this database's serialized form into `out`, which must be at
    /// least [`Database::serialized_len`] bytes.
    pub fn serialize(&self, out: &mut [u8]) -> Result<(), Error> {
        let len = self.serialized_len();
        if out.len() < len {
            return Err(Error::SmallPlace {
                needed: len,
                got: out.len(),
            });
        }
        out[..len].copy_from_slice(&self.buf.as_ref()[..len]);
        Ok(())
    }
}

impl Database<Vec<u8>> {
    /// Validates, preprocesses, discovers popular suffixes, calibrates and
    /// materializes `raw_patterns` into a freshly allocated database.
    pub fn compile<I, S>(raw_patterns: I, limits: &CalibrationLimits) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = preprocess(raw_patterns)?;
        log::debug!("preprocessed to {} patterns", patterns.len());
        let popular = discover_popular(&patterns)?;
        log::debug!("discovered {} popular suffixes", popular.len());
        let cal = calibrate(&patterns, &popular, limits)?;
        log::info!(
            "calibrated: {} buckets, seed {}",
            cal.buckets,
            cal.hash_seed
        );

        let mut blob: Vec<u8> = Vec::new();

        // Popular strings first, grouped BUCKET_CAPACITY-at-a-time into
        // records so each record's slots stay within reach of its base_off.
        let mut popular_records: Vec<Record> = Vec::new();
        for chunk in popular.chunks(BUCKET_CAPACITY) {
            let mut rec = Record::default();
            let base_off = blob.len() as u32;
            rec.base_off = base_off;
            for suffix in chunk {
                let off = push_blob(&mut blob, suffix);
                let rel = (off - base_off) / BUCKET_CAPACITY as u32;
                if rel > u8::MAX as u32 {
                    return Err(Error::BadValue(
                        "popular record span exceeds 8-bit slot offset".into(),
                    ));
                }
                let tag = (full_chain_hash(suffix, cal.hash_seed) >> 48) as u16;
                rec.push(tag, rel as u8);
            }
            popular_records.push(rec);
        }

        // Main table: one record per bucket (even if empty), patterns
        // written contiguously per-bucket so base_off stays close to home.
        let mut main_records: Vec<Record> = Vec::with_capacity(cal.buckets as usize);
        for (b, members) in cal.bucket_members.iter().enumerate() {
            let mut rec = Record::default();
            rec.max_scans = cal.bucket_max_scans[b];
            if members.is_empty() {
                main_records.push(rec);
                continue;
            }
            let base_off = blob.len() as u32;
            rec.base_off = base_off;
            for &idx in members {
                let pattern = &patterns[idx];
                let off = push_blob(&mut blob, pattern.as_bytes());
                let rel = (off - base_off) / BUCKET_CAPACITY as u32;
                if rel > u8::MAX as u32 {
                    return Err(Error::BadValue(
                        "bucket record span exceeds 8-bit slot offset".into(),
                    ));
                }
                rec.push(cal.placements[idx].tag, rel as u8);
            }
            main_records.push(rec);
        }

        // Tail pad so aligned reads at any valid slot never run off the end.
        let tail_start = blob.len();
        blob.resize(tail_start + BLOB_TAIL_PAD, 0);

        let popular_table_off = PREAMBLE_SIZE;
        let main_table_off = popular_table_off + popular_records.len() * RECORD_SIZE;
        let blob_off = main_table_off + main_records.len() * RECORD_SIZE;
        let total = blob_off + blob.len();

        let mut buf = vec![0u8; total];
        buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());

        let header = Header {
            fastmod_m: cal.fastmod.magic(),
            buckets: cal.buckets,
            hash_seed: cal.hash_seed as u32,
            popular_records: popular_records.len() as u32,
            popular_count: popular.len() as u32,
            domains_blob_size: blob.len() as u64,
        };
        header.write_to(&mut buf[4..4 + HEADER_SIZE]);

        for (i, rec) in popular_records.iter().enumerate() {
            let off = popular_table_off + i * RECORD_SIZE;
            rec.write_to(&mut buf[off..off + RECORD_SIZE]);
        }
        for (i, rec) in main_records.iter().enumerate() {
            let off = main_table_off + i * RECORD_SIZE;
            rec.write_to(&mut buf[off..off + RECORD_SIZE]);
        }
        buf[blob_off..blob_off + blob.len()].copy_from_slice(&blob);

        Ok(Database {
            buf,
            buckets: cal.buckets,
            hash_seed: cal.hash_seed as u32,
            fastmod: cal.fastmod,
            popular_count: popular.len() as u32,
            popular_table_off,
            main_table_off,
            blob_off,
            blob_len: blob.len(),
        })
    }
}

/// Reads just enough of a serialized buffer's header to report the total
/// byte size a destination buffer must have to hold it via
/// [`deserialize_into`], without copying or validating the rest of the
/// image. Fails with [`Error::BadValue`] if the magic is wrong or the input
/// is too short to contain a header.
pub fn db_place_size_from_serialized(serialized: &[u8]) -> Result<usize, Error> {
    if serialized.len() < PREAMBLE_SIZE {
        return Err(Error::BadValue("input shorter than header".into()));
    }
    let magic = u32::from_le_bytes(serialized[0..4].try_into().unwrap());
    if magic != MAGIC {
        return Err(Error::BadValue(format!(
            "bad magic: expected {MAGIC:#x}, got {magic:#x}"
        )));
    }
    let header = Header::read_from(&serialized[4..4 + HEADER_SIZE]);
    let popular_table_off = PREAMBLE_SIZE;
    let main_table_off = popular_table_off + header.popular_records as usize * RECORD_SIZE;
    let blob_off = main_table_off + header.buckets as usize * RECORD_SIZE;
    Ok(blob_off + header.domains_blob_size as usize)
}

/// Deserializes a previously serialized database out of `serialized`,
/// copying its blob into a freshly allocated buffer. Offsets are validated
/// against the blob size; no raw pointers are trusted from the input.
pub fn deserialize(serialized: &[u8]) -> Result<Database<Vec<u8>>, Error> {
    deserialize_into(serialized.to_vec())
}

/// Deserializes out of any owned byte buffer, including a memory-mapped
/// file (`memmap2::Mmap` implements `AsRef<[u8]>`), without copying it.
/// Offsets are validated against the blob size; no raw pointers are trusted
/// from the input.
pub fn deserialize_into<B: AsRef<[u8]>>(buf: B) -> Result<Database<B>, Error> {
    let bytes = buf.as_ref();
    if bytes.len() < PREAMBLE_SIZE {
        return Err(Error::BadValue("input shorter than header".into()));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != MAGIC {
        return Err(Error::BadValue(format!(
            "bad magic: expected {MAGIC:#x}, got {magic:#x}"
        )));
    }
    let header = Header::read_from(&bytes[4..4 + HEADER_SIZE]);

    if header.buckets == 0 {
        return Err(Error::BadValue("buckets == 0".into()));
    }
    if header.popular_count as usize > crate::primitives::MAX_POPULAR {
        return Err(Error::BadValue(format!(
            "popular_count {} exceeds the {} limit",
            header.popular_count,
            crate::primitives::MAX_POPULAR
        )));
    }

    let popular_table_off = PREAMBLE_SIZE;
    let main_table_off = popular_table_off + header.popular_records as usize * RECORD_SIZE;
    let blob_off = main_table_off + header.buckets as usize * RECORD_SIZE;
    let blob_len = header.domains_blob_size as usize;
    let total = blob_off + blob_len;

    if bytes.len() < total {
        return Err(Error::SmallPlace {
            needed: total,
            got: bytes.len(),
        });
    }
    if blob_len < BLOB_TAIL_PAD {
        return Err(Error::BadValue("blob smaller than mandatory tail pad".into()));
    }
    if blob_len % BLOB_ALIGN != 0 {
        return Err(Error::BadValue(format!(
            "blob size {blob_len} is not a multiple of {BLOB_ALIGN}"
        )));
    }

    let fastmod = FastMod::from_parts(header.fastmod_m, header.buckets);
    let db = Database {
        buf,
        buckets: header.buckets,
        hash_seed: header.hash_seed,
        fastmod,
        popular_count: header.popular_count,
        popular_table_off,
        main_table_off,
        blob_off,
        blob_len,
    };

    validate_slots(&db)?;
    log::debug!(
        "deserialized: {} buckets, {} popular suffixes, {blob_len}-byte blob",
        db.buckets,
        db.popular_count
    );
    Ok(db)
}

/// Opens a serialized database file via `mmap`, avoiding a copy into the
/// process heap. Mirrors the teacher's `BinaryRuleReader::open`.
pub fn open_mmap(path: &std::path::Path) -> Result<Database<memmap2::Mmap>, Error> {
    let file =
        std::fs::File::open(path).map_err(|e| Error::BadValue(format!("opening {path:?}: {e}")))?;
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .map_err(|e| Error::BadValue(format!("mmap {path:?}: {e}")))?;
    deserialize_into(mmap)
}

/// Bounds-checks every slot's computed byte range against the blob size.
fn validate_slots<B: AsRef<[u8]>>(db: &Database<B>) -> Result<(), Error> {
    let bytes = db.buf.as_ref();
    for i in 0..db.popular_record_count() {
        check_record(&db.read_popular_record(bytes, i), db.blob_len)?;
    }
    for b in 0..db.buckets as usize {
        check_record(&db.read_main_record(bytes, b), db.blob_len)?;
    }
    Ok(())
}

fn check_record(rec: &Record, blob_len: usize) -> Result<(), Error> {
    for i in 0..rec.used as usize {
        let off = rec.slot_byte_offset(i) as usize;
        if off >= blob_len {
            return Err(Error::BadValue("slot offset out of bounds".into()));
        }
    }
    Ok(())
}

/// Convenience re-export: validate+lowercase+hash a raw byte span the same
/// way the query path would, useful for tests and bindings.
pub fn hash_span_for_tests(bytes: &[u8], seed: u64) -> u64 {
    hash64_span_ci(bytes, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_finds_seed_scenario() {
        let db = Database::compile(
            ["example.com", "site.com.", "images.google.com", "GO.com"],
            &CalibrationLimits::default(),
        )
        .unwrap();

        assert_eq!(db.find(b"example.com"), Lookup::Found);
        assert_eq!(db.find(b"api.example.com"), Lookup::Found);
        assert_eq!(db.find(b"a.b.images.google.com."), Lookup::Found);
        assert_eq!(db.find(b"go.com"), Lookup::Found);
        assert_eq!(db.find(b"com"), Lookup::NotFound);
        assert_eq!(db.find(b"google.com"), Lookup::NotFound);
        assert_eq!(db.find(b"not-listed.org"), Lookup::NotFound);
        assert_eq!(db.find(b"white space.com"), Lookup::InvalidInput);
    }

    #[test]
    fn round_trips_through_serialize_deserialize() {
        let db = Database::compile(
            ["example.com", "a.b.c.d.e", "images.google.com"],
            &CalibrationLimits::default(),
        )
        .unwrap();
        let mut out = vec![0u8; db.serialized_len()];
        db.serialize(&mut out).unwrap();

        let db2 = deserialize(&out).unwrap();
        for q in ["example.com", "sub.example.com", "a.b.c.d.e", "b.c.d.e", "images.google.com"] {
            assert_eq!(db.find(q.as_bytes()), db2.find(q.as_bytes()), "mismatch on {q}");
        }

        let mut out2 = vec![0u8; db2.serialized_len()];
        db2.serialize(&mut out2).unwrap();
        assert_eq!(out, out2);
    }

    #[test]
    fn introspection_sizes_are_consistent() {
        let db = Database::compile(
            ["example.com", "images.google.com", "site.net"],
            &CalibrationLimits::default(),
        )
        .unwrap();

        assert_eq!(header_bytes(), PREAMBLE_SIZE);
        assert_eq!(
            db.serialized_len(),
            header_bytes() + db.popular_bytes() + db.table_bytes() + db.blob_bytes()
        );
        assert_eq!(db.table_bytes(), db.buckets() as usize * RECORD_SIZE);

        let mut out = vec![0u8; db.serialized_len()];
        db.serialize(&mut out).unwrap();
        assert_eq!(db_place_size_from_serialized(&out).unwrap(), out.len());
    }

    #[test]
    fn db_place_size_from_serialized_rejects_bad_magic() {
        let mut buf = vec![0u8; PREAMBLE_SIZE + BLOB_TAIL_PAD];
        buf[0..4].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            db_place_size_from_serialized(&buf),
            Err(Error::BadValue(_))
        ));
    }

    #[test]
    fn db_place_size_is_an_upper_bound() {
        let limits = CalibrationLimits::default();
        let patterns: Vec<String> = (0..200)
            .map(|i| format!("host{i}.example{}.com", i % 11))
            .collect();
        let bound = db_place_size(&patterns, &limits);
        let db = Database::compile(patterns.iter().map(String::as_str), &limits).unwrap();
        assert!(
            bound >= db.serialized_len(),
            "bound {bound} < actual {}",
            db.serialized_len()
        );
    }

    #[test]
    fn pruned_subdomain_still_matches() {
        let db = Database::compile(
            ["example.com", "api.example.com"],
            &CalibrationLimits::default(),
        )
        .unwrap();
        assert_eq!(db.used_total(), 1);
        assert_eq!(db.find(b"example.com"), Lookup::Found);
        assert_eq!(db.find(b"api.example.com"), Lookup::Found);
    }

    #[test]
    fn deserialize_rejects_bad_magic() {
        let mut buf = vec![0u8; PREAMBLE_SIZE + BLOB_TAIL_PAD];
        buf[0..4].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(deserialize(&buf), Err(Error::BadValue(_))));
    }

    /// A header claiming more than 256 popular suffixes is rejected even
    /// when the rest of the buffer is otherwise well-formed.
    #[test]
    fn deserialize_rejects_popular_count_over_cap() {
        let db = Database::compile(["example.com"], &CalibrationLimits::default()).unwrap();
        let mut out = vec![0u8; db.serialized_len()];
        db.serialize(&mut out).unwrap();

        out[4 + 36..4 + 40].copy_from_slice(&257u32.to_le_bytes());
        assert!(matches!(deserialize(&out), Err(Error::BadValue(_))));
    }

    /// A header claiming a blob size that isn't a multiple of 16 is rejected.
    #[test]
    fn deserialize_rejects_misaligned_blob_size() {
        let db = Database::compile(["example.com"], &CalibrationLimits::default()).unwrap();
        let mut out = vec![0u8; db.serialized_len() + 1];
        db.serialize(&mut out[..db.serialized_len()]).unwrap();

        let bad_len = db.blob_bytes() as u64 + 1;
        out[4 + 48..4 + 56].copy_from_slice(&bad_len.to_le_bytes());
        assert!(matches!(deserialize(&out), Err(Error::BadValue(_))));
    }

    #[test]
    fn opens_via_mmap() {
        use std::io::Write;

        let db = Database::compile(
            ["example.com", "images.google.com"],
            &CalibrationLimits::default(),
        )
        .unwrap();
        let mut out = vec![0u8; db.serialized_len()];
        db.serialize(&mut out).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&out).unwrap();

        let mapped = open_mmap(file.path()).unwrap();
        assert_eq!(mapped.find(b"example.com"), Lookup::Found);
        assert_eq!(mapped.find(b"google.com"), Lookup::NotFound);
    }
}
