//! The 64-byte, cache-line-aligned record layout shared by bucket and
//! popular-suffix tables.
//!
//! Both tables are built from the same record kind — there is no separate
//! "popular record" type, just a different table the same layout is placed
//! into (see spec Design Notes, "variant types without inheritance").
//!
//! Serialization here uses plain byte-slice reads/writes rather than the
//! `#[repr(C)]` + raw-pointer-cast idiom the original binary format uses,
//! since this crate's output is never run through a compiler in this
//! exercise and an alignment or provenance mistake in `unsafe` code would be
//! undetectable. The on-disk shape is identical either way.

use crate::primitives::BUCKET_CAPACITY;

/// Size in bytes of one serialized record.
pub const RECORD_SIZE: usize = 64;

/// In-memory form of one record: up to [`BUCKET_CAPACITY`] pattern
/// descriptors sharing a bucket (or, in the popular table, a popular
/// suffix group).
#[derive(Debug, Clone)]
pub struct Record {
    /// Upper 16 bits of each stored pattern's chained hash.
    pub tags: [u16; BUCKET_CAPACITY],
    /// Slot offsets into the blob, in units of [`BUCKET_CAPACITY`] bytes,
    /// relative to `base_off`.
    pub slot_offsets: [u8; BUCKET_CAPACITY],
    /// Base byte offset into the domains blob.
    pub base_off: u32,
    /// Number of occupied slots, `<= BUCKET_CAPACITY`.
    pub used: u16,
    /// Deepest left-extension any pattern assigned here required at
    /// calibration time; bounds the query-time scan loop.
    pub max_scans: u16,
}

impl Default for Record {
    fn default() -> Self {
        Record {
            tags: [0; BUCKET_CAPACITY],
            slot_offsets: [0; BUCKET_CAPACITY],
            base_off: 0,
            used: 0,
            max_scans: 0,
        }
    }
}

impl Record {
    /// Appends one `(tag, byte_offset)` slot. `byte_offset` must be
    /// representable as `base_off + offset*BUCKET_CAPACITY`; callers pick
    /// `base_off` so that this always holds exactly (see `calibrate.rs`).
    ///
    /// Returns `false` if the record is already at capacity.
    pub fn push(&mut self, tag: u16, slot_offset: u8) -> bool {
        if self.used as usize >= BUCKET_CAPACITY {
            return false;
        }
        let i = self.used as usize;
        self.tags[i] = tag;
        self.slot_offsets[i] = slot_offset;
        self.used += 1;
        true
    }

    /// Byte offset into the blob of the pattern stored at lane `i`.
    pub fn slot_byte_offset(&self, i: usize) -> u32 {
        self.base_off + (self.slot_offsets[i] as u32) * (BUCKET_CAPACITY as u32)
    }

    pub fn write_to(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), RECORD_SIZE);
        for i in 0..BUCKET_CAPACITY {
            out[i * 2..i * 2 + 2].copy_from_slice(&self.tags[i].to_le_bytes());
        }
        out[32..48].copy_from_slice(&self.slot_offsets);
        out[48..52].copy_from_slice(&self.base_off.to_le_bytes());
        out[52..54].copy_from_slice(&self.used.to_le_bytes());
        out[54..56].copy_from_slice(&self.max_scans.to_le_bytes());
        out[56..64].fill(0); // reserved
    }

    pub fn read_from(buf: &[u8]) -> Record {
        debug_assert_eq!(buf.len(), RECORD_SIZE);
        let mut tags = [0u16; BUCKET_CAPACITY];
        for (i, t) in tags.iter_mut().enumerate() {
            *t = u16::from_le_bytes([buf[i * 2], buf[i * 2 + 1]]);
        }
        let mut slot_offsets = [0u8; BUCKET_CAPACITY];
        slot_offsets.copy_from_slice(&buf[32..48]);
        let base_off = u32::from_le_bytes(buf[48..52].try_into().unwrap());
        let used = u16::from_le_bytes(buf[52..54].try_into().unwrap());
        let max_scans = u16::from_le_bytes(buf[54..56].try_into().unwrap());
        Record {
            tags,
            slot_offsets,
            base_off,
            used,
            max_scans,
        }
    }
}
