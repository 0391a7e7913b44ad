//! Read-only access to Tokyo Cabinet hash database shards.
//!
//! The dataset ships thousands of `.tch` files. No maintained binding for
//! the original C library exists on crates.io, so the read-only subset of
//! the format is decoded here directly:
//!
//! - 256-byte header, integers little-endian at fixed offsets
//! - bucket array of 4-byte (8 with the `large` option) record offsets,
//!   stored right-shifted by the alignment power
//! - records forming a binary search tree per bucket, ordered by a one-byte
//!   secondary hash and then by key
//! - sizes encoded as signed-byte base-128 varints
//!
//! All reads are positional (`FileExt`), so a single open handle serves any
//! number of concurrent readers. Handles live in a process-wide pool that
//! never evicts; open failures are returned, not memoized, so a shard that
//! appears later is picked up on retry.

use std::collections::HashMap;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::error::OscarError;

const HEADER_SIZE: u64 = 256;
const MAGIC: &[u8] = b"ToKyO CaBiNeT";

const APOW_OFF: usize = 34;
const OPTS_OFF: usize = 36;
const BNUM_OFF: usize = 40;
const RNUM_OFF: usize = 48;
const FSIZ_OFF: usize = 56;
const FREC_OFF: usize = 64;

const OPT_LARGE: u8 = 1 << 0;
const OPT_DEFLATE: u8 = 1 << 1;
const OPT_BZIP: u8 = 1 << 2;
const OPT_TCBS: u8 = 1 << 3;

const REC_MAGIC: u8 = 0xc8;
const FREE_MAGIC: u8 = 0xb0;

// ─── Reader ─────────────────────────────────────────────────────────

/// One open shard. Cheap to share; all methods take `&self`.
#[derive(Debug)]
pub struct TchReader {
    file: File,
    path: PathBuf,
    bnum: u64,
    apow: u32,
    width: usize,
    frec: u64,
    fsiz: u64,
    rnum: u64,
}

impl TchReader {
    /// Open a shard read-only and validate its header.
    pub fn open(path: &Path) -> Result<TchReader, OscarError> {
        let unavailable = |message: String| OscarError::ShardUnavailable {
            path: path.to_path_buf(),
            message,
        };
        let file = File::open(path).map_err(|e| unavailable(e.to_string()))?;
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact_at(&mut header, 0)
            .map_err(|e| unavailable(format!("short header: {e}")))?;
        if &header[..MAGIC.len()] != MAGIC {
            return Err(unavailable("not a Tokyo Cabinet file".to_string()));
        }
        let opts = header[OPTS_OFF];
        if opts & (OPT_DEFLATE | OPT_BZIP | OPT_TCBS) != 0 {
            return Err(unavailable(
                "record compression options are not supported".to_string(),
            ));
        }
        let width = if opts & OPT_LARGE != 0 { 8 } else { 4 };
        let bnum = read_u64_le(&header[BNUM_OFF..]);
        let rnum = read_u64_le(&header[RNUM_OFF..]);
        let fsiz = read_u64_le(&header[FSIZ_OFF..]);
        let frec = read_u64_le(&header[FREC_OFF..]);
        let bucket_end = bnum
            .checked_mul(width as u64)
            .and_then(|b| b.checked_add(HEADER_SIZE));
        if bnum == 0 || bucket_end.is_none_or(|end| frec < end) {
            return Err(unavailable("implausible header geometry".to_string()));
        }
        debug!(path = %path.display(), bnum, rnum, "opened shard");
        Ok(TchReader {
            file,
            path: path.to_path_buf(),
            bnum,
            apow: u32::from(header[APOW_OFF]),
            width,
            frec,
            fsiz,
            rnum,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records in the database, per its header.
    pub fn record_count(&self) -> u64 {
        self.rnum
    }

    /// Look a key up. `Ok(None)` means the key is absent; errors mean the
    /// shard itself is broken.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, OscarError> {
        let (bidx, hash) = self.hash_pair(key);
        let mut off = self.read_shifted(HEADER_SIZE + bidx * self.width as u64)?;
        while off != 0 {
            let rec = self.read_record(off, false)?;
            off = match hash.cmp(&rec.hash) {
                std::cmp::Ordering::Greater => rec.left,
                std::cmp::Ordering::Less => rec.right,
                std::cmp::Ordering::Equal => match key_cmp(key, &rec.key) {
                    std::cmp::Ordering::Greater => rec.left,
                    std::cmp::Ordering::Less => rec.right,
                    std::cmp::Ordering::Equal => {
                        let rec = self.read_record(off, true)?;
                        return Ok(rec.value);
                    }
                },
            };
        }
        Ok(None)
    }

    /// Restartable lazy scan over every key, in record order.
    pub fn iter_keys(&self) -> TchKeys<'_> {
        TchKeys {
            reader: self,
            off: self.frec,
        }
    }

    /// Offset where the record region starts.
    pub(crate) fn first_record(&self) -> u64 {
        self.frec
    }

    /// Advance `off` past the next record or free block, yielding the
    /// record's key. Drives both [`TchKeys`] and owning iterators that hold
    /// the reader behind an `Arc`.
    pub(crate) fn next_key(&self, off: &mut u64) -> Option<Result<Vec<u8>, OscarError>> {
        while *off < self.fsiz {
            let mut magic = [0u8; 5];
            let got = match read_at_most(&self.file, &mut magic, *off) {
                Ok(got) => got,
                Err(e) => return Some(Err(self.corrupt(e.to_string()))),
            };
            if got == 0 {
                return None;
            }
            match magic[0] {
                REC_MAGIC => {
                    return match self.read_record(*off, false) {
                        Ok(rec) => {
                            *off += rec.size;
                            Some(Ok(rec.key))
                        }
                        Err(e) => {
                            *off = self.fsiz;
                            Some(Err(e))
                        }
                    };
                }
                FREE_MAGIC if got >= 5 => {
                    let rsiz = u64::from(u32::from_le_bytes([
                        magic[1], magic[2], magic[3], magic[4],
                    ]));
                    if rsiz < 5 {
                        let at = *off;
                        *off = self.fsiz;
                        return Some(Err(
                            self.corrupt(format!("degenerate free block at {at}"))
                        ));
                    }
                    *off += rsiz;
                }
                other => {
                    let at = *off;
                    *off = self.fsiz;
                    return Some(Err(
                        self.corrupt(format!("unexpected block magic {other:#x} at {at}"))
                    ));
                }
            }
        }
        None
    }

    /// TC's hash pair: bucket index folds bytes forward from 19780211×37,
    /// the chain-ordering byte folds them backward from 751×31.
    fn hash_pair(&self, key: &[u8]) -> (u64, u8) {
        let mut idx: u64 = 19_780_211;
        let mut hash: u32 = 751;
        for &b in key {
            idx = idx.wrapping_mul(37).wrapping_add(u64::from(b));
        }
        for &b in key.iter().rev() {
            hash = hash.wrapping_mul(31).wrapping_add(u32::from(b));
        }
        (idx % self.bnum, hash as u8)
    }

    /// Read a bucket entry or chain pointer: `width` bytes, left-shifted by
    /// the alignment power.
    fn read_shifted(&self, pos: u64) -> Result<u64, OscarError> {
        let mut buf = [0u8; 8];
        self.file
            .read_exact_at(&mut buf[..self.width], pos)
            .map_err(|e| self.corrupt(format!("bucket read at {pos}: {e}")))?;
        Ok(u64::from_le_bytes(buf) << self.apow)
    }

    fn read_record(&self, off: u64, want_value: bool) -> Result<Record, OscarError> {
        let fixed = 2 + 2 * self.width + 2;
        let mut buf = vec![0u8; fixed + 20];
        let got = read_at_most(&self.file, &mut buf, off)
            .map_err(|e| self.corrupt(format!("record read at {off}: {e}")))?;
        let buf = &buf[..got];
        if buf.len() < fixed + 2 {
            return Err(self.corrupt(format!("truncated record at {off}")));
        }
        if buf[0] != REC_MAGIC {
            return Err(self.corrupt(format!("bad record magic {:#x} at {off}", buf[0])));
        }
        let hash = buf[1];
        let left = read_uint_le(&buf[2..2 + self.width]) << self.apow;
        let right = read_uint_le(&buf[2 + self.width..2 + 2 * self.width]) << self.apow;
        let psiz = u64::from(u16::from_le_bytes([buf[fixed - 2], buf[fixed - 1]]));
        let (ksiz, klen) = read_vnum(&buf[fixed..])
            .ok_or_else(|| self.corrupt(format!("bad key size at {off}")))?;
        let (vsiz, vlen) = read_vnum(&buf[fixed + klen..])
            .ok_or_else(|| self.corrupt(format!("bad value size at {off}")))?;
        if ksiz + vsiz > self.fsiz {
            return Err(self.corrupt(format!("implausible record sizes at {off}")));
        }
        let body_off = off + (fixed + klen + vlen) as u64;
        let mut key = vec![0u8; ksiz as usize];
        self.file
            .read_exact_at(&mut key, body_off)
            .map_err(|e| self.corrupt(format!("key read at {off}: {e}")))?;
        let value = if want_value {
            let mut value = vec![0u8; vsiz as usize];
            self.file
                .read_exact_at(&mut value, body_off + ksiz)
                .map_err(|e| self.corrupt(format!("value read at {off}: {e}")))?;
            Some(value)
        } else {
            None
        };
        Ok(Record {
            hash,
            left,
            right,
            key,
            value,
            size: (fixed + klen + vlen) as u64 + ksiz + vsiz + psiz,
        })
    }

    fn corrupt(&self, message: String) -> OscarError {
        OscarError::ShardUnavailable {
            path: self.path.clone(),
            message,
        }
    }
}

struct Record {
    hash: u8,
    left: u64,
    right: u64,
    key: Vec<u8>,
    value: Option<Vec<u8>>,
    /// Total on-disk footprint including padding; advances the iterator.
    size: u64,
}

/// Lazy key iterator. Walks records sequentially from the first-record
/// offset, skipping free blocks.
pub struct TchKeys<'a> {
    reader: &'a TchReader,
    off: u64,
}

impl Iterator for TchKeys<'_> {
    type Item = Result<Vec<u8>, OscarError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_key(&mut self.off)
    }
}

// ─── Pool ───────────────────────────────────────────────────────────

static POOL: OnceLock<Mutex<HashMap<PathBuf, Arc<TchReader>>>> = OnceLock::new();

/// Pooled handle for a shard path. At most one live handle per absolute
/// path; handles are never evicted. Open failures are not cached, so a
/// later retry sees the filesystem as it is then.
pub fn get_handle(path: &Path) -> Result<Arc<TchReader>, OscarError> {
    let pool = POOL.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = pool.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(handle) = guard.get(path) {
        return Ok(Arc::clone(handle));
    }
    let handle = Arc::new(TchReader::open(path)?);
    guard.insert(path.to_path_buf(), Arc::clone(&handle));
    Ok(handle)
}

// ─── Byte helpers ───────────────────────────────────────────────────

fn read_u64_le(buf: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(b)
}

fn read_uint_le(buf: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b[..buf.len()].copy_from_slice(buf);
    u64::from_le_bytes(b)
}

/// TC varint: little-endian 7-bit groups, continuation marked by the high
/// bit, continuation bytes storing `255 - group`.
fn read_vnum(buf: &[u8]) -> Option<(u64, usize)> {
    let mut num: u64 = 0;
    let mut base: u64 = 1;
    for (i, &b) in buf.iter().enumerate() {
        if b < 0x80 {
            num += u64::from(b) * base;
            return Some((num, i + 1));
        }
        num += base * u64::from(255 - b);
        base <<= 7;
    }
    None
}

/// Like `read_exact_at` but tolerates hitting EOF; returns bytes read.
fn read_at_most(file: &File, buf: &mut [u8], mut off: u64) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read_at(&mut buf[filled..], off)?;
        if n == 0 {
            break;
        }
        filled += n;
        off += n as u64;
    }
    Ok(filled)
}

/// TC key order within a chain: bytewise, then longer-is-greater.
fn key_cmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

// ─── Test support: a minimal writer ─────────────────────────────────
