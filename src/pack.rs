//! Blob archive access.
//!
//! Blob payloads are concatenated LZF frames in big `blob_<shard>.bin`
//! files; the `(offset, length)` of each record comes from the `blob_offset`
//! shard. A companion `blob_<shard>.idx` text file lists the same records
//! for sequential scans.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::codec;
use crate::error::OscarError;

/// Read and decompress one record of a `.bin` archive.
///
/// The offset comes from a separate index, so a stale or bogus value can
/// point past EOF or at a malformed frame; both cases surface as
/// `ObjectNotFound` for the given key, never as archive-wide failures.
pub fn read_blob(path: &Path, key: &[u8], offset: u64, length: u64) -> Result<Vec<u8>, OscarError> {
    let file = File::open(path).map_err(|e| OscarError::ShardUnavailable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut compressed = vec![0u8; length as usize];
    file.read_exact_at(&mut compressed, offset)
        .map_err(|_| OscarError::not_found("blob_data", key))?;
    codec::decompress(&compressed).map_err(|_| OscarError::not_found("blob_data", key))
}

// ─── Sequential .idx access ─────────────────────────────────────────

/// One row of a `.idx` file: `id;offset;length;sha[;?;sha;?]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxRow {
    pub id: u64,
    pub offset: u64,
    pub length: u64,
    /// Column 4: SHA of the record as stored.
    pub sha: [u8; 20],
    /// The optional later column some blob rows carry. When present it is
    /// the SHA to trust; column 4 then hashes the stored (re-compressed)
    /// bytes rather than the content. Both are kept so callers can audit
    /// rows where the two disagree.
    pub true_sha: Option<[u8; 20]>,
}

impl IdxRow {
    /// The SHA callers should use: the extra column when present, else
    /// column 4.
    pub fn effective_sha(&self) -> [u8; 20] {
        self.true_sha.unwrap_or(self.sha)
    }

    pub fn parse(line: &str) -> Result<IdxRow, OscarError> {
        let fields: Vec<&str> = line.trim_end().split(';').collect();
        if fields.len() < 4 {
            return Err(OscarError::CorruptFrame(format!(
                "idx row has {} fields, expected at least 4",
                fields.len()
            )));
        }
        let number = |i: usize, what: &str| -> Result<u64, OscarError> {
            fields[i].parse().map_err(|_| {
                OscarError::CorruptFrame(format!("idx row {what} '{}' is not a number", fields[i]))
            })
        };
        let sha = codec::sha20_from_hex("idx row", fields[3])
            .map_err(|_| OscarError::CorruptFrame(format!("idx row sha '{}'", fields[3])))?;
        // Blob rows may carry the content SHA in a later column; prefer the
        // 5th, falling back to the 6th for the wider row shape.
        let true_sha = fields
            .get(4)
            .into_iter()
            .chain(fields.get(5))
            .find_map(|f| codec::sha20_from_hex("idx row", f).ok());
        Ok(IdxRow {
            id: number(0, "id")?,
            offset: number(1, "offset")?,
            length: number(2, "length")?,
            sha,
            true_sha,
        })
    }
}

/// Sequential reader over a `.idx` file.
pub struct IdxReader {
    lines: Lines<BufReader<File>>,
}

impl IdxReader {
    pub fn open(path: &Path) -> Result<IdxReader, OscarError> {
        let file = File::open(path).map_err(|e| OscarError::ShardUnavailable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(IdxReader {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Iterator for IdxReader {
    type Item = Result<IdxRow, OscarError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(IdxRow::parse(&line)),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
