//! Domain entities layered over the storage primitives.
//!
//! [`Oscar`] is the entry point: it host-gates once, builds the immutable
//! path table, and hands out entities. Entities are cheap to construct (key
//! validation only); every storage interaction is lazy and memoized on the
//! instance. Equality and hashing consider only the entity kind and key, so
//! two handles to the same object compare equal regardless of what either
//! has already loaded.

mod author;
mod blob;
mod commit;
mod file;
mod project;
mod tag;
mod tree;

#[cfg(test)]
mod model_tests;

pub use author::Author;
pub use blob::Blob;
pub use commit::{Commit, DiffEntry};
pub use file::File;
pub use project::Project;
pub use tag::Tag;
pub use tree::Tree;

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use crate::codec;
use crate::error::OscarError;
use crate::pack;
use crate::paths::PathTable;
use crate::settings::Settings;
use crate::tch::{self, TchReader};

/// Authors whose commits are dropped from project and file iteration (never
/// from the raw relations).
pub const IGNORED_AUTHORS: &[&[u8]] = &[b"GitHub Merge Button <merge-button@github.com>"];

// ─── Keys ───────────────────────────────────────────────────────────

/// A validated 20-byte SHA-1 identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha([u8; 20]);

impl Sha {
    /// From a 40-character hex string; anything else is a construction
    /// error.
    pub fn from_hex(kind: &'static str, s: &str) -> Result<Sha, OscarError> {
        Ok(Sha(codec::sha20_from_hex(kind, s)?))
    }

    /// From exactly 20 raw bytes.
    pub fn from_bytes(kind: &'static str, raw: &[u8]) -> Result<Sha, OscarError> {
        let raw20: [u8; 20] = raw.try_into().map_err(|_| OscarError::Construction {
            kind,
            value: hex::encode(raw),
            reason: format!("expected 20 raw bytes, got {}", raw.len()),
        })?;
        Ok(Sha(raw20))
    }

    pub(crate) fn from_array(raw: [u8; 20]) -> Sha {
        Sha(raw)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha({})", self.to_hex())
    }
}

// ─── Shared store ───────────────────────────────────────────────────

/// The process-lifetime state every entity holds an `Arc` of: the path
/// table, immutable after build. TCH handles live in the global pool, not
/// here.
pub(crate) struct Store {
    table: PathTable,
}

impl Store {
    /// Raw TCH value for a key. `Ok(None)` means the key is absent;
    /// a missing shard is an error only for keys that hash into it.
    pub(crate) fn tch_value(
        &self,
        rel: &'static str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, OscarError> {
        let resolved = self.table.must(rel);
        let handle = tch::get_handle(&resolved.shard_path(key))?;
        handle.get(key)
    }

    pub(crate) fn required(&self, rel: &'static str, key: &[u8]) -> Result<Vec<u8>, OscarError> {
        self.tch_value(rel, key)?
            .ok_or_else(|| OscarError::not_found(rel, key))
    }

    /// LZF-framed Git object payload (`commit_random`, `tree_random`).
    pub(crate) fn git_object(&self, rel: &'static str, sha: &Sha) -> Result<Vec<u8>, OscarError> {
        codec::decompress(&self.required(rel, sha.as_bytes())?)
    }

    /// Raw 20-byte SHA concatenation value.
    pub(crate) fn sha_list(&self, rel: &'static str, key: &[u8]) -> Result<Vec<Sha>, OscarError> {
        Ok(codec::sha_chunks(&self.required(rel, key)?)?
            .into_iter()
            .map(Sha::from_array)
            .collect())
    }

    /// LZF-compressed `;`-delimited list value. Empty segments and the
    /// literal `EMPTY` sentinel are dropped.
    pub(crate) fn name_list(
        &self,
        rel: &'static str,
        key: &[u8],
    ) -> Result<Vec<Vec<u8>>, OscarError> {
        let raw = codec::decompress(&self.required(rel, key)?)?;
        Ok(raw
            .split(|&b| b == b';')
            .filter(|s| !s.is_empty() && *s != b"EMPTY")
            .map(<[u8]>::to_vec)
            .collect())
    }

    /// LZF-compressed `time;author` value.
    pub(crate) fn time_author(
        &self,
        rel: &'static str,
        key: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), OscarError> {
        let raw = codec::decompress(&self.required(rel, key)?)?;
        match raw.iter().position(|&b| b == b';') {
            Some(i) => Ok((raw[..i].to_vec(), raw[i + 1..].to_vec())),
            None => Err(OscarError::CorruptFrame(format!(
                "{rel} value has no time;author separator"
            ))),
        }
    }

    /// BER `(offset, length)` into the blob archive.
    pub(crate) fn blob_position(&self, sha: &Sha) -> Result<(u64, u64), OscarError> {
        codec::ber_decode_pair(&self.required("blob_offset", sha.as_bytes())?)
    }

    /// Decompressed blob content via the archive.
    pub(crate) fn blob_data(&self, sha: &Sha) -> Result<Vec<u8>, OscarError> {
        let (offset, length) = self.blob_position(sha)?;
        let path = self.table.must("blob_data").shard_path(sha.as_bytes());
        pack::read_blob(&path, sha.as_bytes(), offset, length)
    }
}

/// Force-or-compute a per-instance memo.
pub(crate) fn memo<'a, T>(
    cell: &'a OnceCell<T>,
    compute: impl FnOnce() -> Result<T, OscarError>,
) -> Result<&'a T, OscarError> {
    if let Some(v) = cell.get() {
        return Ok(v);
    }
    let v = compute()?;
    Ok(cell.get_or_init(|| v))
}

// ─── Entry point ────────────────────────────────────────────────────

/// Root handle over the dataset.
pub struct Oscar {
    store: Arc<Store>,
}

impl Oscar {
    /// Gate on the host, capture the environment, resolve every relation.
    pub fn new() -> Result<Oscar, OscarError> {
        Oscar::with_settings(Settings::from_env()?)
    }

    /// Build against explicit settings (tests, embeddings).
    pub fn with_settings(settings: Settings) -> Result<Oscar, OscarError> {
        let table = PathTable::build(&settings);
        Ok(Oscar {
            store: Arc::new(Store { table }),
        })
    }

    pub fn commit(&self, hex: &str) -> Result<Commit, OscarError> {
        Ok(Commit::new(Arc::clone(&self.store), Sha::from_hex("commit", hex)?))
    }

    pub fn commit_from_sha(&self, sha: Sha) -> Commit {
        Commit::new(Arc::clone(&self.store), sha)
    }

    pub fn tree(&self, hex: &str) -> Result<Tree, OscarError> {
        Ok(Tree::new(Arc::clone(&self.store), Sha::from_hex("tree", hex)?))
    }

    pub fn blob(&self, hex: &str) -> Result<Blob, OscarError> {
        Ok(Blob::new(Arc::clone(&self.store), Sha::from_hex("blob", hex)?))
    }

    pub fn tag(&self, hex: &str) -> Result<Tag, OscarError> {
        Ok(Tag::new(Sha::from_hex("tag", hex)?))
    }

    pub fn project(&self, name: &str) -> Project {
        Project::new(Arc::clone(&self.store), name.as_bytes().to_vec())
    }

    pub fn file(&self, path: impl Into<Vec<u8>>) -> File {
        File::new(Arc::clone(&self.store), path.into())
    }

    pub fn author(&self, name: impl Into<Vec<u8>>) -> Author {
        Author::new(Arc::clone(&self.store), name.into())
    }

    /// All keys of a relation, shard by shard.
    ///
    /// Relations without a key registry (the blob archive) yield an empty
    /// sequence; for registered relations every shard must be openable.
    pub fn iter_relation_keys(&self, relation: &str) -> Result<RelationKeys, OscarError> {
        let resolved = self
            .store
            .table
            .get(relation)
            .ok_or_else(|| OscarError::Construction {
                kind: "relation",
                value: relation.to_string(),
                reason: "unknown relation name".to_string(),
            })?;
        if !resolved.relation.keys_registered {
            return Ok(RelationKeys {
                handles: Vec::new(),
                index: 0,
                off: 0,
            });
        }
        let handles = (0..resolved.shard_count())
            .map(|i| tch::get_handle(&resolved.path_for_shard(i)))
            .collect::<Result<Vec<_>, _>>()?;
        let off = handles.first().map(|h| h.first_record()).unwrap_or(0);
        Ok(RelationKeys {
            handles,
            index: 0,
            off,
        })
    }
}

/// Lazy key iteration across all shards of one relation.
#[derive(Debug)]
pub struct RelationKeys {
    handles: Vec<Arc<TchReader>>,
    index: usize,
    off: u64,
}

impl Iterator for RelationKeys {
    type Item = Result<Vec<u8>, OscarError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.handles.len() {
            if let Some(item) = self.handles[self.index].next_key(&mut self.off) {
                return Some(item);
            }
            self.index += 1;
            if let Some(next) = self.handles.get(self.index) {
                self.off = next.first_record();
            }
        }
        None
    }
}
