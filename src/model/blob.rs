//! Blob entity: file contents in the packed archive.

use std::cell::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::OscarError;

use super::{Sha, Store, memo};

pub struct Blob {
    store: Arc<Store>,
    sha: Sha,
    position: OnceCell<(u64, u64)>,
    data: OnceCell<Vec<u8>>,
}

impl Blob {
    pub(crate) fn new(store: Arc<Store>, sha: Sha) -> Blob {
        Blob {
            store,
            sha,
            position: OnceCell::new(),
            data: OnceCell::new(),
        }
    }

    pub fn sha(&self) -> &Sha {
        &self.sha
    }

    /// `(offset, compressed_length)` of this blob in its archive shard.
    pub fn position(&self) -> Result<(u64, u64), OscarError> {
        memo(&self.position, || self.store.blob_position(&self.sha)).map(|p| *p)
    }

    /// Decompressed content. `sha1("blob <len>\0<data>")` equals the key.
    pub fn data(&self) -> Result<&[u8], OscarError> {
        memo(&self.data, || self.store.blob_data(&self.sha)).map(Vec::as_slice)
    }

    /// Commits that introduced or modified this blob. Commits that removed
    /// it are not recorded; that asymmetry is in the dataset itself.
    pub fn commit_shas(&self) -> Result<Vec<Sha>, OscarError> {
        self.store.sha_list("blob_commits", self.sha.as_bytes())
    }

    /// `(timestamp, author)` of the earliest commit touching this blob.
    pub fn first_author(&self) -> Result<(Vec<u8>, Vec<u8>), OscarError> {
        self.store.time_author("blob_author", self.sha.as_bytes())
    }

    /// Paths this blob has appeared under.
    pub fn file_names(&self) -> Result<Vec<Vec<u8>>, OscarError> {
        self.store.name_list("blob_files", self.sha.as_bytes())
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Blob {}

impl Hash for Blob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(b"blob");
        state.write(self.sha.as_bytes());
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({})", self.sha)
    }
}
