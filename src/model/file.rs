//! File entity, keyed by path bytes (which may end with a newline in the
//! dataset; keys are taken verbatim).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::OscarError;

use super::{Commit, IGNORED_AUTHORS, Sha, Store};

pub struct File {
    store: Arc<Store>,
    path: Vec<u8>,
}

impl File {
    pub(crate) fn new(store: Arc<Store>, path: Vec<u8>) -> File {
        File { store, path }
    }

    pub fn path(&self) -> &[u8] {
        &self.path
    }

    pub fn commit_shas(&self) -> Result<Vec<Sha>, OscarError> {
        self.store.sha_list("file_commits", &self.path)
    }

    pub fn author_names(&self) -> Result<Vec<Vec<u8>>, OscarError> {
        self.store.name_list("file_authors", &self.path)
    }

    pub fn blob_shas(&self) -> Result<Vec<Sha>, OscarError> {
        self.store.sha_list("file_blobs", &self.path)
    }

    /// Commits touching this file that are retrievable and not by an
    /// ignored author. The raw relation is [`File::commit_shas`].
    pub fn commits(&self) -> Result<Vec<Commit>, OscarError> {
        let mut commits = Vec::new();
        for sha in self.commit_shas()? {
            let commit = Commit::new(Arc::clone(&self.store), sha);
            let skip = match commit.author() {
                Ok(author) => IGNORED_AUTHORS.contains(&author),
                Err(OscarError::ObjectNotFound { .. }) => true,
                Err(e) => return Err(e),
            };
            if !skip {
                commits.push(commit);
            }
        }
        Ok(commits)
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for File {}

impl Hash for File {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(b"file");
        state.write(&self.path);
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", String::from_utf8_lossy(&self.path))
    }
}
