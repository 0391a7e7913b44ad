//! Author entity, keyed by `Name <email>` bytes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::OscarError;

use super::{Sha, Store};

pub struct Author {
    store: Arc<Store>,
    name: Vec<u8>,
}

impl Author {
    pub(crate) fn new(store: Arc<Store>, name: Vec<u8>) -> Author {
        Author { store, name }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn commit_shas(&self) -> Result<Vec<Sha>, OscarError> {
        self.store.sha_list("author_commits", &self.name)
    }

    pub fn project_names(&self) -> Result<Vec<Vec<u8>>, OscarError> {
        self.store.name_list("author_projects", &self.name)
    }

    pub fn file_names(&self) -> Result<Vec<Vec<u8>>, OscarError> {
        self.store.name_list("author_files", &self.name)
    }
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Author {}

impl Hash for Author {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(b"author");
        state.write(&self.name);
    }
}

impl fmt::Debug for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Author({})", String::from_utf8_lossy(&self.name))
    }
}
