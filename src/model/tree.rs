//! Tree entity: directory snapshots.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::OscarError;
use crate::objects::{TreeIter, tree_entries};

use super::{Sha, Store, memo};

pub struct Tree {
    store: Arc<Store>,
    sha: Sha,
    data: OnceCell<Vec<u8>>,
    files: OnceCell<BTreeMap<Vec<u8>, Sha>>,
}

impl Tree {
    pub(crate) fn new(store: Arc<Store>, sha: Sha) -> Tree {
        Tree {
            store,
            sha,
            data: OnceCell::new(),
            files: OnceCell::new(),
        }
    }

    pub fn sha(&self) -> &Sha {
        &self.sha
    }

    /// The raw tree payload.
    pub fn data(&self) -> Result<&[u8], OscarError> {
        memo(&self.data, || self.store.git_object("tree_random", &self.sha)).map(Vec::as_slice)
    }

    /// Entries in on-disk order, without descending into subtrees.
    pub fn entries(&self) -> Result<TreeIter<'_>, OscarError> {
        Ok(tree_entries(self.data()?))
    }

    /// Depth-first traversal: every entry of this tree, and for directory
    /// entries also the subtree's entries with `parent/child` names.
    pub fn walk(&self) -> Result<Vec<(Vec<u8>, Vec<u8>, Sha)>, OscarError> {
        let mut out = Vec::new();
        self.walk_into(b"", self.data()?, &mut out)?;
        Ok(out)
    }

    fn walk_into(
        &self,
        prefix: &[u8],
        data: &[u8],
        out: &mut Vec<(Vec<u8>, Vec<u8>, Sha)>,
    ) -> Result<(), OscarError> {
        for entry in tree_entries(data) {
            let entry = entry?;
            let full = if prefix.is_empty() {
                entry.name.to_vec()
            } else {
                [prefix, b"/", entry.name].concat()
            };
            let sha = Sha::from_array(entry.sha);
            out.push((entry.mode.to_vec(), full.clone(), sha));
            if entry.is_dir() {
                let sub = self.store.git_object("tree_random", &sha)?;
                self.walk_into(&full, &sub, out)?;
            }
        }
        Ok(())
    }

    /// Every recursively-reachable non-directory name mapped to its blob
    /// SHA. Computed once.
    pub fn files(&self) -> Result<&BTreeMap<Vec<u8>, Sha>, OscarError> {
        memo(&self.files, || {
            Ok(self
                .walk()?
                .into_iter()
                .filter(|(mode, _, _)| mode != crate::objects::DIR_MODE)
                .map(|(_, name, sha)| (name, sha))
                .collect())
        })
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Tree {}

impl Hash for Tree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(b"tree");
        state.write(self.sha.as_bytes());
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree({})", self.sha)
    }
}
