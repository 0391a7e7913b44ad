//! Tag entity. The dataset records tag SHAs but no decoded payloads, so
//! this stays a key-only handle.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::Sha;

pub struct Tag {
    sha: Sha,
}

impl Tag {
    pub(crate) fn new(sha: Sha) -> Tag {
        Tag { sha }
    }

    pub fn sha(&self) -> &Sha {
        &self.sha
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(b"tag");
        state.write(self.sha.as_bytes());
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.sha)
    }
}
