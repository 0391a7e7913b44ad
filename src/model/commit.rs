//! Commit entity: parsed header, relational neighbors, diff.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use crate::error::OscarError;
use crate::objects::ParsedCommit;

use super::{Sha, Store, Tree, memo};

pub struct Commit {
    store: Arc<Store>,
    sha: Sha,
    data: OnceCell<Vec<u8>>,
    parsed: OnceCell<ParsedCommit>,
    /// Set by project iteration when date sanitation voids a wrong date.
    authored_override: OnceCell<Option<DateTime<FixedOffset>>>,
    project_names: OnceCell<Vec<Vec<u8>>>,
    child_shas: OnceCell<Vec<Sha>>,
    changed_files: OnceCell<Vec<Vec<u8>>>,
    blob_shas: OnceCell<Vec<Sha>>,
}

impl Commit {
    pub(crate) fn new(store: Arc<Store>, sha: Sha) -> Commit {
        Commit {
            store,
            sha,
            data: OnceCell::new(),
            parsed: OnceCell::new(),
            authored_override: OnceCell::new(),
            project_names: OnceCell::new(),
            child_shas: OnceCell::new(),
            changed_files: OnceCell::new(),
            blob_shas: OnceCell::new(),
        }
    }

    pub fn sha(&self) -> &Sha {
        &self.sha
    }

    /// The raw commit payload.
    pub fn data(&self) -> Result<&[u8], OscarError> {
        memo(&self.data, || {
            self.store.git_object("commit_random", &self.sha)
        })
        .map(Vec::as_slice)
    }

    /// All header fields decode together on the first touch of any of them.
    fn parsed(&self) -> Result<&ParsedCommit, OscarError> {
        memo(&self.parsed, || ParsedCommit::parse(self.data()?))
    }

    pub fn tree(&self) -> Result<Tree, OscarError> {
        Ok(Tree::new(
            Arc::clone(&self.store),
            Sha::from_array(self.parsed()?.tree),
        ))
    }

    /// Parent SHAs in header order; parent 0 drives first-parent chains.
    pub fn parent_shas(&self) -> Result<Vec<Sha>, OscarError> {
        Ok(self
            .parsed()?
            .parents
            .iter()
            .copied()
            .map(Sha::from_array)
            .collect())
    }

    /// First line of the message.
    pub fn message(&self) -> Result<&[u8], OscarError> {
        Ok(&self.parsed()?.message)
    }

    pub fn full_message(&self) -> Result<&[u8], OscarError> {
        Ok(&self.parsed()?.full_message)
    }

    /// `Name <email>` bytes.
    pub fn author(&self) -> Result<&[u8], OscarError> {
        Ok(&self.parsed()?.author)
    }

    pub fn committer(&self) -> Result<&[u8], OscarError> {
        Ok(&self.parsed()?.committer)
    }

    /// Authoring instant, absent when malformed, future-dated, or voided by
    /// project date sanitation.
    pub fn authored_at(&self) -> Result<Option<DateTime<FixedOffset>>, OscarError> {
        if let Some(overridden) = self.authored_override.get() {
            return Ok(*overridden);
        }
        Ok(self.parsed()?.authored_at)
    }

    pub fn committed_at(&self) -> Result<Option<DateTime<FixedOffset>>, OscarError> {
        Ok(self.parsed()?.committed_at)
    }

    pub fn signature(&self) -> Result<Option<&[u8]>, OscarError> {
        Ok(self.parsed()?.signature.as_deref())
    }

    pub fn encoding(&self) -> Result<&str, OscarError> {
        Ok(&self.parsed()?.encoding)
    }

    pub(crate) fn override_authored_at(&self, value: Option<DateTime<FixedOffset>>) {
        let _ = self.authored_override.set(value);
    }

    // ─── Relational neighbors ───────────────────────────────────

    pub fn project_names(&self) -> Result<&[Vec<u8>], OscarError> {
        memo(&self.project_names, || {
            self.store.name_list("commit_projects", self.sha.as_bytes())
        })
        .map(Vec::as_slice)
    }

    pub fn child_shas(&self) -> Result<&[Sha], OscarError> {
        memo(&self.child_shas, || {
            self.store.sha_list("commit_children", self.sha.as_bytes())
        })
        .map(Vec::as_slice)
    }

    pub fn changed_file_names(&self) -> Result<&[Vec<u8>], OscarError> {
        memo(&self.changed_files, || {
            self.store.name_list("commit_files", self.sha.as_bytes())
        })
        .map(Vec::as_slice)
    }

    /// Blobs reachable through the root tree, deduplicated.
    pub fn blob_shas(&self) -> Result<&[Sha], OscarError> {
        memo(&self.blob_shas, || {
            let tree = self.tree()?;
            let files = tree.files()?;
            let mut shas: Vec<Sha> = files.values().copied().collect();
            shas.sort();
            shas.dedup();
            Ok(shas)
        })
        .map(Vec::as_slice)
    }

    /// Same set via the `commit_blobs` relation, which is known to miss the
    /// first file of every tree. Kept for callers that need the relation's
    /// view; prefer [`Commit::blob_shas`].
    pub fn blob_shas_rel(&self) -> Result<Vec<Sha>, OscarError> {
        warn!(
            commit = %self.sha,
            "blob_shas_rel reads the incomplete commit_blobs relation; use blob_shas"
        );
        self.store.sha_list("commit_blobs", self.sha.as_bytes())
    }

    /// `(timestamp, author)` from the `commit_time_author` relation.
    pub fn time_author(&self) -> Result<(Vec<u8>, Vec<u8>), OscarError> {
        self.store
            .time_author("commit_time_author", self.sha.as_bytes())
    }

    /// Root of this commit's history per the `commit_root` relation.
    pub fn root_sha(&self) -> Result<Sha, OscarError> {
        first_sha(self.store.sha_list("commit_root", self.sha.as_bytes())?, "commit_root")
    }

    /// Head this commit is reachable from per the `commit_head` relation.
    pub fn head_sha(&self) -> Result<Sha, OscarError> {
        first_sha(self.store.sha_list("commit_head", self.sha.as_bytes())?, "commit_head")
    }

    /// Ordered parents from the `commit_parent` relation (the header is the
    /// authoritative source; this one exists for sweeps that avoid payload
    /// decoding).
    pub fn parent_shas_rel(&self) -> Result<Vec<Sha>, OscarError> {
        self.store.sha_list("commit_parent", self.sha.as_bytes())
    }

    // ─── Diff ───────────────────────────────────────────────────

    /// Files changed between this commit and `parent`.
    ///
    /// Entries are `(old_path, new_path, old_sha, new_sha)`. With
    /// `threshold >= 1` additions and deletions are reported as-is;
    /// below that, deleted/added pairs whose contents are similar beyond
    /// `threshold` are folded into renames. Unchanged files never appear.
    pub fn diff(&self, parent: &Commit, threshold: f64) -> Result<Vec<DiffEntry>, OscarError> {
        if !self.parent_shas()?.contains(parent.sha()) {
            warn!(
                commit = %self.sha,
                other = %parent.sha(),
                "diffing against a commit that is not a declared parent"
            );
        }
        let new_tree = self.tree()?;
        let new_files = new_tree.files()?;
        let old_tree = parent.tree()?;
        let old_files = old_tree.files()?;

        let mut out = Vec::new();
        let mut added: Vec<(Vec<u8>, Sha)> = Vec::new();
        for (name, sha) in new_files {
            match old_files.get(name) {
                Some(old) if old != sha => out.push(DiffEntry {
                    old_name: Some(name.clone()),
                    new_name: Some(name.clone()),
                    old_sha: Some(*old),
                    new_sha: Some(*sha),
                }),
                Some(_) => {}
                None => added.push((name.clone(), *sha)),
            }
        }
        let mut deleted: Vec<(Vec<u8>, Sha)> = old_files
            .iter()
            .filter(|(name, _)| !new_files.contains_key(*name))
            .map(|(name, sha)| (name.clone(), *sha))
            .collect();

        if threshold >= 1.0 {
            for (name, sha) in added {
                out.push(DiffEntry::added(name, sha));
            }
            for (name, sha) in deleted {
                out.push(DiffEntry::deleted(name, sha));
            }
            return Ok(out);
        }

        for (name, sha) in added {
            let content = self.blob_content(&sha)?;
            let mut matched = None;
            if let Some(content) = &content {
                for (i, (_, old_sha)) in deleted.iter().enumerate() {
                    let Some(candidate) = self.blob_content(old_sha)? else {
                        continue;
                    };
                    if similar(content, &candidate, threshold) {
                        matched = Some(i);
                        break;
                    }
                }
            }
            match matched {
                Some(i) => {
                    let (old_name, old_sha) = deleted.remove(i);
                    out.push(DiffEntry {
                        old_name: Some(old_name),
                        new_name: Some(name),
                        old_sha: Some(old_sha),
                        new_sha: Some(sha),
                    });
                }
                None => out.push(DiffEntry::added(name, sha)),
            }
        }
        for (name, sha) in deleted {
            out.push(DiffEntry::deleted(name, sha));
        }
        Ok(out)
    }

    /// Blob content for similarity checks; an unreachable blob just fails
    /// the match instead of failing the diff.
    fn blob_content(&self, sha: &Sha) -> Result<Option<Vec<u8>>, OscarError> {
        match self.store.blob_data(sha) {
            Ok(data) => Ok(Some(data)),
            Err(OscarError::ObjectNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn first_sha(list: Vec<Sha>, rel: &'static str) -> Result<Sha, OscarError> {
    list.into_iter()
        .next()
        .ok_or_else(|| OscarError::CorruptFrame(format!("{rel} value is empty")))
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Commit {}

impl Hash for Commit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(b"commit");
        state.write(self.sha.as_bytes());
    }
}

impl fmt::Debug for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commit({})", self.sha)
    }
}

// ─── Diff entries and similarity ────────────────────────────────────

/// One changed file: rename pairs carry both names, pure additions and
/// deletions leave the other side `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub old_name: Option<Vec<u8>>,
    pub new_name: Option<Vec<u8>>,
    pub old_sha: Option<Sha>,
    pub new_sha: Option<Sha>,
}

impl DiffEntry {
    fn added(name: Vec<u8>, sha: Sha) -> DiffEntry {
        DiffEntry {
            old_name: None,
            new_name: Some(name),
            old_sha: None,
            new_sha: Some(sha),
        }
    }

    fn deleted(name: Vec<u8>, sha: Sha) -> DiffEntry {
        DiffEntry {
            old_name: Some(name),
            new_name: None,
            old_sha: Some(sha),
            new_sha: None,
        }
    }
}

/// Similarity gate for rename detection: a cheap length bound, then a
/// bigram-multiset ratio, then the full LCS ratio. Each stage must clear
/// `threshold` before the next (more expensive) one runs.
fn similar(a: &[u8], b: &[u8], threshold: f64) -> bool {
    let total = (a.len() + b.len()) as f64;
    if total == 0.0 {
        return true;
    }
    if 2.0 * a.len().min(b.len()) as f64 / total <= threshold {
        return false;
    }
    if bigram_ratio(a, b) <= threshold {
        return false;
    }
    2.0 * lcs_len(a, b) as f64 / total > threshold
}

fn bigram_ratio(a: &[u8], b: &[u8]) -> f64 {
    let pairs = |s: &[u8]| {
        let mut counts: HashMap<[u8; 2], u64> = HashMap::new();
        for w in s.windows(2) {
            *counts.entry([w[0], w[1]]).or_default() += 1;
        }
        counts
    };
    let ca = pairs(a);
    let cb = pairs(b);
    let na: u64 = ca.values().sum();
    let nb: u64 = cb.values().sum();
    if na + nb == 0 {
        // Inputs too short for bigrams; let the full ratio decide.
        return 1.0;
    }
    let common: u64 = ca
        .iter()
        .map(|(pair, n)| n.min(cb.get(pair).unwrap_or(&0)))
        .sum();
    2.0 * common as f64 / (na + nb) as f64
}

/// Longest common subsequence length, two-row DP.
fn lcs_len(a: &[u8], b: &[u8]) -> usize {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];
    for &lb in long {
        for (j, &sb) in short.iter().enumerate() {
            curr[j + 1] = if lb == sb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}
