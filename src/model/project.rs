//! Project entity: commit membership, head/tail detection, URL synthesis.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::error::OscarError;

use super::{Commit, IGNORED_AUTHORS, Sha, Store};

/// Forge prefixes recognized in project keys. Everything else is assumed to
/// live on GitHub.
const URL_PREFIXES: &[(&str, &str)] = &[
    ("android.googlesource.com", "android.googlesource.com"),
    ("bioconductor.org", "git.bioconductor.org"),
    ("bitbucket.org", "bitbucket.org"),
    ("drupal.com", "git.drupal.org"),
    ("git.eclipse.org", "git.eclipse.org"),
    ("git.kernel.org", "git.kernel.org"),
    ("git.postgresql.org", "git.postgresql.org"),
    ("git.savannah.gnu.org", "git.savannah.gnu.org"),
    ("git.zx2c4.com", "git.zx2c4.com"),
    ("gitlab.com", "gitlab.com"),
    ("gitlab.gnome.org", "gitlab.gnome.org"),
    ("kde.org", "anongit.kde.org"),
    ("repo.or.cz", "repo.or.cz"),
    ("salsa.debian.org", "salsa.debian.org"),
    ("sourceforge.net", "git.code.sf.net/p"),
];

pub struct Project {
    store: Arc<Store>,
    name: Vec<u8>,
    commits: OnceCell<Vec<Commit>>,
}

impl Project {
    pub(crate) fn new(store: Arc<Store>, name: Vec<u8>) -> Project {
        Project {
            store,
            name,
            commits: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Raw relation value: every commit SHA recorded for the project,
    /// including unretrievable ones and ignored authors.
    pub fn commit_shas(&self) -> Result<Vec<Sha>, OscarError> {
        self.store.sha_list("project_commits", &self.name)
    }

    pub fn author_names(&self) -> Result<Vec<Vec<u8>>, OscarError> {
        self.store.name_list("project_authors", &self.name)
    }

    /// Retrievable commits by non-ignored authors, with authored dates
    /// sanitized: nothing can predate the oldest tail, so earlier dates are
    /// voided. Runs once and is memoized.
    pub fn commits(&self) -> Result<&[Commit], OscarError> {
        super::memo(&self.commits, || {
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
            sanitize_dates(&commits)?;
            Ok(commits)
        })
        .map(Vec::as_slice)
    }

    /// The parentless root that some commit's first-parent chain reaches.
    pub fn tail(&self) -> Result<Option<&Commit>, OscarError> {
        let commits = self.commits()?;
        let first_parents = first_parent_set(commits)?;
        for commit in commits {
            if commit.parent_shas()?.is_empty() && first_parents.contains(commit.sha()) {
                return Ok(Some(commit));
            }
        }
        Ok(None)
    }

    /// The childless commit with the latest authored date. Parentless-root
    /// reasoning is used instead of "newest commit" because commit dates in
    /// the wild are frequently wrong.
    pub fn head(&self) -> Result<Option<&Commit>, OscarError> {
        let commits = self.commits()?;
        let mut parents: HashSet<Sha> = HashSet::new();
        for commit in commits {
            parents.extend(commit.parent_shas()?);
        }
        let mut best: Option<(&Commit, i64)> = None;
        for commit in commits {
            if parents.contains(commit.sha()) {
                continue;
            }
            let at = date_or_epoch(commit.authored_at()?);
            // Strict comparison keeps the first of equally-dated heads.
            if best.is_none_or(|(_, seen)| at > seen) {
                best = Some((commit, at));
            }
        }
        Ok(best.map(|(commit, _)| commit))
    }

    /// First-parent chain: from the commit with the latest authored date,
    /// follow parent 0 until a root or an unretrievable hop.
    pub fn commits_fp(&self) -> Result<Vec<Commit>, OscarError> {
        let commits = self.commits()?;
        let mut best: Option<(&Commit, i64)> = None;
        for commit in commits {
            let at = date_or_epoch(commit.authored_at()?);
            if best.is_none_or(|(_, seen)| at > seen) {
                best = Some((commit, at));
            }
        }
        let Some((start, _)) = best else {
            return Ok(Vec::new());
        };

        let mut chain = Vec::new();
        let mut current = Commit::new(Arc::clone(&self.store), *start.sha());
        loop {
            let next = match current.parent_shas() {
                Ok(parents) => parents.first().copied(),
                Err(OscarError::ObjectNotFound { .. }) => break,
                Err(e) => return Err(e),
            };
            chain.push(current);
            match next {
                Some(sha) => current = Commit::new(Arc::clone(&self.store), sha),
                None => break,
            }
        }
        Ok(chain)
    }

    /// Clone URL synthesized from the key.
    pub fn url(&self) -> String {
        let key = String::from_utf8_lossy(&self.name);
        let platform_for = |prefix: &str| {
            URL_PREFIXES
                .iter()
                .find(|(k, _)| *k == prefix)
                .map(|(_, v)| *v)
        };
        match key.split_once('_') {
            Some(("sourceforge.net", body)) => {
                format!("https://{}/{}", platform_for("sourceforge.net").unwrap_or("github.com"), body)
            }
            Some((prefix, body)) => match platform_for(prefix) {
                Some(platform) if body.contains('_') => {
                    format!("https://{}/{}", platform, body.replacen('_', "/", 1))
                }
                _ => format!("https://github.com/{}", key.replacen('_', "/", 1)),
            },
            None => format!("https://github.com/{key}"),
        }
    }
}

/// Authored-date sanitation: nothing can be older than the oldest tail, so
/// any earlier date is wrong and gets voided in memory.
fn sanitize_dates(commits: &[Commit]) -> Result<(), OscarError> {
    let first_parents = first_parent_set(commits)?;
    let mut floor: Option<DateTime<FixedOffset>> = None;
    for commit in commits {
        if !commit.parent_shas()?.is_empty() || !first_parents.contains(commit.sha()) {
            continue;
        }
        if let Some(at) = commit.authored_at()? {
            floor = Some(match floor {
                Some(seen) if seen <= at => seen,
                _ => at,
            });
        }
    }
    // No tail with a valid date leaves the epoch as floor, voiding nothing.
    let Some(floor) = floor else {
        return Ok(());
    };
    for commit in commits {
        if let Some(at) = commit.authored_at()? {
            if at < floor {
                commit.override_authored_at(None);
            }
        }
    }
    Ok(())
}

fn first_parent_set(commits: &[Commit]) -> Result<HashSet<Sha>, OscarError> {
    let mut set = HashSet::new();
    for commit in commits {
        if let Some(first) = commit.parent_shas()?.first() {
            set.insert(*first);
        }
    }
    Ok(set)
}

fn date_or_epoch(at: Option<DateTime<FixedOffset>>) -> i64 {
    at.map(|dt| dt.timestamp()).unwrap_or(0)
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Project {}

impl Hash for Project {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(b"project");
        state.write(&self.name);
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Project({})", String::from_utf8_lossy(&self.name))
    }
}
