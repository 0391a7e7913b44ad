//! Git object decoding: commit headers, tree records, canonical identity.
//!
//! Operates on raw object payloads (after LZF decompression), without the
//! `"<type> <size>\0"` envelope loose objects carry on disk.

use chrono::{DateTime, FixedOffset};
use sha1::{Digest, Sha1};

use crate::dates::parse_timestamp;
use crate::error::OscarError;

/// Tree entry mode marking a directory.
pub const DIR_MODE: &[u8] = b"40000";

const SIG_END: &[u8] = b"-----END PGP SIGNATURE-----";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

/// Canonical SHA-1 of a Git object: `sha1("<type> <len>\0<data>")`.
pub fn object_sha(kind: ObjectKind, data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(data.len().to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(data);
    hasher.finalize().into()
}

// ─── Commits ────────────────────────────────────────────────────────

/// Every field a commit header carries, decoded in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommit {
    pub tree: [u8; 20],
    pub parents: Vec<[u8; 20]>,
    pub author: Vec<u8>,
    pub committer: Vec<u8>,
    pub authored_at: Option<DateTime<FixedOffset>>,
    pub committed_at: Option<DateTime<FixedOffset>>,
    pub message: Vec<u8>,
    pub full_message: Vec<u8>,
    pub signature: Option<Vec<u8>>,
    pub encoding: String,
}

enum HeaderState {
    Normal,
    ReadingSignature,
}

impl ParsedCommit {
    /// Parse a raw commit payload.
    ///
    /// Header order is documented but not relied upon; unknown keys and
    /// duplicate unexpected keys are ignored. Continuation lines (leading
    /// space) outside a signature block belong to mergetag objects and are
    /// skipped.
    pub fn parse(data: &[u8]) -> Result<ParsedCommit, OscarError> {
        let split = data
            .windows(2)
            .position(|w| w == b"\n\n")
            .ok_or_else(|| OscarError::CorruptFrame("commit has no header/body split".into()))?;
        let header = &data[..split];
        let full_message = &data[split + 2..];
        let message = full_message
            .split(|&b| b == b'\n')
            .next()
            .unwrap_or_default();

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = Vec::new();
        let mut committer = Vec::new();
        let mut authored_at = None;
        let mut committed_at = None;
        let mut signature: Option<Vec<u8>> = None;
        let mut encoding = "utf8".to_string();

        let mut state = HeaderState::Normal;
        for line in header.split(|&b| b == b'\n') {
            match state {
                HeaderState::ReadingSignature => {
                    let sig = signature.as_mut().expect("state implies buffer");
                    sig.push(b'\n');
                    sig.extend_from_slice(line);
                    if trim_start(line) == SIG_END {
                        state = HeaderState::Normal;
                    }
                }
                HeaderState::Normal => {
                    if line.is_empty() {
                        continue;
                    }
                    if line[0] == b' ' {
                        // mergetag body, not ours to decode
                        continue;
                    }
                    let (key, value) = match line.iter().position(|&b| b == b' ') {
                        Some(i) => (&line[..i], &line[i + 1..]),
                        None => (line, &line[line.len()..]),
                    };
                    match key {
                        b"tree" => tree = Some(hex_field("tree", value)?),
                        b"parent" => parents.push(hex_field("parent", value)?),
                        b"author" => {
                            let (name, at) = person_field(value);
                            author = name;
                            authored_at = at;
                        }
                        b"committer" => {
                            let (name, at) = person_field(value);
                            committer = name;
                            committed_at = at;
                        }
                        b"gpgsig" => {
                            signature = Some(value.to_vec());
                            if trim_start(value) != SIG_END {
                                state = HeaderState::ReadingSignature;
                            }
                        }
                        b"encoding" => {
                            encoding = String::from_utf8_lossy(value).into_owned();
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(ParsedCommit {
            tree: tree
                .ok_or_else(|| OscarError::CorruptFrame("commit header has no tree".into()))?,
            parents,
            author,
            committer,
            authored_at,
            committed_at,
            message: message.to_vec(),
            full_message: full_message.to_vec(),
            signature,
            encoding,
        })
    }
}

/// `Name <email> timestamp ±HHMM` → (name bytes, parsed instant). Fields
/// are taken from the right so names with spaces survive.
fn person_field(value: &[u8]) -> (Vec<u8>, Option<DateTime<FixedOffset>>) {
    let mut parts = value.rsplitn(3, |&b| b == b' ');
    let tz = parts.next().unwrap_or_default();
    let ts = parts.next().unwrap_or_default();
    match parts.next() {
        Some(name) => (name.to_vec(), parse_timestamp(ts, tz)),
        None => (value.to_vec(), None),
    }
}

fn hex_field(what: &'static str, value: &[u8]) -> Result<[u8; 20], OscarError> {
    let s = std::str::from_utf8(value)
        .map_err(|_| OscarError::CorruptFrame(format!("{what} field is not UTF-8")))?;
    crate::codec::sha20_from_hex(what, s)
        .map_err(|e| OscarError::CorruptFrame(format!("{what} field: {e}")))
}

fn trim_start(line: &[u8]) -> &[u8] {
    let skip = line.iter().take_while(|&&b| b == b' ').count();
    &line[skip..]
}

// ─── Trees ──────────────────────────────────────────────────────────

/// One `<mode> <name>\0<sha20>` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry<'a> {
    pub mode: &'a [u8],
    pub name: &'a [u8],
    pub sha: [u8; 20],
}

impl TreeEntry<'_> {
    pub fn is_dir(&self) -> bool {
        self.mode == DIR_MODE
    }
}

/// Cursor over the raw tree payload, yielding entries in on-disk order.
pub struct TreeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

pub fn tree_entries(data: &[u8]) -> TreeIter<'_> {
    TreeIter { data, pos: 0 }
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = Result<TreeEntry<'a>, OscarError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let Some(sp) = rest.iter().position(|&b| b == b' ') else {
            self.pos = self.data.len();
            return Some(Err(OscarError::CorruptFrame(
                "tree entry has no mode terminator".into(),
            )));
        };
        let Some(nul) = rest[sp + 1..].iter().position(|&b| b == 0) else {
            self.pos = self.data.len();
            return Some(Err(OscarError::CorruptFrame(
                "tree entry has no name terminator".into(),
            )));
        };
        let sha_at = sp + 1 + nul + 1;
        if rest.len() < sha_at + 20 {
            self.pos = self.data.len();
            return Some(Err(OscarError::CorruptFrame(
                "tree entry truncated before its SHA".into(),
            )));
        }
        let mut sha = [0u8; 20];
        sha.copy_from_slice(&rest[sha_at..sha_at + 20]);
        let entry = TreeEntry {
            mode: &rest[..sp],
            name: &rest[sp + 1..sp + 1 + nul],
            sha,
        };
        self.pos += sha_at + 20;
        Some(Ok(entry))
    }
}

/// Serialize entries back into tree-record bytes (the inverse of
/// [`tree_entries`]; fixtures only).
#[cfg(test)]
pub(crate) fn build_tree(entries: &[(&[u8], &[u8], [u8; 20])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (mode, name, sha) in entries {
        out.extend_from_slice(mode);
        out.push(b' ');
        out.extend_from_slice(name);
        out.push(0);
        out.extend_from_slice(sha);
    }
    out
}

/// Assemble a commit payload for fixtures.
#[cfg(test)]
pub(crate) fn build_commit(
    tree_hex: &str,
    parent_hexes: &[&str],
    author: &str,
    committer: &str,
    timestamp: &str,
    tz: &str,
    message: &str,
) -> Vec<u8> {
    let mut out = format!("tree {tree_hex}\n");
    for p in parent_hexes {
        out.push_str(&format!("parent {p}\n"));
    }
    out.push_str(&format!("author {author} {timestamp} {tz}\n"));
    out.push_str(&format!("committer {committer} {timestamp} {tz}\n"));
    out.push('\n');
    out.push_str(message);
    out.into_bytes()
}
