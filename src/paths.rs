//! Path resolution: from a (relation, key) pair to a concrete shard file.
//!
//! Every relation the dataset ships is declared once in [`RELATIONS`] as a
//! category plus a filename template with `{ver}` and `{key}` holes.
//! [`PathTable::build`] fills the holes from the environment and from what is
//! actually on disk; after that, resolution is a pure function of the key.
//!
//! Version suffixes change between dataset releases (`R`, `S`, ...) and the
//! shard fan-out differs per relation, so both are discovered by listing the
//! prefix directory rather than hardcoded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::codec::fnv1a;
use crate::settings::Settings;

// ─── Relation declarations ──────────────────────────────────────────

/// Directory family a relation lives in. Each has one env override and a
/// default prefix on the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    AllBlobs,
    AllSha1c,
    AllSha1o,
    Basemaps,
}

impl Category {
    pub fn env_name(self) -> &'static str {
        match self {
            Category::AllBlobs => "OSCAR_ALL_BLOBS",
            Category::AllSha1c => "OSCAR_ALL_SHA1C",
            Category::AllSha1o => "OSCAR_ALL_SHA1O",
            Category::Basemaps => "OSCAR_BASEMAPS",
        }
    }

    fn default_prefix(self) -> &'static str {
        match self {
            Category::AllBlobs => "/da4_data/All.blobs",
            Category::AllSha1c => "/fast/All.sha1c",
            Category::AllSha1o => "/fast/All.sha1o",
            Category::Basemaps => "/da4_data/basemaps",
        }
    }
}

/// How a key picks its shard: first byte of a raw SHA-1, or FNV-1a of the
/// key bytes for textual keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Sha,
    Text,
}

/// How a relation's value decodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// LZF-framed raw Git object (`commit_random`, `tree_random`)
    GitObject,
    /// BER `(offset, length)` pair into the blob archive
    BerPair,
    /// The `.bin` archive itself; looked up by offset, not by key
    BlobArchive,
    /// Concatenated 20-byte SHA-1s
    ShaList,
    /// LZF-compressed `;`-delimited names, `EMPTY` sentinel dropped
    NameList,
    /// LZF-compressed `time;author` string
    TimeAuthor,
}

/// One declared relation.
#[derive(Debug)]
pub struct Relation {
    pub name: &'static str,
    pub category: Category,
    /// Filename template under the category prefix.
    pub template: &'static str,
    pub key_kind: KeyKind,
    pub value_kind: ValueKind,
    /// Whether the relation's shards double as a key registry. Unset means
    /// whole-relation key iteration yields nothing instead of erroring.
    pub keys_registered: bool,
}

pub const RELATIONS: &[Relation] = &[
    Relation { name: "commit_random", category: Category::AllSha1c, template: "commit_{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::GitObject, keys_registered: true },
    Relation { name: "tree_random", category: Category::AllSha1c, template: "tree_{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::GitObject, keys_registered: true },
    Relation { name: "blob_offset", category: Category::AllSha1o, template: "sha1.blob_{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::BerPair, keys_registered: true },
    Relation { name: "blob_data", category: Category::AllBlobs, template: "blob_{key}.bin", key_kind: KeyKind::Sha, value_kind: ValueKind::BlobArchive, keys_registered: false },
    Relation { name: "commit_projects", category: Category::Basemaps, template: "c2pFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::NameList, keys_registered: true },
    Relation { name: "commit_children", category: Category::Basemaps, template: "c2ccFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "commit_time_author", category: Category::Basemaps, template: "c2taFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::TimeAuthor, keys_registered: true },
    Relation { name: "commit_root", category: Category::Basemaps, template: "c2rFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "commit_head", category: Category::Basemaps, template: "c2hFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "commit_parent", category: Category::Basemaps, template: "c2pcFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "commit_blobs", category: Category::Basemaps, template: "c2bFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "commit_files", category: Category::Basemaps, template: "c2fFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::NameList, keys_registered: true },
    Relation { name: "author_commits", category: Category::Basemaps, template: "a2cFull{ver}.{key}.tch", key_kind: KeyKind::Text, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "author_projects", category: Category::Basemaps, template: "a2pFull{ver}.{key}.tch", key_kind: KeyKind::Text, value_kind: ValueKind::NameList, keys_registered: true },
    Relation { name: "author_files", category: Category::Basemaps, template: "a2fFull{ver}.{key}.tch", key_kind: KeyKind::Text, value_kind: ValueKind::NameList, keys_registered: true },
    Relation { name: "project_authors", category: Category::Basemaps, template: "p2aFull{ver}.{key}.tch", key_kind: KeyKind::Text, value_kind: ValueKind::NameList, keys_registered: true },
    Relation { name: "project_commits", category: Category::Basemaps, template: "p2cFull{ver}.{key}.tch", key_kind: KeyKind::Text, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "blob_commits", category: Category::Basemaps, template: "b2cFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "blob_author", category: Category::Basemaps, template: "b2faFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::TimeAuthor, keys_registered: true },
    Relation { name: "blob_files", category: Category::Basemaps, template: "b2fFull{ver}.{key}.tch", key_kind: KeyKind::Sha, value_kind: ValueKind::NameList, keys_registered: true },
    Relation { name: "file_authors", category: Category::Basemaps, template: "f2aFull{ver}.{key}.tch", key_kind: KeyKind::Text, value_kind: ValueKind::NameList, keys_registered: true },
    Relation { name: "file_commits", category: Category::Basemaps, template: "f2cFull{ver}.{key}.tch", key_kind: KeyKind::Text, value_kind: ValueKind::ShaList, keys_registered: true },
    Relation { name: "file_blobs", category: Category::Basemaps, template: "f2bFull{ver}.{key}.tch", key_kind: KeyKind::Text, value_kind: ValueKind::ShaList, keys_registered: true },
];

// ─── Resolution ─────────────────────────────────────────────────────

/// A relation with its holes filled: absolute path template (only `{key}`
/// left) plus the discovered shard-index bit width.
#[derive(Debug)]
pub struct ResolvedRelation {
    pub relation: &'static Relation,
    template: String,
    pub bit_width: u32,
}

impl ResolvedRelation {
    /// Low-bits mask over the key hash.
    pub fn shard_index(&self, key: &[u8]) -> u32 {
        let mask = (1u32 << self.bit_width) - 1;
        match self.relation.key_kind {
            KeyKind::Sha => u32::from(key.first().copied().unwrap_or(0)) & mask,
            KeyKind::Text => fnv1a(key) & mask,
        }
    }

    /// Shard file the given key lives in.
    pub fn shard_path(&self, key: &[u8]) -> PathBuf {
        self.path_for_shard(self.shard_index(key))
    }

    pub fn shard_count(&self) -> u32 {
        1u32 << self.bit_width
    }

    pub fn path_for_shard(&self, index: u32) -> PathBuf {
        PathBuf::from(self.template.replace("{key}", &index.to_string()))
    }
}

/// The immutable relation → path mapping built at startup.
#[derive(Debug)]
pub struct PathTable {
    relations: HashMap<&'static str, ResolvedRelation>,
}

impl PathTable {
    /// Resolve every declared relation. Missing prefixes or empty
    /// directories register with zero key width (and a warning outside test
    /// mode); lookups against them fail per-shard later.
    pub fn build(settings: &Settings) -> PathTable {
        let relations = RELATIONS
            .iter()
            .map(|rel| (rel.name, resolve_relation(rel, settings)))
            .collect();
        PathTable { relations }
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedRelation> {
        self.relations.get(name)
    }

    /// Lookup by one of the [`RELATIONS`] constants.
    pub(crate) fn must(&self, name: &'static str) -> &ResolvedRelation {
        self.relations
            .get(name)
            .expect("every declared relation is registered at build time")
    }
}

fn resolve_relation(rel: &'static Relation, settings: &Settings) -> ResolvedRelation {
    let env_name = rel.category.env_name();
    let mut prefix = settings
        .var(env_name)
        .unwrap_or(rel.category.default_prefix())
        .to_string();

    // A prefix addressing this host's own export is served from the local
    // mount instead of going through the network path.
    let local = format!("/{}_data", settings.host());
    if let Some(rest) = prefix.strip_prefix(&local) {
        prefix = format!("/data{rest}");
    }

    let mut version = settings
        .var(&format!("{env_name}_VER"))
        .map(str::to_string);

    let rel_env = format!("OSCAR_{}", rel.name.to_uppercase());
    let mut file_template = match settings.var(&rel_env) {
        Some(path) => path.to_string(),
        None => format!("{prefix}/{}", rel.template),
    };
    if let Some(v) = settings.var(&format!("{rel_env}_VER")) {
        version = Some(v.to_string());
    }

    if file_template.contains("{ver}") {
        let version =
            version.unwrap_or_else(|| detect_version(&file_template).unwrap_or_default());
        file_template = file_template.replace("{ver}", &version);
    }

    let bit_width = match detect_max_key(&file_template) {
        Some(max_key) => bit_width_for(max_key),
        None => {
            if !settings.test_mode() {
                warn!(
                    relation = rel.name,
                    template = %file_template,
                    "no shard files found, registering with zero key width"
                );
            }
            0
        }
    };

    ResolvedRelation {
        relation: rel,
        template: file_template,
        bit_width,
    }
}

/// `ceil(log2(max_key + 1))`: the number of index bits the on-disk fan-out
/// actually uses.
fn bit_width_for(max_key: u64) -> u32 {
    let shards = max_key + 1;
    if shards <= 1 {
        0
    } else {
        64 - (shards - 1).leading_zeros()
    }
}

/// Latest on-disk version: list the prefix for `<filename ver=* key=0>`,
/// strip the literal pre/postfix, pick the longest match with ties broken
/// by lexical order (so `S` beats both `R` and the empty string).
fn detect_version(file_template: &str) -> Option<String> {
    let probe = file_template.replace("{key}", "0");
    hole_matches(&probe, "{ver}")?
        .into_iter()
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
}

/// Largest shard number present for `<filename key=*>`.
fn detect_max_key(file_template: &str) -> Option<u64> {
    hole_matches(file_template, "{key}")?
        .into_iter()
        .filter_map(|s| s.parse::<u64>().ok())
        .max()
}

/// List the directory of `template` and return, for every entry matching
/// the literal text around `hole`, the substring the hole stands for.
fn hole_matches(template: &str, hole: &str) -> Option<Vec<String>> {
    let path = Path::new(template);
    let dir = path.parent()?;
    let file = path.file_name()?.to_str()?;
    let (pre, post) = file.split_once(hole)?;
    let entries = std::fs::read_dir(dir).ok()?;
    let matches: Vec<String> = entries
        .flatten()
        .filter_map(|e| e.file_name().into_string().ok())
        .filter_map(|name| {
            name.strip_prefix(pre)
                .and_then(|rest| rest.strip_suffix(post))
                .map(str::to_string)
        })
        .collect();
    if matches.is_empty() { None } else { Some(matches) }
}


// ─── Property-based tests (proptest) ─────────────────────────────────
