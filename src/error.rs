//! Unified error type for dataset lookups.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur while navigating the dataset.
#[derive(Error, Debug)]
pub enum OscarError {
    /// I/O error (file open, positional read, directory scan)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entity key was syntactically invalid at construction time
    #[error("invalid {kind} key '{value}': {reason}")]
    Construction {
        kind: &'static str,
        value: String,
        reason: String,
    },

    /// Key absent from its shard, or a blob offset points outside the archive
    #[error("object not found: {key} ({relation})")]
    ObjectNotFound {
        relation: &'static str,
        key: String,
    },

    /// Malformed LZF header, truncated tree record, or invalid commit header
    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    /// A shard file cannot be opened or iterated
    #[error("shard unavailable: {}: {message}", path.display())]
    ShardUnavailable { path: PathBuf, message: String },

    /// Host gating failed at initialization
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl OscarError {
    /// Shorthand used wherever a key misses in a relation shard.
    /// Raw SHA keys render as hex, textual keys as-is.
    pub(crate) fn not_found(relation: &'static str, key: impl AsRef<[u8]>) -> Self {
        let key = key.as_ref();
        let printable = if key.len() == 20 && key.iter().any(|b| !b.is_ascii_graphic()) {
            hex::encode(key)
        } else {
            String::from_utf8_lossy(key).into_owned()
        };
        OscarError::ObjectNotFound {
            relation,
            key: printable,
        }
    }
}
