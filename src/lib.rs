//! # oscar — World of Code dataset navigation
//!
//! Read-only, random-access lookups over the World of Code mirror of public
//! Git history: hundreds of Tokyo Cabinet shards plus packed blob archives,
//! exposed as typed entities (Commit, Tree, Blob, Tag, Project, File,
//! Author) with lazily-loaded, per-instance-memoized attributes.
//!
//! ```no_run
//! use oscar::Oscar;
//!
//! # fn main() -> Result<(), oscar::OscarError> {
//! let woc = Oscar::new()?;
//! let commit = woc.commit("e38126dbca6572912013621d2aa9e6f7c50f36bc")?;
//! for parent in commit.parent_shas()? {
//!     println!("{parent}");
//! }
//! for sha in woc.project("user2589_minicms").commit_shas()? {
//!     println!("{sha}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The crate never writes, never caches decoded objects beyond the instance
//! at hand, and trusts the dataset: a missing or corrupt shard surfaces as
//! a lookup failure on the keys living in that shard only.

pub mod codec;
pub mod dates;
mod error;
pub mod model;
pub mod objects;
pub mod pack;
pub mod paths;
pub mod settings;
pub mod tch;

pub use error::OscarError;
pub use model::{
    Author, Blob, Commit, DiffEntry, File, IGNORED_AUTHORS, Oscar, Project, RelationKeys, Sha,
    Tag, Tree,
};
pub use settings::Settings;
