//! Host gating and the recognized environment surface.
//!
//! The dataset lives on a known cluster; shard paths baked into the relation
//! table only make sense there. Initialization therefore reads
//! `/etc/hostname` and refuses to run elsewhere unless `OSCAR_TEST` is set.
//!
//! All `OSCAR_*` variables are captured once into an owned [`Settings`]
//! value. Tests construct `Settings` directly with [`Settings::new`] instead
//! of mutating process environment.

use std::collections::HashMap;

use tracing::warn;

use crate::error::OscarError;

/// Domain suffix of the cluster the default shard prefixes point at.
const CLUSTER_DOMAIN: &str = "eecs.utk.edu";

/// Hosts the default prefixes are known to be mounted on.
const KNOWN_HOSTS: &[&str] = &["da4", "da5"];

/// Captured environment plus the gating result.
#[derive(Debug, Clone)]
pub struct Settings {
    host: String,
    vars: HashMap<String, String>,
}

impl Settings {
    /// Production path: read `/etc/hostname`, capture process environment.
    pub fn from_env() -> Result<Self, OscarError> {
        let hostname = std::fs::read_to_string("/etc/hostname").map_err(|e| {
            OscarError::UnsupportedPlatform(format!("cannot read /etc/hostname: {e}"))
        })?;
        let vars = std::env::vars()
            .filter(|(k, _)| k.starts_with("OSCAR_"))
            .collect();
        Self::new(hostname.trim(), vars)
    }

    /// Construct from explicit parts. This is the only seam tests use; it
    /// applies the same gating as [`Settings::from_env`].
    pub fn new(
        hostname: &str,
        vars: HashMap<String, String>,
    ) -> Result<Self, OscarError> {
        let (host, domain) = match hostname.split_once('.') {
            Some((h, d)) => (h.to_string(), d),
            None => (hostname.to_string(), ""),
        };
        let test_mode = vars.contains_key("OSCAR_TEST");
        if !test_mode && domain != CLUSTER_DOMAIN {
            return Err(OscarError::UnsupportedPlatform(format!(
                "host '{hostname}' is not on {CLUSTER_DOMAIN} and OSCAR_TEST is unset"
            )));
        }
        if !KNOWN_HOSTS.contains(&host.as_str()) {
            warn!(host = %host, "unrecognized host, default shard prefixes may not be mounted");
        }
        Ok(Settings { host, vars })
    }

    /// Short hostname (everything before the first `.`).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// `OSCAR_TEST` disables host checks and key-width warnings.
    pub fn test_mode(&self) -> bool {
        self.vars.contains_key("OSCAR_TEST")
    }

    /// A captured `OSCAR_*` variable.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) fn test_settings(vars: &[(&str, &str)]) -> Settings {
    let mut map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    map.entry("OSCAR_TEST".to_string())
        .or_insert_with(|| "1".to_string());
    Settings::new("test-host", map).unwrap()
}
