//! Configuration pool: pre-provisioned device profiles.
//!
//! Entries are keyed by a concrete UID or by a placeholder key (any key
//! containing [`PLACEHOLDER_MARKER`]). A placeholder is a template slot: the
//! first new device without its own entry claims it, and the entry moves to
//! that device's UID for good.

use std::collections::BTreeMap;

use gw_types::{NetConfig, PoolEntry, ProvisioningProfile, Uid};

/// Substring that marks a placeholder key.
pub const PLACEHOLDER_MARKER: &str = "NODE";

/// Pool of configured device profiles.
#[derive(Debug, Clone, Default)]
pub struct ConfigPool {
    /// Entries by UID or placeholder key.
    entries: BTreeMap<String, PoolEntry>,
    /// Placeholder key -> UID that claimed it.
    claims: BTreeMap<String, Uid>,
}

impl ConfigPool {
    /// Create a pool from its entries.
    pub fn new(entries: BTreeMap<String, PoolEntry>) -> Self {
        Self {
            entries,
            claims: BTreeMap::new(),
        }
    }

    /// Create a pool from the `Nodes` section of a network config.
    pub fn from_net_config(config: &NetConfig) -> Self {
        Self::new(config.nodes.clone())
    }

    /// Whether a key is a placeholder key.
    pub fn is_placeholder(key: &str) -> bool {
        key.contains(PLACEHOLDER_MARKER)
    }

    /// Entry keyed exactly by `uid`.
    pub fn get(&self, uid: &str) -> Option<&PoolEntry> {
        self.entries.get(uid)
    }

    /// Entry `uid` would receive if it were claimed now, without claiming.
    pub fn preview(&self, uid: &str) -> Option<&PoolEntry> {
        self.entries
            .get(uid)
            .or_else(|| self.first_placeholder().map(|(_, entry)| entry))
    }

    /// Bind an entry to `uid`.
    ///
    /// Returns the entry keyed by `uid` if one exists. Otherwise the first
    /// placeholder (in key order) is moved to `uid` and returned. Returns
    /// `None` if neither exists.
    pub fn claim(&mut self, uid: &Uid) -> Option<&PoolEntry> {
        if !self.entries.contains_key(uid.as_str()) {
            let key = self.first_placeholder().map(|(key, _)| key.clone())?;
            let entry = self.entries.remove(&key)?;
            self.entries.insert(uid.to_string(), entry);
            self.claims.insert(key, uid.clone());
        }
        self.entries.get(uid.as_str())
    }

    /// UID that claimed a placeholder key, if any.
    pub fn claimed_by(&self, placeholder: &str) -> Option<&Uid> {
        self.claims.get(placeholder)
    }

    /// Provisioning profile for `uid`.
    pub fn profile(&self, uid: &str) -> Option<&ProvisioningProfile> {
        self.get(uid)?.provisioning.as_ref()
    }

    /// Physical identifier for `uid`.
    pub fn physical_id(&self, uid: &str) -> Option<&str> {
        self.get(uid)?.physical_id()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of unclaimed placeholder entries.
    pub fn placeholders_remaining(&self) -> usize {
        self.entries
            .keys()
            .filter(|key| Self::is_placeholder(key))
            .count()
    }

    fn first_placeholder(&self) -> Option<(&String, &PoolEntry)> {
        self.entries
            .iter()
            .find(|(key, _)| Self::is_placeholder(key))
    }
}
