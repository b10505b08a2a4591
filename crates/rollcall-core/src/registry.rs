//! The ordered list of known beacons.
//!
//! Order matters: the matcher walks entries front to back and the first
//! match wins, so earlier entries take priority.

use std::collections::HashSet;

use crate::types::Beacon;

/// Immutable, ordered registry of known beacons.
#[derive(Debug, Clone, Default)]
pub struct BeaconRegistry {
    beacons: Vec<Beacon>,
}

impl BeaconRegistry {
    /// Build a registry from an ordered list of beacons.
    ///
    /// Validation (unique, non-empty identifiers) happens at the
    /// configuration layer; see [`crate::config::RollcallConfig::validate`].
    pub fn new(beacons: Vec<Beacon>) -> Self {
        Self { beacons }
    }

    /// Look up a beacon by its exact identifier.
    pub fn get(&self, identifier: &str) -> Option<&Beacon> {
        self.beacons.iter().find(|b| b.identifier == identifier)
    }

    /// The first (highest-priority) beacon, if any.
    pub fn first(&self) -> Option<&Beacon> {
        self.beacons.first()
    }

    /// Iterate beacons in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Beacon> {
        self.beacons.iter()
    }

    /// Number of registered beacons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    /// Identifiers that appear more than once, in first-seen order.
    pub fn duplicate_identifiers(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut dupes = Vec::new();
        for beacon in &self.beacons {
            let id = beacon.identifier.as_str();
            if !seen.insert(id) && !dupes.contains(&id) {
                dupes.push(id);
            }
        }
        dupes
    }
}

impl From<Vec<Beacon>> for BeaconRegistry {
    fn from(beacons: Vec<Beacon>) -> Self {
        Self::new(beacons)
    }
}
