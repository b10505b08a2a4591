//! Advertisement matching.
//!
//! Decides whether a raw [`DiscoveryEvent`] corresponds to a known beacon.
//! This is a heuristic over advertised names and ids, not iBeacon payload
//! decoding: an event matches a beacon when its device name or device id
//! contains the beacon identifier, or when its device name carries the
//! bench test marker. Comparison is case-sensitive and registry order is
//! priority order (first match wins).

use crate::radio::DiscoveryEvent;
use crate::registry::BeaconRegistry;
use crate::types::Beacon;

/// Marker token advertised by simulated/bench beacons.
pub const DEFAULT_TEST_MARKER: &str = "TEST_BEACON";

/// Pure matcher from discovery events to registry entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    test_marker: Option<String>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(Some(DEFAULT_TEST_MARKER.to_string()))
    }
}

impl Matcher {
    /// Create a matcher. An empty or absent marker disables marker matching.
    pub fn new(test_marker: Option<String>) -> Self {
        Self {
            test_marker: test_marker.filter(|m| !m.is_empty()),
        }
    }

    /// The active test marker, if any.
    pub fn test_marker(&self) -> Option<&str> {
        self.test_marker.as_deref()
    }

    /// Return the first registry entry `event` matches.
    pub fn match_event<'r>(
        &self,
        event: &DiscoveryEvent,
        registry: &'r BeaconRegistry,
    ) -> Option<&'r Beacon> {
        let name = event.device_name.as_deref().unwrap_or_default();
        let carries_marker = self
            .test_marker
            .as_deref()
            .is_some_and(|marker| name.contains(marker));

        registry.iter().find(|beacon| {
            let id = beacon.identifier.as_str();
            // An empty identifier would match every device.
            if id.is_empty() {
                return false;
            }
            name.contains(id) || event.device_id.contains(id) || carries_marker
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BeaconRegistry {
        BeaconRegistry::new(vec![
            Beacon::new("TEST_BEACON_UUID", "Choir Room A"),
            Beacon::new("HALL_B", "Hall B"),
        ])
    }

    fn named(name: &str) -> DiscoveryEvent {
        DiscoveryEvent::new("AA:BB:CC:DD:EE:FF", Some(name.to_string()))
    }

    #[test]
    fn test_name_contains_identifier() {
        let reg = registry();
        let m = Matcher::new(None);
        let beacon = m.match_event(&named("TEST_BEACON_UUID-7F3"), &reg).unwrap();
        assert_eq!(beacon.label, "Choir Room A");

        let beacon = m.match_event(&named("prefix-HALL_B"), &reg).unwrap();
        assert_eq!(beacon.identifier, "HALL_B");
    }

    #[test]
    fn test_device_id_contains_identifier() {
        let reg = registry();
        let event = DiscoveryEvent::new("dev-HALL_B-01", None);
        let beacon = Matcher::new(None).match_event(&event, &reg).unwrap();
        assert_eq!(beacon.identifier, "HALL_B");
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let reg = registry();
        assert!(Matcher::new(None).match_event(&named("hall_b"), &reg).is_none());
    }

    #[test]
    fn test_unrelated_device_does_not_match() {
        let reg = registry();
        let event = DiscoveryEvent::new("11:22:33:44:55:66", Some("Headphones".into()));
        assert!(Matcher::default().match_event(&event, &reg).is_none());

        let nameless = DiscoveryEvent::new("11:22:33:44:55:66", None);
        assert!(Matcher::default().match_event(&nameless, &reg).is_none());
    }

    #[test]
    fn test_marker_matches_first_entry() {
        let reg = BeaconRegistry::new(vec![
            Beacon::new("HALL_A", "Hall A"),
            Beacon::new("HALL_B", "Hall B"),
        ]);
        let beacon = Matcher::default()
            .match_event(&named("bench TEST_BEACON 3"), &reg)
            .unwrap();
        assert_eq!(beacon.identifier, "HALL_A");

        assert!(Matcher::new(None)
            .match_event(&named("bench TEST_BEACON 3"), &reg)
            .is_none());
        assert!(Matcher::new(Some(String::new())).test_marker().is_none());
    }

    #[test]
    fn test_first_registry_entry_wins() {
        let reg = BeaconRegistry::new(vec![
            Beacon::new("ROOM", "Generic room"),
            Beacon::new("ROOM_12", "Room 12"),
        ]);
        let beacon = Matcher::new(None).match_event(&named("ROOM_12"), &reg).unwrap();
        assert_eq!(beacon.label, "Generic room");
    }

    #[test]
    fn test_empty_identifier_never_matches() {
        let reg = BeaconRegistry::new(vec![Beacon::new("", "Broken")]);
        assert!(Matcher::new(None).match_event(&named("anything"), &reg).is_none());
    }

    #[test]
    fn test_matching_is_pure() {
        let reg = registry();
        let m = Matcher::default();
        let event = named("TEST_BEACON_UUID-7F3");
        assert_eq!(m.match_event(&event, &reg), m.match_event(&event, &reg));
    }
}
