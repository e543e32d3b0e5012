//! Core data model for the tracking engine.
//!
//! These types are shared between the tracking controller, the
//! significant-change monitor and the persistence layer. The persisted
//! representations use camelCase field names so snapshots stay readable
//! to the app layer that consumes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Samples and History Records
// ============================================================================

/// A single raw position fix, produced by either event source.
///
/// Immutable once created; the controller only ever appends samples to a
/// buffer, never edits them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationSample {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
        }
    }
}

/// One entry in the significant-change log.
///
/// Appended at the head of the log (most recent first) and never mutated
/// afterwards; the log is only emptied via bulk clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignificantChangeEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl SignificantChangeEntry {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            latitude,
            longitude,
        }
    }
}

/// A finalized tracking session.
///
/// Created atomically when active tracking stops with a non-empty buffer.
/// The sample sequence is chronological and never reordered; only the two
/// place-name fields may transition from absent to present, set once by
/// the asynchronous enrichment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub locations: Vec<LocationSample>,
    #[serde(default)]
    pub start_location_name: Option<String>,
    #[serde(default)]
    pub end_location_name: Option<String>,
}

impl Trip {
    /// Create a trip from a finished sample buffer.
    pub fn new(date: DateTime<Utc>, locations: Vec<LocationSample>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            locations,
            start_location_name: None,
            end_location_name: None,
        }
    }

    /// First sample of the path, if any.
    pub fn start_sample(&self) -> Option<&LocationSample> {
        self.locations.first()
    }

    /// Last sample of the path, if any.
    pub fn end_sample(&self) -> Option<&LocationSample> {
        self.locations.last()
    }
}

// ============================================================================
// Geocode Cache Keys
// ============================================================================

/// Rounding precision for geocode cache keys: 1e-4 degrees (~11m).
const COORD_KEY_SCALE: f64 = 1e4;

/// A coordinate rounded to fixed precision for geocode memoization.
///
/// Two coordinates map to the same key only if their scaled integer
/// components are identical; there is no fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey {
    pub lat_e4: i64,
    pub lng_e4: i64,
}

impl CoordKey {
    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_e4: (latitude * COORD_KEY_SCALE).round() as i64,
            lng_e4: (longitude * COORD_KEY_SCALE).round() as i64,
        }
    }

    /// The rounded coordinate this key represents, for issuing lookups.
    pub fn to_degrees(self) -> (f64, f64) {
        (
            self.lat_e4 as f64 / COORD_KEY_SCALE,
            self.lng_e4 as f64 / COORD_KEY_SCALE,
        )
    }
}

// ============================================================================
// Monitor States
// ============================================================================

/// Platform authorization level for location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationState {
    NotDetermined,
    WhenInUse,
    Always,
    Denied,
    Restricted,
    Unknown,
}

impl AuthorizationState {
    /// Whether this level permits significant-change monitoring.
    pub fn allows_monitoring(self) -> bool {
        matches!(self, AuthorizationState::Always | AuthorizationState::WhenInUse)
    }

    /// Human-readable label used in the monitor's diagnostic status.
    pub fn label(self) -> &'static str {
        match self {
            AuthorizationState::NotDetermined => "not determined",
            AuthorizationState::WhenInUse => "when in use",
            AuthorizationState::Always => "always",
            AuthorizationState::Denied => "denied",
            AuthorizationState::Restricted => "restricted",
            AuthorizationState::Unknown => "unknown",
        }
    }
}

/// Whether the monitor is subscribed to the low-power event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringState {
    Stopped,
    Monitoring,
}
