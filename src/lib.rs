//! # Waytrack
//!
//! Location-tracking coordination and trip persistence engine.
//!
//! Two independent monitoring regimes feed the engine: a low-power
//! significant-change source that can wake the system from a dormant
//! state, and a high-frequency position source that records a continuous
//! path while tracking is active. The engine reconciles them into a
//! durable trip history enriched with human-readable place names.
//!
//! ## Architecture
//!
//! - [`SignificantChangeMonitor`] — ingests low-power wake-ups: logs
//!   them, persists the log, fires a notification and force-starts
//!   active tracking.
//! - [`TrackingController`] — owns the Idle/Active state machine and the
//!   sample buffer; on stop it finalizes a [`Trip`], persists it and
//!   enriches it asynchronously with start/end place names.
//! - [`GeocodeCache`] — memoizing wrapper around an external
//!   reverse-geocoding capability, keyed by fixed-precision coordinates.
//! - [`HistoryStore`] — whole-snapshot persistence of the two history
//!   collections over a durable key/value [`RecordStore`].
//!
//! All platform collaborators (sensor sources, notifier, geocoding
//! provider, record store) sit behind the traits in [`sources`] and
//! [`store`]; components are constructed and wired explicitly at
//! startup, there are no process-wide singletons.

pub mod controller;
pub mod error;
pub mod geocode;
pub mod http;
pub mod monitor;
pub mod sources;
pub mod store;
pub mod types;

pub use controller::TrackingController;
pub use error::{Result, TrackError};
pub use geocode::{GeocodeCache, LOOKUP_FAILED, UNKNOWN_LOCATION};
pub use http::RemoteGeocoder;
pub use monitor::SignificantChangeMonitor;
pub use sources::{
    Notifier, Placemark, PositionListener, PositionSource, ReverseGeocoder,
    SignificantChangeListener, SignificantChangeSource,
};
pub use store::{
    HistoryStore, MemoryStore, RecordStore, SqliteStore, SIGNIFICANT_CHANGES_KEY, TRIPS_KEY,
};
pub use types::{
    AuthorizationState, CoordKey, LocationSample, MonitoringState, SignificantChangeEntry, Trip,
};
