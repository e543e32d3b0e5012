//! Abstract collaborator contracts.
//!
//! The engine never talks to platform sensor APIs, notification surfaces
//! or geocoding providers directly. Everything external sits behind one
//! of these traits, wired in explicitly at startup. Each source has a
//! single registered subscriber and one method per event type; callbacks
//! may arrive on any delivery thread, so subscribers are `Send + Sync`
//! and marshal onto their own serialized state internally.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AuthorizationState, LocationSample};

// ============================================================================
// High-Frequency Position Source
// ============================================================================

/// Subscriber for the high-frequency position source.
pub trait PositionListener: Send + Sync {
    /// A new position fix, already filtered by the source's own
    /// distance/accuracy policy.
    fn on_sample(&self, sample: LocationSample);

    /// A non-fatal source error.
    fn on_source_error(&self, message: &str);
}

/// Continuous fine-grained position sampling, active only while
/// explicitly subscribed.
pub trait PositionSource: Send + Sync {
    fn start(&self, listener: Arc<dyn PositionListener>);
    fn stop(&self);
}

// ============================================================================
// Low-Power Significant-Change Source
// ============================================================================

/// Subscriber for the low-power significant-change source.
pub trait SignificantChangeListener: Send + Sync {
    /// A coarse position-changed wake-up, possibly delivered long after
    /// the hosting process went dormant.
    fn on_significant_change(&self, event: LocationSample);

    /// The platform authorization level changed.
    fn on_authorization_change(&self, state: AuthorizationState);

    /// A non-fatal source error.
    fn on_source_error(&self, message: &str);
}

/// Coarse, power-efficient change notifications that can wake the system
/// from a dormant state.
pub trait SignificantChangeSource: Send + Sync {
    /// Whether this platform instance supports significant-change
    /// monitoring at all.
    fn is_available(&self) -> bool;

    fn start(&self, listener: Arc<dyn SignificantChangeListener>);
    fn stop(&self);
}

// ============================================================================
// Notifier
// ============================================================================

/// Fire-and-forget user notification surface; no result is consumed.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

// ============================================================================
// Reverse Geocoding
// ============================================================================

/// Raw result of one reverse-geocode lookup, before sentinel fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placemark {
    /// Most descriptive field the provider returned (e.g. a POI or
    /// street name).
    pub name: Option<String>,
    /// Generic locality fallback (city/town/village).
    pub locality: Option<String>,
}

/// Asynchronous reverse-geocode capability.
///
/// Implementations are free to be called concurrently; the cache layer
/// deduplicates per-key work only opportunistically.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Placemark>;
}
