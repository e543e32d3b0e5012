//! Memoizing reverse-geocode cache.
//!
//! Wraps a [`ReverseGeocoder`] with a per-coordinate-key cache. Keys are
//! coordinates rounded to a fixed precision ([`CoordKey`]); entries never
//! expire or get evicted, bounded in practice by the distinct coordinates
//! visited. Failed lookups are not cached, so a later call with the same
//! key retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::sources::ReverseGeocoder;
use crate::types::CoordKey;

/// Returned when the provider resolved the coordinate but supplied no
/// usable descriptive field.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Returned when the lookup itself failed; never stored in the cache.
pub const LOOKUP_FAILED: &str = "Location not found";

/// Memoizing wrapper around an external reverse-geocoding capability.
///
/// Lookups are not serialized: two callers racing on the same uncached
/// key may each hit the provider, and the last write wins in the cache.
/// Duplicate resolution is wasteful but not incorrect, since the resolved
/// value is stable for a given coordinate.
pub struct GeocodeCache {
    geocoder: Arc<dyn ReverseGeocoder>,
    entries: Mutex<HashMap<CoordKey, String>>,
}

impl GeocodeCache {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            geocoder,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a coordinate to a place name, consulting the cache first.
    ///
    /// On a miss the external capability is invoked once; on success the
    /// first non-empty descriptive field wins, falling back to the
    /// locality, falling back to [`UNKNOWN_LOCATION`]. On failure
    /// [`LOOKUP_FAILED`] is returned and nothing is cached.
    pub async fn resolve(&self, latitude: f64, longitude: f64) -> String {
        let key = CoordKey::from_degrees(latitude, longitude);

        if let Some(name) = self.entries.lock().unwrap().get(&key) {
            return name.clone();
        }

        // Lookup runs without the lock held; concurrent misses on the
        // same key are allowed to race.
        let (lat, lng) = key.to_degrees();
        match self.geocoder.lookup(lat, lng).await {
            Ok(placemark) => {
                let name = placemark
                    .name
                    .filter(|n| !n.is_empty())
                    .or(placemark.locality.filter(|l| !l.is_empty()))
                    .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

                debug!("[GeocodeCache] Resolved ({:.4}, {:.4}) -> '{}'", lat, lng, name);
                self.entries.lock().unwrap().insert(key, name.clone());
                name
            }
            Err(e) => {
                warn!("[GeocodeCache] Lookup for ({:.4}, {:.4}) failed: {}", lat, lng, e);
                LOOKUP_FAILED.to_string()
            }
        }
    }

    /// Number of memoized keys.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TrackError};
    use crate::sources::Placemark;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted geocoder that counts external calls.
    struct ScriptedGeocoder {
        placemark: Option<Placemark>,
        calls: AtomicU32,
    }

    impl ScriptedGeocoder {
        fn resolving(placemark: Placemark) -> Self {
            Self {
                placemark: Some(placemark),
                calls: AtomicU32::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                placemark: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ReverseGeocoder for ScriptedGeocoder {
        async fn lookup(&self, _latitude: f64, _longitude: f64) -> Result<Placemark> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.placemark
                .clone()
                .ok_or_else(|| TrackError::Geocode("provider down".into()))
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let geocoder = Arc::new(ScriptedGeocoder::resolving(Placemark {
            name: Some("Greenwich Park".into()),
            locality: Some("London".into()),
        }));
        let cache = GeocodeCache::new(geocoder.clone());

        assert_eq!(cache.resolve(51.4769, 0.0005).await, "Greenwich Park");
        assert_eq!(cache.resolve(51.4769, 0.0005).await, "Greenwich Park");

        // Second call was served from the cache
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_locality_fallback() {
        let geocoder = Arc::new(ScriptedGeocoder::resolving(Placemark {
            name: Some(String::new()),
            locality: Some("London".into()),
        }));
        let cache = GeocodeCache::new(geocoder);

        assert_eq!(cache.resolve(51.5, -0.1).await, "London");
    }

    #[tokio::test]
    async fn test_unknown_location_sentinel() {
        let geocoder = Arc::new(ScriptedGeocoder::resolving(Placemark::default()));
        let cache = GeocodeCache::new(geocoder);

        assert_eq!(cache.resolve(51.5, -0.1).await, UNKNOWN_LOCATION);
        // The sentinel for an empty placemark is still a resolution and is cached
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let geocoder = Arc::new(ScriptedGeocoder::failing());
        let cache = GeocodeCache::new(geocoder.clone());

        assert_eq!(cache.resolve(51.5, -0.1).await, LOOKUP_FAILED);
        assert_eq!(cache.resolve(51.5, -0.1).await, LOOKUP_FAILED);

        // Each call retried the provider; nothing was memoized
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_nearby_coordinates_share_key() {
        let geocoder = Arc::new(ScriptedGeocoder::resolving(Placemark {
            name: Some("Somewhere".into()),
            locality: None,
        }));
        let cache = GeocodeCache::new(geocoder.clone());

        cache.resolve(51.50741, -0.12782).await;
        cache.resolve(51.50744, -0.12779).await;

        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}
