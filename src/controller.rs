//! Active-tracking state machine and trip history.
//!
//! The controller owns the transient tracking session (Idle/Active, the
//! sample buffer, the manual-override flag) and the durable trip list.
//! Source callbacks may arrive on any delivery thread; every entry point
//! marshals onto the session state by taking its lock, which serializes
//! all mutations. The only asynchronous work is place-name enrichment,
//! which runs as a detached task and re-locates its trip by id before
//! writing anything back.

use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use log::{debug, info, warn};
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::geocode::{GeocodeCache, LOOKUP_FAILED};
use crate::sources::{PositionListener, PositionSource};
use crate::store::{HistoryStore, TRIPS_KEY};
use crate::types::{LocationSample, Trip};

/// Transient session state, reset in place across start/stop cycles.
struct SessionState {
    is_active: bool,
    buffer: Vec<LocationSample>,
    /// Set when the user explicitly stops tracking; suppresses automatic
    /// restarts until the next manual toggle.
    manual_override: bool,
    /// Trip history, most recent first.
    trips: Vec<Trip>,
    /// Read-only projection of a past trip for the rendering layer.
    displayed_path: Vec<LocationSample>,
}

/// Endpoint coordinates captured at finalization, resolved off-context.
struct PendingEnrichment {
    trip_id: Uuid,
    start: LocationSample,
    end: LocationSample,
}

enum Transition {
    Started,
    Stopped(Option<PendingEnrichment>),
}

/// Owns the active-tracking state machine and the durable trip history.
pub struct TrackingController {
    state: Mutex<SessionState>,
    history: HistoryStore,
    geocoder: Arc<GeocodeCache>,
    source: Arc<dyn PositionSource>,
    runtime: Handle,
    /// Self-reference handed to the position source on subscribe and to
    /// detached enrichment tasks.
    weak_self: Weak<TrackingController>,
}

impl TrackingController {
    /// Wire up a controller, reloading the persisted trip history.
    ///
    /// The runtime handle is where detached enrichment tasks are spawned;
    /// it is passed explicitly so the controller can be driven from
    /// arbitrary callback threads.
    pub fn new(
        source: Arc<dyn PositionSource>,
        history: HistoryStore,
        geocoder: Arc<GeocodeCache>,
        runtime: Handle,
    ) -> Arc<Self> {
        let trips: Vec<Trip> = history.load(TRIPS_KEY);
        info!("[TrackingController] Loaded {} persisted trips", trips.len());

        Arc::new_cyclic(|weak| Self {
            state: Mutex::new(SessionState {
                is_active: false,
                buffer: Vec::new(),
                manual_override: false,
                trips,
                displayed_path: Vec::new(),
            }),
            history,
            geocoder,
            source,
            runtime,
            weak_self: weak.clone(),
        })
    }

    /// Subscribe to the position source with ourselves as the listener.
    fn subscribe(&self) {
        if let Some(me) = self.weak_self.upgrade() {
            self.source.start(me);
        }
    }

    // ========================================================================
    // State Machine
    // ========================================================================

    /// Manual toggle: Idle starts tracking, Active stops and finalizes.
    pub fn toggle_tracking(&self) {
        let transition = {
            let mut state = self.state.lock().unwrap();
            if state.is_active {
                Transition::Stopped(self.deactivate_locked(&mut state))
            } else {
                self.activate_locked(&mut state);
                Transition::Started
            }
        };

        match transition {
            Transition::Started => {
                info!("[TrackingController] Tracking started");
                self.subscribe();
            }
            Transition::Stopped(pending) => {
                info!("[TrackingController] Tracking stopped");
                self.source.stop();
                if let Some(pending) = pending {
                    self.spawn_enrichment(pending);
                }
            }
        }
    }

    /// Automatic start, driven by the significant-change monitor.
    ///
    /// No-op if already active, or if the user explicitly stopped
    /// tracking and `force` is false. A fresh significant-change event
    /// passes `force: true` to override a lingering manual stop.
    pub fn start_automatically(&self, force: bool) {
        {
            let mut state = self.state.lock().unwrap();
            if state.is_active {
                return;
            }
            if state.manual_override && !force {
                debug!("[TrackingController] Automatic start suppressed by manual override");
                return;
            }
            self.activate_locked(&mut state);
        }

        info!("[TrackingController] Tracking started automatically (force: {})", force);
        self.subscribe();
    }

    /// Show a past trip's path. If tracking is active, the in-progress
    /// session is stopped and finalized first so no data is lost; the
    /// displayed path is a read-only projection, not a resumption.
    pub fn display_trip(&self, trip: &Trip) {
        let (was_active, pending) = {
            let mut state = self.state.lock().unwrap();
            let was_active = state.is_active;
            let pending = if was_active {
                self.deactivate_locked(&mut state)
            } else {
                None
            };
            state.displayed_path = trip.locations.clone();
            (was_active, pending)
        };

        if was_active {
            info!("[TrackingController] Tracking stopped to display trip {}", trip.id);
            self.source.stop();
            if let Some(pending) = pending {
                self.spawn_enrichment(pending);
            }
        }
    }

    /// Empty the trip list and the transient buffer, persisting the
    /// empty list.
    pub fn clear_history(&self) {
        let mut state = self.state.lock().unwrap();
        state.trips.clear();
        state.buffer.clear();
        self.history.save(TRIPS_KEY, &state.trips);
        info!("[TrackingController] Trip history cleared");
    }

    /// Active-entry half of the state machine. Caller holds the lock and
    /// subscribes to the source after releasing it.
    fn activate_locked(&self, state: &mut SessionState) {
        state.buffer.clear();
        state.is_active = true;
        state.manual_override = false;
    }

    /// Active-exit half: finalize a trip from the buffer (if non-empty),
    /// persist, and hand back the endpoints for async enrichment. Caller
    /// holds the lock and unsubscribes after releasing it.
    fn deactivate_locked(&self, state: &mut SessionState) -> Option<PendingEnrichment> {
        state.is_active = false;
        state.manual_override = true;

        let samples = std::mem::take(&mut state.buffer);
        if samples.is_empty() {
            debug!("[TrackingController] Stopped with empty buffer, no trip finalized");
            return None;
        }

        let trip = Trip::new(Utc::now(), samples);
        let pending = PendingEnrichment {
            trip_id: trip.id,
            start: *trip.start_sample()?,
            end: *trip.end_sample()?,
        };

        info!(
            "[TrackingController] Finalized trip {} with {} samples",
            trip.id,
            trip.locations.len()
        );
        state.trips.insert(0, trip);
        self.history.save(TRIPS_KEY, &state.trips);

        Some(pending)
    }

    // ========================================================================
    // Enrichment
    // ========================================================================

    /// Resolve start/end place names off-context and merge them back in.
    fn spawn_enrichment(&self, pending: PendingEnrichment) {
        let Some(controller) = self.weak_self.upgrade() else {
            return;
        };
        self.runtime.spawn(async move {
            let (start_name, end_name) = tokio::join!(
                controller
                    .geocoder
                    .resolve(pending.start.latitude, pending.start.longitude),
                controller
                    .geocoder
                    .resolve(pending.end.latitude, pending.end.longitude),
            );
            controller.apply_enrichment(pending.trip_id, start_name, end_name);
        });
    }

    /// Merge resolved names into the trip, located by id. If the trip was
    /// cleared while the lookup was in flight, the result is dropped
    /// silently.
    fn apply_enrichment(&self, trip_id: Uuid, start_name: String, end_name: String) {
        let mut state = self.state.lock().unwrap();
        match state.trips.iter_mut().find(|t| t.id == trip_id) {
            Some(trip) => {
                // Failed lookups leave the field absent rather than
                // storing the sentinel.
                if start_name != LOOKUP_FAILED {
                    trip.start_location_name = Some(start_name);
                }
                if end_name != LOOKUP_FAILED {
                    trip.end_location_name = Some(end_name);
                }
            }
            None => {
                debug!(
                    "[TrackingController] Trip {} gone before enrichment completed, dropping result",
                    trip_id
                );
                return;
            }
        }
        self.history.save(TRIPS_KEY, &state.trips);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().is_active
    }

    /// Trip history, most recent first.
    pub fn trips(&self) -> Vec<Trip> {
        self.state.lock().unwrap().trips.clone()
    }

    pub fn displayed_path(&self) -> Vec<LocationSample> {
        self.state.lock().unwrap().displayed_path.clone()
    }

    /// Whether automatic restarts are currently suppressed by an
    /// explicit manual stop.
    pub fn manual_override(&self) -> bool {
        self.state.lock().unwrap().manual_override
    }
}

impl PositionListener for TrackingController {
    fn on_sample(&self, sample: LocationSample) {
        let mut state = self.state.lock().unwrap();
        if !state.is_active {
            debug!("[TrackingController] Ignoring sample while idle");
            return;
        }
        state.buffer.push(sample);
    }

    fn on_source_error(&self, message: &str) {
        warn!("[TrackingController] Position source error: {}", message);
    }
}
