//! Significant-change monitoring.
//!
//! Subscribes to the low-power event source once the platform
//! authorization level permits it. Each accepted event is logged at the
//! head of the significant-change history, persisted, surfaced through
//! the notifier, and promotes the tracking controller into active
//! tracking with `force: true` so a stale manual stop cannot swallow a
//! fresh wake-up. Events older than the staleness threshold at receipt
//! time are dropped without any downstream effect.

use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use log::{debug, info, warn};

use crate::controller::TrackingController;
use crate::sources::{Notifier, SignificantChangeListener, SignificantChangeSource};
use crate::store::{HistoryStore, SIGNIFICANT_CHANGES_KEY};
use crate::types::{AuthorizationState, LocationSample, MonitoringState, SignificantChangeEntry};

/// Events older than this at receipt time are stale wake-ups and dropped.
const STALENESS_LIMIT_SECS: i64 = 60;

/// Diagnostic status when the platform has no significant-change source.
const UNAVAILABLE_STATUS: &str = "significant-change monitoring unavailable on this device";

struct MonitorState {
    authorization: AuthorizationState,
    monitoring: MonitoringState,
    /// Human-readable diagnostic status.
    status: String,
    /// Significant-change log, most recent first.
    entries: Vec<SignificantChangeEntry>,
}

/// Watches the low-power significant-change source and promotes the
/// system into active tracking.
pub struct SignificantChangeMonitor {
    state: Mutex<MonitorState>,
    history: HistoryStore,
    notifier: Arc<dyn Notifier>,
    controller: Arc<TrackingController>,
    source: Arc<dyn SignificantChangeSource>,
    /// Self-reference handed to the event source on subscribe.
    weak_self: Weak<SignificantChangeMonitor>,
}

impl SignificantChangeMonitor {
    /// Wire up a monitor, reloading the persisted significant-change log.
    /// Monitoring starts only when an authorization change permits it.
    pub fn new(
        source: Arc<dyn SignificantChangeSource>,
        history: HistoryStore,
        notifier: Arc<dyn Notifier>,
        controller: Arc<TrackingController>,
    ) -> Arc<Self> {
        let entries: Vec<SignificantChangeEntry> = history.load(SIGNIFICANT_CHANGES_KEY);
        info!(
            "[SignificantChangeMonitor] Loaded {} persisted entries",
            entries.len()
        );

        let status = if source.is_available() {
            "waiting for authorization".to_string()
        } else {
            UNAVAILABLE_STATUS.to_string()
        };

        Arc::new_cyclic(|weak| Self {
            state: Mutex::new(MonitorState {
                authorization: AuthorizationState::NotDetermined,
                monitoring: MonitoringState::Stopped,
                status,
                entries,
            }),
            history,
            notifier,
            controller,
            source,
            weak_self: weak.clone(),
        })
    }

    /// Subscribe to the significant-change source with ourselves as the
    /// listener.
    fn subscribe(&self) {
        if let Some(me) = self.weak_self.upgrade() {
            self.source.start(me);
        }
    }

    /// Empty the significant-change log and persist.
    pub fn clear_history(&self) {
        let mut state = self.state.lock().unwrap();
        state.entries.clear();
        self.history.save(SIGNIFICANT_CHANGES_KEY, &state.entries);
        info!("[SignificantChangeMonitor] History cleared");
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Significant-change log, most recent first.
    pub fn entries(&self) -> Vec<SignificantChangeEntry> {
        self.state.lock().unwrap().entries.clone()
    }

    /// Current diagnostic status string.
    pub fn status(&self) -> String {
        self.state.lock().unwrap().status.clone()
    }

    pub fn authorization(&self) -> AuthorizationState {
        self.state.lock().unwrap().authorization
    }

    pub fn monitoring(&self) -> MonitoringState {
        self.state.lock().unwrap().monitoring
    }
}

impl SignificantChangeListener for SignificantChangeMonitor {
    fn on_significant_change(&self, event: LocationSample) {
        let age = Utc::now().signed_duration_since(event.timestamp);
        if age.num_seconds() > STALENESS_LIMIT_SECS {
            debug!(
                "[SignificantChangeMonitor] Dropping stale event ({}s old)",
                age.num_seconds()
            );
            return;
        }

        let entry = SignificantChangeEntry::new(event.timestamp, event.latitude, event.longitude);
        info!(
            "[SignificantChangeMonitor] Significant change at ({:.4}, {:.4})",
            entry.latitude, entry.longitude
        );

        {
            let mut state = self.state.lock().unwrap();
            state.entries.insert(0, entry.clone());
            self.history.save(SIGNIFICANT_CHANGES_KEY, &state.entries);
        }

        self.notifier.notify(
            "Significant location change",
            &format!("({:.4}, {:.4})", entry.latitude, entry.longitude),
        );

        self.controller.start_automatically(true);
    }

    fn on_authorization_change(&self, authorization: AuthorizationState) {
        let transition = {
            let mut state = self.state.lock().unwrap();
            state.authorization = authorization;

            if authorization.allows_monitoring() {
                // An unavailable source never starts, whatever the
                // authorization level says.
                if !self.source.is_available() {
                    state.status = UNAVAILABLE_STATUS.to_string();
                    None
                } else if state.monitoring == MonitoringState::Stopped {
                    state.monitoring = MonitoringState::Monitoring;
                    state.status = format!("monitoring (authorization: {})", authorization.label());
                    Some(true)
                } else {
                    None
                }
            } else {
                state.status = format!("not monitoring (authorization: {})", authorization.label());
                if state.monitoring == MonitoringState::Monitoring {
                    state.monitoring = MonitoringState::Stopped;
                    Some(false)
                } else {
                    None
                }
            }
        };

        // Subscribe/unsubscribe outside the lock: the source may deliver
        // synchronously.
        match transition {
            Some(true) => {
                info!(
                    "[SignificantChangeMonitor] Monitoring started (authorization: {})",
                    authorization.label()
                );
                self.subscribe();
            }
            Some(false) => {
                info!(
                    "[SignificantChangeMonitor] Monitoring stopped (authorization: {})",
                    authorization.label()
                );
                self.source.stop();
            }
            None => {}
        }
    }

    fn on_source_error(&self, message: &str) {
        warn!("[SignificantChangeMonitor] Source error: {}", message);
        let mut state = self.state.lock().unwrap();
        state.status = format!("monitoring error: {}", message);
    }
}
