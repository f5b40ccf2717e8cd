//! Interval-gated traffic recalculation.
//!
//! Traffic on the remainder of the active route goes stale while driving, but
//! the recalculation is a network call and must not fire on every progress
//! tick. The refresher gates it by a minimum interval and stamps the clock
//! *before* the asynchronous request resolves, so a slow response cannot let a
//! second request overlap the first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::reroute::{ActiveRoute, RoutingPort};
use crate::session::{EventSink, GuidanceEvent};

/// Configuration for the periodic traffic refresh.
#[derive(Debug, Clone)]
pub struct TrafficConfig {
    /// Minimum time between refresh attempts.
    /// Default: 10 minutes; accepted range 5–15 minutes.
    pub min_interval: Duration,
}

/// Shortest accepted refresh interval.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Longest accepted refresh interval.
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(10 * 60),
        }
    }
}

impl TrafficConfig {
    fn clamped_interval(&self) -> Duration {
        if self.min_interval < MIN_REFRESH_INTERVAL {
            warn!(
                "[traffic] configured interval {:?} below minimum, using {:?}",
                self.min_interval, MIN_REFRESH_INTERVAL
            );
            MIN_REFRESH_INTERVAL
        } else if self.min_interval > MAX_REFRESH_INTERVAL {
            warn!(
                "[traffic] configured interval {:?} above maximum, using {:?}",
                self.min_interval, MAX_REFRESH_INTERVAL
            );
            MAX_REFRESH_INTERVAL
        } else {
            self.min_interval
        }
    }
}

/// Gates the external traffic recalculation by a minimum interval.
pub struct TrafficRefresher {
    routing: Arc<dyn RoutingPort>,
    active: Arc<ActiveRoute>,
    events: EventSink,
    min_interval: Duration,
    last_refresh: Option<Instant>,
}

impl TrafficRefresher {
    pub fn new(
        config: &TrafficConfig,
        routing: Arc<dyn RoutingPort>,
        active: Arc<ActiveRoute>,
        events: EventSink,
    ) -> Self {
        Self {
            routing,
            active,
            events,
            min_interval: config.clamped_interval(),
            last_refresh: None,
        }
    }

    /// The effective (clamped) refresh interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Forget the last refresh time (new guidance session).
    pub fn reset(&mut self) {
        self.last_refresh = None;
    }

    /// Refresh traffic on the active route unless the interval has not yet
    /// elapsed. Returns `true` when a request was issued.
    ///
    /// On success only the [`TrafficOverlay`](crate::TrafficOverlay) of the
    /// active route is replaced; on failure the prior annotation stays in
    /// place and a [`GuidanceEvent::TrafficRefreshFailed`] is emitted.
    pub fn maybe_refresh(&mut self, now: Instant, section_index: u32, traveled_m: f64) -> bool {
        if let Some(last) = self.last_refresh {
            if now.duration_since(last) < self.min_interval {
                debug!("[traffic] refresh gated, interval not elapsed");
                return false;
            }
        }
        // Stamp before the request resolves.
        self.last_refresh = Some(now);

        let route = self.active.current();
        info!(
            "[traffic] refreshing traffic on route {} (section {}, {:.0} m traveled)",
            route.token(),
            section_index,
            traveled_m
        );

        let active = Arc::clone(&self.active);
        let events = Arc::clone(&self.events);
        let issued_for = route.clone();
        self.routing.request_traffic_on_route(
            &route,
            section_index,
            traveled_m,
            Box::new(move |outcome| {
                if active.is_retired() {
                    debug!("[traffic] completion for abandoned guidance discarded");
                    return;
                }
                match outcome {
                    Ok(overlay) => {
                        // A reroute may have swapped the route while the
                        // request was outstanding; the overlay is then stale.
                        if active.set_traffic(&issued_for, overlay) {
                            events(GuidanceEvent::TrafficRefreshed(overlay));
                        } else {
                            debug!(
                                "[traffic] overlay for superseded route {} discarded",
                                issued_for.token()
                            );
                        }
                    }
                    Err(err) => {
                        warn!("[traffic] refresh failed: {}", err);
                        events(GuidanceEvent::TrafficRefreshFailed(err));
                    }
                }
            }),
        );
        true
    }
}
