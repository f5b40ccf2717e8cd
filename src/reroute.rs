//! Rerouting coordination and the external routing port.
//!
//! The external routing collaborator is network-backed and asynchronous: its
//! completions may arrive on any thread. [`ActiveRoute`] therefore guards the
//! shared route/traffic/in-flight state behind a mutex (single-writer
//! discipline), and [`RerouteCoordinator`] enforces the at-most-one-in-flight
//! invariant with a test-and-set on that state.
//!
//! The coordinator never retries on its own; the next natural deviation
//! trigger decides whether another attempt is warranted.

use std::fmt;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::session::{EventSink, GuidanceEvent};
use crate::{GpsFix, RouteHandle, TrafficOverlay};

/// Opaque failure reported by the external routing collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingError {
    /// Vendor error code, forwarded verbatim.
    pub code: u32,
    pub message: String,
}

impl RoutingError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "routing error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RoutingError {}

/// Completion callback for a return-to-route request.
pub type RerouteCompletion = Box<dyn FnOnce(Result<RouteHandle, RoutingError>) + Send>;

/// Completion callback for a traffic-on-route request.
pub type TrafficCompletion = Box<dyn FnOnce(Result<TrafficOverlay, RoutingError>) + Send>;

/// The external Routing collaborator.
///
/// Both requests are asynchronous; the implementation invokes the completion
/// exactly once, on an arbitrary thread.
pub trait RoutingPort: Send + Sync {
    /// Calculate a route from the current position back onto (or replacing)
    /// the given route.
    fn request_return_to_route(
        &self,
        fix: &GpsFix,
        route: &RouteHandle,
        section_index: u32,
        traveled_m: f64,
        completion: RerouteCompletion,
    );

    /// Recalculate traffic delays on the remainder of the given route.
    fn request_traffic_on_route(
        &self,
        route: &RouteHandle,
        section_index: u32,
        traveled_m: f64,
        completion: TrafficCompletion,
    );
}

// ============================================================================
// Active route state
// ============================================================================

#[derive(Debug)]
struct ActiveRouteInner {
    route: RouteHandle,
    traffic: Option<TrafficOverlay>,
    reroute_in_flight: bool,
    retired: bool,
}

/// Shared state of the route currently being followed.
///
/// Mutated from two directions — the event-delivery thread triggering reroutes
/// and the collaborator's completion thread settling them — so every access
/// goes through the internal mutex. The route swap on reroute success happens
/// in the same critical section that clears the in-flight flag: no observer
/// can see the old route discarded without the new one installed.
#[derive(Debug)]
pub struct ActiveRoute {
    inner: Mutex<ActiveRouteInner>,
}

impl ActiveRoute {
    pub fn new(route: RouteHandle) -> Self {
        Self {
            inner: Mutex::new(ActiveRouteInner {
                route,
                traffic: None,
                reroute_in_flight: false,
                retired: false,
            }),
        }
    }

    /// Handle of the route currently being followed.
    pub fn current(&self) -> RouteHandle {
        self.inner.lock().unwrap().route.clone()
    }

    /// Current traffic annotation, if a refresh has completed.
    pub fn traffic(&self) -> Option<TrafficOverlay> {
        self.inner.lock().unwrap().traffic
    }

    /// Whether a return-to-route request is outstanding.
    pub fn reroute_in_flight(&self) -> bool {
        self.inner.lock().unwrap().reroute_in_flight
    }

    /// Mark this guidance state as abandoned (the host stopped or restarted
    /// guidance). Late completions check this so they never emit events for a
    /// route the host no longer follows.
    pub(crate) fn retire(&self) {
        self.inner.lock().unwrap().retired = true;
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.inner.lock().unwrap().retired
    }

    /// Test-and-set entry into a reroute: returns the route to reroute from,
    /// or `None` when a request is already in flight.
    pub(crate) fn begin_reroute(&self) -> Option<RouteHandle> {
        let mut inner = self.inner.lock().unwrap();
        if inner.reroute_in_flight {
            return None;
        }
        inner.reroute_in_flight = true;
        Some(inner.route.clone())
    }

    /// Settle a reroute: swap the route in on success, keep the previous route
    /// on failure, and clear the in-flight flag on every path.
    pub(crate) fn finish_reroute(&self, outcome: &Result<RouteHandle, RoutingError>) {
        let mut inner = self.inner.lock().unwrap();
        if let Ok(new_route) = outcome {
            inner.route = new_route.clone();
            inner.traffic = None;
        }
        inner.reroute_in_flight = false;
    }

    /// Install a traffic annotation, provided it was computed for the route
    /// still being followed. Returns `false` when the route changed since the
    /// request was issued; the stale overlay is discarded.
    pub(crate) fn set_traffic(&self, issued_for: &RouteHandle, overlay: TrafficOverlay) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.route != *issued_for {
            return false;
        }
        inner.traffic = Some(overlay);
        true
    }
}

// ============================================================================
// Reroute coordinator
// ============================================================================

/// Issues return-to-route requests, at most one in flight.
pub struct RerouteCoordinator {
    routing: Arc<dyn RoutingPort>,
    active: Arc<ActiveRoute>,
    events: EventSink,
}

impl RerouteCoordinator {
    pub fn new(routing: Arc<dyn RoutingPort>, active: Arc<ActiveRoute>, events: EventSink) -> Self {
        Self {
            routing,
            active,
            events,
        }
    }

    /// Request a route from `fix` back onto the active route.
    ///
    /// Returns `false` without issuing anything when a request is already in
    /// flight. On completion exactly one [`GuidanceEvent`] is emitted:
    /// `Rerouted` with the new handle (now active) or `RerouteFailed` with the
    /// collaborator's error (previous route untouched).
    pub fn trigger_return_to_route(&self, fix: &GpsFix, section_index: u32, traveled_m: f64) -> bool {
        let Some(route) = self.active.begin_reroute() else {
            debug!("[reroute] trigger ignored: request already in flight");
            return false;
        };

        info!(
            "[reroute] requesting return to route {} (section {}, {:.0} m traveled)",
            route.token(),
            section_index,
            traveled_m
        );

        let active = Arc::clone(&self.active);
        let events = Arc::clone(&self.events);
        self.routing.request_return_to_route(
            fix,
            &route,
            section_index,
            traveled_m,
            Box::new(move |outcome| {
                active.finish_reroute(&outcome);
                if active.is_retired() {
                    debug!("[reroute] completion for abandoned guidance discarded");
                    return;
                }
                match outcome {
                    Ok(new_route) => {
                        info!("[reroute] switched to route {}", new_route.token());
                        events(GuidanceEvent::Rerouted(new_route));
                    }
                    Err(err) => {
                        warn!("[reroute] return to route failed: {}", err);
                        events(GuidanceEvent::RerouteFailed(err));
                    }
                }
            }),
        );
        true
    }
}
