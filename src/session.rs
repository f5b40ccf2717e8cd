//! Session dispatcher.
//!
//! One typed event surface per concern instead of a zoo of listener objects:
//! the host forwards its positioning/navigation callbacks to
//! [`GuidanceSession`] (`on_location_fix`, `on_deviation_event`,
//! `on_route_progress_tick`) and receives decisions back through a single
//! [`EventSink`] of tagged [`GuidanceEvent`] variants.
//!
//! All inbound calls are expected on the host's callback delivery thread and
//! are non-blocking except [`GuidanceSession::save_recording`], which performs
//! file I/O and belongs off that thread.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use crate::deviation::{DeviationConfig, DeviationMonitor, DeviationSignal};
use crate::filter::{FilterConfig, FilterState, LocationFilter};
use crate::recorder::TrackRecorder;
use crate::reroute::{ActiveRoute, RerouteCoordinator, RoutingError, RoutingPort};
use crate::track::TrackStore;
use crate::traffic::{TrafficConfig, TrafficRefresher};
use crate::{GpsFix, Result, RouteHandle, TrafficOverlay};

/// Notification from the core back to the host, delivered through the
/// session's [`EventSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceEvent {
    /// A return-to-route completed; the new route is already active.
    Rerouted(RouteHandle),
    /// A return-to-route failed; the previous route is still active.
    RerouteFailed(RoutingError),
    /// Traffic annotations on the active route were replaced.
    TrafficRefreshed(TrafficOverlay),
    /// Traffic refresh failed; the prior annotation is still in place.
    TrafficRefreshFailed(RoutingError),
}

/// Host callback receiving [`GuidanceEvent`]s.
///
/// Completions from the routing collaborator may arrive on any thread, so the
/// sink must be `Send + Sync`; hosts marshal to their UI thread themselves.
pub type EventSink = Arc<dyn Fn(GuidanceEvent) + Send + Sync>;

/// What the session is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    Recording,
    Guiding,
}

/// Configuration for a [`GuidanceSession`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub filter: FilterConfig,
    pub deviation: DeviationConfig,
    pub traffic: TrafficConfig,
}

/// Per-guidance state, created on `start_guidance` and dropped on stop.
struct GuidanceUnit {
    active: Arc<ActiveRoute>,
    monitor: DeviationMonitor,
    coordinator: RerouteCoordinator,
    refresher: TrafficRefresher,
    filter: Box<dyn LocationFilter>,
    filter_state: FilterState,
    /// Last admitted fix; the position a reroute is requested from.
    last_fix: Option<GpsFix>,
}

/// Wires the filter, recorder, deviation monitor, reroute coordinator and
/// traffic refresher behind one inbound surface.
pub struct GuidanceSession {
    routing: Arc<dyn RoutingPort>,
    events: EventSink,
    config: SessionConfig,
    recorder: TrackRecorder,
    guidance: Option<GuidanceUnit>,
}

impl GuidanceSession {
    /// Create a session. The routing collaborator is injected here — the core
    /// never reaches for an ambient SDK global. Fails only when an existing
    /// track document cannot be loaded.
    pub fn new(
        routing: Arc<dyn RoutingPort>,
        store: TrackStore,
        config: SessionConfig,
        events: EventSink,
    ) -> Result<Self> {
        let recorder = TrackRecorder::new(store, &config.filter)?;
        Ok(Self {
            routing,
            events,
            config,
            recorder,
            guidance: None,
        })
    }

    /// Guiding takes precedence over recording when both are active.
    pub fn mode(&self) -> SessionMode {
        if self.guidance.is_some() {
            SessionMode::Guiding
        } else if self.recorder.is_recording() {
            SessionMode::Recording
        } else {
            SessionMode::Idle
        }
    }

    // ========================================================================
    // Recording
    // ========================================================================

    pub fn start_recording(&mut self) {
        info!("[session] recording started");
        self.recorder.start_recording();
    }

    pub fn stop_recording(&mut self) {
        info!("[session] recording stopped");
        self.recorder.stop_recording();
    }

    /// Save the current track; see [`TrackRecorder::save_recording`].
    pub fn save_recording(&mut self) -> bool {
        self.recorder.save_recording()
    }

    pub fn recorder(&self) -> &TrackRecorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut TrackRecorder {
        &mut self.recorder
    }

    // ========================================================================
    // Guidance
    // ========================================================================

    /// Begin following `route`. Replaces any guidance already in progress; a
    /// completion still outstanding for the replaced guidance settles silently.
    pub fn start_guidance(&mut self, route: RouteHandle) {
        if let Some(old) = self.guidance.take() {
            old.active.retire();
        }
        info!("[session] guidance started on route {}", route.token());
        let active = Arc::new(ActiveRoute::new(route));
        self.guidance = Some(GuidanceUnit {
            monitor: DeviationMonitor::new(self.config.deviation.clone(), Arc::clone(&active)),
            coordinator: RerouteCoordinator::new(
                Arc::clone(&self.routing),
                Arc::clone(&active),
                Arc::clone(&self.events),
            ),
            refresher: TrafficRefresher::new(
                &self.config.traffic,
                Arc::clone(&self.routing),
                Arc::clone(&active),
                Arc::clone(&self.events),
            ),
            filter: self.config.filter.build(),
            filter_state: FilterState::new(),
            last_fix: None,
            active,
        });
    }

    pub fn stop_guidance(&mut self) {
        if let Some(old) = self.guidance.take() {
            old.active.retire();
            info!("[session] guidance stopped");
        }
    }

    /// Handle of the route currently being followed, if guiding.
    pub fn active_route(&self) -> Option<RouteHandle> {
        self.guidance.as_ref().map(|g| g.active.current())
    }

    /// Current traffic annotation of the followed route, if any.
    pub fn active_traffic(&self) -> Option<TrafficOverlay> {
        self.guidance.as_ref().and_then(|g| g.active.traffic())
    }

    // ========================================================================
    // Inbound events (host callback thread)
    // ========================================================================

    /// Raw location fix from the positioning collaborator.
    pub fn on_location_fix(&mut self, fix: GpsFix) {
        if self.recorder.is_recording() {
            self.recorder.record(fix);
        }
        if let Some(guidance) = &mut self.guidance {
            if guidance.filter.accept(&mut guidance.filter_state, &fix) {
                guidance.last_fix = Some(fix);
            }
        }
    }

    /// Deviation notification from the navigation engine: the current fix
    /// lies `distance_m` off the active route.
    pub fn on_deviation_event(&mut self, distance_m: f64, section_index: u32, traveled_m: f64) {
        let Some(guidance) = &mut self.guidance else {
            return;
        };
        if guidance.monitor.on_deviation_event(distance_m) == DeviationSignal::TriggerReroute {
            match &guidance.last_fix {
                Some(fix) => {
                    guidance
                        .coordinator
                        .trigger_return_to_route(fix, section_index, traveled_m);
                }
                None => {
                    debug!("[session] reroute wanted but no admitted fix yet");
                }
            }
        }
    }

    /// Route progress tick from the navigation engine.
    pub fn on_route_progress_tick(&mut self, now: Instant, section_index: u32, traveled_m: f64) {
        if let Some(guidance) = &mut self.guidance {
            guidance.refresher.maybe_refresh(now, section_index, traveled_m);
        }
    }
}
