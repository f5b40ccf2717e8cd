//! Off-route hysteresis.
//!
//! Deviation detection is noisy near route edges: a single off-route sample is
//! as likely to be GPS scatter as a real wrong turn. The monitor therefore
//! requires several consecutive deviation events, all beyond a distance
//! threshold, before asking for a reroute. Both constants are empirical and
//! live in [`DeviationConfig`].

use std::sync::Arc;

use log::{debug, info};

use crate::reroute::ActiveRoute;

/// Decision for one deviation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationSignal {
    /// Keep following the current route.
    Ignore,
    /// Enough evidence: ask the coordinator for a return-to-route.
    TriggerReroute,
}

/// Configuration for the deviation monitor.
#[derive(Debug, Clone)]
pub struct DeviationConfig {
    /// Distance from the route a fix must exceed to count as off-route.
    /// Default: 50.0 meters
    pub distance_threshold_m: f64,

    /// Consecutive qualifying events required before triggering a reroute.
    /// Default: 3
    pub min_consecutive_events: u32,
}

impl Default for DeviationConfig {
    fn default() -> Self {
        Self {
            distance_threshold_m: 50.0,
            min_consecutive_events: 3,
        }
    }
}

/// Counts consecutive deviation events and decides when to reroute.
///
/// While a return-to-route request is outstanding on the shared
/// [`ActiveRoute`], every event is answered with [`DeviationSignal::Ignore`];
/// retriggering is left to the next natural deviation after the request
/// settles.
pub struct DeviationMonitor {
    config: DeviationConfig,
    active: Arc<ActiveRoute>,
    consecutive: u32,
}

impl DeviationMonitor {
    pub fn new(config: DeviationConfig, active: Arc<ActiveRoute>) -> Self {
        Self {
            config,
            active,
            consecutive: 0,
        }
    }

    /// Current consecutive-event count.
    pub fn consecutive_events(&self) -> u32 {
        self.consecutive
    }

    /// Forget accumulated evidence (new guidance session).
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Process one deviation notification from the navigation engine.
    ///
    /// Emits [`DeviationSignal::TriggerReroute`] only when the distance
    /// exceeds the threshold and the consecutive count has reached the
    /// configured minimum; the counter resets immediately on trigger,
    /// regardless of how the reroute eventually settles.
    pub fn on_deviation_event(&mut self, distance_m: f64) -> DeviationSignal {
        if self.active.reroute_in_flight() {
            debug!("[deviation] reroute in flight, ignoring event");
            return DeviationSignal::Ignore;
        }

        if distance_m <= self.config.distance_threshold_m {
            // Back within tolerance; stale counts must not add up across
            // separate excursions.
            self.consecutive = 0;
            return DeviationSignal::Ignore;
        }

        self.consecutive += 1;
        debug!(
            "[deviation] {:.0} m off route, event {}/{}",
            distance_m, self.consecutive, self.config.min_consecutive_events
        );

        if self.consecutive >= self.config.min_consecutive_events {
            info!(
                "[deviation] {:.0} m off route after {} consecutive events, triggering reroute",
                distance_m, self.consecutive
            );
            self.consecutive = 0;
            DeviationSignal::TriggerReroute
        } else {
            DeviationSignal::Ignore
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteHandle;

    fn monitor() -> (DeviationMonitor, Arc<ActiveRoute>) {
        let active = Arc::new(ActiveRoute::new(RouteHandle::new(1)));
        (
            DeviationMonitor::new(DeviationConfig::default(), Arc::clone(&active)),
            active,
        )
    }

    #[test]
    fn test_trigger_on_third_consecutive_event() {
        let (mut monitor, _active) = monitor();

        assert_eq!(monitor.on_deviation_event(60.0), DeviationSignal::Ignore);
        assert_eq!(monitor.on_deviation_event(60.0), DeviationSignal::Ignore);
        assert_eq!(
            monitor.on_deviation_event(60.0),
            DeviationSignal::TriggerReroute
        );

        // Counter reset immediately after the trigger.
        assert_eq!(monitor.consecutive_events(), 0);
        assert_eq!(monitor.on_deviation_event(60.0), DeviationSignal::Ignore);
    }

    #[test]
    fn test_small_distance_never_triggers() {
        let (mut monitor, _active) = monitor();

        for _ in 0..10 {
            assert_eq!(monitor.on_deviation_event(49.0), DeviationSignal::Ignore);
        }
        assert_eq!(monitor.consecutive_events(), 0);
    }

    #[test]
    fn test_near_route_event_resets_the_count() {
        let (mut monitor, _active) = monitor();

        monitor.on_deviation_event(60.0);
        monitor.on_deviation_event(60.0);
        // Briefly back near the route: the excursion is over.
        monitor.on_deviation_event(10.0);

        assert_eq!(monitor.on_deviation_event(60.0), DeviationSignal::Ignore);
        assert_eq!(monitor.on_deviation_event(60.0), DeviationSignal::Ignore);
        assert_eq!(
            monitor.on_deviation_event(60.0),
            DeviationSignal::TriggerReroute
        );
    }

    #[test]
    fn test_events_ignored_while_reroute_in_flight() {
        let (mut monitor, active) = monitor();

        assert!(active.begin_reroute().is_some());
        for _ in 0..5 {
            assert_eq!(monitor.on_deviation_event(500.0), DeviationSignal::Ignore);
        }
        assert_eq!(monitor.consecutive_events(), 0);

        active.finish_reroute(&Ok(RouteHandle::new(2)));
        assert_eq!(monitor.on_deviation_event(60.0), DeviationSignal::Ignore);
        assert_eq!(monitor.consecutive_events(), 1);
    }

    #[test]
    fn test_custom_thresholds() {
        let active = Arc::new(ActiveRoute::new(RouteHandle::new(1)));
        let config = DeviationConfig {
            distance_threshold_m: 100.0,
            min_consecutive_events: 1,
        };
        let mut monitor = DeviationMonitor::new(config, active);

        assert_eq!(monitor.on_deviation_event(90.0), DeviationSignal::Ignore);
        assert_eq!(
            monitor.on_deviation_event(101.0),
            DeviationSignal::TriggerReroute
        );
    }
}
