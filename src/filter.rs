//! Location-quality filter strategies.
//!
//! Raw fixes from a positioning source are noisy: poor-accuracy readings jump
//! tens of meters, and a stationary device produces a cloud of near-identical
//! points. Everything downstream (track recording, deviation handling) only
//! sees fixes that pass one of the strategies here.
//!
//! Two interchangeable strategies implement the same [`LocationFilter`]
//! contract and are selected by [`FilterConfig`]:
//!
//! - [`DistanceAccuracyFilter`] — accuracy gate plus minimum-movement gate
//! - [`PermissiveFilter`] — admits everything (raw-signal visualization)

use crate::geo_utils::haversine_distance;
use crate::GpsFix;

/// Reference state carried across fixes of one recording session.
///
/// Holds the coordinates of the last admitted fix; reset when a new
/// track/recording starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    last_accepted: Option<(f64, f64)>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coordinates of the last admitted fix, if any.
    pub fn last_accepted(&self) -> Option<(f64, f64)> {
        self.last_accepted
    }

    /// Forget the reference point. Call when a new recording session starts.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    fn admit(&mut self, fix: &GpsFix) {
        self.last_accepted = Some((fix.latitude, fix.longitude));
    }
}

/// Decides whether a raw fix can be used.
///
/// Implementations must be pure over their inputs: the only side effect is the
/// reference update in `state`, and only when the fix is admitted.
pub trait LocationFilter: Send {
    /// Evaluate `fix` against `state`. Returns `true` when the fix is admitted,
    /// in which case `state` now references the admitted coordinates.
    fn accept(&self, state: &mut FilterState, fix: &GpsFix) -> bool;
}

/// Strategy selector for [`FilterConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStrategy {
    /// Accuracy and minimum-movement gating (the recording default).
    #[default]
    DistanceAccuracy,
    /// Admit every fix unfiltered.
    Permissive,
}

/// Configuration for the location filter.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Which strategy to build.
    pub strategy: FilterStrategy,

    /// Maximum horizontal accuracy for a fix to be trusted.
    /// Fixes with larger (worse) or absent accuracy are rejected.
    /// Default: 10.0 meters
    pub accuracy_threshold_m: f64,

    /// Minimum great-circle distance from the last admitted fix.
    /// Suppresses the stationary-noise cloud. Default: 15.0 meters
    pub movement_threshold_m: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            strategy: FilterStrategy::DistanceAccuracy,
            accuracy_threshold_m: 10.0,
            movement_threshold_m: 15.0,
        }
    }
}

impl FilterConfig {
    /// Build the configured strategy.
    pub fn build(&self) -> Box<dyn LocationFilter> {
        match self.strategy {
            FilterStrategy::DistanceAccuracy => Box::new(DistanceAccuracyFilter {
                accuracy_threshold_m: self.accuracy_threshold_m,
                movement_threshold_m: self.movement_threshold_m,
            }),
            FilterStrategy::Permissive => Box::new(PermissiveFilter),
        }
    }
}

/// Strict strategy: accuracy gate first, then minimum-movement gate.
///
/// The very first fix of a session has no reference to compare against, so it
/// skips the movement gate (but not the accuracy gate) and seats the reference.
#[derive(Debug, Clone)]
pub struct DistanceAccuracyFilter {
    pub accuracy_threshold_m: f64,
    pub movement_threshold_m: f64,
}

impl LocationFilter for DistanceAccuracyFilter {
    fn accept(&self, state: &mut FilterState, fix: &GpsFix) -> bool {
        match fix.accuracy {
            None => return false,
            Some(accuracy) if accuracy > self.accuracy_threshold_m => return false,
            Some(_) => {}
        }

        if let Some((lat, lon)) = state.last_accepted() {
            let moved = haversine_distance(lat, lon, fix.latitude, fix.longitude);
            if moved < self.movement_threshold_m {
                return false;
            }
        }

        state.admit(fix);
        true
    }
}

/// Permissive strategy: admits every fix.
///
/// Still seats the reference so a later switch to the strict strategy picks up
/// from the most recent fix rather than an ancient one.
#[derive(Debug, Clone)]
pub struct PermissiveFilter;

impl LocationFilter for PermissiveFilter {
    fn accept(&self, state: &mut FilterState, fix: &GpsFix) -> bool {
        state.admit(fix);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fix(lat: f64, lon: f64, accuracy: Option<f64>) -> GpsFix {
        let mut f = GpsFix::new(lat, lon, Utc::now());
        f.accuracy = accuracy;
        f
    }

    #[test]
    fn test_poor_accuracy_rejected_regardless_of_movement() {
        let filter = FilterConfig::default().build();
        let mut state = FilterState::new();

        assert!(!filter.accept(&mut state, &fix(52.5, 13.4, Some(10.1))));
        assert!(!filter.accept(&mut state, &fix(53.5, 14.4, Some(50.0))));
        assert_eq!(state.last_accepted(), None);
    }

    #[test]
    fn test_missing_accuracy_rejected() {
        let filter = FilterConfig::default().build();
        let mut state = FilterState::new();

        assert!(!filter.accept(&mut state, &fix(52.5, 13.4, None)));
        assert_eq!(state.last_accepted(), None);
    }

    #[test]
    fn test_first_fix_always_seats_reference() {
        let filter = FilterConfig::default().build();
        let mut state = FilterState::new();

        assert!(filter.accept(&mut state, &fix(52.5, 13.4, Some(5.0))));
        assert_eq!(state.last_accepted(), Some((52.5, 13.4)));
    }

    #[test]
    fn test_stationary_noise_suppressed() {
        let filter = FilterConfig::default().build();
        let mut state = FilterState::new();

        // First fix admitted; the rest are within ~11 m of it.
        assert!(filter.accept(&mut state, &fix(52.5, 13.4, Some(5.0))));
        assert!(!filter.accept(&mut state, &fix(52.50005, 13.4, Some(5.0))));
        assert!(!filter.accept(&mut state, &fix(52.5001, 13.4, Some(5.0))));
        assert!(!filter.accept(&mut state, &fix(52.5, 13.40005, Some(5.0))));

        // Reference still points at the first fix.
        assert_eq!(state.last_accepted(), Some((52.5, 13.4)));
    }

    #[test]
    fn test_real_movement_admitted_and_reference_advances() {
        let filter = FilterConfig::default().build();
        let mut state = FilterState::new();

        assert!(filter.accept(&mut state, &fix(52.5, 13.4, Some(5.0))));
        // ~22 m north of the reference.
        assert!(filter.accept(&mut state, &fix(52.5002, 13.4, Some(5.0))));
        assert_eq!(state.last_accepted(), Some((52.5002, 13.4)));

        // ~11 m from the *new* reference: rejected.
        assert!(!filter.accept(&mut state, &fix(52.5003, 13.4, Some(5.0))));
    }

    #[test]
    fn test_reset_forgets_reference() {
        let filter = FilterConfig::default().build();
        let mut state = FilterState::new();

        assert!(filter.accept(&mut state, &fix(52.5, 13.4, Some(5.0))));
        state.reset();

        // Same coordinates pass again: new session, no reference.
        assert!(filter.accept(&mut state, &fix(52.5, 13.4, Some(5.0))));
    }

    #[test]
    fn test_permissive_admits_everything() {
        let config = FilterConfig {
            strategy: FilterStrategy::Permissive,
            ..FilterConfig::default()
        };
        let filter = config.build();
        let mut state = FilterState::new();

        assert!(filter.accept(&mut state, &fix(52.5, 13.4, None)));
        assert!(filter.accept(&mut state, &fix(52.5, 13.4, Some(999.0))));
        assert_eq!(state.last_accepted(), Some((52.5, 13.4)));
    }
}
