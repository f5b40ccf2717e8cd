//! # Route Sentry
//!
//! Location-quality filtering and rerouting decisions for turn-by-turn
//! navigation hosts.
//!
//! The heavy machinery of a navigation stack (map rendering, route calculation,
//! guidance voice) lives in the host's vendor SDK. This library owns the small
//! decision core that sits between the host's raw callbacks and that SDK:
//!
//! - **Location filtering** — which raw GPS fixes are trustworthy enough to act on
//! - **Track recording** — accumulating admitted fixes into persistable tracks
//! - **Deviation monitoring** — hysteresis before declaring the user off-route
//! - **Reroute coordination** — at most one in-flight reroute, atomic route swap
//! - **Traffic refresh** — interval-gated traffic recalculation
//!
//! The external routing collaborator is injected through the [`RoutingPort`]
//! trait; the core never reaches for an ambient SDK singleton.
//!
//! Events (location fixes, deviation notifications, progress ticks) are assumed
//! to arrive in chronological order on a single logical delivery stream.
//! Defensive reordering of late or duplicated events is out of scope.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use route_sentry::{FilterConfig, FilterState, GpsFix, LocationFilter};
//!
//! let filter = FilterConfig::default().build();
//! let mut state = FilterState::new();
//!
//! let fix = GpsFix::new(52.520, 13.405, Utc::now()).with_accuracy(5.0);
//! assert!(filter.accept(&mut state, &fix));
//!
//! // A fix with poor accuracy is rejected regardless of movement.
//! let noisy = GpsFix::new(52.521, 13.406, Utc::now()).with_accuracy(50.0);
//! assert!(!filter.accept(&mut state, &noisy));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, SentryError};

// Geographic utilities (great-circle distance)
pub mod geo_utils;

// Location-quality filter strategies
pub mod filter;
pub use filter::{
    DistanceAccuracyFilter, FilterConfig, FilterState, FilterStrategy, LocationFilter,
    PermissiveFilter,
};

// Track model and whole-document persistence
pub mod track;
pub use track::{Track, TrackDocument, TrackStore};

// Filtered track recording
pub mod recorder;
pub use recorder::TrackRecorder;

// Off-route hysteresis
pub mod deviation;
pub use deviation::{DeviationConfig, DeviationMonitor, DeviationSignal};

// Rerouting coordination and the external routing port
pub mod reroute;
pub use reroute::{
    ActiveRoute, RerouteCompletion, RerouteCoordinator, RoutingError, RoutingPort,
    TrafficCompletion,
};

// Interval-gated traffic recalculation
pub mod traffic;
pub use traffic::{TrafficConfig, TrafficRefresher};

// Session dispatcher wiring all concerns together
pub mod session;
pub use session::{EventSink, GuidanceEvent, GuidanceSession, SessionConfig, SessionMode};

// ============================================================================
// Core Types
// ============================================================================

/// A single reported device location.
///
/// Accuracy, bearing and speed are optional because positioning sources
/// (device sensors, simulated playback) do not always provide them.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use route_sentry::GpsFix;
///
/// let fix = GpsFix::new(51.5074, -0.1278, Utc::now()).with_accuracy(8.0);
/// assert!(fix.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, if the source reports one.
    pub accuracy: Option<f64>,
    /// Bearing in degrees from true north.
    pub bearing: Option<f64>,
    /// Speed in m/s.
    pub speed: Option<f64>,
    /// When the fix was produced by the positioning source.
    pub time: DateTime<Utc>,
}

impl GpsFix {
    /// Create a fix with coordinates and timestamp only.
    pub fn new(latitude: f64, longitude: f64, time: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            bearing: None,
            speed: None,
            time,
        }
    }

    /// Set the horizontal accuracy in meters.
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Set the bearing in degrees.
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// Set the speed in m/s.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Check that the coordinates are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Opaque reference to a route calculated by the external routing collaborator.
///
/// The core never inspects route geometry; it only forwards the handle back to
/// the collaborator and replaces it wholesale when a reroute completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteHandle(u64);

impl RouteHandle {
    pub fn new(token: u64) -> Self {
        Self(token)
    }

    /// The host-side token identifying the underlying route object.
    pub fn token(&self) -> u64 {
        self.0
    }
}

/// Traffic-delay annotation for the active route's progress projection.
///
/// Replaced as a whole on each successful traffic refresh; route geometry and
/// distance are never touched by a refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficOverlay {
    /// Remaining traffic delay on the route in seconds.
    pub delay_seconds: f64,
    /// When the collaborator produced this annotation.
    pub fetched_at: DateTime<Utc>,
}

// ============================================================================
// Tests
// ============================================================================
