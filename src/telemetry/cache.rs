use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use super::error::TelemetryError;
use super::types::{
    DomeState, DomeStateSample, TelemetrySnapshot, TelescopeTarget, TelescopeTargetSample,
    UpdateOutcome,
};
use crate::angle::Azimuth;

/// How far ahead of the local clock a sample timestamp may be.
fn max_clock_skew() -> Duration {
    Duration::seconds(1)
}

#[derive(Debug, Default)]
struct Shared {
    snapshot: TelemetrySnapshot,
}

/// Latest telescope and dome state, shared between ingress tasks and the
/// control loop.
#[derive(Debug, Clone)]
pub struct TelemetryCache {
    shared: Arc<StdMutex<Shared>>,
    stale_after: Duration,
}

impl TelemetryCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            shared: Arc::new(StdMutex::new(Shared::default())),
            stale_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.lock().snapshot.clone()
    }

    pub fn update_telescope(
        &self,
        sample: TelescopeTargetSample,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, TelemetryError> {
        validate_telescope(&sample, now)?;

        let mut locked = self.lock();
        if let Some(current) = &locked.snapshot.telescope {
            if sample.timestamp < current.timestamp {
                return Ok(UpdateOutcome::Discarded);
            }
        }

        let fresh = !self.is_expired(sample.timestamp, now);
        locked.snapshot.telescope = Some(TelescopeTarget {
            azimuth: Azimuth::new(sample.azimuth),
            elevation: sample.elevation,
            azimuth_velocity: sample.azimuth_velocity,
            timestamp: sample.timestamp,
            valid: sample.valid && fresh,
        });
        Ok(UpdateOutcome::Applied)
    }

    pub fn update_dome(
        &self,
        sample: DomeStateSample,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, TelemetryError> {
        if !sample.azimuth.is_finite() {
            return Err(TelemetryError::dome(format!(
                "azimuth {} is not finite",
                sample.azimuth
            )));
        }
        if is_from_future(sample.timestamp, now) {
            return Err(TelemetryError::dome(format!(
                "timestamp {} is ahead of local time {}",
                sample.timestamp, now
            )));
        }

        let mut locked = self.lock();
        if let Some(current) = &locked.snapshot.dome {
            if sample.timestamp < current.timestamp {
                return Ok(UpdateOutcome::Discarded);
            }
        }

        locked.snapshot.dome = Some(DomeState {
            azimuth: Azimuth::new(sample.azimuth),
            motion_state: sample.motion_state,
            enabled: sample.enabled,
            timestamp: sample.timestamp,
        });
        Ok(UpdateOutcome::Applied)
    }

    /// Invalidate the telescope entry once it has aged past the staleness
    /// window. Returns true only on the valid -> stale transition.
    pub fn refresh_staleness(&self, now: DateTime<Utc>) -> bool {
        let mut locked = self.lock();
        match locked.snapshot.telescope.as_mut() {
            Some(target) if target.valid && self.is_expired(target.timestamp, now) => {
                target.valid = false;
                true
            }
            _ => false,
        }
    }

    fn is_expired(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - timestamp > self.stale_after
    }
}

fn is_from_future(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    timestamp - now > max_clock_skew()
}

fn validate_telescope(
    sample: &TelescopeTargetSample,
    now: DateTime<Utc>,
) -> Result<(), TelemetryError> {
    if is_from_future(sample.timestamp, now) {
        return Err(TelemetryError::telescope(format!(
            "timestamp {} is ahead of local time {}",
            sample.timestamp, now
        )));
    }
    if !sample.azimuth.is_finite() {
        return Err(TelemetryError::telescope(format!(
            "azimuth {} is not finite",
            sample.azimuth
        )));
    }
    if !sample.elevation.is_finite() || !(-90.0..=90.0).contains(&sample.elevation) {
        return Err(TelemetryError::telescope(format!(
            "elevation {} outside [-90, 90]",
            sample.elevation
        )));
    }
    if let Some(velocity) = sample.azimuth_velocity {
        if !velocity.is_finite() {
            return Err(TelemetryError::telescope(format!(
                "azimuth velocity {} is not finite",
                velocity
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MotionState;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-12T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn telescope(azimuth: f64, at: DateTime<Utc>) -> TelescopeTargetSample {
        TelescopeTargetSample {
            azimuth,
            elevation: 45.0,
            azimuth_velocity: None,
            timestamp: at,
            valid: true,
        }
    }

    fn dome(azimuth: f64, at: DateTime<Utc>) -> DomeStateSample {
        DomeStateSample {
            azimuth,
            motion_state: MotionState::Stopped,
            enabled: true,
            timestamp: at,
        }
    }

    #[test]
    fn empty_cache_has_no_entries() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        assert_eq!(cache.snapshot(), TelemetrySnapshot::default());
    }

    #[test]
    fn newer_sample_replaces_older() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        cache.update_telescope(telescope(10.0, t0()), t0()).unwrap();
        let outcome = cache
            .update_telescope(
                telescope(20.0, t0() + Duration::seconds(1)),
                t0() + Duration::seconds(1),
            )
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied);
        let target = cache.snapshot().telescope.unwrap();
        assert_eq!(target.azimuth.degrees(), 20.0);
        assert!(target.valid);
    }

    #[test]
    fn late_sample_is_discarded() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        let later = t0() + Duration::seconds(2);
        cache.update_telescope(telescope(20.0, later), later).unwrap();
        let outcome = cache.update_telescope(telescope(10.0, t0()), later).unwrap();
        assert_eq!(outcome, UpdateOutcome::Discarded);
        assert_eq!(cache.snapshot().telescope.unwrap().azimuth.degrees(), 20.0);

        cache.update_dome(dome(30.0, later), later).unwrap();
        assert_eq!(
            cache.update_dome(dome(5.0, t0()), later).unwrap(),
            UpdateOutcome::Discarded
        );
        assert_eq!(cache.snapshot().dome.unwrap().azimuth.degrees(), 30.0);
    }

    #[test]
    fn azimuth_is_normalized_on_ingest() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        cache.update_telescope(telescope(-10.0, t0()), t0()).unwrap();
        cache.update_dome(dome(370.0, t0()), t0()).unwrap();
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.telescope.unwrap().azimuth.degrees(), 350.0);
        assert_eq!(snapshot.dome.unwrap().azimuth.degrees(), 10.0);
    }

    #[test]
    fn malformed_samples_leave_cache_untouched() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        cache.update_telescope(telescope(10.0, t0()), t0()).unwrap();

        let mut bad = telescope(f64::NAN, t0() + Duration::seconds(1));
        assert!(cache.update_telescope(bad.clone(), t0()).is_err());
        bad.azimuth = 20.0;
        bad.elevation = 95.0;
        assert!(cache.update_telescope(bad.clone(), t0()).is_err());
        bad.elevation = 45.0;
        bad.azimuth_velocity = Some(f64::INFINITY);
        assert!(cache.update_telescope(bad, t0()).is_err());
        assert!(cache
            .update_dome(dome(f64::NAN, t0() + Duration::seconds(1)), t0())
            .is_err());

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.telescope.unwrap().azimuth.degrees(), 10.0);
        assert!(snapshot.dome.is_none());
    }

    #[test]
    fn staleness_transition_fires_once() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        cache.update_telescope(telescope(10.0, t0()), t0()).unwrap();

        assert!(!cache.refresh_staleness(t0() + Duration::seconds(5)));
        assert!(cache.snapshot().telescope.unwrap().valid);

        assert!(cache.refresh_staleness(t0() + Duration::seconds(6)));
        assert!(!cache.snapshot().telescope.unwrap().valid);
        assert!(!cache.refresh_staleness(t0() + Duration::seconds(7)));

        let fresh = t0() + Duration::seconds(8);
        cache.update_telescope(telescope(12.0, fresh), fresh).unwrap();
        assert!(cache.snapshot().telescope.unwrap().valid);
    }

    #[test]
    fn sample_already_expired_on_arrival_is_invalid() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        cache
            .update_telescope(telescope(10.0, t0()), t0() + Duration::seconds(30))
            .unwrap();
        assert!(!cache.snapshot().telescope.unwrap().valid);
    }

    #[test]
    fn invalid_flag_from_source_is_kept() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        let mut sample = telescope(10.0, t0());
        sample.valid = false;
        cache.update_telescope(sample, t0()).unwrap();
        assert!(!cache.snapshot().telescope.unwrap().valid);
    }

    #[test]
    fn future_samples_are_rejected() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        let ahead = t0() + Duration::hours(1);
        assert!(matches!(
            cache.update_telescope(telescope(90.0, ahead), t0()),
            Err(TelemetryError::Malformed { .. })
        ));
        assert!(matches!(
            cache.update_dome(dome(90.0, ahead), t0()),
            Err(TelemetryError::Malformed { .. })
        ));
        assert_eq!(cache.snapshot(), TelemetrySnapshot::default());

        // Real samples still get through and age out normally.
        let now = t0() + Duration::seconds(1);
        assert_eq!(
            cache.update_telescope(telescope(10.0, now), now).unwrap(),
            UpdateOutcome::Applied
        );
        assert!(cache.refresh_staleness(t0() + Duration::seconds(30)));
        assert!(!cache.snapshot().telescope.unwrap().valid);
    }

    #[test]
    fn small_clock_skew_is_tolerated() {
        let cache = TelemetryCache::new(Duration::seconds(5));
        let slightly_ahead = t0() + Duration::milliseconds(500);
        assert!(cache
            .update_telescope(telescope(10.0, slightly_ahead), t0())
            .is_ok());
        assert!(cache.update_dome(dome(10.0, slightly_ahead), t0()).is_ok());
    }
}
