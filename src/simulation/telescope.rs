use chrono::Utc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::angle::Azimuth;
use crate::telemetry::{TelescopeTargetSample, TelemetryIngress};

#[derive(Debug, Clone, Copy)]
pub struct MockTelescopeConfig {
    pub start_azimuth: f64,
    /// Azimuth drift, deg/s.
    pub rate: f64,
    pub elevation: f64,
    pub interval: Duration,
}

/// Telescope that drifts in azimuth at a constant rate, publishing its
/// position and velocity on every interval.
pub struct MockTelescope {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl MockTelescope {
    pub fn start(config: MockTelescopeConfig, ingress: TelemetryIngress) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_telescope_loop(config, ingress, stop_rx));
        Self { stop_tx, join }
    }

    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.join.await;
    }
}

pub fn sample_at(config: &MockTelescopeConfig, elapsed: Duration) -> TelescopeTargetSample {
    let azimuth = Azimuth::new(config.start_azimuth + config.rate * elapsed.as_secs_f64());
    TelescopeTargetSample {
        azimuth: azimuth.degrees(),
        elevation: config.elevation,
        azimuth_velocity: Some(config.rate),
        timestamp: Utc::now(),
        valid: true,
    }
}

async fn run_telescope_loop(
    config: MockTelescopeConfig,
    ingress: TelemetryIngress,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let started = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut stop_rx => return,
        }
        let sample = sample_at(&config, started.elapsed());
        if let Err(e) = ingress.telescope(sample).await {
            log::warn!("Mock telescope stopped publishing: {}", e);
            return;
        }
    }
}
