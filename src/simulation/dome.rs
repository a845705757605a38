use chrono::Utc;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::angle::Azimuth;
use crate::gateway::{
    CommandGateway, CommandHandle, CommandResponder, GatewayError, MoveRequest,
};
use crate::telemetry::{DomeStateSample, MotionState, TelemetryIngress};

#[derive(Debug, Clone, Copy)]
pub struct MockDomeConfig {
    /// Slew rate, deg/s.
    pub velocity: f64,
    pub telemetry_interval: Duration,
    pub start_azimuth: f64,
    pub enabled: bool,
    /// Go to fault this long after the worker starts.
    pub fault_after: Option<Duration>,
}

impl Default for MockDomeConfig {
    fn default() -> Self {
        Self {
            velocity: 3.0,
            telemetry_interval: Duration::from_millis(200),
            start_azimuth: 0.0,
            enabled: true,
            fault_after: None,
        }
    }
}

#[derive(Debug)]
struct Motion {
    target: Azimuth,
    responder: CommandResponder,
}

#[derive(Debug)]
struct Shared {
    azimuth: Azimuth,
    motion: Option<Motion>,
    enabled: bool,
    faulted: bool,
    stopped: bool,
}

impl Shared {
    /// Advance the dome by `dt` seconds at `velocity`, completing the active
    /// command once the target is reached.
    fn step(&mut self, velocity: f64, dt: f64) {
        if !self.enabled || self.faulted {
            return;
        }
        let Some(motion) = &self.motion else {
            return;
        };
        let error = motion.target.diff(self.azimuth);
        let max_step = velocity * dt;
        if error.abs() <= max_step {
            self.azimuth = motion.target;
            if let Some(done) = self.motion.take() {
                done.responder.complete();
            }
        } else {
            self.azimuth = self.azimuth.offset(max_step.copysign(error));
        }
    }

    /// Enter fault; the active command, if any, is rejected.
    fn fault(&mut self, reason: &str) {
        self.faulted = true;
        if let Some(motion) = self.motion.take() {
            motion.responder.reject(reason);
        }
    }

    fn sample(&self) -> DomeStateSample {
        let motion_state = if self.faulted {
            MotionState::Fault
        } else if self.motion.is_some() {
            MotionState::Moving
        } else {
            MotionState::Stopped
        };
        DomeStateSample {
            azimuth: self.azimuth.degrees(),
            motion_state,
            enabled: self.enabled,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Simulated dome: accepts move commands like the real one and publishes
/// its position as telemetry while slewing at a fixed rate.
#[derive(Debug)]
pub struct MockDome {
    config: MockDomeConfig,
    shared: Arc<StdMutex<Shared>>,
    worker: StdMutex<Option<WorkerHandle>>,
}

impl MockDome {
    pub fn new(config: MockDomeConfig) -> Self {
        Self {
            config,
            shared: Arc::new(StdMutex::new(Shared {
                azimuth: Azimuth::new(config.start_azimuth),
                motion: None,
                enabled: config.enabled,
                faulted: false,
                stopped: false,
            })),
            worker: StdMutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start moving and publishing telemetry. Calling it again is a no-op.
    pub fn start(&self, ingress: TelemetryIngress) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return;
        }
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_dome_loop(
            self.shared.clone(),
            self.config,
            ingress,
            stop_rx,
        ));
        *worker = Some(WorkerHandle { stop_tx, join });
    }

    /// Stop the worker. Later moves fail as if the dome were disconnected.
    pub async fn stop(&self) {
        self.lock().stopped = true;
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.stop_tx.send(());
            let _ = worker.join.await;
        }
    }
}

impl CommandGateway for MockDome {
    fn send_move(&self, request: MoveRequest) -> Result<CommandHandle, GatewayError> {
        let mut locked = self.lock();
        if locked.stopped {
            return Err(GatewayError::Unavailable("mock dome stopped".into()));
        }
        let (responder, handle) = CommandHandle::channel(request.id);
        if locked.faulted {
            responder.reject("dome is in fault");
        } else if !locked.enabled {
            responder.reject("dome is not enabled");
        } else {
            if let Some(previous) = locked.motion.take() {
                previous.responder.reject("superseded by a newer move");
            }
            log::debug!("Mock dome moving to {}", request.azimuth);
            responder.accept();
            locked.motion = Some(Motion {
                target: request.azimuth,
                responder,
            });
        }
        Ok(handle)
    }
}

async fn run_dome_loop(
    shared: Arc<StdMutex<Shared>>,
    config: MockDomeConfig,
    ingress: TelemetryIngress,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval(config.telemetry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let dt = config.telemetry_interval.as_secs_f64();
    let fault_at = config.fault_after.map(|after| Instant::now() + after);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut stop_rx => return,
        }

        let sample = {
            let mut locked = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if !locked.faulted && fault_at.is_some_and(|at| Instant::now() >= at) {
                log::warn!("Mock dome entering simulated fault");
                locked.fault("simulated dome fault");
            }
            locked.step(config.velocity, dt);
            locked.sample()
        };
        if let Err(e) = ingress.dome(sample).await {
            log::warn!("Mock dome stopped publishing: {}", e);
            return;
        }
    }
}
