use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};

use super::coordinator::Coordinator;
use super::error::CoordinatorError;
use super::event::{ControlRequest, Event};
use super::state::{CommandOutcome, CoordinatorState, CoordinatorStatus, ShutdownOutcome};
use crate::algorithm::AlgorithmConfig;
use crate::config::CoordinatorConfig;
use crate::gateway::{CommandGateway, CommandHandle, CommandReply, MoveRequest};
use crate::telemetry::{TelemetryCache, TelemetryIngress};

/// Cloneable front end to a running control loop.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    events: mpsc::Sender<Event>,
    cache: TelemetryCache,
}

impl CoordinatorHandle {
    pub fn ingress(&self) -> TelemetryIngress {
        TelemetryIngress::new(self.cache.clone(), self.events.clone())
    }

    pub async fn enable(&self) -> Result<CoordinatorState, CoordinatorError> {
        self.control(ControlRequest::Enable).await?
    }

    pub async fn disable(&self) -> Result<CoordinatorState, CoordinatorError> {
        self.control(ControlRequest::Disable).await
    }

    pub async fn reset_fault(&self) -> Result<CoordinatorState, CoordinatorError> {
        self.control(ControlRequest::ResetFault).await
    }

    pub async fn configure(&self, config: AlgorithmConfig) -> Result<(), CoordinatorError> {
        self.control(|reply| ControlRequest::Configure(config, reply))
            .await?
            .map_err(CoordinatorError::from)
    }

    pub async fn status(&self) -> Result<CoordinatorStatus, CoordinatorError> {
        self.control(ControlRequest::Status).await
    }

    /// Stop the loop, waiting (bounded by the shutdown timeout) for an
    /// in-flight command to finish first.
    pub async fn shutdown(&self) -> Result<ShutdownOutcome, CoordinatorError> {
        self.request(Event::Shutdown).await
    }

    async fn control<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControlRequest,
    ) -> Result<T, CoordinatorError> {
        self.request(|reply| Event::Control(make(reply))).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Event,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(make(tx))
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)
    }
}

/// Start the control loop on the current tokio runtime.
pub fn spawn(
    coordinator: Coordinator,
    gateway: Arc<dyn CommandGateway>,
    config: &CoordinatorConfig,
) -> (CoordinatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let handle = CoordinatorHandle {
        events: tx.clone(),
        cache: coordinator.cache().clone(),
    };
    let control_loop = ControlLoop {
        coordinator,
        gateway,
        events_tx: tx,
        events: rx,
        waiters: JoinSet::new(),
        heartbeat_interval: config.heartbeat_interval,
        command_timeout: config.command_timeout,
        shutdown_timeout: config.shutdown_timeout,
    };
    let join = tokio::spawn(control_loop.run());
    (handle, join)
}

struct ControlLoop {
    coordinator: Coordinator,
    gateway: Arc<dyn CommandGateway>,
    events_tx: mpsc::Sender<Event>,
    events: mpsc::Receiver<Event>,
    waiters: JoinSet<()>,
    heartbeat_interval: Duration,
    command_timeout: Duration,
    shutdown_timeout: Duration,
}

impl ControlLoop {
    async fn run(mut self) {
        let mut heartbeat = interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    if let Some(reply) = self.handle(event) {
                        let outcome = self.drain().await;
                        let _ = reply.send(outcome);
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    let request = self.coordinator.on_tick(Utc::now());
                    self.dispatch(request);
                }
                Some(joined) = self.waiters.join_next(), if !self.waiters.is_empty() => {
                    if let Err(e) = joined {
                        log::error!("Command waiter failed: {}", e);
                    }
                }
            }
        }

        self.waiters.abort_all();
        log::info!("Coordinator stopped in state {}", self.coordinator.state());
    }

    /// Apply one event. Returns the reply channel when the event asks the
    /// loop to stop.
    fn handle(&mut self, event: Event) -> Option<oneshot::Sender<ShutdownOutcome>> {
        let now = Utc::now();
        let request = match event {
            Event::TelescopeUpdated => self.coordinator.on_telescope_updated(now),
            Event::DomeUpdated => self.coordinator.on_dome_updated(now),
            Event::TelemetryFailed(reason) => {
                self.coordinator.on_telemetry_failed(reason, now);
                None
            }
            Event::CommandAcknowledged(id) => {
                self.coordinator.on_command_acknowledged(id);
                None
            }
            Event::CommandFinished { id, outcome } => {
                self.coordinator.on_command_finished(id, outcome, now)
            }
            Event::Control(request) => self.control(request),
            Event::Shutdown(reply) => return Some(reply),
        };
        self.dispatch(request);
        None
    }

    fn control(&mut self, request: ControlRequest) -> Option<MoveRequest> {
        let now = Utc::now();
        match request {
            ControlRequest::Enable(reply) => {
                let result = self.coordinator.enable(now);
                let state = self.coordinator.state();
                match result {
                    Ok(request) => {
                        let _ = reply.send(Ok(state));
                        request
                    }
                    Err(e) => {
                        log::warn!("Enable refused: {}", e);
                        let _ = reply.send(Err(e));
                        None
                    }
                }
            }
            ControlRequest::Disable(reply) => {
                let _ = reply.send(self.coordinator.disable());
                None
            }
            ControlRequest::ResetFault(reply) => {
                let _ = reply.send(self.coordinator.reset_fault());
                None
            }
            ControlRequest::Configure(config, reply) => {
                match self.coordinator.configure(config, now) {
                    Ok(request) => {
                        let _ = reply.send(Ok(()));
                        request
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        None
                    }
                }
            }
            ControlRequest::Status(reply) => {
                let _ = reply.send(self.coordinator.status());
                None
            }
        }
    }

    /// Hand a move to the gateway and start waiting for its outcome.
    fn dispatch(&mut self, request: Option<MoveRequest>) {
        let mut next = request;
        while let Some(request) = next.take() {
            match self.gateway.send_move(request) {
                Ok(handle) => {
                    let events = self.events_tx.clone();
                    let deadline = Instant::now() + self.command_timeout;
                    self.waiters
                        .spawn(await_outcome(handle, deadline, events));
                }
                Err(e) => {
                    log::error!("Gateway refused move to {}: {}", request.azimuth, e);
                    next = self.coordinator.on_command_finished(
                        request.id,
                        CommandOutcome::Rejected(e.to_string()),
                        Utc::now(),
                    );
                }
            }
        }
    }

    async fn drain(&mut self) -> ShutdownOutcome {
        self.coordinator.disable();
        let Some(id) = self.coordinator.pending().map(|p| p.id) else {
            return ShutdownOutcome::Idle;
        };

        log::info!(
            "Waiting up to {:?} for command {} before shutting down",
            self.shutdown_timeout,
            id
        );
        let deadline = Instant::now() + self.shutdown_timeout;
        loop {
            match timeout_at(deadline, self.events.recv()).await {
                Ok(Some(Event::CommandFinished { id, outcome })) => {
                    self.coordinator.on_command_finished(id, outcome, Utc::now());
                }
                Ok(Some(Event::CommandAcknowledged(id))) => {
                    self.coordinator.on_command_acknowledged(id);
                }
                // Control and shutdown requests see their reply channel
                // dropped and report the coordinator as stopped.
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => {
                    log::warn!("Abandoning in-flight command {}", id);
                    return ShutdownOutcome::Abandoned(id);
                }
            }
            if self.coordinator.pending().is_none() {
                return ShutdownOutcome::Drained;
            }
        }
    }
}

/// Follow one command until it reaches a terminal status or the deadline
/// passes, reporting back to the control loop.
async fn await_outcome(mut handle: CommandHandle, deadline: Instant, events: mpsc::Sender<Event>) {
    let id = handle.id();
    let outcome = loop {
        match timeout_at(deadline, handle.next_reply()).await {
            Err(_) => break CommandOutcome::TimedOut,
            Ok(None) => break CommandOutcome::Rejected("gateway dropped the command".into()),
            Ok(Some(CommandReply::Accepted)) => {
                if events.send(Event::CommandAcknowledged(id)).await.is_err() {
                    return;
                }
            }
            Ok(Some(CommandReply::Completed)) => break CommandOutcome::Completed,
            Ok(Some(CommandReply::Rejected(reason))) => break CommandOutcome::Rejected(reason),
        }
    };
    let _ = events.send(Event::CommandFinished { id, outcome }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CommandStatus;
    use crate::fault::FaultKind;
    use crate::gateway::{CommandResponder, GatewayError};
    use crate::telemetry::{DomeStateSample, MotionState, TelescopeTargetSample};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct ScriptedGateway {
        refuse: AtomicBool,
        sent: StdMutex<Vec<(MoveRequest, CommandResponder)>>,
    }

    impl ScriptedGateway {
        fn requests(&self) -> Vec<MoveRequest> {
            self.sent.lock().unwrap().iter().map(|(r, _)| *r).collect()
        }

        fn responder(&self, index: usize) -> CommandResponder {
            self.sent.lock().unwrap()[index].1.clone()
        }
    }

    impl CommandGateway for ScriptedGateway {
        fn send_move(&self, request: MoveRequest) -> Result<CommandHandle, GatewayError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(GatewayError::Unavailable("link down".into()));
            }
            let (responder, handle) = CommandHandle::channel(request.id);
            self.sent.lock().unwrap().push((request, responder));
            Ok(handle)
        }
    }

    fn start(gateway: Arc<ScriptedGateway>, config: CoordinatorConfig) -> CoordinatorHandle {
        let cache = TelemetryCache::new(chrono::Duration::hours(1));
        let mut coordinator = Coordinator::new(cache, config.dead_band);
        coordinator
            .configure(AlgorithmConfig::new("simple"), Utc::now())
            .unwrap();
        let (handle, _join) = spawn(coordinator, gateway, &config);
        handle
    }

    async fn dome_at(handle: &CoordinatorHandle, azimuth: f64) {
        handle
            .ingress()
            .dome(DomeStateSample {
                azimuth,
                motion_state: MotionState::Stopped,
                enabled: true,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn telescope_at(handle: &CoordinatorHandle, azimuth: f64) {
        handle
            .ingress()
            .telescope(TelescopeTargetSample {
                azimuth,
                elevation: 45.0,
                azimuth_velocity: None,
                timestamp: Utc::now(),
                valid: true,
            })
            .await
            .unwrap();
    }

    async fn wait_for(
        handle: &CoordinatorHandle,
        check: impl Fn(&CoordinatorStatus) -> bool,
    ) -> CoordinatorStatus {
        for _ in 0..100 {
            let status = handle.status().await.unwrap();
            if check(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("coordinator never reached the expected status");
    }

    #[tokio::test(start_paused = true)]
    async fn follows_telescope_and_issues_deferred_target() {
        let gateway = Arc::new(ScriptedGateway::default());
        let handle = start(gateway.clone(), CoordinatorConfig::default());

        assert_eq!(handle.enable().await.unwrap(), CoordinatorState::Enabled);
        dome_at(&handle, 10.0).await;
        telescope_at(&handle, 16.0).await;
        handle.status().await.unwrap();
        let sent = gateway.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].azimuth.degrees(), 16.0);

        gateway.responder(0).accept();
        wait_for(&handle, |s| {
            s.pending_command.as_ref().map(|p| p.status) == Some(CommandStatus::Acknowledged)
        })
        .await;

        telescope_at(&handle, 20.0).await;
        let status = handle.status().await.unwrap();
        assert_eq!(gateway.requests().len(), 1);
        assert_eq!(status.desired_azimuth.map(|a| a.degrees()), Some(20.0));

        gateway.responder(0).complete();
        wait_for(&handle, |s| {
            s.pending_command.as_ref().map(|p| p.target_azimuth.degrees()) == Some(20.0)
        })
        .await;
        let sent = gateway.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].azimuth.degrees(), 20.0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_gateway_times_out_into_fault() {
        let gateway = Arc::new(ScriptedGateway::default());
        let config = CoordinatorConfig {
            command_timeout: Duration::from_secs(5),
            ..CoordinatorConfig::default()
        };
        let handle = start(gateway.clone(), config);

        handle.enable().await.unwrap();
        dome_at(&handle, 0.0).await;
        telescope_at(&handle, 90.0).await;
        handle.status().await.unwrap();
        assert_eq!(gateway.requests().len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let status = wait_for(&handle, |s| s.state == CoordinatorState::Fault).await;
        assert_eq!(
            status.last_fault.map(|f| f.kind),
            Some(FaultKind::CommandTimedOut)
        );
        assert!(status.pending_command.is_none());
        assert_eq!(
            status.last_command.map(|c| c.status),
            Some(CommandStatus::TimedOut)
        );

        telescope_at(&handle, 120.0).await;
        handle.status().await.unwrap();
        assert_eq!(gateway.requests().len(), 1);

        assert_eq!(handle.enable().await, Err(CoordinatorError::Faulted));
        assert_eq!(handle.reset_fault().await.unwrap(), CoordinatorState::Disabled);
        assert_eq!(handle.enable().await.unwrap(), CoordinatorState::Enabled);
        handle.status().await.unwrap();
        assert_eq!(gateway.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_send_faults() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.refuse.store(true, Ordering::SeqCst);
        let handle = start(gateway.clone(), CoordinatorConfig::default());

        handle.enable().await.unwrap();
        dome_at(&handle, 0.0).await;
        telescope_at(&handle, 90.0).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.state, CoordinatorState::Fault);
        assert_eq!(
            status.last_fault.map(|f| f.kind),
            Some(FaultKind::CommandRejected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_configuration_keeps_active_algorithm() {
        let gateway = Arc::new(ScriptedGateway::default());
        let handle = start(gateway, CoordinatorConfig::default());

        let err = handle
            .configure(AlgorithmConfig::new("spiral"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Registry(_)));

        let err = handle
            .configure(AlgorithmConfig::new("simple").with_parameter("max_delta_azimuth", -1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Registry(_)));

        let status = handle.status().await.unwrap();
        assert_eq!(status.algorithm.map(|a| a.name), Some("simple".to_string()));

        handle
            .configure(AlgorithmConfig::new("simple").with_parameter("max_delta_azimuth", 2.0))
            .await
            .unwrap();
        let status = handle.status().await.unwrap();
        assert!(status.algorithm.unwrap().config.contains("max_delta_azimuth: 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_when_idle() {
        let gateway = Arc::new(ScriptedGateway::default());
        let handle = start(gateway, CoordinatorConfig::default());
        assert_eq!(handle.shutdown().await.unwrap(), ShutdownOutcome::Idle);
        assert_eq!(handle.status().await, Err(CoordinatorError::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_in_flight_command() {
        let gateway = Arc::new(ScriptedGateway::default());
        let handle = start(gateway.clone(), CoordinatorConfig::default());

        handle.enable().await.unwrap();
        dome_at(&handle, 0.0).await;
        telescope_at(&handle, 90.0).await;
        handle.status().await.unwrap();
        let responder = gateway.responder(0);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            responder.complete();
        });

        assert_eq!(handle.shutdown().await.unwrap(), ShutdownOutcome::Drained);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_after_timeout() {
        let gateway = Arc::new(ScriptedGateway::default());
        let config = CoordinatorConfig {
            shutdown_timeout: Duration::from_secs(2),
            ..CoordinatorConfig::default()
        };
        let handle = start(gateway.clone(), config);

        handle.enable().await.unwrap();
        dome_at(&handle, 0.0).await;
        telescope_at(&handle, 90.0).await;
        handle.status().await.unwrap();
        let id = gateway.requests()[0].id;

        assert_eq!(
            handle.shutdown().await.unwrap(),
            ShutdownOutcome::Abandoned(id)
        );
    }
}
