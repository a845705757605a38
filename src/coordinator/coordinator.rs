use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::CoordinatorError;
use super::state::{
    AlgorithmStatus, CommandOutcome, CommandStatus, CoordinatorState, CoordinatorStatus,
    PendingCommand,
};
use crate::algorithm::{ActiveAlgorithm, AlgorithmConfig, Decision, RegistryError};
use crate::angle::Azimuth;
use crate::fault::{FaultKind, FaultReport};
use crate::gateway::MoveRequest;
use crate::telemetry::{DomeState, MotionState, TelemetryCache};

/// Dome-following state machine.
///
/// Every method is synchronous and takes the current time explicitly; the
/// runtime feeds it events one at a time and forwards any [`MoveRequest`] it
/// returns to the command gateway.
#[derive(Debug)]
pub struct Coordinator {
    state: CoordinatorState,
    active: Option<ActiveAlgorithm>,
    cache: TelemetryCache,
    dead_band: f64,
    pending: Option<PendingCommand>,
    last_command: Option<PendingCommand>,
    desired: Option<Azimuth>,
    last_commanded: Option<Azimuth>,
    last_fault: Option<FaultReport>,
}

impl Coordinator {
    pub fn new(cache: TelemetryCache, dead_band: f64) -> Self {
        Self {
            state: CoordinatorState::Disabled,
            active: None,
            cache,
            dead_band,
            pending: None,
            last_command: None,
            desired: None,
            last_commanded: None,
            last_fault: None,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn cache(&self) -> &TelemetryCache {
        &self.cache
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    /// Replace the active algorithm. On error nothing changes.
    pub fn configure(
        &mut self,
        config: AlgorithmConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<MoveRequest>, RegistryError> {
        let active = ActiveAlgorithm::build(config).inspect_err(|e| {
            log::warn!("Rejected algorithm configuration: {}", e);
        })?;
        log::info!(
            "Applied algorithm {} with config:\n{}",
            active.config().name,
            active.config().parameters_yaml()
        );
        self.active = Some(active);
        Ok(self.evaluate(now))
    }

    pub fn enable(&mut self, now: DateTime<Utc>) -> Result<Option<MoveRequest>, CoordinatorError> {
        match self.state {
            CoordinatorState::Enabled => Ok(None),
            CoordinatorState::Fault => Err(CoordinatorError::Faulted),
            CoordinatorState::Disabled => {
                if self.active.is_none() {
                    return Err(CoordinatorError::NotConfigured);
                }
                self.transition(CoordinatorState::Enabled);
                self.last_commanded = None;
                Ok(self.evaluate(now))
            }
        }
    }

    /// Stop issuing commands. A command already in flight is left to finish.
    pub fn disable(&mut self) -> CoordinatorState {
        if self.state == CoordinatorState::Enabled {
            self.transition(CoordinatorState::Disabled);
            self.desired = None;
        }
        self.state
    }

    pub fn reset_fault(&mut self) -> CoordinatorState {
        if self.state == CoordinatorState::Fault {
            self.transition(CoordinatorState::Disabled);
        }
        self.state
    }

    pub fn on_telescope_updated(&mut self, now: DateTime<Utc>) -> Option<MoveRequest> {
        self.evaluate(now)
    }

    pub fn on_dome_updated(&mut self, now: DateTime<Utc>) -> Option<MoveRequest> {
        if let Some(dome) = self.cache.snapshot().dome {
            if dome.motion_state == MotionState::Fault {
                self.fault(
                    FaultKind::RemoteFault,
                    format!("dome reports fault at azimuth {}", dome.azimuth),
                    now,
                );
                return None;
            }
        }
        self.evaluate(now)
    }

    /// Periodic heartbeat; also where silent telescopes are noticed.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> Option<MoveRequest> {
        self.refresh_staleness(now);
        self.evaluate(now)
    }

    pub fn on_telemetry_failed(&mut self, reason: String, now: DateTime<Utc>) {
        self.fault(FaultKind::TelemetryFailure, reason, now);
    }

    pub fn on_command_acknowledged(&mut self, id: Uuid) {
        match self.pending.as_mut() {
            Some(pending) if pending.id == id && pending.status == CommandStatus::InFlight => {
                log::debug!("Dome accepted move to {}", pending.target_azimuth);
                pending.status = CommandStatus::Acknowledged;
            }
            _ => log::debug!("Ignoring acknowledgement for command {}", id),
        }
    }

    pub fn on_command_finished(
        &mut self,
        id: Uuid,
        outcome: CommandOutcome,
        now: DateTime<Utc>,
    ) -> Option<MoveRequest> {
        if self.pending.as_ref().map(|p| p.id) != Some(id) {
            log::debug!("Ignoring result for unknown command {}", id);
            return None;
        }
        let mut finished = self.pending.take()?;
        finished.status = outcome.status();
        log::info!(
            "Move to {} finished: {}",
            finished.target_azimuth,
            finished.status
        );
        let target = finished.target_azimuth;
        self.last_command = Some(finished);

        match outcome {
            CommandOutcome::Completed => {
                let desired = self.desired.take()?;
                if self.state != CoordinatorState::Enabled {
                    return None;
                }
                self.refresh_staleness(now);
                let snapshot = self.cache.snapshot();
                if !snapshot.telescope.is_some_and(|t| t.valid) {
                    log::debug!(
                        "Dropping deferred move to {}: telescope data invalid",
                        desired
                    );
                    return None;
                }
                self.request_move(desired, &snapshot.dome?, now)
            }
            CommandOutcome::Rejected(reason) => {
                self.abandon_intent();
                self.fault(
                    FaultKind::CommandRejected,
                    format!("move to {} rejected: {}", target, reason),
                    now,
                );
                None
            }
            CommandOutcome::TimedOut => {
                self.abandon_intent();
                self.fault(
                    FaultKind::CommandTimedOut,
                    format!("move to {} did not finish in time", target),
                    now,
                );
                None
            }
        }
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            state: self.state,
            algorithm: self.active.as_ref().map(|active| AlgorithmStatus {
                name: active.config().name.clone(),
                config: active.config().parameters_yaml(),
            }),
            pending_command: self.pending.clone(),
            last_command: self.last_command.clone(),
            desired_azimuth: self.desired,
            last_commanded_azimuth: self.last_commanded,
            last_fault: self.last_fault.clone(),
            telemetry: self.cache.snapshot(),
        }
    }

    fn evaluate(&mut self, now: DateTime<Utc>) -> Option<MoveRequest> {
        if self.state != CoordinatorState::Enabled {
            return None;
        }
        self.refresh_staleness(now);

        let snapshot = self.cache.snapshot();
        let (Some(telescope), Some(dome)) = (snapshot.telescope, snapshot.dome) else {
            log::debug!("Skipping evaluation: telemetry incomplete");
            return None;
        };
        let decision = self
            .active
            .as_ref()?
            .algorithm()
            .evaluate(dome.azimuth, &telescope);

        match decision {
            Decision::NoAction => {
                self.desired = None;
                None
            }
            Decision::MoveTo(azimuth) => self.request_move(azimuth, &dome, now),
        }
    }

    fn request_move(
        &mut self,
        azimuth: Azimuth,
        dome: &DomeState,
        now: DateTime<Utc>,
    ) -> Option<MoveRequest> {
        if !dome.accepts_commands() {
            log::debug!(
                "Not commanding dome to {}: enabled={}, motion={:?}",
                azimuth,
                dome.enabled,
                dome.motion_state
            );
            return None;
        }
        if let Some(pending) = &self.pending {
            log::debug!(
                "Deferring move to {} until move to {} finishes",
                azimuth,
                pending.target_azimuth
            );
            self.desired = Some(azimuth);
            return None;
        }
        if let Some(last) = self.last_commanded {
            if azimuth.diff(last).abs() <= self.dead_band {
                return None;
            }
        }

        let request = MoveRequest {
            id: Uuid::new_v4(),
            azimuth,
        };
        log::info!("Commanding dome to {} (command {})", azimuth, request.id);
        self.pending = Some(PendingCommand {
            id: request.id,
            target_azimuth: azimuth,
            issued_at: now,
            status: CommandStatus::InFlight,
        });
        self.last_commanded = Some(azimuth);
        self.desired = None;
        Some(request)
    }

    fn refresh_staleness(&self, now: DateTime<Utc>) {
        if self.cache.refresh_staleness(now) {
            log::warn!("Telescope telemetry went stale; holding dome position");
        }
    }

    fn abandon_intent(&mut self) {
        self.desired = None;
        self.last_commanded = None;
    }

    fn fault(&mut self, kind: FaultKind, reason: String, now: DateTime<Utc>) {
        if self.state != CoordinatorState::Enabled {
            log::warn!("{} while {}: {}", kind, self.state, reason);
            return;
        }
        log::error!("Fault ({}): {}", kind, reason);
        self.last_fault = Some(FaultReport {
            kind,
            reason,
            at: now,
        });
        self.desired = None;
        self.transition(CoordinatorState::Fault);
    }

    fn transition(&mut self, to: CoordinatorState) {
        log::info!("Coordinator state {} -> {}", self.state, to);
        self.state = to;
    }
}
