use chrono::Utc;
use tokio::sync::mpsc;

use super::cache::TelemetryCache;
use super::error::TelemetryError;
use super::types::{DomeStateSample, TelescopeTargetSample, UpdateOutcome};
use crate::coordinator::Event;

/// Producer-side handle: writes samples into the cache and wakes the control
/// loop when something was applied.
#[derive(Debug, Clone)]
pub struct TelemetryIngress {
    cache: TelemetryCache,
    events: mpsc::Sender<Event>,
}

impl TelemetryIngress {
    pub fn new(cache: TelemetryCache, events: mpsc::Sender<Event>) -> Self {
        Self { cache, events }
    }

    pub async fn telescope(
        &self,
        sample: TelescopeTargetSample,
    ) -> Result<UpdateOutcome, TelemetryError> {
        let timestamp = sample.timestamp;
        let outcome = self
            .cache
            .update_telescope(sample, Utc::now())
            .inspect_err(|e| log::warn!("Discarding telescope sample: {}", e))?;

        match outcome {
            UpdateOutcome::Applied => self.notify(Event::TelescopeUpdated).await?,
            UpdateOutcome::Discarded => {
                log::debug!("Ignoring late telescope sample from {}", timestamp)
            }
        }
        Ok(outcome)
    }

    pub async fn dome(&self, sample: DomeStateSample) -> Result<UpdateOutcome, TelemetryError> {
        let timestamp = sample.timestamp;
        let outcome = self
            .cache
            .update_dome(sample, Utc::now())
            .inspect_err(|e| log::warn!("Discarding dome sample: {}", e))?;

        match outcome {
            UpdateOutcome::Applied => self.notify(Event::DomeUpdated).await?,
            UpdateOutcome::Discarded => {
                log::debug!("Ignoring late dome sample from {}", timestamp)
            }
        }
        Ok(outcome)
    }

    /// Report a telemetry source that can no longer be trusted.
    pub async fn report_failure(&self, reason: impl Into<String>) -> Result<(), TelemetryError> {
        self.notify(Event::TelemetryFailed(reason.into())).await
    }

    async fn notify(&self, event: Event) -> Result<(), TelemetryError> {
        self.events
            .send(event)
            .await
            .map_err(|_| TelemetryError::Closed)
    }
}
