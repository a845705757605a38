use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::angle::Azimuth;

/// Raw telescope pointing sample as delivered by the telemetry source.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TelescopeTargetSample {
    pub azimuth: f64,
    pub elevation: f64,
    #[serde(default)]
    pub azimuth_velocity: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

/// Raw dome state sample as delivered by the telemetry source.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DomeStateSample {
    pub azimuth: f64,
    pub motion_state: MotionState,
    pub enabled: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    Stopped,
    Moving,
    Fault,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TelescopeTarget {
    pub azimuth: Azimuth,
    pub elevation: f64,
    pub azimuth_velocity: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DomeState {
    pub azimuth: Azimuth,
    pub motion_state: MotionState,
    pub enabled: bool,
    pub timestamp: DateTime<Utc>,
}

impl DomeState {
    /// Whether the dome may be sent a move command at all.
    pub fn accepts_commands(&self) -> bool {
        self.enabled && self.motion_state != MotionState::Fault
    }
}

/// Consistent view of both telemetry entries, taken under one lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct TelemetrySnapshot {
    pub telescope: Option<TelescopeTarget>,
    pub dome: Option<DomeState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// Sample was older than the stored entry.
    Discarded,
}
