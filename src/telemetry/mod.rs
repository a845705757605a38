mod cache;
mod error;
mod ingress;
mod types;

pub use cache::TelemetryCache;
pub use error::TelemetryError;
pub use ingress::TelemetryIngress;
pub use types::{
    DomeState, DomeStateSample, MotionState, TelemetrySnapshot, TelescopeTarget,
    TelescopeTargetSample, UpdateOutcome,
};
