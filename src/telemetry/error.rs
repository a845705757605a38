use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TelemetryError {
    #[error("malformed {source_name} sample: {reason}")]
    Malformed {
        source_name: &'static str,
        reason: String,
    },
    #[error("coordinator is not accepting telemetry")]
    Closed,
}

impl TelemetryError {
    pub(crate) fn telescope(reason: impl Into<String>) -> Self {
        TelemetryError::Malformed {
            source_name: "telescope",
            reason: reason.into(),
        }
    }

    pub(crate) fn dome(reason: impl Into<String>) -> Self {
        TelemetryError::Malformed {
            source_name: "dome",
            reason: reason.into(),
        }
    }
}
