use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::telemetry::{FailureReport, IngestResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::control::enable,
        super::api::control::disable,
        super::api::control::reset_fault,
        super::api::control::configure,
        super::api::control::status,
        super::api::telemetry::telescope,
        super::api::telemetry::dome,
        super::api::telemetry::failure,
    ),
    components(
        schemas(
            ErrorResponse,
            IngestResponse,
            FailureReport,
            crate::algorithm::AlgorithmConfig,
            crate::coordinator::CoordinatorState,
            crate::coordinator::CoordinatorStatus,
            crate::coordinator::CommandStatus,
            crate::coordinator::PendingCommand,
            crate::coordinator::AlgorithmStatus,
            crate::fault::FaultKind,
            crate::fault::FaultReport,
            crate::telemetry::TelescopeTargetSample,
            crate::telemetry::DomeStateSample,
            crate::telemetry::MotionState,
            crate::telemetry::TelemetrySnapshot,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Dome Trajectory API",
        description = "Control and telemetry API for the dome pointing coordinator",
        version = "0.1.0"
    ),
    tags(
        (name = "control", description = "Coordinator control and status"),
        (name = "telemetry", description = "Telescope and dome telemetry ingress")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
