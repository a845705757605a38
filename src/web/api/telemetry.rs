use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Permission;
use crate::telemetry::{DomeStateSample, TelescopeTargetSample, UpdateOutcome};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    /// False when the sample was older than the one already held.
    pub applied: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct FailureReport {
    pub reason: String,
}

impl From<UpdateOutcome> for IngestResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        IngestResponse {
            applied: outcome == UpdateOutcome::Applied,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/telemetry/telescope",
    request_body = TelescopeTargetSample,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Sample processed", body = IngestResponse),
        (status = 400, description = "Malformed sample", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing telemetry permission", body = ErrorResponse)
    ),
    tag = "telemetry"
)]
pub async fn telescope(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(sample): Json<TelescopeTargetSample>,
) -> ApiResult<Json<IngestResponse>> {
    require_permission(&user, Permission::Telemetry)?;
    let outcome = state.coordinator.ingress().telescope(sample).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/telemetry/dome",
    request_body = DomeStateSample,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Sample processed", body = IngestResponse),
        (status = 400, description = "Malformed sample", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing telemetry permission", body = ErrorResponse)
    ),
    tag = "telemetry"
)]
pub async fn dome(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(sample): Json<DomeStateSample>,
) -> ApiResult<Json<IngestResponse>> {
    require_permission(&user, Permission::Telemetry)?;
    let outcome = state.coordinator.ingress().dome(sample).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/api/telemetry/failure",
    request_body = FailureReport,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 204, description = "Failure reported"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing telemetry permission", body = ErrorResponse)
    ),
    tag = "telemetry"
)]
pub async fn failure(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(report): Json<FailureReport>,
) -> ApiResult<StatusCode> {
    require_permission(&user, Permission::Telemetry)?;
    log::warn!("{} reported a telemetry failure: {}", user.name, report.reason);
    state.coordinator.ingress().report_failure(report.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}
