use axum::{extract::State, Json};

use crate::algorithm::AlgorithmConfig;
use crate::config::Permission;
use crate::coordinator::{CoordinatorState, CoordinatorStatus};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[utoipa::path(
    post,
    path = "/api/control/enable",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Coordinator enabled", body = CoordinatorState),
        (status = 409, description = "Coordinator in fault or not configured", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing control permission", body = ErrorResponse)
    ),
    tag = "control"
)]
pub async fn enable(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<CoordinatorState>> {
    require_permission(&user, Permission::Control)?;
    log::info!("{} enabled the coordinator", user.name);
    Ok(Json(state.coordinator.enable().await?))
}

#[utoipa::path(
    post,
    path = "/api/control/disable",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Coordinator disabled", body = CoordinatorState),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing control permission", body = ErrorResponse)
    ),
    tag = "control"
)]
pub async fn disable(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<CoordinatorState>> {
    require_permission(&user, Permission::Control)?;
    log::info!("{} disabled the coordinator", user.name);
    Ok(Json(state.coordinator.disable().await?))
}

#[utoipa::path(
    post,
    path = "/api/control/reset_fault",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Fault cleared", body = CoordinatorState),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing control permission", body = ErrorResponse)
    ),
    tag = "control"
)]
pub async fn reset_fault(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<CoordinatorState>> {
    require_permission(&user, Permission::Control)?;
    log::info!("{} reset the coordinator fault", user.name);
    Ok(Json(state.coordinator.reset_fault().await?))
}

#[utoipa::path(
    put,
    path = "/api/algorithm",
    request_body = AlgorithmConfig,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Algorithm applied", body = CoordinatorStatus),
        (status = 400, description = "Unknown algorithm or invalid parameters", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Missing configure permission", body = ErrorResponse)
    ),
    tag = "control"
)]
pub async fn configure(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(config): Json<AlgorithmConfig>,
) -> ApiResult<Json<CoordinatorStatus>> {
    require_permission(&user, Permission::Configure)?;
    log::info!("{} requested algorithm {}", user.name, config.name);
    state.coordinator.configure(config).await?;
    Ok(Json(state.coordinator.status().await?))
}

#[utoipa::path(
    get,
    path = "/api/status",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Coordinator status", body = CoordinatorStatus),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "control"
)]
pub async fn status(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<CoordinatorStatus>> {
    Ok(Json(state.coordinator.status().await?))
}
