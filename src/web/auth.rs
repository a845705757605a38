use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{Config, Permission};
use crate::coordinator::CoordinatorHandle;

#[derive(Clone)]
pub struct AuthenticatedUser {
    pub name: String,
    pub permissions: HashSet<Permission>,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: CoordinatorHandle,
}

pub enum AuthError {
    MissingAuth,
    InvalidFormat,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Missing Authorization header"),
            AuthError::InvalidFormat => (StatusCode::UNAUTHORIZED, "Invalid Authorization format"),
            AuthError::InvalidKey => (StatusCode::UNAUTHORIZED, "Invalid API key"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug)]
pub struct PermissionError(pub Permission);

impl IntoResponse for PermissionError {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Insufficient permissions",
                "required": format!("{:?}", self.0).to_lowercase(),
            })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .ok_or(AuthError::MissingAuth)?
            .to_str()
            .map_err(|_| AuthError::InvalidFormat)?;

        let key = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidFormat)?;

        let api_key = state
            .config
            .find_api_key(key)
            .ok_or(AuthError::InvalidKey)?;

        log::debug!("Request authenticated as {}", api_key.name);
        Ok(AuthenticatedUser {
            name: api_key.name.clone(),
            permissions: api_key.permissions.clone(),
        })
    }
}

pub fn require_permission(
    user: &AuthenticatedUser,
    permission: Permission,
) -> Result<(), PermissionError> {
    if user.has_permission(permission) {
        Ok(())
    } else {
        log::warn!("{} lacks {:?} permission", user.name, permission);
        Err(PermissionError(permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(permissions: &[Permission]) -> AuthenticatedUser {
        AuthenticatedUser {
            name: "operator".into(),
            permissions: permissions.iter().copied().collect(),
        }
    }

    #[test]
    fn permissions_are_checked_individually() {
        let operator = user(&[Permission::Control]);
        assert!(require_permission(&operator, Permission::Control).is_ok());
        assert!(require_permission(&operator, Permission::Configure).is_err());
        assert!(require_permission(&user(&[]), Permission::Telemetry).is_err());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let response = PermissionError(Permission::Configure).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
