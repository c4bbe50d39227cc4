use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, Identity};

/// Resolves the caller from an `Authorization: Bearer <token>` header.
/// Tokens are opaque and issued at registration; anything beyond this
/// registry (sessions, signing, refresh) lives outside this service.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("malformed authorization header".to_string()))?;

    state
        .tokens
        .get(token)
        .map(|entry| *entry.value())
        .ok_or_else(|| AppError::Unauthorized("unknown token".to_string()))
}

pub fn require_customer(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    match authenticate(state, headers)? {
        Identity::Customer(id) => Ok(id),
        _ => Err(AppError::Unauthorized(
            "customer credentials required".to_string(),
        )),
    }
}

pub fn require_pump(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    match authenticate(state, headers)? {
        Identity::Pump(id) => Ok(id),
        _ => Err(AppError::Unauthorized(
            "fuel pump credentials required".to_string(),
        )),
    }
}

/// Returns `(worker_id, pump_id)` for a delivery-worker caller.
pub fn require_worker(state: &AppState, headers: &HeaderMap) -> Result<(Uuid, Uuid), AppError> {
    match authenticate(state, headers)? {
        Identity::Worker { id, pump_id } => Ok((id, pump_id)),
        _ => Err(AppError::Unauthorized(
            "delivery worker credentials required".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use uuid::Uuid;

    use super::{authenticate, require_pump};
    use crate::error::AppError;
    use crate::state::{AppState, Identity};

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let state = AppState::new(8);
        let result = authenticate(&state, &HeaderMap::new());
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn issued_token_resolves_to_its_identity() {
        let state = AppState::new(8);
        let id = Uuid::new_v4();
        let token = state.issue_token(Identity::Customer(id));

        let identity = authenticate(&state, &bearer(&token)).unwrap();
        assert_eq!(identity, Identity::Customer(id));
    }

    #[test]
    fn role_check_rejects_a_different_role() {
        let state = AppState::new(8);
        let token = state.issue_token(Identity::Customer(Uuid::new_v4()));

        let result = require_pump(&state, &bearer(&token));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
