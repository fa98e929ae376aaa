use axum::{extract::FromRequestParts, http::request::Parts};
use axum_auth::AuthBearer;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    users::User,
    AppState,
};

/// What a route requires from whoever calls it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Public,
    Authenticated,
    Admin,
}

/// The user behind the request's bearer token, if any.
#[derive(Debug)]
pub struct Caller(pub Option<User>);

impl Caller {
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        match (capability, &self.0) {
            (Capability::Public, _) => Ok(()),
            (_, None) => Err(AppError::Unauthenticated),
            (Capability::Authenticated, Some(_)) => Ok(()),
            (Capability::Admin, Some(user)) if user.is_staff => Ok(()),
            (Capability::Admin, Some(_)) => Err(AppError::Forbidden),
        }
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // A request without usable bearer credentials is anonymous.
        let Ok(AuthBearer(token)) = AuthBearer::from_request_parts(parts, state).await else {
            return Ok(Caller(None));
        };

        match User::from_token(&token, &state.db).await? {
            Some(user) => Ok(Caller(Some(user))),
            None => {
                tracing::debug!("Rejected unknown bearer token");
                Err(AppError::InvalidToken)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn user(is_staff: bool) -> User {
        let now = Utc::now().naive_utc();
        User {
            id: "7c7c2a8e-6a43-4d2b-9b84-1f3c0e0a6d11".to_string(),
            username: "robin".to_string(),
            email: None,
            is_staff,
            is_superuser: false,
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn test_anonymous_caller() {
        let caller = Caller(None);
        assert!(caller.require(Capability::Public).is_ok());
        assert!(matches!(
            caller.require(Capability::Authenticated),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            caller.require(Capability::Admin),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_regular_user_caller() {
        let caller = Caller(Some(user(false)));
        assert!(caller.require(Capability::Authenticated).is_ok());
        assert!(matches!(
            caller.require(Capability::Admin),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn test_staff_caller() {
        let caller = Caller(Some(user(true)));
        assert!(caller.require(Capability::Admin).is_ok());
    }

    #[test]
    fn test_capability_from_config_value() {
        let capability: Capability = serde_json::from_str("\"authenticated\"").unwrap();
        assert_eq!(capability, Capability::Authenticated);
    }
}
