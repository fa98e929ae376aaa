mod user;

use chrono::Utc;
use serde::{Deserialize, Serialize};
pub use user::*;

use crate::{
    auth::Caller,
    error::{AppError, AppResult, FieldErrors},
    validate::{self, new_id, parse_id, AppJson},
};
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateUserParams {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl CreateUserParams {
    fn validate(&self) -> AppResult<()> {
        let mut errors = FieldErrors::new();
        validate::required(&mut errors, "username", &self.username, 150);
        validate::email(&mut errors, "email", self.email.as_deref(), 254);
        errors.into_result()
    }
}

/// Returned only on creation: the token is never shown again.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedUser {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    AppJson(params): AppJson<CreateUserParams>,
) -> AppResult<impl IntoResponse> {
    caller.require(state.settings.access.users)?;
    params.validate()?;

    let mut db = state.db.acquire().await?;
    let taken = sqlx::query!("SELECT id FROM users WHERE username = ?", params.username)
        .fetch_optional(&mut *db)
        .await?;
    if taken.is_some() {
        return Err(AppError::Validation(FieldErrors::single(
            "username",
            "A user with that username already exists.",
        )));
    }

    let id = new_id();
    let token = new_id();
    let now = Utc::now().naive_utc();
    sqlx::query!(
        r#"
        INSERT INTO users (id, username, email, is_staff, is_superuser, token, created_at, modified_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        id,
        params.username,
        params.email,
        params.is_staff,
        params.is_superuser,
        token,
        now,
        now
    )
    .execute(&mut *db)
    .await?;

    let user = User::from_id(&id, &mut db).await?.ok_or(AppError::NotFound)?;
    tracing::info!("Created user {}", user.username);

    Ok((StatusCode::CREATED, Json(CreatedUser { user, token })))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_users(State(state): State<AppState>, caller: Caller) -> AppResult<Json<Vec<User>>> {
    caller.require(state.settings.access.users)?;

    let mut db = state.db.acquire().await?;
    let users = User::list(&mut db).await?;

    Ok(Json(users))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    caller.require(state.settings.access.users)?;
    let id = parse_id(&id)?;

    let mut db = state.db.acquire().await?;
    let user = User::from_id(&id, &mut db).await?.ok_or(AppError::NotFound)?;

    Ok(Json(user))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    caller.require(state.settings.access.users)?;
    let id = parse_id(&id)?;

    if id == state.owner_id {
        return Err(AppError::Protected(
            "The owner account cannot be deleted.".to_string(),
        ));
    }

    // Authored archers and clubs keep the user alive through the foreign keys.
    let result = sqlx::query!("DELETE FROM users WHERE id = ?", id)
        .execute(&state.db)
        .await?;

    match result.rows_affected() {
        0 => Err(AppError::NotFound),
        _ => {
            tracing::info!("Deleted user {}", id);
            Ok(StatusCode::NO_CONTENT)
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::settings::test::OWNER_TOKEN;
    use crate::tests::create_test_server;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use tracing_test::traced_test;

    pub async fn create_user(server: &TestServer, user: CreateUserParams) -> CreatedUser {
        let response = server
            .post("/users")
            .authorization_bearer(OWNER_TOKEN)
            .json(&user)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    /// A plain, non-staff account.
    pub async fn create_test_user(server: &TestServer) -> CreatedUser {
        create_user(
            server,
            CreateUserParams {
                username: "robin".to_string(),
                email: Some("robin@example.com".to_string()),
                is_staff: false,
                is_superuser: false,
            },
        )
        .await
    }

    #[tokio::test]
    #[traced_test]
    async fn test_create_user() {
        let server = create_test_server().await;
        let created = create_test_user(&server).await;
        assert!(!created.token.is_empty());

        let response = server
            .get(&format!("/users/{}", created.user.id))
            .authorization_bearer(OWNER_TOKEN)
            .await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["username"], "robin");
        assert_eq!(body["is_staff"], false);
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_duplicate_username() {
        let server = create_test_server().await;
        create_test_user(&server).await;

        let response = server
            .post("/users")
            .authorization_bearer(OWNER_TOKEN)
            .json(&json!({ "username": "robin" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["username"].is_array());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_get_users_lists_owner() {
        let server = create_test_server().await;
        create_test_user(&server).await;

        let response = server.get("/users").authorization_bearer(OWNER_TOKEN).await;
        response.assert_status(StatusCode::OK);
        let users: Vec<User> = response.json();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["admin", "robin"]);
        assert!(users[0].is_staff && users[0].is_superuser);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_users_require_admin() {
        let server = create_test_server().await;
        let created = create_test_user(&server).await;

        let response = server.get("/users").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server.get("/users").authorization_bearer(&created.token).await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = server.get("/users").authorization_bearer("bogus").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["detail"], "Invalid token.");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_delete_user() {
        let server = create_test_server().await;
        let created = create_test_user(&server).await;

        let response = server
            .delete(&format!("/users/{}", created.user.id))
            .authorization_bearer(OWNER_TOKEN)
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server
            .get(&format!("/users/{}", created.user.id))
            .authorization_bearer(OWNER_TOKEN)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_owner_cannot_be_deleted() {
        let server = create_test_server().await;
        let response = server.get("/users").authorization_bearer(OWNER_TOKEN).await;
        let users: Vec<User> = response.json();

        let response = server
            .delete(&format!("/users/{}", users[0].id))
            .authorization_bearer(OWNER_TOKEN)
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }
}
