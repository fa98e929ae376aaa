use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::{error::AppResult, settings::OwnerSettings, validate::new_id};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

const USER_COLUMNS: &str = "id, username, email, is_staff, is_superuser, created_at, modified_at";

impl User {
    pub async fn from_id(id: &str, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let user = sqlx::query_as!(
            User,
            r#"
            SELECT id, username, email, is_staff, is_superuser, created_at, modified_at
            FROM users
            WHERE id = ?
            "#,
            id
        )
        .fetch_optional(db)
        .await?;

        Ok(user)
    }

    pub async fn from_token(token: &str, db: &SqlitePool) -> AppResult<Option<Self>> {
        if token.is_empty() {
            return Ok(None);
        }
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(db)
        .await?;

        Ok(user)
    }

    pub async fn list(db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(db)
        .await?;

        Ok(users)
    }

    pub async fn exists(id: &str, db: &mut SqliteConnection) -> AppResult<bool> {
        let found = sqlx::query!("SELECT id FROM users WHERE id = ?", id)
            .fetch_optional(db)
            .await?;

        Ok(found.is_some())
    }
}

/// Make sure the configured owner account exists and carries the configured
/// token. Returns the owner's id, which becomes the default author.
pub async fn ensure_owner(owner: &OwnerSettings, db: &SqlitePool) -> AppResult<String> {
    let now = Utc::now().naive_utc();
    let token = owner_token(owner);
    let existing = sqlx::query!(r#"SELECT id AS "id!" FROM users WHERE username = ?"#, owner.username)
        .fetch_optional(db)
        .await?;

    let id = match existing {
        Some(row) => {
            sqlx::query!(
                "UPDATE users SET token = ?, modified_at = ? WHERE id = ?",
                token,
                now,
                row.id
            )
            .execute(db)
            .await?;
            row.id
        }
        None => {
            let id = new_id();
            sqlx::query!(
                r#"
                INSERT INTO users (id, username, email, is_staff, is_superuser, token, created_at, modified_at)
                VALUES (?, ?, ?, TRUE, TRUE, ?, ?, ?)
                "#,
                id,
                owner.username,
                owner.email,
                token,
                now,
                now
            )
            .execute(db)
            .await?;
            tracing::info!("Created owner account {}", owner.username);
            id
        }
    };

    Ok(id)
}

// Tokens are unique, so an unset owner token gets a random one nobody knows.
fn owner_token(owner: &OwnerSettings) -> String {
    match owner.token.as_str() {
        "" => new_id(),
        token => token.to_string(),
    }
}
