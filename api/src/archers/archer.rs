use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::{AppResult, FieldErrors},
    slug::slugify,
    validate::{self, new_id, patch_field},
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Archer {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub slug: String,
    pub union_number: Option<i64>,
    pub info: Option<String>,
    pub author: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

pub(crate) const ARCHER_COLUMNS: &str = r#"
    id, created_at, modified_at, last_name, first_name, middle_name, slug,
    union_number, info, author_id AS author, email, phone, address, city,
    state, zip_code, birth_date
"#;

/// `"<last> <first> <middle>"`, keeping both separators even without a middle name.
pub fn display_name(last_name: &str, first_name: &str, middle_name: Option<&str>) -> String {
    format!("{} {} {}", last_name, first_name, middle_name.unwrap_or_default())
}

impl fmt::Display for Archer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_name(
            &self.last_name,
            &self.first_name,
            self.middle_name.as_deref(),
        ))
    }
}

/// Every writable archer field, as accepted by create and full update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArcherParams {
    pub last_name: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub union_number: Option<i64>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// Partial update: absent fields keep their value, `null` clears a nullable one.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ArcherPatch {
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub middle_name: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub union_number: Option<Option<i64>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub info: Option<Option<String>>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub city: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub state: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub zip_code: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub birth_date: Option<Option<NaiveDate>>,
}

impl ArcherParams {
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = FieldErrors::new();
        validate::required(&mut errors, "last_name", &self.last_name, 64);
        validate::required(&mut errors, "first_name", &self.first_name, 32);
        validate::optional(&mut errors, "middle_name", self.middle_name.as_deref(), 6);
        validate::non_negative(&mut errors, "union_number", self.union_number);
        validate::email(&mut errors, "email", self.email.as_deref(), 254);
        validate::optional(&mut errors, "phone", self.phone.as_deref(), 15);
        validate::optional(&mut errors, "address", self.address.as_deref(), 128);
        validate::optional(&mut errors, "city", self.city.as_deref(), 64);
        validate::optional(&mut errors, "state", self.state.as_deref(), 64);
        validate::optional(&mut errors, "zip_code", self.zip_code.as_deref(), 6);
        errors.into_result()
    }

    pub fn apply(mut self, patch: ArcherPatch) -> Self {
        if let Some(last_name) = patch.last_name {
            self.last_name = last_name;
        }
        if let Some(first_name) = patch.first_name {
            self.first_name = first_name;
        }
        if let Some(author) = patch.author {
            self.author = Some(author);
        }
        patch_field(&mut self.middle_name, patch.middle_name);
        patch_field(&mut self.union_number, patch.union_number);
        patch_field(&mut self.info, patch.info);
        patch_field(&mut self.email, patch.email);
        patch_field(&mut self.phone, patch.phone);
        patch_field(&mut self.address, patch.address);
        patch_field(&mut self.city, patch.city);
        patch_field(&mut self.state, patch.state);
        patch_field(&mut self.zip_code, patch.zip_code);
        patch_field(&mut self.birth_date, patch.birth_date);
        self
    }
}

impl From<Archer> for ArcherParams {
    fn from(archer: Archer) -> Self {
        Self {
            last_name: archer.last_name,
            first_name: archer.first_name,
            middle_name: archer.middle_name,
            union_number: archer.union_number,
            info: archer.info,
            author: Some(archer.author),
            email: archer.email,
            phone: archer.phone,
            address: archer.address,
            city: archer.city,
            state: archer.state,
            zip_code: archer.zip_code,
            birth_date: archer.birth_date,
        }
    }
}

impl Archer {
    pub async fn from_id(id: &str, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let archer = sqlx::query_as::<_, Archer>(&format!(
            "SELECT {ARCHER_COLUMNS} FROM archers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(archer)
    }

    pub async fn exists(id: &str, db: &mut SqliteConnection) -> AppResult<bool> {
        let found = sqlx::query!("SELECT id FROM archers WHERE id = ?", id)
            .fetch_optional(db)
            .await?;

        Ok(found.is_some())
    }

    /// Whether another archer than `except` already holds `union_number`.
    pub async fn union_number_taken(
        union_number: i64,
        except: Option<&str>,
        db: &mut SqliteConnection,
    ) -> AppResult<bool> {
        let found = sqlx::query!(
            "SELECT id FROM archers WHERE union_number = ? AND id IS NOT ?",
            union_number,
            except
        )
        .fetch_optional(db)
        .await?;

        Ok(found.is_some())
    }

    pub async fn list(db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let archers = sqlx::query_as::<_, Archer>(&format!(
            "SELECT {ARCHER_COLUMNS} FROM archers ORDER BY rowid"
        ))
        .fetch_all(db)
        .await?;

        Ok(archers)
    }

    /// Insert a validated archer owned by `author`, returning the new id.
    pub async fn insert(
        params: &ArcherParams,
        author: &str,
        db: &mut SqliteConnection,
    ) -> AppResult<String> {
        let id = new_id();
        let slug = slugify(&params.last_name);
        let now = Utc::now().naive_utc();
        sqlx::query!(
            r#"
            INSERT INTO archers (
                id, last_name, first_name, middle_name, slug, union_number, info,
                author_id, email, phone, address, city, state, zip_code, birth_date,
                created_at, modified_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            id,
            params.last_name,
            params.first_name,
            params.middle_name,
            slug,
            params.union_number,
            params.info,
            author,
            params.email,
            params.phone,
            params.address,
            params.city,
            params.state,
            params.zip_code,
            params.birth_date,
            now,
            now
        )
        .execute(db)
        .await?;

        Ok(id)
    }

    /// Overwrite every writable field and recompute the slug.
    pub async fn update(
        id: &str,
        params: &ArcherParams,
        author: &str,
        db: &mut SqliteConnection,
    ) -> AppResult<()> {
        let slug = slugify(&params.last_name);
        let now = Utc::now().naive_utc();
        sqlx::query!(
            r#"
            UPDATE archers SET
                last_name = ?, first_name = ?, middle_name = ?, slug = ?,
                union_number = ?, info = ?, author_id = ?, email = ?, phone = ?,
                address = ?, city = ?, state = ?, zip_code = ?, birth_date = ?,
                modified_at = ?
            WHERE id = ?
            "#,
            params.last_name,
            params.first_name,
            params.middle_name,
            slug,
            params.union_number,
            params.info,
            author,
            params.email,
            params.phone,
            params.address,
            params.city,
            params.state,
            params.zip_code,
            params.birth_date,
            now,
            id
        )
        .execute(db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn harrie() -> ArcherParams {
        ArcherParams {
            last_name: "Smulders".to_string(),
            first_name: "Harrie".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_display_without_middle_name() {
        assert_eq!(display_name("Smulders", "Harrie", None), "Smulders Harrie ");
        assert_eq!(display_name("Smulders", "Harrie", Some("")), "Smulders Harrie ");
    }

    #[test]
    fn test_display_with_middle_name() {
        assert_eq!(
            display_name("Berg", "Anna", Some("van")),
            "Berg Anna van"
        );
    }

    #[test]
    fn test_validate_lengths() {
        assert!(harrie().validate().is_ok());

        let params = ArcherParams {
            first_name: "x".repeat(33),
            middle_name: Some("toolong".to_string()),
            zip_code: Some("1234 AB".to_string()),
            union_number: Some(-1),
            ..harrie()
        };
        let Err(crate::error::AppError::Validation(errors)) = params.validate() else {
            panic!("expected validation errors");
        };
        for field in ["first_name", "middle_name", "zip_code", "union_number"] {
            assert!(errors.get(field).is_some(), "{field} should be rejected");
        }
        assert!(errors.get("last_name").is_none());
    }

    #[test]
    fn test_patch_keeps_absent_and_clears_null() {
        let params = ArcherParams {
            info: Some("left-handed".to_string()),
            city: Some("Eindhoven".to_string()),
            ..harrie()
        };
        let patch: ArcherPatch =
            serde_json::from_str(r#"{"first_name": "Harry", "info": null}"#).unwrap();

        let patched = params.apply(patch);
        assert_eq!(patched.first_name, "Harry");
        assert_eq!(patched.last_name, "Smulders");
        assert_eq!(patched.info, None);
        assert_eq!(patched.city.as_deref(), Some("Eindhoven"));
    }
}
