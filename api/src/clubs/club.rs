use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use super::memberships::MembershipEntry;
use crate::{
    error::{AppError, AppResult, FieldErrors},
    slug::slugify,
    validate::{self, new_id, patch_field},
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Club {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
    pub name: String,
    pub slug: String,
    pub address: Option<String>,
    pub town: Option<String>,
    pub info: Option<String>,
    pub author: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_media: Option<String>,
}

pub(crate) const CLUB_COLUMNS: &str = r#"
    id, created_at, modified_at, name, slug, address, town, info,
    author_id AS author, email, phone, website, social_media
"#;

/// A club together with its current memberships, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubView {
    #[serde(flatten)]
    pub club: Club,
    pub memberships: Vec<MembershipEntry>,
}

/// One requested member: an archer reference with optional date bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRef {
    pub archer: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub info: Option<String>,
}

/// The scalar attributes written to the club row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClubFields {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub social_media: Option<String>,
}

/// Body of create and full update.
///
/// `memberships` distinguishes three cases: absent (`None`), explicit `null`
/// (`Some(None)`, rejected) and a list, possibly empty (`Some(Some(_))`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubParams {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub social_media: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub memberships: Option<Option<Vec<MemberRef>>>,
}

/// Body of partial update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClubPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub address: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub town: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub info: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub email: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub phone: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub website: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub social_media: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub memberships: Option<Option<Vec<MemberRef>>>,
}

/// Reject an explicit `null` member list; absent stays `None`.
pub fn member_list(memberships: Option<Option<Vec<MemberRef>>>) -> AppResult<Option<Vec<MemberRef>>> {
    match memberships {
        None => Ok(None),
        Some(None) => Err(AppError::Validation(FieldErrors::single(
            "memberships",
            "This field may not be null.",
        ))),
        Some(Some(members)) => Ok(Some(members)),
    }
}

impl ClubParams {
    pub fn into_parts(self) -> AppResult<(ClubFields, Option<Vec<MemberRef>>)> {
        let members = member_list(self.memberships)?;
        let fields = ClubFields {
            name: self.name,
            address: self.address,
            town: self.town,
            info: self.info,
            author: self.author,
            email: self.email,
            phone: self.phone,
            website: self.website,
            social_media: self.social_media,
        };
        Ok((fields, members))
    }
}

impl ClubPatch {
    pub fn into_parts(self) -> AppResult<(impl FnOnce(ClubFields) -> ClubFields, Option<Vec<MemberRef>>)> {
        let members = member_list(self.memberships)?;
        let apply = move |mut fields: ClubFields| {
            if let Some(name) = self.name {
                fields.name = name;
            }
            if let Some(author) = self.author {
                fields.author = Some(author);
            }
            patch_field(&mut fields.address, self.address);
            patch_field(&mut fields.town, self.town);
            patch_field(&mut fields.info, self.info);
            patch_field(&mut fields.email, self.email);
            patch_field(&mut fields.phone, self.phone);
            patch_field(&mut fields.website, self.website);
            patch_field(&mut fields.social_media, self.social_media);
            fields
        };
        Ok((apply, members))
    }
}

impl ClubFields {
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = FieldErrors::new();
        validate::required(&mut errors, "name", &self.name, 64);
        validate::optional(&mut errors, "address", self.address.as_deref(), 128);
        validate::optional(&mut errors, "town", self.town.as_deref(), 64);
        validate::email(&mut errors, "email", self.email.as_deref(), 254);
        validate::optional(&mut errors, "phone", self.phone.as_deref(), 15);
        validate::url(&mut errors, "website", self.website.as_deref(), 200);
        validate::optional(&mut errors, "social_media", self.social_media.as_deref(), 128);
        errors.into_result()
    }
}

impl From<Club> for ClubFields {
    fn from(club: Club) -> Self {
        Self {
            name: club.name,
            address: club.address,
            town: club.town,
            info: club.info,
            author: Some(club.author),
            email: club.email,
            phone: club.phone,
            website: club.website,
            social_media: club.social_media,
        }
    }
}

impl Club {
    pub async fn from_id(id: &str, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let club = sqlx::query_as!(
            Club,
            r#"
            SELECT id, created_at, modified_at, name, slug, address, town, info,
                   author_id AS "author!", email, phone, website, social_media
            FROM clubs
            WHERE id = ?
            "#,
            id
        )
        .fetch_optional(db)
        .await?;

        Ok(club)
    }

    pub async fn insert(fields: &ClubFields, author: &str, db: &mut SqliteConnection) -> AppResult<String> {
        let id = new_id();
        let slug = slugify(&fields.name);
        let now = Utc::now().naive_utc();
        sqlx::query!(
            r#"
            INSERT INTO clubs (
                id, name, slug, address, town, info, author_id, email, phone,
                website, social_media, created_at, modified_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            id,
            fields.name,
            slug,
            fields.address,
            fields.town,
            fields.info,
            author,
            fields.email,
            fields.phone,
            fields.website,
            fields.social_media,
            now,
            now
        )
        .execute(db)
        .await?;

        Ok(id)
    }

    pub async fn update(
        id: &str,
        fields: &ClubFields,
        author: &str,
        db: &mut SqliteConnection,
    ) -> AppResult<()> {
        let slug = slugify(&fields.name);
        let now = Utc::now().naive_utc();
        sqlx::query!(
            r#"
            UPDATE clubs SET
                name = ?, slug = ?, address = ?, town = ?, info = ?, author_id = ?,
                email = ?, phone = ?, website = ?, social_media = ?, modified_at = ?
            WHERE id = ?
            "#,
            fields.name,
            slug,
            fields.address,
            fields.town,
            fields.info,
            author,
            fields.email,
            fields.phone,
            fields.website,
            fields.social_media,
            now,
            id
        )
        .execute(db)
        .await?;

        Ok(())
    }
}

impl ClubView {
    pub async fn from_id(id: &str, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let Some(club) = Club::from_id(id, &mut *db).await? else {
            return Ok(None);
        };
        let memberships = MembershipEntry::for_club(id, db).await?;

        Ok(Some(ClubView { club, memberships }))
    }
}
