use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{archers::display_name, clubs::MemberRef, error::AppResult, validate::new_id};

/// A membership as nested inside its club: the archer is flattened to its
/// display string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipEntry {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
    pub archer: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub info: Option<String>,
}

/// A membership on its own, carrying the references the nested form leaves out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    #[serde(flatten)]
    pub entry: MembershipEntry,
    pub club: String,
    pub archer_id: String,
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    id: String,
    club_id: String,
    archer_id: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    info: Option<String>,
    created_at: NaiveDateTime,
    modified_at: NaiveDateTime,
    last_name: String,
    first_name: String,
    middle_name: Option<String>,
}

const MEMBERSHIP_SELECT: &str = r#"
    SELECT m.id, m.club_id, m.archer_id, m.start_date, m.end_date, m.info,
           m.created_at, m.modified_at,
           a.last_name, a.first_name, a.middle_name
    FROM memberships m
    JOIN archers a ON a.id = m.archer_id
"#;

impl From<MembershipRow> for Membership {
    fn from(row: MembershipRow) -> Self {
        Membership {
            entry: MembershipEntry {
                archer: display_name(&row.last_name, &row.first_name, row.middle_name.as_deref()),
                id: row.id,
                created_at: row.created_at,
                modified_at: row.modified_at,
                start_date: row.start_date,
                end_date: row.end_date,
                info: row.info,
            },
            club: row.club_id,
            archer_id: row.archer_id,
        }
    }
}

/// Optional `club` / `archer` restrictions for listing memberships.
#[derive(Debug, Default, Deserialize)]
pub struct MembershipFilter {
    pub club: Option<String>,
    pub archer: Option<String>,
}

impl Membership {
    pub async fn from_id(id: &str, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let membership = sqlx::query_as::<_, MembershipRow>(&format!(
            "{MEMBERSHIP_SELECT} WHERE m.id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .map(Membership::from);

        Ok(membership)
    }

    pub async fn list(filter: &MembershipFilter, db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("{MEMBERSHIP_SELECT} WHERE 1 = 1"));
        if let Some(club) = &filter.club {
            query.push(" AND m.club_id = ");
            query.push_bind(club.clone());
        }
        if let Some(archer) = &filter.archer {
            query.push(" AND m.archer_id = ");
            query.push_bind(archer.clone());
        }
        query.push(" ORDER BY m.rowid");
        tracing::debug!("Query: {}", query.sql());

        let memberships = query
            .build_query_as::<MembershipRow>()
            .fetch_all(db)
            .await?
            .into_iter()
            .map(Membership::from)
            .collect();

        Ok(memberships)
    }

    pub async fn insert(
        club_id: &str,
        member: &MemberRef,
        archer_id: &str,
        db: &mut SqliteConnection,
    ) -> AppResult<String> {
        let id = new_id();
        let now = Utc::now().naive_utc();
        sqlx::query!(
            r#"
            INSERT INTO memberships (
                id, club_id, archer_id, start_date, end_date, info, created_at, modified_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            id,
            club_id,
            archer_id,
            member.start_date,
            member.end_date,
            member.info,
            now,
            now
        )
        .execute(db)
        .await?;

        Ok(id)
    }

    /// Remove every membership of a club, returning how many were removed.
    pub async fn delete_for_club(club_id: &str, db: &mut SqliteConnection) -> AppResult<u64> {
        let result = sqlx::query!("DELETE FROM memberships WHERE club_id = ?", club_id)
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }
}

impl MembershipEntry {
    /// Memberships of one club in insertion order.
    pub async fn for_club(club_id: &str, db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let filter = MembershipFilter {
            club: Some(club_id.to_string()),
            archer: None,
        };
        let entries = Membership::list(&filter, db)
            .await?
            .into_iter()
            .map(|membership| membership.entry)
            .collect();

        Ok(entries)
    }

    /// Memberships of several clubs at once, grouped by club id.
    pub async fn for_clubs(
        club_ids: &[String],
        db: &mut SqliteConnection,
    ) -> AppResult<HashMap<String, Vec<Self>>> {
        let mut grouped: HashMap<String, Vec<Self>> = HashMap::new();
        if club_ids.is_empty() {
            return Ok(grouped);
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!("{MEMBERSHIP_SELECT} WHERE m.club_id IN ("));
        let mut ids = query.separated(", ");
        for id in club_ids {
            ids.push_bind(id.clone());
        }
        query.push(") ORDER BY m.rowid");

        let rows = query
            .build_query_as::<MembershipRow>()
            .fetch_all(db)
            .await?;
        for membership in rows.into_iter().map(Membership::from) {
            grouped
                .entry(membership.club)
                .or_default()
                .push(membership.entry);
        }

        Ok(grouped)
    }
}
