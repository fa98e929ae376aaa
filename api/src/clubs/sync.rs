//! Keeps a club's membership rows in line with the member list submitted for it.
//!
//! Both operations run in a single transaction: the club row and every
//! membership row are committed together or not at all. Memberships are never
//! edited in place. A submitted list replaces the previous set wholesale, while
//! an absent list leaves the stored set alone.

use sqlx::{SqliteConnection, SqlitePool};

use super::{
    memberships::Membership, Club, ClubFields, ClubView, MemberRef,
};
use crate::{
    archers::{resolve_author, Archer},
    error::{AppError, AppResult, FieldErrors},
    validate::parse_id,
};

/// Date bounds are checked before any transaction is opened.
pub fn validate_members(members: &[MemberRef]) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    for member in members {
        if let (Some(start), Some(end)) = (member.start_date, member.end_date) {
            if end < start {
                errors.add("memberships", "End date must not precede start date.");
            }
        }
    }
    errors.into_result()
}

/// Create a club and one membership per entry of `members`, duplicates included.
pub async fn create_club(
    db: &SqlitePool,
    fields: &ClubFields,
    members: &[MemberRef],
    default_author: &str,
) -> AppResult<ClubView> {
    fields.validate()?;
    validate_members(members)?;

    let mut tx = db.begin().await?;
    let author = resolve_author(fields.author.as_deref(), default_author, &mut tx).await?;
    let id = Club::insert(fields, &author, &mut tx).await?;
    insert_members(&id, members, &mut tx).await?;
    let view = ClubView::from_id(&id, &mut tx).await?.ok_or(AppError::NotFound)?;
    tx.commit().await?;

    tracing::info!(
        "Created club {} ({}) with {} memberships",
        view.club.name,
        view.club.id,
        view.memberships.len()
    );
    Ok(view)
}

/// Overwrite a club's attributes and, when `members` is given, replace its
/// memberships with exactly that list. `changes` derives the new attributes
/// from the stored ones so partial updates see current values inside the
/// same transaction.
pub async fn update_club(
    db: &SqlitePool,
    id: &str,
    changes: impl FnOnce(ClubFields) -> ClubFields,
    members: Option<&[MemberRef]>,
) -> AppResult<ClubView> {
    if let Some(members) = members {
        validate_members(members)?;
    }

    let mut tx = db.begin().await?;
    let current = Club::from_id(id, &mut tx).await?.ok_or(AppError::NotFound)?;
    let current_author = current.author.clone();
    let fields = changes(ClubFields::from(current));
    fields.validate()?;

    let author = resolve_author(fields.author.as_deref(), &current_author, &mut tx).await?;
    Club::update(id, &fields, &author, &mut tx).await?;

    if let Some(members) = members {
        let removed = Membership::delete_for_club(id, &mut tx).await?;
        tracing::debug!("Removed {} memberships of club {}", removed, id);
        insert_members(id, members, &mut tx).await?;
    }

    let view = ClubView::from_id(id, &mut tx).await?.ok_or(AppError::NotFound)?;
    tx.commit().await?;

    tracing::info!(
        "Updated club {} ({}), {} memberships",
        view.club.name,
        view.club.id,
        view.memberships.len()
    );
    Ok(view)
}

/// Insert memberships in list order. An unknown archer aborts the caller's
/// transaction through the returned error.
async fn insert_members(club_id: &str, members: &[MemberRef], db: &mut SqliteConnection) -> AppResult<()> {
    for member in members {
        let reference = || AppError::Reference {
            field: "memberships",
            id: member.archer.clone(),
        };
        let archer_id = parse_id(&member.archer).map_err(|_| reference())?;
        if !Archer::exists(&archer_id, &mut *db).await? {
            return Err(reference());
        }
        Membership::insert(club_id, member, &archer_id, &mut *db).await?;
    }

    Ok(())
}
