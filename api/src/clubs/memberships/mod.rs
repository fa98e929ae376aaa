mod membership;

pub use membership::*;

use crate::{
    auth::Caller,
    error::{AppError, AppResult, FieldErrors},
    validate::parse_id,
};
use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Json,
};

use crate::AppState;

/// Memberships are read-only here; they change only through their club.
#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_memberships(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<MembershipFilter>,
) -> AppResult<Json<Vec<Membership>>> {
    caller.require(state.settings.access.clubs)?;

    let mut errors = FieldErrors::new();
    let mut checked = |field: &str, raw: Option<String>| {
        raw.and_then(|raw| match parse_id(&raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add(field, "Must be a valid UUID.");
                None
            }
        })
    };
    let filter = MembershipFilter {
        club: checked("club", filter.club),
        archer: checked("archer", filter.archer),
    };
    errors.into_result()?;

    let mut db = state.db.acquire().await?;
    let memberships = Membership::list(&filter, &mut db).await?;

    Ok(Json(memberships))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_membership_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Membership>> {
    caller.require(state.settings.access.clubs)?;
    let id = parse_id(&id)?;

    let mut db = state.db.acquire().await?;
    let membership = Membership::from_id(&id, &mut db)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(membership))
}
