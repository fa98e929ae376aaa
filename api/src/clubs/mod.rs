mod club;
mod filter;
pub mod memberships;
pub mod sync;

pub use club::*;
pub use filter::*;

use crate::{
    auth::Caller,
    error::{AppError, AppResult},
    validate::{parse_id, AppJson},
    AppState,
};
use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use memberships::MembershipEntry;
use sqlx::{QueryBuilder, Sqlite};

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn create_club(
    State(state): State<AppState>,
    caller: Caller,
    AppJson(params): AppJson<ClubParams>,
) -> AppResult<impl IntoResponse> {
    caller.require(state.settings.access.clubs)?;

    let (fields, members) = params.into_parts()?;
    let members = members.unwrap_or_default();
    let club = sync::create_club(&state.db, &fields, &members, &state.owner_id).await?;

    Ok((StatusCode::CREATED, Json(club)))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn update_club(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    AppJson(params): AppJson<ClubParams>,
) -> AppResult<Json<ClubView>> {
    caller.require(state.settings.access.clubs)?;
    let id = parse_id(&id)?;

    let (fields, members) = params.into_parts()?;
    // Full update: an omitted author keeps the current one.
    let club = sync::update_club(&state.db, &id, |_| fields, members.as_deref()).await?;

    Ok(Json(club))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn patch_club(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    AppJson(patch): AppJson<ClubPatch>,
) -> AppResult<Json<ClubView>> {
    caller.require(state.settings.access.clubs)?;
    let id = parse_id(&id)?;

    let (apply, members) = patch.into_parts()?;
    let club = sync::update_club(&state.db, &id, apply, members.as_deref()).await?;

    Ok(Json(club))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_clubs(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<ClubFilter>,
) -> AppResult<Json<Vec<ClubView>>> {
    caller.require(state.settings.access.clubs)?;
    let bounds = filter.date_bounds()?;

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {CLUB_COLUMNS} FROM clubs WHERE 1 = 1"
    ));
    filter.push_conditions(&bounds, &mut query);
    query.push(" ORDER BY name, rowid");
    tracing::debug!("Query: {}", query.sql());

    let mut db = state.db.acquire().await?;
    let clubs = query.build_query_as::<Club>().fetch_all(&mut *db).await?;

    let ids: Vec<String> = clubs.iter().map(|club| club.id.clone()).collect();
    let mut memberships = MembershipEntry::for_clubs(&ids, &mut db).await?;

    let clubs = clubs
        .into_iter()
        .map(|club| ClubView {
            memberships: memberships.remove(&club.id).unwrap_or_default(),
            club,
        })
        .collect();

    Ok(Json(clubs))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_club_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<ClubView>> {
    caller.require(state.settings.access.clubs)?;
    let id = parse_id(&id)?;

    let mut db = state.db.acquire().await?;
    let club = ClubView::from_id(&id, &mut db).await?.ok_or(AppError::NotFound)?;

    Ok(Json(club))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn delete_club(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    caller.require(state.settings.access.clubs)?;
    let id = parse_id(&id)?;

    // A club with memberships is protected; clear them with an update first.
    let result = sqlx::query!("DELETE FROM clubs WHERE id = ?", id)
        .execute(&state.db)
        .await?;

    match result.rows_affected() {
        0 => Err(AppError::NotFound),
        _ => {
            tracing::info!("Deleted club {}", id);
            Ok(StatusCode::NO_CONTENT)
        }
    }
}
