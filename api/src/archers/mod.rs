mod archer;
mod filter;

pub use archer::*;
pub use filter::*;

use crate::{
    auth::Caller,
    error::{AppError, AppResult, FieldErrors},
    pagination::{Page, PageParams},
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
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

/// Use `fallback` when no author is given, otherwise make sure the given one exists.
pub(crate) async fn resolve_author(
    author: Option<&str>,
    fallback: &str,
    db: &mut SqliteConnection,
) -> AppResult<String> {
    let Some(author) = author else {
        return Ok(fallback.to_string());
    };
    let reference = || AppError::Reference {
        field: "author",
        id: author.to_string(),
    };
    let id = parse_id(author).map_err(|_| reference())?;
    if !crate::users::User::exists(&id, db).await? {
        return Err(reference());
    }
    Ok(id)
}

/// Union numbers are unique among archers; `except` is the archer being updated.
async fn check_union_number(
    params: &ArcherParams,
    except: Option<&str>,
    db: &mut SqliteConnection,
) -> AppResult<()> {
    let Some(union_number) = params.union_number else {
        return Ok(());
    };
    if Archer::union_number_taken(union_number, except, db).await? {
        return Err(AppError::Validation(FieldErrors::single(
            "union_number",
            "archer with this union number already exists.",
        )));
    }
    Ok(())
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_archers(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<ArcherFilter>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Page<Archer>>> {
    caller.require(state.settings.access.archer_read)?;
    let page = page.resolve(&state.settings.pagination)?;

    let mut db = state.db.acquire().await?;

    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM archers WHERE 1 = 1");
    filter.push_conditions(&mut count_query);
    let count: i64 = count_query.build().fetch_one(&mut *db).await?.get(0);

    let page = page.checked(count)?;

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {ARCHER_COLUMNS} FROM archers WHERE 1 = 1"
    ));
    filter.push_conditions(&mut query);
    query.push(filter.order_by());
    query.push(" LIMIT ");
    query.push_bind(page.limit());
    query.push(" OFFSET ");
    query.push_bind(page.offset());
    tracing::debug!("Query: {}", query.sql());

    let archers = query
        .build_query_as::<Archer>()
        .fetch_all(&mut *db)
        .await?;

    Ok(Json(page.wrap(count, archers)))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn create_archer(
    State(state): State<AppState>,
    caller: Caller,
    AppJson(params): AppJson<ArcherParams>,
) -> AppResult<impl IntoResponse> {
    caller.require(state.settings.access.archer_write)?;
    params.validate()?;

    let mut tx = state.db.begin().await?;
    check_union_number(&params, None, &mut tx).await?;
    let author = resolve_author(params.author.as_deref(), &state.owner_id, &mut tx).await?;
    let id = Archer::insert(&params, &author, &mut tx).await?;
    let archer = Archer::from_id(&id, &mut tx).await?.ok_or(AppError::NotFound)?;
    tx.commit().await?;

    tracing::info!("Created archer {} ({})", archer, archer.id);
    Ok((StatusCode::CREATED, Json(archer)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArcherInfo {
    pub archers: Vec<Archer>,
    pub count: usize,
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_archer_info(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<ArcherInfo>> {
    caller.require(state.settings.access.archer_read)?;

    let mut db = state.db.acquire().await?;
    let archers = Archer::list(&mut db).await?;

    Ok(Json(ArcherInfo {
        count: archers.len(),
        archers,
    }))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn get_archer_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<Archer>> {
    caller.require(state.settings.access.archer_read)?;
    let id = parse_id(&id)?;

    let mut db = state.db.acquire().await?;
    let archer = Archer::from_id(&id, &mut db).await?.ok_or(AppError::NotFound)?;

    Ok(Json(archer))
}

/// Load the archer, derive its new fields from the current ones and write them
/// back in one transaction. An omitted author keeps the current one.
async fn write_archer(
    state: &AppState,
    id: &str,
    changes: impl FnOnce(Archer) -> ArcherParams,
) -> AppResult<Archer> {
    let mut tx = state.db.begin().await?;
    let current = Archer::from_id(id, &mut tx).await?.ok_or(AppError::NotFound)?;
    let current_author = current.author.clone();
    let params = changes(current);
    params.validate()?;
    check_union_number(&params, Some(id), &mut tx).await?;

    let author = resolve_author(params.author.as_deref(), &current_author, &mut tx).await?;
    Archer::update(id, &params, &author, &mut tx).await?;
    let archer = Archer::from_id(id, &mut tx).await?.ok_or(AppError::NotFound)?;
    tx.commit().await?;

    tracing::info!("Updated archer {} ({})", archer, archer.id);
    Ok(archer)
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn update_archer(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    AppJson(params): AppJson<ArcherParams>,
) -> AppResult<Json<Archer>> {
    caller.require(state.settings.access.archer_write)?;
    let id = parse_id(&id)?;

    Ok(Json(write_archer(&state, &id, |_| params).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn patch_archer(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    AppJson(patch): AppJson<ArcherPatch>,
) -> AppResult<Json<Archer>> {
    caller.require(state.settings.access.archer_write)?;
    let id = parse_id(&id)?;

    let archer = write_archer(&state, &id, |current| {
        ArcherParams::from(current).apply(patch)
    })
    .await?;

    Ok(Json(archer))
}

#[debug_handler]
#[tracing::instrument(skip(state, caller))]
pub async fn delete_archer(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    caller.require(state.settings.access.archer_write)?;
    let id = parse_id(&id)?;

    // Memberships pointing at this archer make SQLite refuse the delete.
    let result = sqlx::query!("DELETE FROM archers WHERE id = ?", id)
        .execute(&state.db)
        .await?;

    match result.rows_affected() {
        0 => Err(AppError::NotFound),
        _ => {
            tracing::info!("Deleted archer {}", id);
            Ok(StatusCode::NO_CONTENT)
        }
    }
}
