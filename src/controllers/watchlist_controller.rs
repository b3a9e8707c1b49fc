use axum::{extract::Extension, http::StatusCode, response::Json};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::ApiError,
    extractors::{AuthUser, JsonBody, PathParam, QueryParams},
    models::{
        user_model::User,
        watchlist_model::{
            WatchStatus, WatchlistAdd, WatchlistCheck, WatchlistEntry, WatchlistItem, WatchlistUpdate,
        },
        validate_external_id, DeleteResponse, Page, PageRequest,
    },
    state::AppState,
};

use super::movie_controller::get_or_create;

pub const DEFAULT_WATCHLIST_LIMIT: u64 = 20;
pub const MAX_WATCHLIST_LIMIT: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct WatchlistParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<WatchStatus>,
}

/// Loads an item the caller may mutate: 404 when missing, 403 when owned by someone else.
async fn load_owned(state: &AppState, id: &str, user: &User) -> Result<WatchlistItem, ApiError> {
    let item = state
        .store
        .find_watchlist_item(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("watchlist item not found".to_string()))?;
    if item.user_id != user.id {
        return Err(ApiError::Forbidden(
            "you can only modify your own watchlist".to_string(),
        ));
    }
    Ok(item)
}

async fn joined(state: &AppState, item: WatchlistItem) -> Result<WatchlistEntry, ApiError> {
    match state.store.watchlist_entry(&item.id).await? {
        Some(entry) => Ok(entry),
        None => Ok(WatchlistEntry { item, movie: None }),
    }
}

pub async fn load_watchlist(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    QueryParams(params): QueryParams<WatchlistParams>,
) -> Result<Json<Page<WatchlistEntry>>, ApiError> {
    let page = PageRequest::from_params(
        params.page,
        params.limit,
        DEFAULT_WATCHLIST_LIMIT,
        MAX_WATCHLIST_LIMIT,
    )?;
    let result = state.store.list_watchlist(&user.id, params.status, page).await?;
    Ok(Json(result))
}

pub async fn add_to_watchlist(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(add): JsonBody<WatchlistAdd>,
) -> Result<(StatusCode, Json<WatchlistEntry>), ApiError> {
    add.validate()?;
    if state
        .store
        .find_watchlist_entry_for_movie(&user.id, &add.movie_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("movie is already in your watchlist".to_string()));
    }

    let movie = get_or_create(&state, &add.movie_id).await?;
    let item = state.store.insert_watchlist_item(&user.id, &add).await?;
    info!(user_id = %user.id, movie_id = %item.movie_id, "added to watchlist");

    let entry = WatchlistEntry {
        item,
        movie: Some(movie),
    };
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn check_watchlist(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    PathParam(movie_id): PathParam<String>,
) -> Result<Json<WatchlistCheck>, ApiError> {
    validate_external_id(&movie_id)?;
    let item = state
        .store
        .find_watchlist_entry_for_movie(&user.id, &movie_id)
        .await?;
    Ok(Json(WatchlistCheck {
        in_watchlist: item.is_some(),
        item,
    }))
}

pub async fn update_watchlist_item(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<String>,
    JsonBody(update): JsonBody<WatchlistUpdate>,
) -> Result<Json<WatchlistEntry>, ApiError> {
    update.validate()?;
    load_owned(&state, &id, &user).await?;
    let item = state.store.update_watchlist_item(&id, &update).await?;
    Ok(Json(joined(&state, item).await?))
}

pub async fn remove_from_watchlist(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let item = load_owned(&state, &id, &user).await?;
    state.store.delete_watchlist_item(&id).await?;
    info!(user_id = %user.id, movie_id = %item.movie_id, "removed from watchlist");
    Ok(Json(DeleteResponse {
        message: "Removed from watchlist".to_string(),
        id,
    }))
}
