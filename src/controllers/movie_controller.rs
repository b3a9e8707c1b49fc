use axum::{extract::Extension, http::StatusCode, response::Json};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    error::ApiError,
    extractors::{AdminUser, JsonBody, PathParam, QueryParams},
    models::{
        movie_model::{Movie, MovieUpdate, NewMovie},
        validate_external_id, Page, PageRequest,
    },
    state::AppState,
    store::MovieQuery,
};

pub const DEFAULT_MOVIE_LIMIT: u64 = 20;
pub const MAX_MOVIE_LIMIT: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct MovieListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub title: String,
}

/// Returns the movie, creating a placeholder on first reference.
/// New placeholders are enriched in the background when a metadata source is configured.
pub(crate) async fn get_or_create(state: &AppState, external_id: &str) -> Result<Movie, ApiError> {
    let (movie, created) = state.store.get_or_create_movie(external_id).await?;
    if created {
        debug!(external_id, "movie placeholder created");
        spawn_enrichment(state, external_id.to_string());
    }
    Ok(movie)
}

fn spawn_enrichment(state: &AppState, external_id: String) {
    let Some(source) = state.metadata.clone() else {
        return;
    };
    let store = state.store.clone();
    tokio::spawn(async move {
        let found = match source.fetch_by_id(&external_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(external_id, error = %e, "background enrichment failed");
                return;
            }
        };
        match store.enrich_movie(&external_id, &found.metadata).await {
            Ok(movie) => debug!(external_id, title = %movie.title, "movie enriched"),
            Err(e) => warn!(external_id, error = %e, "failed to store enriched metadata"),
        }
    });
}

pub async fn load_movies(
    Extension(state): Extension<AppState>,
    QueryParams(params): QueryParams<MovieListParams>,
) -> Result<Json<Page<Movie>>, ApiError> {
    let page = PageRequest::from_params(params.page, params.limit, DEFAULT_MOVIE_LIMIT, MAX_MOVIE_LIMIT)?;
    let query = MovieQuery {
        search: params.search.filter(|s| !s.trim().is_empty()),
    };
    Ok(Json(state.store.list_movies(&query, page).await?))
}

pub async fn load_movie(
    Extension(state): Extension<AppState>,
    PathParam(movie_id): PathParam<String>,
) -> Result<Json<Movie>, ApiError> {
    state
        .store
        .find_movie(&movie_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("movie {movie_id} not found")))
}

pub async fn add_movie(
    Extension(state): Extension<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(new_movie): JsonBody<NewMovie>,
) -> Result<(StatusCode, Json<Movie>), ApiError> {
    new_movie.validate()?;
    let movie = state
        .store
        .insert_movie(new_movie.into_movie(chrono::Utc::now()))
        .await?;
    info!(external_id = %movie.external_id, admin = %admin.username, "movie added");
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn update_movie(
    Extension(state): Extension<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(movie_id): PathParam<String>,
    JsonBody(update): JsonBody<MovieUpdate>,
) -> Result<Json<Movie>, ApiError> {
    update.validate()?;
    if update.is_empty() {
        return Err(ApiError::Validation("no fields to update".to_string()));
    }
    let movie = state.store.update_movie(&movie_id, &update).await?;
    info!(external_id = %movie_id, admin = %admin.username, "movie updated");
    Ok(Json(movie))
}

pub async fn enrich_movie(
    Extension(state): Extension<AppState>,
    AdminUser(_admin): AdminUser,
    PathParam(movie_id): PathParam<String>,
) -> Result<Json<Movie>, ApiError> {
    let source = state
        .metadata
        .clone()
        .ok_or_else(|| ApiError::Unavailable("metadata source is not configured".to_string()))?;
    if state.store.find_movie(&movie_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("movie {movie_id} not found")));
    }
    let found = source.fetch_by_id(&movie_id).await?;
    Ok(Json(state.store.enrich_movie(&movie_id, &found.metadata).await?))
}

pub async fn lookup_movie(
    Extension(state): Extension<AppState>,
    QueryParams(params): QueryParams<LookupParams>,
) -> Result<Json<Movie>, ApiError> {
    let title = params.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("title must not be empty".to_string()));
    }
    let source = state
        .metadata
        .clone()
        .ok_or_else(|| ApiError::Unavailable("metadata source is not configured".to_string()))?;

    let found = source.fetch_by_title(title).await?;
    validate_external_id(&found.external_id)?;
    state.store.get_or_create_movie(&found.external_id).await?;
    Ok(Json(
        state
            .store
            .enrich_movie(&found.external_id, &found.metadata)
            .await?,
    ))
}
