use axum::{extract::Extension, http::StatusCode, response::Json};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    error::ApiError,
    extractors::{AuthUser, JsonBody, PathParam, QueryParams},
    models::{
        review_model::{Review, ReviewEntry, ReviewSubmission, ReviewUpdate},
        user_model::User,
        validate_external_id, DeleteResponse, Page, PageRequest,
    },
    state::AppState,
    store::ReviewScope,
};

use super::movie_controller::get_or_create;

pub const DEFAULT_REVIEW_LIMIT: u64 = 10;
pub const MAX_REVIEW_LIMIT: u64 = 50;

#[derive(Debug, Deserialize)]
pub struct ReviewParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ReviewParams {
    fn page_request(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::from_params(
            self.page,
            self.limit,
            DEFAULT_REVIEW_LIMIT,
            MAX_REVIEW_LIMIT,
        )?)
    }
}

async fn load_owned(state: &AppState, id: &str, user: &User) -> Result<Review, ApiError> {
    let review = state
        .store
        .find_review(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("review not found".to_string()))?;
    if review.user_id != user.id {
        return Err(ApiError::Forbidden(
            "you can only modify your own reviews".to_string(),
        ));
    }
    Ok(review)
}

async fn refresh_stats(state: &AppState, movie_id: &str) -> Result<(), ApiError> {
    let stats = state.store.refresh_movie_stats(movie_id).await?;
    info!(
        movie_id,
        average_rating = stats.average_rating,
        total_reviews = stats.total_reviews,
        "movie rating refreshed"
    );
    Ok(())
}

async fn joined(state: &AppState, review: Review) -> Result<ReviewEntry, ApiError> {
    match state.store.review_entry(&review.id).await? {
        Some(entry) => Ok(entry),
        None => {
            warn!(review_id = %review.id, "review vanished before it could be joined");
            Ok(ReviewEntry {
                review,
                author: None,
                movie: None,
            })
        }
    }
}

pub async fn load_movie_reviews(
    Extension(state): Extension<AppState>,
    PathParam(movie_id): PathParam<String>,
    QueryParams(params): QueryParams<ReviewParams>,
) -> Result<Json<Page<ReviewEntry>>, ApiError> {
    validate_external_id(&movie_id)?;
    let page = params.page_request()?;
    let result = state
        .store
        .list_reviews(&ReviewScope::Movie(movie_id), page)
        .await?;
    Ok(Json(result))
}

pub async fn load_my_reviews(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    QueryParams(params): QueryParams<ReviewParams>,
) -> Result<Json<Page<ReviewEntry>>, ApiError> {
    let page = params.page_request()?;
    let result = state
        .store
        .list_reviews(&ReviewScope::User(user.id), page)
        .await?;
    Ok(Json(result))
}

pub async fn submit_review(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(submission): JsonBody<ReviewSubmission>,
) -> Result<(StatusCode, Json<ReviewEntry>), ApiError> {
    submission.validate()?;
    if state
        .store
        .find_user_review(&user.id, &submission.movie_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("you have already reviewed this movie".to_string()));
    }

    get_or_create(&state, &submission.movie_id).await?;
    let review = state.store.insert_review(&user.id, &submission).await?;
    refresh_stats(&state, &review.movie_id).await?;
    info!(user_id = %user.id, movie_id = %review.movie_id, rating = review.rating, "review submitted");

    Ok((StatusCode::CREATED, Json(joined(&state, review).await?)))
}

pub async fn update_review(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<String>,
    JsonBody(update): JsonBody<ReviewUpdate>,
) -> Result<Json<ReviewEntry>, ApiError> {
    update.validate()?;
    load_owned(&state, &id, &user).await?;
    let review = state.store.update_review(&id, &update).await?;
    refresh_stats(&state, &review.movie_id).await?;
    Ok(Json(joined(&state, review).await?))
}

pub async fn delete_review(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let review = load_owned(&state, &id, &user).await?;
    state.store.delete_review(&id).await?;
    refresh_stats(&state, &review.movie_id).await?;
    info!(user_id = %user.id, movie_id = %review.movie_id, "review deleted");
    Ok(Json(DeleteResponse {
        message: "Review deleted successfully".to_string(),
        id,
    }))
}
