use axum::{extract::Extension, response::Json};

use crate::{
    error::ApiError,
    extractors::{AuthUser, JsonBody},
    models::user_model::{ProfileUpdate, User},
    state::AppState,
};

pub async fn load_profile(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

pub async fn update_profile(
    Extension(state): Extension<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    update.validate()?;
    Ok(Json(state.store.update_profile(&user.id, &update).await?))
}
