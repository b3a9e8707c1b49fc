use movie_review_api::{config::AppConfig, make_app, state::AppState};
use shuttle_runtime::{SecretStore, Secrets};
use tracing::info;

#[shuttle_runtime::main]
async fn main(#[Secrets] secret_store: SecretStore) -> shuttle_axum::ShuttleAxum {
    // Secrets come from `Secrets.toml`; the standalone binary reads the same keys from the environment.
    let config = AppConfig::from_lookup(|key| secret_store.get(key))?;
    config.require_mongodb()?;

    let cors_origin = config.cors_origin()?;
    let state = AppState::from_config(&config).await?;
    info!(database = %config.mongodb_database, origin = %config.app_url, "movie review api ready");

    Ok(make_app(state, cors_origin).into())
}
