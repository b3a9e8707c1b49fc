use anyhow::{anyhow, Context};
use axum::http::HeaderValue;

pub const DEFAULT_DATABASE: &str = "movie-reviews";
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_OMDB_BASE_URL: &str = "https://www.omdbapi.com/";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
    /// Origin allowed by CORS.
    pub app_url: String,
    pub omdb_api_key: Option<String>,
    pub omdb_base_url: String,
    pub bootstrap_admin_token: Option<String>,
    pub bind_addr: String,
}

impl AppConfig {
    /// Reads every key through `lookup`, so Shuttle secrets and the process
    /// environment share one loader. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = AppConfig {
            mongodb_uri: get("MONGODB_URI"),
            mongodb_database: get("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            app_url: get("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            omdb_api_key: get("OMDB_API_KEY"),
            omdb_base_url: get("OMDB_BASE_URL").unwrap_or_else(|| DEFAULT_OMDB_BASE_URL.to_string()),
            bootstrap_admin_token: get("BOOTSTRAP_ADMIN_TOKEN"),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        };
        config.cors_origin()?;
        Ok(config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn cors_origin(&self) -> anyhow::Result<HeaderValue> {
        self.app_url
            .parse::<HeaderValue>()
            .with_context(|| format!("APP_URL is not a valid origin: {}", self.app_url))
    }

    pub fn require_mongodb(&self) -> anyhow::Result<&str> {
        self.mongodb_uri
            .as_deref()
            .ok_or_else(|| anyhow!("secret MONGODB_URI was not found"))
    }
}
