use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{MetadataError, MetadataMatch, MetadataSource};
use crate::models::movie_model::MovieMetadata;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the OMDb API (`https://www.omdbapi.com/`).
pub struct OmdbClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: String,
    error: Option<String>,
    title: Option<String>,
    year: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    actors: Option<String>,
    plot: Option<String>,
    runtime: Option<String>,
    poster: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
}

/// OMDb reports missing values as "N/A".
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "N/A")
}

/// Series years look like "2008–2013"; keep the first year.
fn parse_year(value: Option<String>) -> Option<i32> {
    let value = present(value)?;
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

impl OmdbResponse {
    fn into_match(self, requested: &str) -> Result<MetadataMatch, MetadataError> {
        if !self.response.eq_ignore_ascii_case("true") {
            let error = self.error.unwrap_or_else(|| "unknown error".to_string());
            if error.to_lowercase().contains("not found") {
                return Err(MetadataError::NotFound(format!("no metadata for {requested}")));
            }
            return Err(MetadataError::Upstream(error));
        }
        let external_id = present(self.imdb_id).unwrap_or_else(|| requested.to_string());
        let metadata = MovieMetadata {
            title: present(self.title),
            year: parse_year(self.year),
            genre: present(self.genre),
            director: present(self.director),
            cast: present(self.actors),
            plot: present(self.plot),
            runtime: present(self.runtime),
            rating: present(self.imdb_rating).and_then(|r| r.parse().ok()),
            poster: present(self.poster),
        };
        Ok(MetadataMatch {
            external_id,
            metadata,
        })
    }
}

impl OmdbClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, MetadataError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(OmdbClient {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn query(&self, key: &str, value: &str) -> Result<MetadataMatch, MetadataError> {
        debug!(key, value, "querying OMDb");
        let response: OmdbResponse = self
            .http
            .get(&self.base_url)
            .query(&[("apikey", self.api_key.as_str()), (key, value), ("plot", "full")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_match(value)
    }
}

#[async_trait]
impl MetadataSource for OmdbClient {
    async fn fetch_by_id(&self, external_id: &str) -> Result<MetadataMatch, MetadataError> {
        self.query("i", external_id).await
    }

    async fn fetch_by_title(&self, title: &str) -> Result<MetadataMatch, MetadataError> {
        self.query("t", title).await
    }
}
