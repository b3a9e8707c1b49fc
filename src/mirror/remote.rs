use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::backing::{Backing, ListQuery, MirrorError, MirrorItem, MirrorResult};
use crate::{
    error::ErrorBody,
    models::{
        review_model::{ReviewEntry, ReviewSubmission, ReviewUpdate},
        user_model::User,
        watchlist_model::{WatchlistAdd, WatchlistCheck, WatchlistEntry, WatchlistUpdate},
        DeleteResponse, Page,
    },
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Authenticated client for the REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
    user: User,
}

impl ApiClient {
    /// Builds a client and resolves the token's user.
    pub async fn connect(base_url: &str, token: &str) -> MirrorResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let response = http
            .get(format!("{base_url}/api/users/me"))
            .bearer_auth(token)
            .send()
            .await?;
        let user: User = decode(response).await?;
        debug!(user_id = %user.id, username = %user.username, "api client connected");
        Ok(ApiClient {
            http,
            base_url,
            token: token.to_string(),
            user,
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> MirrorResult<R> {
        decode(request.send().await?).await
    }

    async fn fetch_page<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &ListQuery,
    ) -> MirrorResult<Page<R>> {
        let mut params = vec![
            ("page", query.page.page.to_string()),
            ("limit", query.page.limit.to_string()),
        ];
        if let Some(status) = query.status {
            params.push(("status", status.as_str().to_string()));
        }
        self.send(self.request(reqwest::Method::GET, path).query(&params))
            .await
    }
}

/// Error responses carry the `{error, message}` envelope.
async fn decode<R: DeserializeOwned>(response: Response) -> MirrorResult<R> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await?;
    let envelope = serde_json::from_str::<ErrorBody>(&body).unwrap_or_else(|_| ErrorBody {
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        message: body,
    });
    Err(MirrorError::from_api(status.as_u16(), envelope))
}

/// The caller's watchlist on the server.
pub struct RemoteWatchlist {
    client: ApiClient,
}

impl RemoteWatchlist {
    pub fn new(client: ApiClient) -> Self {
        RemoteWatchlist { client }
    }
}

#[async_trait]
impl Backing<WatchlistEntry> for RemoteWatchlist {
    fn owner(&self) -> &str {
        &self.client.user.id
    }

    async fn fetch(&self, query: &ListQuery) -> MirrorResult<Page<WatchlistEntry>> {
        let Some(movie_id) = &query.movie_id else {
            return self.client.fetch_page("/api/watchlist", query).await;
        };
        // At most one entry per movie, so the check endpoint answers the whole query.
        let request = self
            .client
            .request(reqwest::Method::GET, &format!("/api/watchlist/check/{movie_id}"));
        let check: WatchlistCheck = self.client.send(request).await?;
        let items: Vec<WatchlistEntry> = check
            .item
            .map(|item| WatchlistEntry { item, movie: None })
            .into_iter()
            .filter(|entry| entry.matches(query))
            .collect();
        Ok(Page::slice(items, query.page))
    }

    async fn add(&self, draft: &WatchlistAdd) -> MirrorResult<WatchlistEntry> {
        let request = self
            .client
            .request(reqwest::Method::POST, "/api/watchlist")
            .json(draft);
        self.client.send(request).await
    }

    async fn update(&self, key: &str, patch: &WatchlistUpdate) -> MirrorResult<WatchlistEntry> {
        let request = self
            .client
            .request(reqwest::Method::PUT, &format!("/api/watchlist/{key}"))
            .json(patch);
        self.client.send(request).await
    }

    async fn remove(&self, key: &str) -> MirrorResult<()> {
        let request = self
            .client
            .request(reqwest::Method::DELETE, &format!("/api/watchlist/{key}"));
        let _: DeleteResponse = self.client.send(request).await?;
        Ok(())
    }
}

/// Reviews written by the caller, or one movie's reviews when the query names a movie.
pub struct RemoteReviews {
    client: ApiClient,
}

impl RemoteReviews {
    pub fn new(client: ApiClient) -> Self {
        RemoteReviews { client }
    }
}

#[async_trait]
impl Backing<ReviewEntry> for RemoteReviews {
    fn owner(&self) -> &str {
        &self.client.user.id
    }

    async fn fetch(&self, query: &ListQuery) -> MirrorResult<Page<ReviewEntry>> {
        let path = match &query.movie_id {
            Some(movie_id) => format!("/api/reviews/movie/{movie_id}"),
            None => "/api/reviews/me".to_string(),
        };
        self.client.fetch_page(&path, query).await
    }

    async fn add(&self, draft: &ReviewSubmission) -> MirrorResult<ReviewEntry> {
        let request = self
            .client
            .request(reqwest::Method::POST, "/api/reviews")
            .json(draft);
        self.client.send(request).await
    }

    async fn update(&self, key: &str, patch: &ReviewUpdate) -> MirrorResult<ReviewEntry> {
        let request = self
            .client
            .request(reqwest::Method::PUT, &format!("/api/reviews/{key}"))
            .json(patch);
        self.client.send(request).await
    }

    async fn remove(&self, key: &str) -> MirrorResult<()> {
        let request = self
            .client
            .request(reqwest::Method::DELETE, &format!("/api/reviews/{key}"));
        let _: DeleteResponse = self.client.send(request).await?;
        Ok(())
    }
}
