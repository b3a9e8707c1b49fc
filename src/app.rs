use axum::{
    extract::Extension,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    controllers::{
        home_controller, movie_controller::*, review_controller::*, user_controller::*,
        watchlist_controller::*,
    },
    state::AppState,
};

pub fn make_app(state: AppState, cors_origin: HeaderValue) -> Router {
    Router::new()
        .route("/", get(home_controller::index))
        .route("/api/movies", get(load_movies).post(add_movie))
        .route("/api/movies/lookup", get(lookup_movie))
        .route("/api/movies/:movie_id", get(load_movie).patch(update_movie))
        .route("/api/movies/:movie_id/enrich", post(enrich_movie))
        .route("/api/reviews", post(submit_review))
        .route("/api/reviews/me", get(load_my_reviews))
        .route("/api/reviews/movie/:movie_id", get(load_movie_reviews))
        .route("/api/reviews/:id", put(update_review).delete(delete_review))
        .route("/api/watchlist", get(load_watchlist).post(add_to_watchlist))
        .route("/api/watchlist/check/:movie_id", get(check_watchlist))
        .route(
            "/api/watchlist/:id",
            put(update_watchlist_item).delete(remove_from_watchlist),
        )
        .route("/api/users/me", get(load_profile).put(update_profile))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_origin(cors_origin)
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        extractors::hash_token,
        metadata::{MetadataError, MetadataMatch, MetadataSource},
        models::{movie_model::MovieMetadata, user_model::NewUser},
        store::{CatalogStore, MemoryStore},
    };
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const ALICE: &str = "alice-token";
    const BOB: &str = "bob-token";
    const ADMIN: &str = "admin-token";

    struct FakeOmdb;

    #[async_trait]
    impl MetadataSource for FakeOmdb {
        async fn fetch_by_id(&self, external_id: &str) -> Result<MetadataMatch, MetadataError> {
            if external_id == "tt0133093" {
                Ok(MetadataMatch {
                    external_id: external_id.to_string(),
                    metadata: MovieMetadata {
                        title: Some("The Matrix".into()),
                        year: Some(1999),
                        director: Some("Lana Wachowski, Lilly Wachowski".into()),
                        ..Default::default()
                    },
                })
            } else {
                Err(MetadataError::NotFound(format!("no metadata for {external_id}")))
            }
        }

        async fn fetch_by_title(&self, title: &str) -> Result<MetadataMatch, MetadataError> {
            if title.eq_ignore_ascii_case("the matrix") {
                self.fetch_by_id("tt0133093").await
            } else {
                Err(MetadataError::NotFound(format!("no metadata for {title}")))
            }
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (name, token, is_admin) in [("alice", ALICE, false), ("bob", BOB, false), ("admin", ADMIN, true)] {
            store
                .insert_user(NewUser {
                    username: name.to_string(),
                    email: format!("{name}@example.com"),
                    token_hash: hash_token(token),
                    is_admin,
                })
                .await
                .unwrap();
        }
        store
    }

    async fn test_app() -> Router {
        let store = seeded_store().await;
        make_app(
            AppState::new(store, None),
            HeaderValue::from_static("http://localhost:3000"),
        )
    }

    async fn test_app_with_metadata() -> Router {
        let store = seeded_store().await;
        make_app(
            AppState::new(store, Some(Arc::new(FakeOmdb))),
            HeaderValue::from_static("http://localhost:3000"),
        )
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn index_reports_service_name() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "movie-review-api");
    }

    #[tokio::test]
    async fn adding_twice_conflicts() {
        let app = test_app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt1234567"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "want_to_watch");
        assert_eq!(body["priority"], 0);
        assert_eq!(body["movie"]["title"], "Movie tt1234567");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt1234567"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict");
        assert!(body["message"].as_str().unwrap().contains("already"));
    }

    #[tokio::test]
    async fn watchlist_requires_authentication() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/api/watchlist", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = send(&app, Method::GET, "/api/watchlist", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn watchlist_second_page_of_twenty_five() {
        let app = test_app().await;
        for i in 0..25 {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/watchlist",
                Some(ALICE),
                Some(json!({"movie_id": format!("tt{:07}", i)})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/watchlist?page=2&limit=20",
            Some(ALICE),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 5);
        assert_eq!(body["pagination"]["total_pages"], 2);
        assert_eq!(body["pagination"]["total_items"], 25);
        assert_eq!(body["pagination"]["has_next"], false);
        assert_eq!(body["pagination"]["has_prev"], true);

        // Newest first: the first page starts with the last insert.
        let (_, body) = send(&app, Method::GET, "/api/watchlist?limit=1", Some(ALICE), None).await;
        assert_eq!(body["items"][0]["movie_id"], "tt0000024");

        let (_, body) = send(&app, Method::GET, "/api/watchlist", Some(BOB), None).await;
        assert_eq!(body["pagination"]["total_items"], 0);
    }

    #[tokio::test]
    async fn watchlist_query_validation() {
        let app = test_app().await;
        for uri in [
            "/api/watchlist?status=dropped",
            "/api/watchlist?page=0",
            "/api/watchlist?limit=101",
            "/api/watchlist?page=abc",
        ] {
            let (status, body) = send(&app, Method::GET, uri, Some(ALICE), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], "ValidationError");
        }
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let app = test_app().await;
        send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt0000001"})),
        )
        .await;
        for uri in [
            "/api/watchlist?page=18446744073709551615",
            "/api/reviews/movie/tt0000001?page=18446744073709551615",
            "/api/movies?page=18446744073709551615&limit=100",
        ] {
            let (status, body) = send(&app, Method::GET, uri, Some(ALICE), None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(body["items"].as_array().unwrap().is_empty(), "{uri}");
            assert_eq!(body["pagination"]["has_next"], false);
            assert_eq!(body["pagination"]["has_prev"], true);
        }
    }

    #[tokio::test]
    async fn watchlist_status_filter_and_update() {
        let app = test_app().await;
        let (_, first) = send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt0000001", "notes": "cinema", "priority": 4})),
        )
        .await;
        send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt0000002", "status": "watching"})),
        )
        .await;

        let id = first["id"].as_str().unwrap();
        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/watchlist/{id}"),
            Some(ALICE),
            Some(json!({"status": "watched"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "watched");
        assert_eq!(updated["notes"], "cinema");
        assert_eq!(updated["priority"], 4);
        assert!(updated["watched_at"].is_string());

        let (_, watched) = send(
            &app,
            Method::GET,
            "/api/watchlist?status=watched",
            Some(ALICE),
            None,
        )
        .await;
        assert_eq!(watched["pagination"]["total_items"], 1);
        assert_eq!(watched["items"][0]["movie_id"], "tt0000001");

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/watchlist/{id}"),
            Some(ALICE),
            Some(json!({"priority": 9})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, cleared) = send(
            &app,
            Method::PUT,
            &format!("/api/watchlist/{id}"),
            Some(ALICE),
            Some(json!({"notes": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(cleared.get("notes").is_none());
    }

    #[tokio::test]
    async fn watchlist_ownership_is_enforced() {
        let app = test_app().await;
        let (_, item) = send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt0000001"})),
        )
        .await;
        let uri = format!("/api/watchlist/{}", item["id"].as_str().unwrap());

        let (status, body) = send(&app, Method::PUT, &uri, Some(BOB), Some(json!({"priority": 1}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Forbidden");
        let (status, _) = send(&app, Method::DELETE, &uri, Some(BOB), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, Method::DELETE, &uri, Some(ALICE), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], item["id"]);

        let (status, _) = send(&app, Method::DELETE, &uri, Some(ALICE), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn watchlist_check_reports_membership() {
        let app = test_app().await;
        let (_, body) = send(&app, Method::GET, "/api/watchlist/check/tt0000001", Some(ALICE), None).await;
        assert_eq!(body["in_watchlist"], false);

        send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt0000001"})),
        )
        .await;
        let (_, body) = send(&app, Method::GET, "/api/watchlist/check/tt0000001", Some(ALICE), None).await;
        assert_eq!(body["in_watchlist"], true);
        assert_eq!(body["item"]["movie_id"], "tt0000001");
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let app = test_app().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/watchlist")
            .header(header::AUTHORIZATION, format!("Bearer {ALICE}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reviews_are_unique_and_update_aggregates() {
        let app = test_app().await;
        let (status, review) = send(
            &app,
            Method::POST,
            "/api/reviews",
            Some(ALICE),
            Some(json!({"movie_id": "tt0111161", "rating": 9, "review_text": "Hope."})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(review["is_spoiler"], false);
        assert_eq!(review["author"]["username"], "alice");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/reviews",
            Some(ALICE),
            Some(json!({"movie_id": "tt0111161", "rating": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        send(
            &app,
            Method::POST,
            "/api/reviews",
            Some(BOB),
            Some(json!({"movie_id": "tt0111161", "rating": 6, "is_spoiler": true})),
        )
        .await;

        let (_, movie) = send(&app, Method::GET, "/api/movies/tt0111161", None, None).await;
        assert_eq!(movie["total_reviews"], 2);
        assert_eq!(movie["average_rating"], 7.5);

        let uri = format!("/api/reviews/{}", review["id"].as_str().unwrap());
        let (status, _) = send(&app, Method::PUT, &uri, Some(BOB), Some(json!({"rating": 1}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, updated) = send(&app, Method::PUT, &uri, Some(ALICE), Some(json!({"rating": 10}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["rating"], 10);
        assert_eq!(updated["review_text"], "Hope.");
        let (_, movie) = send(&app, Method::GET, "/api/movies/tt0111161", None, None).await;
        assert_eq!(movie["average_rating"], 8.0);

        let (status, _) = send(&app, Method::DELETE, &uri, Some(ALICE), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, movie) = send(&app, Method::GET, "/api/movies/tt0111161", None, None).await;
        assert_eq!(movie["total_reviews"], 1);
        assert_eq!(movie["average_rating"], 6.0);
    }

    #[tokio::test]
    async fn review_rating_is_validated() {
        let app = test_app().await;
        for body in [
            json!({"movie_id": "tt0111161", "rating": 0}),
            json!({"movie_id": "tt0111161", "rating": 11}),
            json!({"movie_id": "tt0111161", "rating": 7.5}),
            json!({"movie_id": "tt0111161"}),
        ] {
            let (status, response) = send(&app, Method::POST, "/api/reviews", Some(ALICE), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(response["error"], "ValidationError");
        }
        // Nothing was created on the way.
        let (status, _) = send(&app, Method::GET, "/api/movies/tt0111161", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn review_listing_is_public_and_paginated() {
        let app = test_app().await;
        for token in [ALICE, BOB] {
            send(
                &app,
                Method::POST,
                "/api/reviews",
                Some(token),
                Some(json!({"movie_id": "tt0068646", "rating": 10})),
            )
            .await;
        }
        let (status, body) = send(&app, Method::GET, "/api/reviews/movie/tt0068646?limit=1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["author"]["username"], "bob");
        assert_eq!(body["pagination"]["total_pages"], 2);
        assert_eq!(body["pagination"]["has_next"], true);

        let (status, _) = send(&app, Method::GET, "/api/reviews/movie/tt0068646?limit=51", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, mine) = send(&app, Method::GET, "/api/reviews/me", Some(ALICE), None).await;
        assert_eq!(mine["pagination"]["total_items"], 1);
        assert_eq!(mine["items"][0]["movie"]["external_id"], "tt0068646");
    }

    #[tokio::test]
    async fn admin_movie_management() {
        let app = test_app().await;
        let new_movie = json!({"external_id": "tt0075314", "title": "Taxi Driver", "year": 1976, "genre": "Crime, Drama"});

        let (status, _) = send(&app, Method::POST, "/api/movies", Some(ALICE), Some(new_movie.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, movie) = send(&app, Method::POST, "/api/movies", Some(ADMIN), Some(new_movie.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(movie["title"], "Taxi Driver");
        assert_eq!(movie["total_reviews"], 0);

        let (status, _) = send(&app, Method::POST, "/api/movies", Some(ADMIN), Some(new_movie)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, movie) = send(
            &app,
            Method::PATCH,
            "/api/movies/tt0075314",
            Some(ADMIN),
            Some(json!({"plot": "A veteran drives a cab."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(movie["plot"], "A veteran drives a cab.");
        assert_eq!(movie["title"], "Taxi Driver");
        assert_eq!(movie["year"], 1976);

        let (status, _) = send(
            &app,
            Method::PATCH,
            "/api/movies/tt9999999",
            Some(ADMIN),
            Some(json!({"plot": "missing"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, list) = send(&app, Method::GET, "/api/movies?search=taxi", None, None).await;
        assert_eq!(list["pagination"]["total_items"], 1);
    }

    #[tokio::test]
    async fn movie_patch_null_clears_field() {
        let app = test_app().await;
        let new_movie = json!({"external_id": "tt0113277", "title": "Heat", "poster": "https://img/heat.jpg"});
        let (status, _) = send(&app, Method::POST, "/api/movies", Some(ADMIN), Some(new_movie)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, movie) = send(
            &app,
            Method::PATCH,
            "/api/movies/tt0113277",
            Some(ADMIN),
            Some(json!({"poster": null, "year": 1995})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(movie.get("poster").is_none());
        assert_eq!(movie["year"], 1995);
        assert_eq!(movie["title"], "Heat");

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/api/movies/tt0113277",
            Some(ADMIN),
            Some(json!({"title": null})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");

        let (_, movie) = send(&app, Method::GET, "/api/movies/tt0113277", None, None).await;
        assert_eq!(movie["title"], "Heat");
        assert!(movie.get("poster").is_none());
    }

    #[tokio::test]
    async fn enrichment_requires_metadata_source() {
        let app = test_app().await;
        send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt0133093"})),
        )
        .await;
        let (status, body) = send(&app, Method::POST, "/api/movies/tt0133093/enrich", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Unavailable");
    }

    #[tokio::test]
    async fn enrichment_merges_external_metadata() {
        let app = test_app_with_metadata().await;
        let (status, movie) = send(
            &app,
            Method::POST,
            "/api/movies",
            Some(ADMIN),
            Some(json!({"external_id": "tt0133093", "title": "Matrix", "poster": "https://img/matrix.jpg"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(movie["title"], "Matrix");

        let (status, movie) = send(&app, Method::POST, "/api/movies/tt0133093/enrich", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(movie["title"], "The Matrix");
        assert_eq!(movie["year"], 1999);
        assert_eq!(movie["poster"], "https://img/matrix.jpg");

        let (status, _) = send(&app, Method::POST, "/api/movies/tt0000404/enrich", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn new_placeholder_is_enriched_in_background() {
        let app = test_app_with_metadata().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt0133093"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["movie"]["title"], "Movie tt0133093");

        let mut movie = Value::Null;
        for _ in 0..50 {
            (_, movie) = send(&app, Method::GET, "/api/movies/tt0133093", None, None).await;
            if movie["title"] == "The Matrix" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(movie["title"], "The Matrix");
        assert_eq!(movie["year"], 1999);

        // Unknown ids keep their placeholder.
        send(
            &app,
            Method::POST,
            "/api/watchlist",
            Some(ALICE),
            Some(json!({"movie_id": "tt0000404"})),
        )
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let (_, movie) = send(&app, Method::GET, "/api/movies/tt0000404", None, None).await;
        assert_eq!(movie["title"], "Movie tt0000404");
    }

    #[tokio::test]
    async fn lookup_by_title_creates_and_enriches() {
        let app = test_app_with_metadata().await;
        let (status, movie) = send(&app, Method::GET, "/api/movies/lookup?title=The%20Matrix", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(movie["external_id"], "tt0133093");
        assert_eq!(movie["title"], "The Matrix");

        let (status, _) = send(&app, Method::GET, "/api/movies/lookup?title=Nothing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_updates_distinguish_null_from_absent() {
        let app = test_app().await;
        let (status, user) = send(
            &app,
            Method::PUT,
            "/api/users/me",
            Some(ALICE),
            Some(json!({"display_name": "Alice", "bio": "Film nerd"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["display_name"], "Alice");

        let (_, user) = send(&app, Method::PUT, "/api/users/me", Some(ALICE), Some(json!({"bio": null}))).await;
        assert_eq!(user["display_name"], "Alice");
        assert!(user.get("bio").is_none());

        let (_, me) = send(&app, Method::GET, "/api/users/me", Some(ALICE), None).await;
        assert_eq!(me["username"], "alice");
        assert_eq!(me["is_admin"], false);
    }
}
