//! Shared setup for end-to-end tests: a server on a random port backed by
//! the in-memory store, with two regular users and an admin.

use std::sync::Arc;

use axum::http::HeaderValue;
use movie_review_api::{
    extractors::hash_token,
    make_app,
    models::user_model::NewUser,
    state::AppState,
    store::{CatalogStore, MemoryStore},
};
use tokio::net::TcpListener;

pub const ALICE_TOKEN: &str = "alice-e2e-token";
pub const BOB_TOKEN: &str = "bob-e2e-token";
pub const ADMIN_TOKEN: &str = "admin-e2e-token";

/// Running server; shuts down when dropped.
pub struct TestServer {
    pub base_url: String,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        for (username, token, is_admin) in [
            ("alice", ALICE_TOKEN, false),
            ("bob", BOB_TOKEN, false),
            ("admin", ADMIN_TOKEN, true),
        ] {
            store
                .insert_user(NewUser {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    token_hash: hash_token(token),
                    is_admin,
                })
                .await
                .expect("Failed to seed user");
        }

        let app = make_app(
            AppState::new(store, None),
            HeaderValue::from_static("http://localhost:3000"),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        TestServer {
            base_url: format!("http://127.0.0.1:{port}"),
            _shutdown_tx: Some(shutdown_tx),
        }
    }
}
