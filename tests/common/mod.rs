#![allow(dead_code)]

use std::net::SocketAddr;

use financy::identity::{hash_password, SessionConfig, SessionGate};
use financy::server::{serve, AppState};
use financy::storage::SharedStore;
use tempfile::TempDir;

pub const SECRET: &str = "integration-secret-0123456789abcdef";

/// A running server on an ephemeral port plus a handle to its store.
pub struct TestServer {
    pub base: String,
    pub store: SharedStore,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> TestServer {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SharedStore::open(dir.path().join("financy.db")).expect("open store");
        let sessions = SessionGate::new(SessionConfig::new(SECRET)).expect("session gate");
        let state = AppState::new(store.clone(), sessions);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr: SocketAddr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            if let Err(e) = serve(listener, state).await {
                panic!("server error: {e}");
            }
        });
        TestServer { base: format!("http://{addr}"), store, _dir: dir }
    }

    pub fn url(&self, path: &str) -> String { format!("{}{}", self.base, path) }

    /// Seed an identity exactly as stored (no canonicalization).
    pub fn add_user(&self, stored_rut: &str, password: &str) -> String {
        let hash = hash_password(password).expect("hash");
        self.store.lock().insert_user(stored_rut, &hash).expect("insert user").id
    }
}

/// Browser-like client: keeps cookies, does not follow redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}

pub async fn login(client: &reqwest::Client, srv: &TestServer, identifier: &str, password: &str) -> reqwest::Response {
    client
        .post(srv.url("/api/login"))
        .json(&serde_json::json!({"identifier": identifier, "password": password}))
        .send()
        .await
        .expect("login request")
}
