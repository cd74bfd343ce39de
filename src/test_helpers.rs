//! Fixtures shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;

use crate::config::HttpTimeouts;
use crate::net::api::{ApiClient, ApiError};
use crate::net::types::{Role, UserProfile};
use crate::state::session::ProfileSource;

/// Serve `app` on an ephemeral loopback port and return its origin.
pub async fn spawn_backend(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, HttpTimeouts::default()).unwrap()
}

/// A client pointed at a port nothing listens on; never sent in tests.
pub fn offline_client() -> ApiClient {
    client("http://127.0.0.1:9")
}

pub fn profile(role: Role) -> UserProfile {
    UserProfile {
        id: 42,
        username: "wang".to_owned(),
        role,
        department_id: Some(3),
        department_name: Some("Ops".to_owned()),
    }
}

// =========================================================================
// Profile sources
// =========================================================================

/// Replays canned `current_user` answers in order; errors once exhausted.
#[derive(Default)]
pub struct FakeProfiles {
    responses: Mutex<VecDeque<Result<UserProfile, ApiError>>>,
    calls: AtomicUsize,
}

impl FakeProfiles {
    pub fn answering(profile: UserProfile) -> Self {
        Self::from(vec![Ok(profile)])
    }

    pub fn rejecting(status: u16) -> Self {
        Self::from(vec![Err(ApiError::Status { status, body: "expired".to_owned() })])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl From<Vec<Result<UserProfile, ApiError>>> for FakeProfiles {
    fn from(responses: Vec<Result<UserProfile, ApiError>>) -> Self {
        Self { responses: Mutex::new(responses.into()), calls: AtomicUsize::new(0) }
    }
}

#[async_trait::async_trait]
impl ProfileSource for FakeProfiles {
    async fn current_user(&self, _token: &str) -> Result<UserProfile, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Status { status: 500, body: "no canned response".to_owned() }))
    }
}

/// Never answers.
pub struct HangingProfiles;

#[async_trait::async_trait]
impl ProfileSource for HangingProfiles {
    async fn current_user(&self, _token: &str) -> Result<UserProfile, ApiError> {
        std::future::pending().await
    }
}

/// Answers only once [`GatedProfiles::open_gate`] is called.
pub struct GatedProfiles {
    gate: tokio::sync::Notify,
    profile: UserProfile,
}

impl GatedProfiles {
    pub fn new(profile: UserProfile) -> Self {
        Self { gate: tokio::sync::Notify::new(), profile }
    }

    pub fn open_gate(&self) {
        self.gate.notify_one();
    }
}

#[async_trait::async_trait]
impl ProfileSource for GatedProfiles {
    async fn current_user(&self, _token: &str) -> Result<UserProfile, ApiError> {
        self.gate.notified().await;
        Ok(self.profile.clone())
    }
}

/// Unique path under the system temp dir; the file itself is not created.
pub fn temp_path(name: &str) -> std::path::PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir()
        .join(format!("kbconsole-test-{}-{n}", std::process::id()))
        .join(name)
}
