use async_trait::async_trait;
use habit_tracker::errors::BackendError;
use habit_tracker::models::{CompletionRecord, HabitPatch, HabitRecord, Section, UserId};
use habit_tracker::{router, AppState, HabitBackend};
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::sync::Arc;

/// Backend whose writes always fail; reads fail too when `reads_fail` is set.
struct UnavailableBackend {
    reads_fail: bool,
}

fn unavailable() -> BackendError {
    BackendError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl HabitBackend for UnavailableBackend {
    async fn fetch_habits(&self, _user: &UserId) -> Result<Vec<HabitRecord>, BackendError> {
        if self.reads_fail {
            return Err(unavailable());
        }
        Ok(Vec::new())
    }

    async fn fetch_completions(
        &self,
        _user: &UserId,
    ) -> Result<Vec<CompletionRecord>, BackendError> {
        if self.reads_fail {
            return Err(unavailable());
        }
        Ok(Vec::new())
    }

    async fn insert_habit(
        &self,
        _user: &UserId,
        _name: &str,
        _section: Section,
    ) -> Result<HabitRecord, BackendError> {
        Err(unavailable())
    }

    async fn delete_habit(&self, _user: &UserId, _habit_id: &str) -> Result<(), BackendError> {
        Err(unavailable())
    }

    async fn update_habit(
        &self,
        _user: &UserId,
        _habit_id: &str,
        _patch: &HabitPatch,
    ) -> Result<HabitRecord, BackendError> {
        Err(unavailable())
    }

    async fn insert_completion(
        &self,
        _user: &UserId,
        _habit_id: &str,
        _date: &str,
    ) -> Result<(), BackendError> {
        Err(unavailable())
    }

    async fn delete_completion(
        &self,
        _user: &UserId,
        _habit_id: &str,
        _date: &str,
    ) -> Result<(), BackendError> {
        Err(unavailable())
    }
}

async fn serve(backend: UnavailableBackend) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(AppState::new(Arc::new(backend)));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn failed_write_is_service_unavailable() {
    let base_url = serve(UnavailableBackend { reads_fail: false }).await;
    let client = Client::new();

    let response = client
        .post(format!("{base_url}/api/habits"))
        .header("x-user-id", "alice")
        .json(&json!({ "name": "Run", "section": "Body and Mind" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let habits: Vec<serde_json::Value> = client
        .get(format!("{base_url}/api/habits"))
        .header("x-user-id", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(habits.is_empty());
}

#[tokio::test]
async fn failed_load_is_service_unavailable() {
    let base_url = serve(UnavailableBackend { reads_fail: true }).await;
    let client = Client::new();

    for path in ["/api/habits", "/api/stats", "/api/day"] {
        let response = client
            .get(format!("{base_url}{path}"))
            .header("x-user-id", "alice")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{path}");
    }
}

#[tokio::test]
async fn validation_fails_before_backend_is_reached() {
    let base_url = serve(UnavailableBackend { reads_fail: true }).await;
    let client = Client::new();

    let response = client
        .post(format!("{base_url}/api/habits/anything/toggle"))
        .header("x-user-id", "alice")
        .header("content-type", "application/json")
        .body(r#"{"date": 20260105}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
