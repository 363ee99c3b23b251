//! HTTP surface tests against the real router with in-process index and
//! generator stand-ins.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use resume_review_server::{
    build_router,
    index::{DocumentIndex, IndexError, IndexHandle, SearchHit},
    services::{ReviewService, TextGenerator},
    session::{SessionManager, SnapshotFile, SESSION_HEADER},
    AppState,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

#[derive(Default)]
struct FakeIndex {
    hits: Vec<SearchHit>,
    fail_upload: bool,
    /// Remove the uploading session before indexing returns, as an expiry would
    expire_during_upload: bool,
    sessions: Mutex<Option<SessionManager>>,
    /// Temp file seen by the last upload, with its contents at that moment
    last_upload: Mutex<Option<(PathBuf, String)>>,
    has_storage: Mutex<bool>,
    dropped: Mutex<Vec<String>>,
}

#[async_trait]
impl DocumentIndex for FakeIndex {
    async fn embed_and_index(
        &self,
        session_id: &str,
        path: &Path,
        source: &str,
    ) -> Result<IndexHandle, IndexError> {
        let contents = std::fs::read_to_string(path)?;
        *self.last_upload.lock().unwrap() = Some((path.to_path_buf(), contents));

        if self.fail_upload {
            return Err(IndexError::Upstream(anyhow::anyhow!("embedding server down")));
        }

        if self.expire_during_upload {
            let sessions = self.sessions.lock().unwrap().clone();
            if let Some(sessions) = sessions {
                sessions.remove(session_id).await;
            }
        }

        *self.has_storage.lock().unwrap() = true;
        Ok(IndexHandle {
            collection: format!("resume_{}", session_id),
            source: source.to_string(),
            chunk_count: 1,
        })
    }

    async fn search(
        &self,
        _handle: &IndexHandle,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }

    async fn drop_collection(&self, handle: &IndexHandle) -> Result<(), IndexError> {
        self.dropped.lock().unwrap().push(handle.collection.clone());
        Ok(())
    }

    async fn delete_storage(&self) -> Result<(), IndexError> {
        let mut has_storage = self.has_storage.lock().unwrap();
        if !*has_storage {
            return Err(IndexError::StorageNotFound);
        }
        *has_storage = false;
        Ok(())
    }
}

struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(format!("review of: {}", prompt))
    }
}

struct TestApp {
    router: Router,
    sessions: SessionManager,
    index: Arc<FakeIndex>,
    _dir: tempfile::TempDir,
}

fn test_app(index: FakeIndex) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(index);
    let sessions = SessionManager::with_collections(
        SnapshotFile::new(dir.path().join("sessions.json")),
        Duration::from_secs(600),
        index.clone(),
    );
    *index.sessions.lock().unwrap() = Some(sessions.clone());
    let review_service = Arc::new(ReviewService::new(
        index.clone(),
        Arc::new(EchoGenerator),
        "{context}|{question}".to_string(),
        4,
    ));

    let state = AppState {
        sessions: sessions.clone(),
        index: index.clone(),
        review_service,
    };

    TestApp {
        router: build_router(state, 1024 * 1024),
        sessions,
        index,
        _dir: dir,
    }
}

fn hit(content: &str) -> SearchHit {
    SearchHit {
        content: content.to_string(),
        source: "resume.pdf".to_string(),
        chunk_index: 0,
        score: 0.8,
    }
}

fn upload_request(session_id: Option<&str>, filename: &str, contents: &str) -> Request<Body> {
    let boundary = "resume-review-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {contents}\r\n\
         --{boundary}--\r\n"
    );

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        );
    if let Some(id) = session_id {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::from(body)).unwrap()
}

fn query_request(session_id: Option<&str>, query: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(id) = session_id {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder
        .body(Body::from(serde_json::json!({ "query": query }).to_string()))
        .unwrap()
}

fn delete_request() -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri("/delete")
        .body(Body::empty())
        .unwrap()
}

/// Status, echoed session id and raw body.
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let session = response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, session, String::from_utf8(body.to_vec()).unwrap())
}

fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = test_app(FakeIndex::default());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "healthy");
}

#[tokio::test]
async fn test_upload_creates_session_and_attaches_index() {
    let app = test_app(FakeIndex::default());

    let (status, header_id, body) =
        send(&app.router, upload_request(None, "resume.txt", "Jane Doe, Rust")).await;

    assert_eq!(status, StatusCode::CREATED);
    let body = json(&body);
    let session_id = body["response"]["session_id"].as_str().unwrap().to_string();
    assert_eq!(header_id.as_deref(), Some(session_id.as_str()));
    assert_eq!(body["response"]["message"], "Database resume.txt created");

    let session = app.sessions.peek(&session_id).await.unwrap();
    let handle = session.index.unwrap();
    assert_eq!(handle.collection, format!("resume_{}", session_id));
    assert_eq!(handle.source, "resume.txt");

    let (temp_path, contents) = app.index.last_upload.lock().unwrap().clone().unwrap();
    assert_eq!(contents, "Jane Doe, Rust");
    assert!(!temp_path.exists());
}

#[tokio::test]
async fn test_upload_reuses_known_session() {
    let app = test_app(FakeIndex::default());
    let (existing, _) = app.sessions.resolve(None).await;

    let (status, header_id, _) = send(
        &app.router,
        upload_request(Some(&existing), "cv.md", "# Jane"),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(header_id.as_deref(), Some(existing.as_str()));
    assert_eq!(app.sessions.len().await, 1);
}

#[tokio::test]
async fn test_upload_failure_is_500_and_cleans_temp_file() {
    let app = test_app(FakeIndex {
        fail_upload: true,
        ..Default::default()
    });

    let (status, _, body) =
        send(&app.router, upload_request(None, "resume.txt", "Jane Doe")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json(&body)["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Error creating vector store"));
    assert!(detail.contains("embedding server down"));

    let (temp_path, _) = app.index.last_upload.lock().unwrap().clone().unwrap();
    assert!(!temp_path.exists());
}

#[tokio::test]
async fn test_upload_into_expired_session_is_404_and_drops_collection() {
    let app = test_app(FakeIndex {
        expire_during_upload: true,
        ..Default::default()
    });

    let (status, _, body) =
        send(&app.router, upload_request(None, "resume.txt", "Jane Doe")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"], "NotFound");
    assert!(app.sessions.is_empty().await);

    let (temp_path, _) = app.index.last_upload.lock().unwrap().clone().unwrap();
    assert!(!temp_path.exists());

    // The freshly built collection has no session left to own it.
    let dropped = app.index.dropped.lock().unwrap().clone();
    assert_eq!(dropped.len(), 1);
    assert!(dropped[0].starts_with("resume_"));
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let app = test_app(FakeIndex::default());

    let boundary = "b";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_query_before_upload_is_400() {
    let app = test_app(FakeIndex::default());

    let (status, header_id, body) = send(&app.router, query_request(None, "Backend role")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["detail"], "No documents have been added yet");
    // A session was still minted for the caller.
    assert!(header_id.is_some());
}

#[tokio::test]
async fn test_query_after_upload_answers_with_sources() {
    let app = test_app(FakeIndex {
        hits: vec![hit("Rust at Acme"), hit("Go at Initech")],
        ..Default::default()
    });

    let (_, session_id, _) =
        send(&app.router, upload_request(None, "resume.pdf", "ignored")).await;
    let session_id = session_id.unwrap();

    let (status, header_id, body) = send(
        &app.router,
        query_request(Some(&session_id), "Fullstack Engineer"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header_id.as_deref(), Some(session_id.as_str()));
    let body = json(&body);
    assert_eq!(
        body["response"]["answer"],
        "review of: Rust at Acme\nGo at Initech|Fullstack Engineer"
    );
    assert_eq!(
        body["response"]["sources"],
        serde_json::json!(["resume.pdf", "resume.pdf"])
    );
}

#[tokio::test]
async fn test_query_without_matches_returns_plain_message() {
    let app = test_app(FakeIndex::default());

    let (_, session_id, _) =
        send(&app.router, upload_request(None, "resume.pdf", "ignored")).await;

    let (status, _, body) = send(
        &app.router,
        query_request(session_id.as_deref(), "Data Scientist"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Unable to find matching results");
}

#[tokio::test]
async fn test_unknown_session_header_gets_fresh_id() {
    let app = test_app(FakeIndex::default());

    let (_, header_id, _) = send(&app.router, query_request(Some("stale-id"), "q")).await;

    let fresh = header_id.unwrap();
    assert_ne!(fresh, "stale-id");
    assert!(app.sessions.peek(&fresh).await.is_some());
}

#[tokio::test]
async fn test_delete_storage_then_not_found() {
    let app = test_app(FakeIndex::default());

    let (status, _, body) = send(&app.router, delete_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["detail"], "Database not found");

    let (_, session_id, _) =
        send(&app.router, upload_request(None, "resume.pdf", "ignored")).await;
    let session_id = session_id.unwrap();

    let (status, _, body) = send(&app.router, delete_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Database deleted");

    // Handles into the wiped storage are dropped.
    let session = app.sessions.peek(&session_id).await.unwrap();
    assert!(session.index.is_none());
}
