//! HTTP-level tests for the birdrace-api router

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use birdrace_api::db::users;
use birdrace_api::email::{EmailError, EmailMessage, EmailProvider};
use birdrace_api::{build_router, AppState};
use birdrace_common::config::Config;
use birdrace_common::db::init_database;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::util::ServiceExt;

const BOUNDARY: &str = "birdrace-test-boundary";

const SAMPLE_CSV: &str = "Submission ID,Common Name,Scientific Name,Taxonomic Order,Count,State/Province,County,Location,Latitude,Longitude,Date,Time
S1,Northern Cardinal,Cardinalis cardinalis,1,2,US-NY,Kings,Prospect Park,40.66,-73.97,2026-01-05,07:15 AM
S1,Blue Jay,Cyanocitta cristata,2,1,US-NY,Kings,Prospect Park,40.66,-73.97,2026-01-05,07:15 AM
S2,gull sp.,Larinae sp.,3,5,US-NJ,,Shore,40.0,-74.0,2026-03-10,
S3,American Robin,Turdus migratorius,4,X,US-NJ,Monmouth,Yard,40.1,-74.1,2026-03-12,09:00 AM
S0,House Sparrow,Passer domesticus,5,1,US-NY,Kings,Old,40.6,-73.9,2025-12-30,
";

/// Keeps every message instead of sending it
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Rejects every message
struct FailingMailer;

#[async_trait]
impl EmailProvider for FailingMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<(), EmailError> {
        Err(EmailError::SendFailed("provider unavailable".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct TestApp {
    _dir: TempDir,
    state: AppState,
    mailer: Arc<RecordingMailer>,
}

impl TestApp {
    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Create a user directly and return a bearer token for them
    async fn login(&self, email: &str) -> String {
        let user = users::get_or_create_user(&self.state.db, email).await.unwrap();
        self.state.tokens.issue(user.id, &user.email)
    }
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        data_folder: dir.path().to_path_buf(),
        target_year: 2026,
        token_secret: "integration-test-secret-0123456789".to_string(),
        frontend_url: "http://frontend.test".to_string(),
        max_upload_bytes: 4096,
        ..Config::default()
    }
}

async fn create_test_app_with(mailer: Option<Arc<dyn EmailProvider>>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("birdrace.db")).await.unwrap();
    let config = test_config(&dir);

    let recorder = Arc::new(RecordingMailer::default());
    let provider: Arc<dyn EmailProvider> = match mailer {
        Some(mailer) => mailer,
        None => recorder.clone(),
    };
    let state = AppState::new(pool, config, provider).unwrap();

    TestApp {
        _dir: dir,
        state,
        mailer: recorder,
    }
}

async fn create_test_app() -> TestApp {
    create_test_app_with(None).await
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn upload_request(token: &str, file_name: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = file_name,
        c = contents
    );

    Request::builder()
        .method("POST")
        .uri("/upload/csv")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Pull the login token out of an emailed magic link
fn token_from_email(message: &EmailMessage) -> String {
    let start = message.html.find("token=").unwrap() + "token=".len();
    message.html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    let response = app.router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["module"], "birdrace-api");
}

#[tokio::test]
async fn test_root_banner() {
    let app = create_test_app().await;

    let response = app.router().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_magic_link_login_flow() {
    let app = create_test_app().await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/auth/request-magic-link",
            None,
            json!({ "email": "  Ann@Example.com " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["expires_in"], 15 * 60);

    let messages = app.mailer.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].to, "ann@example.com");
    assert!(messages[0].html.contains("http://frontend.test/auth/verify?token="));

    let token = token_from_email(&messages[0]);
    let verify_uri = format!("/auth/verify?token={}", token);

    let response = app.router().oneshot(get(&verify_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["email"], "ann@example.com");
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let response = app
        .router()
        .oneshot(get_authed("/user/me", &access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Second use of the same link fails
    let response = app.router().oneshot(get(&verify_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_rejects_unknown_and_missing_token() {
    let app = create_test_app().await;

    let response = app.router().oneshot(get("/auth/verify?token=nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.router().oneshot(get("/auth/verify")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_magic_link_rejects_bad_email() {
    let app = create_test_app().await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/auth/request-magic-link",
            None,
            json!({ "email": "not-an-email" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.mailer.messages().is_empty());
}

#[tokio::test]
async fn test_login_email_failure_is_bad_gateway() {
    let app = create_test_app_with(Some(Arc::new(FailingMailer))).await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/auth/request-magic-link",
            None,
            json!({ "email": "ann@example.com" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "EMAIL_DELIVERY_FAILED");
    assert_eq!(
        body["error"]["message"],
        birdrace_api::error::LOGIN_EMAIL_FAILURE
    );
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let app = create_test_app().await;

    let response = app.router().oneshot(get("/user/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(get_authed("/user/me", "garbage.token.value"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(upload_request("garbage", "data.csv", SAMPLE_CSV))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_user_is_rejected() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;

    sqlx::query("DELETE FROM users")
        .execute(&app.state.db)
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(get_authed("/user/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_and_profile_stats() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;

    let response = app
        .router()
        .oneshot(upload_request(&token, "MyEBirdData.CSV", SAMPLE_CSV))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "CSV processed successfully");
    assert_eq!(body["stats"]["rows_seen"], 4);
    assert_eq!(body["stats"]["rows_imported"], 4);
    assert_eq!(body["stats"]["earliest_date"], "2026-01-05");
    assert_eq!(body["stats"]["latest_date"], "2026-03-12");

    let response = app
        .router()
        .oneshot(get_authed("/user/me", &token))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["email"], "ann@example.com");
    assert_eq!(body["stats"]["species_count"], 3);
    assert_eq!(body["stats"]["total_observations"], 4);
    assert_eq!(body["stats"]["states_visited"], 2);
    assert!(!body["stats"]["last_upload"].is_null());

    // Same file again only produces duplicates
    let response = app
        .router()
        .oneshot(upload_request(&token, "MyEBirdData.csv", SAMPLE_CSV))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["stats"]["rows_imported"], 0);
    assert_eq!(body["stats"]["rows_duplicate"], 4);
}

#[tokio::test]
async fn test_upload_rejects_non_csv_name() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;

    let response = app
        .router()
        .oneshot(upload_request(&token, "export.txt", SAMPLE_CSV))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "File must be a CSV file");
}

#[tokio::test]
async fn test_upload_reports_missing_columns() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;

    let csv = "Common Name,Date\nBlue Jay,2026-01-01\n";
    let response = app
        .router()
        .oneshot(upload_request(&token, "data.csv", csv))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Missing required columns:"));
    assert!(message.contains("Scientific Name"));
}

#[tokio::test]
async fn test_upload_over_size_limit() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;

    // Test config caps uploads at 4096 bytes
    let mut csv = String::from(SAMPLE_CSV);
    while csv.len() <= 5000 {
        csv.push_str("S1,Blue Jay,Cyanocitta cristata,2,1,US-NY,Kings,Prospect Park,40.66,-73.97,2026-01-05,07:15 AM\n");
    }

    let response = app
        .router()
        .oneshot(upload_request(&token, "data.csv", &csv))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_observation_listing() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;
    app.router()
        .oneshot(upload_request(&token, "data.csv", SAMPLE_CSV))
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(get_authed("/user/me/observations?limit=2", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 4);
    let page = body["observations"].as_array().unwrap();
    assert_eq!(page.len(), 2);
    // Newest first
    assert_eq!(page[0]["common_name"], "American Robin");

    let response = app
        .router()
        .oneshot(get_authed("/user/me/observations?state=US-NJ", &token))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);

    let response = app
        .router()
        .oneshot(get_authed("/user/me/observations?limit=0", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_geographic_stats() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;
    app.router()
        .oneshot(upload_request(&token, "data.csv", SAMPLE_CSV))
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(get_authed("/user/me/geographic-stats", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["states_visited"],
        json!([
            { "state": "US-NJ", "species_count": 1, "counties": ["Monmouth"] },
            { "state": "US-NY", "species_count": 2, "counties": ["Kings"] },
        ])
    );
}

#[tokio::test]
async fn test_profile_update_validation() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;

    let response = app
        .router()
        .oneshot(json_request("PATCH", "/user/me", Some(&token), json!({ "name": "   " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router()
        .oneshot(json_request(
            "PATCH",
            "/user/me",
            Some(&token),
            json!({ "privacy_level": "secret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router()
        .oneshot(json_request(
            "PATCH",
            "/user/me",
            Some(&token),
            json!({ "name": "  Ann Birder ", "privacy_level": "counts_only" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Ann Birder");
    assert_eq!(body["privacy_level"], "counts_only");
}

#[tokio::test]
async fn test_leaderboard_and_public_species() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;
    app.router()
        .oneshot(upload_request(&token, "data.csv", SAMPLE_CSV))
        .await
        .unwrap();
    let ann = users::get_user_by_email(&app.state.db, "ann@example.com")
        .await
        .unwrap()
        .unwrap();

    let response = app.router().oneshot(get("/leaderboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["year"], 2026);
    assert_eq!(body["participants"], 1);
    assert_eq!(body["leaderboard"][0]["rank"], 1);
    assert_eq!(body["leaderboard"][0]["species_count"], 3);

    let species_uri = format!("/leaderboard/{}/species?sort=date", ann.id);
    let response = app.router().oneshot(get(&species_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["species_count"], 3);
    assert_eq!(body["species"][2]["common_name"], "American Robin");
    assert_eq!(body["species"][2]["state_province"], "US-NJ");

    let progress_uri = format!("/leaderboard/{}/progress", ann.id);
    let response = app.router().oneshot(get(&progress_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["monthly_progress"][0]["month"], "2026-01");
    assert_eq!(body["monthly_progress"][1]["species_count"], 3);

    // counts_only hides locations
    app.router()
        .oneshot(json_request(
            "PATCH",
            "/user/me",
            Some(&token),
            json!({ "privacy_level": "counts_only" }),
        ))
        .await
        .unwrap();
    let response = app.router().oneshot(get(&species_uri)).await.unwrap();
    let body = body_json(response).await;
    assert!(body["species"][0]["state_province"].is_null());
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_leaderboard_limit_validation() {
    let app = create_test_app().await;

    for uri in ["/leaderboard?limit=0", "/leaderboard?limit=501"] {
        let response = app.router().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }

    let response = app.router().oneshot(get("/leaderboard?limit=500")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_private_user_is_indistinguishable_from_unknown() {
    let app = create_test_app().await;
    let token = app.login("ann@example.com").await;
    app.router()
        .oneshot(upload_request(&token, "data.csv", SAMPLE_CSV))
        .await
        .unwrap();
    let ann = users::get_user_by_email(&app.state.db, "ann@example.com")
        .await
        .unwrap()
        .unwrap();

    let response = app
        .router()
        .oneshot(json_request(
            "PATCH",
            "/user/me",
            Some(&token),
            json!({ "privacy_level": "private" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.router().oneshot(get("/leaderboard")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["participants"], 0);
    assert_eq!(body["leaderboard"], json!([]));

    let private = app
        .router()
        .oneshot(get(&format!("/leaderboard/{}/species", ann.id)))
        .await
        .unwrap();
    let unknown = app
        .router()
        .oneshot(get(&format!("/leaderboard/{}/species", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    let malformed = app
        .router()
        .oneshot(get("/leaderboard/not-a-uuid/species"))
        .await
        .unwrap();

    assert_eq!(private.status(), StatusCode::NOT_FOUND);
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(malformed.status(), StatusCode::NOT_FOUND);

    let private = body_json(private).await;
    assert_eq!(private, body_json(unknown).await);
    assert_eq!(private, body_json(malformed).await);

    let response = app
        .router()
        .oneshot(get(&format!("/leaderboard/{}/progress", ann.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_species_sort_validation() {
    let app = create_test_app().await;
    app.login("ann@example.com").await;
    let ann = users::get_user_by_email(&app.state.db, "ann@example.com")
        .await
        .unwrap()
        .unwrap();

    let response = app
        .router()
        .oneshot(get(&format!("/leaderboard/{}/species?sort=size", ann.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feature_request() {
    let app = create_test_app().await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/feedback/feature-request",
            None,
            json!({ "suggestion": "too short" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.mailer.messages().is_empty());

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/feedback/feature-request",
            None,
            json!({
                "suggestion": "Please add a <b>county</b> leaderboard",
                "email": "Fan@Example.com"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let messages = app.mailer.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].reply_to.as_deref(), Some("fan@example.com"));
    assert!(messages[0].html.contains("&lt;b&gt;county&lt;/b&gt;"));
}

#[tokio::test]
async fn test_feature_request_email_failure() {
    let app = create_test_app_with(Some(Arc::new(FailingMailer))).await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/feedback/feature-request",
            None,
            json!({ "suggestion": "A perfectly reasonable idea" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
