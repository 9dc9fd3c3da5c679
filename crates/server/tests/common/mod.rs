#![allow(dead_code)]

use axum_test::TestServer;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use serde_json::json;
use std::sync::Arc;
use surfer::AppState;
use surfer::clock::ManualClock;
use surfer::config::{AppConfig, ProviderConfig, SessionConfig};
use surfer::entity::user::Role;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";
/// The only authorization code the mock provider accepts.
pub const GOOD_CODE: &str = "good-code";
const ACCESS_TOKEN: &str = "provider-access-token";

pub async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT '',
            picture TEXT NOT NULL DEFAULT '',
            provider_subject TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'pending',
            status TEXT NOT NULL DEFAULT 'pending',
            approved_by TEXT NULL,
            approved_at TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("create users table");
    db
}

pub fn test_config(provider_uri: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        frontend_url: Some("http://localhost:3000".into()),
        oauth: ProviderConfig {
            client_id: "client-123".into(),
            client_secret: "client-secret".into(),
            redirect_url: "http://localhost:8080/api/v1/auth/google/callback".into(),
            auth_url: format!("{provider_uri}/o/oauth2/auth"),
            token_url: format!("{provider_uri}/token"),
            userinfo_url: format!("{provider_uri}/userinfo"),
            scopes: vec!["email".into(), "profile".into()],
            http_timeout_secs: 5,
        },
        session: SessionConfig {
            secret: Some(TEST_SECRET.into()),
            ..SessionConfig::default()
        },
    }
}

/// Make the mock provider accept [`GOOD_CODE`] and resolve it to the given profile.
pub async fn mount_provider(provider: &MockServer, subject: &str, email: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(format!("code={GOOD_CODE}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .with_priority(1)
        .mount(provider)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Bad Request",
        })))
        .with_priority(10)
        .mount(provider)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": subject,
            "email": email,
            "verified_email": true,
            "name": "Test User",
            "picture": "https://example.com/avatar.png",
        })))
        .mount(provider)
        .await;
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub clock: ManualClock,
    pub provider: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let provider = MockServer::start().await;
        let clock = ManualClock::starting_now();
        let db = Arc::new(create_test_db().await);
        let state = AppState::new(
            test_config(&provider.uri()),
            db,
            Arc::new(clock.clone()),
            CancellationToken::new(),
        )
        .expect("build app state");
        let server = TestServer::new(surfer::api::router(state.clone())).expect("test server");

        Self {
            server,
            state,
            clock,
            provider,
        }
    }

    /// Start a login attempt and return the correlation token from the consent URL.
    pub async fn begin_login(&self) -> String {
        let response = self.server.get("/api/v1/auth/google/login").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let url = oauth2::url::Url::parse(body["url"].as_str().expect("url")).expect("valid url");
        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("state parameter")
    }

    /// Run a full login for the identity mounted on the provider.
    pub async fn login(&self) -> axum_test::TestResponse {
        let state = self.begin_login().await;
        self.server
            .get("/api/v1/auth/google/callback")
            .add_query_param("state", state)
            .add_query_param("code", GOOD_CODE)
            .await
    }

    /// A valid credential for a made-up account holding `role`.
    pub fn credential_for(&self, role: Role) -> String {
        self.state
            .credentials
            .issue("acct-test", "test@example.com", role)
            .expect("issue credential")
    }
}
