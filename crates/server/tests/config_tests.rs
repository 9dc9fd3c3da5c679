use config::Config;
use std::env;
use std::fs;
use std::time::Duration;
use surfer::config::{AppConfig, ProviderConfig, SessionConfig, validate};

fn from_yaml<T: serde::de::DeserializeOwned>(yaml: &str) -> Result<T, config::ConfigError> {
    Config::builder()
        .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
        .build()
        .expect("Failed to build config")
        .try_deserialize()
}

#[test]
fn test_provider_config_defaults_to_google() {
    let provider: ProviderConfig = from_yaml(
        r#"
client_id: "client-123"
client_secret: "secret123"
redirect_url: "http://localhost:8080/api/v1/auth/google/callback"
"#,
    )
    .expect("Failed to deserialize provider config");

    assert_eq!(provider.client_id, "client-123");
    assert_eq!(provider.auth_url, "https://accounts.google.com/o/oauth2/auth");
    assert_eq!(provider.token_url, "https://oauth2.googleapis.com/token");
    assert_eq!(
        provider.userinfo_url,
        "https://www.googleapis.com/oauth2/v2/userinfo"
    );
    assert_eq!(provider.scopes.len(), 2);
    assert_eq!(provider.http_timeout(), Duration::from_secs(10));
}

#[test]
fn test_app_config_deserialization() {
    let app_config: AppConfig = from_yaml(
        r#"
database_url: "postgres://localhost/test"
listen_addr: "127.0.0.1:9000"
frontend_url: "https://dashboard.example.com"
oauth:
  client_id: "client-123"
  client_secret: "secret123"
  redirect_url: "https://dashboard.example.com/callback"
session:
  secret: "0123456789abcdef0123456789abcdef"
  credential_ttl_secs: 3600
  cookie_secure: true
"#,
    )
    .expect("Failed to deserialize app config");

    assert_eq!(app_config.database_url, "postgres://localhost/test");
    assert_eq!(app_config.listen_addr, "127.0.0.1:9000");
    assert_eq!(
        app_config.frontend_url.as_deref(),
        Some("https://dashboard.example.com")
    );
    assert_eq!(app_config.session.credential_ttl(), Duration::from_secs(3600));
    // Unset lifetimes keep their defaults
    assert_eq!(app_config.session.state_ttl(), Duration::from_secs(300));
    assert!(app_config.session.cookie_secure);
    assert!(validate(&app_config).is_ok());
}

#[test]
fn test_config_with_environment_variables() {
    let temp_dir = env::temp_dir();
    let config_path = temp_dir.join("surfer_test_config.yaml");
    let config_content = r#"
database_url: "postgres://file/test"
oauth:
  client_id: "file-client"
  client_secret: "file-secret"
  redirect_url: "https://file.example.com/callback"
"#;
    fs::write(&config_path, config_content).expect("Failed to write temp config");

    unsafe {
        env::set_var("SURFERTEST__DATABASE_URL", "postgres://env/test");
        env::set_var("SURFERTEST__OAUTH__CLIENT_ID", "env-client");

        let config = Config::builder()
            .add_source(config::File::from(config_path.clone()))
            .add_source(
                config::Environment::default()
                    .prefix("SURFERTEST")
                    .separator("__"),
            )
            .build()
            .expect("Failed to build config");

        let app_config: AppConfig = config.try_deserialize().expect("Failed to deserialize");

        assert_eq!(app_config.database_url, "postgres://env/test");
        assert_eq!(app_config.oauth.client_id, "env-client");
        assert_eq!(app_config.oauth.client_secret, "file-secret");

        env::remove_var("SURFERTEST__DATABASE_URL");
        env::remove_var("SURFERTEST__OAUTH__CLIENT_ID");
        let _ = fs::remove_file(config_path);
    }
}

#[test]
fn test_config_missing_oauth_section() {
    let result: Result<AppConfig, _> = from_yaml(
        r#"
database_url: "postgres://localhost/test"
"#,
    );
    assert!(result.is_err(), "Should fail when the oauth section is missing");
}

#[test]
fn test_validate_rejects_zero_lifetimes() {
    let mut app_config: AppConfig = from_yaml(
        r#"
oauth:
  client_id: "client-123"
  client_secret: "secret123"
  redirect_url: "http://localhost/callback"
session:
  secret: "0123456789abcdef0123456789abcdef"
"#,
    )
    .expect("Failed to deserialize app config");
    assert!(validate(&app_config).is_ok());

    app_config.session = SessionConfig {
        state_ttl_secs: 0,
        ..app_config.session.clone()
    };
    assert!(validate(&app_config).is_err());
}

#[test]
fn test_validate_requires_client_id() {
    let app_config: AppConfig = from_yaml(
        r#"
oauth:
  client_id: ""
  client_secret: "secret123"
  redirect_url: "http://localhost/callback"
"#,
    )
    .expect("Failed to deserialize app config");
    assert!(validate(&app_config).is_err());
}

#[test]
fn test_validate_rejects_unparsable_frontend_url() {
    let mut app_config: AppConfig = from_yaml(
        r#"
frontend_url: "https://dashboard.example.com/"
oauth:
  client_id: "client-123"
  client_secret: "secret123"
  redirect_url: "http://localhost/callback"
session:
  secret: "0123456789abcdef0123456789abcdef"
"#,
    )
    .expect("Failed to deserialize app config");
    assert!(validate(&app_config).is_ok());
    assert_eq!(
        app_config.frontend_origin().unwrap().unwrap(),
        "https://dashboard.example.com"
    );

    for bad in ["not a url", "ftp://dashboard.example.com", "http://bad\nhost"] {
        app_config.frontend_url = Some(bad.to_string());
        assert!(validate(&app_config).is_err(), "{bad} should be rejected");
    }
}

