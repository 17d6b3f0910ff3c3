use firestore_nexus::{AuthSession, Config, CredentialStore, NexusError, SignInParams};
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer, dir: &TempDir) -> Config {
    let base = Url::parse(&server.uri()).expect("mock server uri");
    Config {
        project_id: "demo-project".to_string(),
        project_key: "test-key".to_string(),
        auth_email: "jeff@example.com".to_string(),
        auth_password: "hunter2".to_string(),
        token_path: dir.path().join("firebase_auth_token.json"),
        identity_base: base.clone(),
        securetoken_base: base.clone(),
        firestore_base: base,
        ..Config::default()
    }
}

#[tokio::test]
async fn password_sign_in_persists_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");

    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .and(query_param("key", "test-key"))
        .and(body_json(json!({
            "email": "jeff@example.com",
            "password": "hunter2",
            "returnSecureToken": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": "eyJhbGciOi.first",
            "refreshToken": "refresh-1",
            "expiresIn": "3600"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = test_config(&server, &dir);
    let token_path = cfg.token_path.clone();
    let session = AuthSession::start(cfg).await.expect("session");

    let token = session
        .acquire_via_password(SignInParams::default(), false)
        .await
        .expect("sign-in");

    assert_eq!(token.as_deref(), Some("eyJhbGciOi.first"));
    assert_eq!(session.current_token().as_deref(), Some("eyJhbGciOi.first"));
    let on_disk = std::fs::read_to_string(token_path).expect("token file");
    assert_eq!(on_disk, r#"{"id_token":"eyJhbGciOi.first"}"#);
    assert!(!session.refresh().is_armed().await.expect("is_armed"));

    session.shutdown();
}

#[tokio::test]
async fn explicit_credentials_override_configured_ones() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");

    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .and(body_json(json!({
            "email": "other@example.com",
            "password": "secret",
            "returnSecureToken": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": "eyJ.other"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = AuthSession::start(test_config(&server, &dir))
        .await
        .expect("session");
    let token = session
        .acquire_via_password(SignInParams::password("other@example.com", "secret"), false)
        .await
        .expect("sign-in");

    assert_eq!(token.as_deref(), Some("eyJ.other"));
    session.shutdown();
}

#[tokio::test]
async fn rejected_sign_in_is_soft_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");

    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "INVALID_PASSWORD", "errors": [] }
        })))
        .mount(&server)
        .await;

    let mut cfg = test_config(&server, &dir);
    cfg.token = "previous".to_string();
    let session = AuthSession::start(cfg).await.expect("session");

    let token = session
        .acquire_via_password(SignInParams::default(), true)
        .await
        .expect("rejection is not an error");

    assert_eq!(token, None);
    assert_eq!(session.current_token().as_deref(), Some("previous"));
    assert!(!session.refresh().is_armed().await.expect("is_armed"));
    session.shutdown();
}

#[tokio::test]
async fn lifetime_without_token_still_schedules_refresh() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");

    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refreshToken": "refresh-1",
            "expiresIn": "3600"
        })))
        .mount(&server)
        .await;

    let session = AuthSession::start(test_config(&server, &dir))
        .await
        .expect("session");

    let token = session
        .acquire_via_password(SignInParams::default(), true)
        .await
        .expect("missing idToken is not an error");

    assert_eq!(token, None);
    assert_eq!(session.current_token(), None);
    assert!(session.refresh().is_armed().await.expect("is_armed"));
    session.refresh().cancel();
    session.shutdown();
}

#[tokio::test]
async fn refresh_grant_posts_refresh_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");

    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .and(query_param("key", "test-key"))
        .and(body_json(json!({
            "refresh_token": "refresh-1",
            "grant_type": "refresh_token"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "eyJ.refreshed",
            "refresh_token": "refresh-2",
            "expires_in": "3600",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = AuthSession::start(test_config(&server, &dir))
        .await
        .expect("session");
    let params = SignInParams::refresh(oauth2::RefreshToken::new("refresh-1".to_string()));
    let token = session
        .acquire_via_password(params, false)
        .await
        .expect("refresh");

    assert_eq!(token.as_deref(), Some("eyJ.refreshed"));
    assert_eq!(session.current_token().as_deref(), Some("eyJ.refreshed"));
    session.shutdown();
}

#[tokio::test]
async fn non_json_identity_response_is_an_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");

    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let session = AuthSession::start(test_config(&server, &dir))
        .await
        .expect("session");
    let err = session
        .acquire_via_password(SignInParams::default(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, NexusError::Json(_)));
    session.shutdown();
}

#[cfg(unix)]
#[tokio::test]
async fn service_account_flow_uses_helper_output() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");

    let mut cfg = test_config(&server, &dir);
    cfg.helper_program = "printf".to_string();
    cfg.helper_args = "ya29.helper-token\\n".to_string();
    let token_cfg = cfg.clone();
    let session = AuthSession::start(cfg).await.expect("session");

    let token = session
        .acquire_via_service_account()
        .await
        .expect("helper token");
    assert_eq!(token, "ya29.helper-token");

    let reopened = CredentialStore::open(&token_cfg).await;
    assert_eq!(reopened.current_token().as_deref(), Some("ya29.helper-token"));
    session.shutdown();
}

#[cfg(unix)]
#[tokio::test]
async fn failing_helper_keeps_previous_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");

    let mut cfg = test_config(&server, &dir);
    cfg.token = "previous".to_string();
    cfg.helper_program = "false".to_string();
    cfg.helper_args = String::new();
    let session = AuthSession::start(cfg).await.expect("session");

    let err = session.acquire_via_service_account().await.unwrap_err();
    assert!(matches!(err, NexusError::HelperExecution(_)));
    assert_eq!(session.current_token().as_deref(), Some("previous"));
    session.shutdown();
}
