//! Integration tests for the upstream session manager.
//!
//! The token endpoint is a wiremock server; credentials persist to SQLite.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chapter_stitch::{
    AuthClient, AuthError, CredentialPair, CredentialStore, Database, SessionManager,
    SqliteCredentialStore,
};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::{auth_config, mount_login, mount_refresh};

async fn in_memory_store() -> Arc<SqliteCredentialStore> {
    Arc::new(SqliteCredentialStore::new(
        Database::new_in_memory().await.unwrap(),
    ))
}

fn manager(server: &MockServer, store: Arc<SqliteCredentialStore>) -> SessionManager {
    SessionManager::new(AuthClient::new(auth_config(server)).unwrap(), store)
}

#[tokio::test]
async fn test_first_use_logs_in_and_persists() {
    let server = MockServer::start().await;
    mount_login(&server, "a1", "r1", 1).await;
    let store = in_memory_store().await;
    let session = manager(&server, store.clone());

    assert_eq!(session.access_token().await.unwrap(), "a1");
    // Second call reuses the in-memory pair; login stays at one call.
    assert_eq!(session.access_token().await.unwrap(), "a1");

    let persisted = store.find_latest().await.unwrap().unwrap();
    assert_eq!(persisted.access_token(), "a1");
    assert_eq!(persisted.refresh_token(), "r1");
}

#[tokio::test]
async fn test_stale_pair_is_refreshed_before_use() {
    let server = MockServer::start().await;
    mount_refresh(&server, "a2", "r2", 1).await;
    mount_login(&server, "unused", "unused", 0).await;
    let store = in_memory_store().await;
    let issued = SystemTime::now() - Duration::from_secs(20 * 60);
    store
        .create(&CredentialPair::new("a1", "r1", issued))
        .await
        .unwrap();

    let session = manager(&server, store.clone());
    assert_eq!(session.access_token().await.unwrap(), "a2");

    let persisted = store.find_latest().await.unwrap().unwrap();
    assert_eq!(persisted.access_token(), "a2");
}

#[tokio::test]
async fn test_refresh_failure_falls_back_to_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token is not active",
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, "a-login", "r-login", 1).await;

    let session = manager(&server, in_memory_store().await);
    let pair = session.refresh("revoked").await.unwrap();

    assert_eq!(pair.access_token(), "a-login");
    assert_eq!(session.current().unwrap().access_token(), "a-login");
}

#[tokio::test]
async fn test_login_rejection_is_auth_error_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": "unauthorized_client",
        })))
        .mount(&server)
        .await;

    let session = manager(&server, in_memory_store().await);
    let err = session.access_token().await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::Rejected {
            grant: "password",
            status: 403,
            ..
        }
    ));
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_restart_reuses_persisted_credential() {
    let server = MockServer::start().await;
    mount_login(&server, "a1", "r1", 1).await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("creds.db");

    {
        let store = Arc::new(SqliteCredentialStore::new(
            Database::new(&db_path).await.unwrap(),
        ));
        assert_eq!(manager(&server, store).access_token().await.unwrap(), "a1");
    }

    // A new process opens the same file and must not log in again.
    let store = Arc::new(SqliteCredentialStore::new(
        Database::new(&db_path).await.unwrap(),
    ));
    assert_eq!(manager(&server, store).access_token().await.unwrap(), "a1");
}

#[tokio::test]
async fn test_renew_after_rejection_refreshes_current_pair() {
    let server = MockServer::start().await;
    mount_refresh(&server, "a2", "r2", 1).await;
    let store = in_memory_store().await;
    store
        .create(&CredentialPair::new("a1", "r1", SystemTime::now()))
        .await
        .unwrap();
    let session = manager(&server, store.clone());

    assert_eq!(session.access_token().await.unwrap(), "a1");
    assert_eq!(session.renew_after_rejection("a1").await.unwrap(), "a2");

    // The refreshed pair replaced the rejected row.
    let latest = store.find_latest().await.unwrap().unwrap();
    assert_eq!(latest.access_token(), "a2");
}
