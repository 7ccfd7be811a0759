//! Shared fixtures for integration tests: encoded test pages, wiremock
//! upstream (auth, manifest, image host) and service wiring.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chapter_stitch::{
    AuthClient, AuthConfig, Cache, ChapterService, Database, MemoryCache, MetadataResolver,
    PageClient, PageFetcher, RetryPolicy, SessionManager, SqliteCredentialStore, UpstreamConfig,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Content hash used by every mocked manifest.
pub const HASH: &str = "h4sh";

/// Retry policy with millisecond backoff so failure tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50), 2.0)
}

/// Encodes a solid `width` x `height` PNG.
pub fn png_page(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([40, 80, 120, 255]),
    ));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Page file names `p1.png`..`p{n}.png`.
pub fn file_names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("p{i}.png")).collect()
}

/// Mounts an `/at-home/server/{chapter_id}` manifest answering only
/// `Bearer {token}`, served `times` times.
pub async fn mount_manifest(
    server: &MockServer,
    chapter_id: &str,
    token: &str,
    pages: usize,
    times: u64,
) {
    let names = file_names(pages);
    Mock::given(method("GET"))
        .and(path(format!("/at-home/server/{chapter_id}")))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "ok",
            "baseUrl": server.uri(),
            "chapter": {
                "hash": HASH,
                "data": names,
                "dataSaver": names,
            }
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts a high-quality page image at `/data/{HASH}/{name}`.
pub async fn mount_page(server: &MockServer, name: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/data/{HASH}/{name}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

/// Mounts a password-grant login at `/token` issuing `access`/`refresh`.
pub async fn mount_login(server: &MockServer, access: &str, refresh: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access,
            "refresh_token": refresh,
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts a refresh-token grant at `/token` issuing `access`/`refresh`.
pub async fn mount_refresh(server: &MockServer, access: &str, refresh: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access,
            "refresh_token": refresh,
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Auth config pointing at `{server}/token` with a complete service account.
pub fn auth_config(server: &MockServer) -> AuthConfig {
    AuthConfig {
        token_url: format!("{}/token", server.uri()),
        client_id: "client".into(),
        client_secret: "secret".into(),
        username: "reader".into(),
        password: "pw".into(),
    }
}

/// Everything a delivery test needs to poke at.
pub struct Harness {
    pub service: Arc<ChapterService>,
    pub session: Arc<SessionManager>,
    pub store: Arc<SqliteCredentialStore>,
    pub cache: Arc<dyn Cache>,
}

/// Wires a service against `server` for auth, manifest and images, with an
/// in-memory database and cache.
pub async fn harness(server: &MockServer) -> Harness {
    harness_with_auth(server, auth_config(server)).await
}

/// Like [`harness`] with a custom service account.
pub async fn harness_with_auth(server: &MockServer, auth: AuthConfig) -> Harness {
    let store = Arc::new(SqliteCredentialStore::new(
        Database::new_in_memory().await.unwrap(),
    ));
    let session = Arc::new(SessionManager::new(
        AuthClient::new(auth).unwrap(),
        store.clone(),
    ));
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let resolver = MetadataResolver::new(
        &UpstreamConfig {
            api_base_url: server.uri(),
        },
        Arc::clone(&cache),
    )
    .unwrap();
    let fetcher = PageFetcher::new(PageClient::new(None).unwrap(), 2, fast_retry());
    let service = Arc::new(ChapterService::new(
        Arc::clone(&session),
        resolver,
        Arc::clone(&cache),
        fetcher,
    ));
    Harness {
        service,
        session,
        store,
        cache,
    }
}
