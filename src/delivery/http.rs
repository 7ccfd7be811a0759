//! axum router for the chapter endpoints.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS,
};
use axum::http::{HeaderValue, Method};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::body::ChunkedImage;
use super::service::{AssembledChapter, ChapterService, PageCount, PageLink};
use super::ServiceError;
use crate::chapter::Quality;
use crate::compose::content_type_of;

/// `Cache-Control` of single-page responses (one day).
const PAGE_CACHE_CONTROL: &str = "public, max-age=86400";

#[derive(Debug, Deserialize)]
struct QualityQuery {
    quality: Option<String>,
}

impl QualityQuery {
    fn quality(&self) -> Quality {
        Quality::from_param(self.quality.as_deref())
    }
}

/// Builds the HTTP surface over `service`.
///
/// With `cors_origin` set, responses carry CORS headers for that origin
/// and expose the download headers to scripts.
pub fn router(service: Arc<ChapterService>, cors_origin: Option<HeaderValue>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/manga/:manga_id/download/:chapter_id", get(download_chapter))
        .route("/manga/chapter/:chapter_id", get(page_count))
        .route("/manga/chapter/:chapter_id/:page", get(page_image))
        .route("/manga/chapter/:chapter_id/:page/url", get(page_link))
        .with_state(service);

    if let Some(origin) = cors_origin {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET])
                .expose_headers([CONTENT_DISPOSITION, CONTENT_TYPE, CONTENT_LENGTH]),
        );
    }

    app.layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn download_chapter(
    State(service): State<Arc<ChapterService>>,
    Path((manga_id, chapter_id)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    check_id("manga id", &manga_id)?;
    check_id("chapter id", &chapter_id)?;
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"chapter-{chapter_id}.png\""
    ))
    .map_err(|_| ServiceError::BadRequest(format!("unusable chapter id {chapter_id:?}")))?;

    let chapter = service.assemble_chapter(&manga_id, &chapter_id).await?;
    Ok(chapter_response(chapter, disposition))
}

/// Headers are fixed before the first body byte.
fn chapter_response(chapter: AssembledChapter, disposition: HeaderValue) -> Response {
    let body = Body::from_stream(ChunkedImage::new(chapter.chapter_id, chapter.image));
    (
        [
            (CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (CONTENT_DISPOSITION, disposition),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        ],
        body,
    )
        .into_response()
}

async fn page_image(
    State(service): State<Arc<ChapterService>>,
    Path((chapter_id, page)): Path<(String, String)>,
    Query(query): Query<QualityQuery>,
) -> Result<Response, ServiceError> {
    check_id("chapter id", &chapter_id)?;
    let page = parse_page(&page)?;
    let bytes = service.get_page(&chapter_id, page, query.quality()).await?;
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(content_type_of(&bytes))),
            (CACHE_CONTROL, HeaderValue::from_static(PAGE_CACHE_CONTROL)),
        ],
        bytes,
    )
        .into_response())
}

async fn page_link(
    State(service): State<Arc<ChapterService>>,
    Path((chapter_id, page)): Path<(String, String)>,
    Query(query): Query<QualityQuery>,
) -> Result<Json<PageLink>, ServiceError> {
    check_id("chapter id", &chapter_id)?;
    let page = parse_page(&page)?;
    Ok(Json(
        service.page_link(&chapter_id, page, query.quality()).await?,
    ))
}

async fn page_count(
    State(service): State<Arc<ChapterService>>,
    Path(chapter_id): Path<String>,
) -> Result<Json<PageCount>, ServiceError> {
    check_id("chapter id", &chapter_id)?;
    Ok(Json(service.page_count(&chapter_id).await?))
}

/// Upstream ids are UUIDs; anything outside `[A-Za-z0-9-]` is refused before
/// it can reach an upstream URL.
fn check_id(kind: &str, raw: &str) -> Result<(), ServiceError> {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        Ok(())
    } else {
        Err(ServiceError::BadRequest(format!("invalid {kind} {raw:?}")))
    }
}

fn parse_page(raw: &str) -> Result<usize, ServiceError> {
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::BadRequest(format!("page must be a positive integer, got {raw:?}")))
}
