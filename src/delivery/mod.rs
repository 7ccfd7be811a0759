//! Chapter delivery: the request pipeline and its HTTP surface.
//!
//! [`ChapterService`] runs the pipeline for each request kind;
//! [`router`] exposes it over axum. Failures before the first body byte
//! become a JSON [`ServiceError`]; failures after it only end the stream.

mod body;
mod error;
mod http;
mod service;

pub use body::{CHUNK_SIZE, ChunkedImage};
pub use error::{ErrorBody, ServiceError};
pub use http::router;
pub use service::{AssembledChapter, ChapterService, PageCount, PageLink, PipelineState};
