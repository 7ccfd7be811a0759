//! Chapter metadata and page references.
//!
//! A chapter's manifest names a base URL, a content hash and two parallel
//! file-name lists, one per [`Quality`] tier. Page references are derived
//! from it on demand and never stored:
//!
//! ```text
//! {baseUrl}/{data|data-saver}/{hash}/{fileName}
//! ```
//!
//! Page indices are 1-based everywhere in this crate.

mod error;
mod resolver;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use error::UpstreamError;
pub use resolver::{DEFAULT_API_BASE_URL, MetadataResolver, UpstreamConfig};

/// Upstream page-resolution variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    /// Original scans (`data` tier).
    #[default]
    High,
    /// Compressed scans (`data-saver` tier).
    Low,
}

impl Quality {
    /// Parses the `quality` query parameter.
    ///
    /// Missing means [`Quality::High`]; any value other than exactly `high`
    /// means [`Quality::Low`].
    #[must_use]
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            None => Self::High,
            Some("high") => Self::High,
            Some(_) => Self::Low,
        }
    }

    /// Stable label used in cache keys and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }

    /// Path segment of this tier on the page host.
    #[must_use]
    pub fn tier(self) -> &'static str {
        match self {
            Self::High => "data",
            Self::Low => "data-saver",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested page index outside `1..=total_pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("page {page} is out of range (chapter has {total_pages} pages)")]
pub struct PageOutOfRange {
    /// The requested 1-based index.
    pub page: usize,
    /// Number of pages in the chapter.
    pub total_pages: usize,
}

/// Resolved manifest of one chapter.
///
/// Immutable once fetched. Serialized field names match the cache records
/// written by earlier deployments so existing entries stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMetadata {
    base_url: String,
    hash: String,
    #[serde(rename = "data")]
    high_quality_file_names: Vec<String>,
    #[serde(rename = "dataSaver")]
    low_quality_file_names: Vec<String>,
    total_pages: usize,
}

impl ChapterMetadata {
    /// Builds a record, enforcing that both tiers list the same number of pages.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when the tiers disagree.
    pub fn new(
        base_url: impl Into<String>,
        hash: impl Into<String>,
        high_quality_file_names: Vec<String>,
        low_quality_file_names: Vec<String>,
    ) -> Result<Self, String> {
        if high_quality_file_names.len() != low_quality_file_names.len() {
            return Err(format!(
                "quality tiers disagree on page count: {} high vs {} low",
                high_quality_file_names.len(),
                low_quality_file_names.len()
            ));
        }
        let total_pages = high_quality_file_names.len();
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            hash: hash.into(),
            high_quality_file_names,
            low_quality_file_names,
            total_pages,
        })
    }

    /// `true` when the page count matches both file-name lists.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total_pages == self.high_quality_file_names.len()
            && self.total_pages == self.low_quality_file_names.len()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// File names of one tier, in page order.
    #[must_use]
    pub fn file_names(&self, quality: Quality) -> &[String] {
        match quality {
            Quality::High => &self.high_quality_file_names,
            Quality::Low => &self.low_quality_file_names,
        }
    }

    /// Page reference for a 1-based `page` index.
    ///
    /// # Errors
    ///
    /// Returns [`PageOutOfRange`] unless `1 <= page <= total_pages`.
    pub fn page_url(&self, page: usize, quality: Quality) -> Result<String, PageOutOfRange> {
        let out_of_range = PageOutOfRange {
            page,
            total_pages: self.total_pages,
        };
        let index = page.checked_sub(1).ok_or(out_of_range)?;
        let file_name = self.file_names(quality).get(index).ok_or(out_of_range)?;
        Ok(self.url_for(quality, file_name))
    }

    /// Ordered download link list for the whole chapter.
    #[must_use]
    pub fn page_urls(&self, quality: Quality) -> Vec<String> {
        self.file_names(quality)
            .iter()
            .map(|name| self.url_for(quality, name))
            .collect()
    }

    fn url_for(&self, quality: Quality, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            quality.tier(),
            self.hash,
            file_name
        )
    }
}
