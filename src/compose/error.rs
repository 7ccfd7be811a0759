use thiserror::Error;

/// Errors from normalizing or stitching pages.
///
/// Page indices are 1-based.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// Nothing to compose.
    #[error("no pages to compose")]
    NoPages,

    /// A page body had zero bytes.
    #[error("page {index} is empty")]
    Empty {
        /// The offending page.
        index: usize,
    },

    /// A page could not be decoded as an image.
    #[error("failed to decode page {index}: {source}")]
    Decode {
        /// The offending page.
        index: usize,
        /// The decoder error.
        #[source]
        source: image::ImageError,
    },

    /// A page decoded to a zero width or height.
    #[error("could not determine dimensions of page {index}")]
    Dimensions {
        /// The offending page.
        index: usize,
    },

    /// The stacked height does not fit in a single image.
    #[error("composed image is too tall")]
    TooTall,

    /// PNG encoding failed.
    #[error("failed to encode composed image: {0}")]
    Encode(#[source] image::ImageError),
}
