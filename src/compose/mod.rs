//! Page normalization and vertical composition.
//!
//! Every page is scaled to [`TARGET_WIDTH`] with its aspect ratio kept
//! (upscaling included), then the pages are stacked top to bottom in input
//! order on an opaque white canvas and encoded as PNG.
//!
//! ```text
//! scaled_height(i) = round(height(i) * TARGET_WIDTH / width(i))
//! canvas           = TARGET_WIDTH x sum(scaled_height)
//! ```

mod error;

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use tracing::{debug, info, instrument};

pub use error::CompositionError;

/// Width of every page in the composed image, in pixels.
pub const TARGET_WIDTH: u32 = 1080;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Height of a `width` x `height` page once scaled to [`TARGET_WIDTH`].
///
/// Rounds half away from zero and never returns less than 1.
#[must_use]
pub fn scaled_height(width: u32, height: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let scaled = (u64::from(height) * u64::from(TARGET_WIDTH) * 2 + u64::from(width))
        / (2 * u64::from(width));
    u32::try_from(scaled.max(1)).unwrap_or(u32::MAX)
}

/// MIME type of an encoded image, sniffed from its leading bytes.
///
/// Falls back to `application/octet-stream` for unknown content.
#[must_use]
pub fn content_type_of(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Stitches downloaded pages into one vertical PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    /// Creates a compositor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Normalizes `pages` to [`TARGET_WIDTH`] and stacks them in order.
    ///
    /// CPU bound; async callers should run it on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError`] if there are no pages, a page is empty,
    /// undecodable or has no dimensions, or the result cannot be encoded.
    #[instrument(skip(self, pages), fields(pages = pages.len()))]
    pub fn compose(&self, pages: &[Vec<u8>]) -> Result<Vec<u8>, CompositionError> {
        if pages.is_empty() {
            return Err(CompositionError::NoPages);
        }

        let normalized = pages
            .iter()
            .enumerate()
            .map(|(i, bytes)| normalize(i + 1, bytes))
            .collect::<Result<Vec<_>, _>>()?;

        let total_height = normalized
            .iter()
            .try_fold(0u32, |sum, page| sum.checked_add(page.height()))
            .ok_or(CompositionError::TooTall)?;

        info!(
            width = TARGET_WIDTH,
            height = total_height,
            "creating composed image"
        );

        let mut canvas = RgbaImage::from_pixel(TARGET_WIDTH, total_height, BACKGROUND);
        let mut y = 0i64;
        for page in &normalized {
            imageops::overlay(&mut canvas, page, 0, y);
            y += i64::from(page.height());
        }

        encode_png(&canvas)
    }
}

/// Decodes page `index` (1-based) and scales it to the target width.
fn normalize(index: usize, bytes: &[u8]) -> Result<RgbaImage, CompositionError> {
    if bytes.is_empty() {
        return Err(CompositionError::Empty { index });
    }

    let decoded: DynamicImage = image::load_from_memory(bytes)
        .map_err(|source| CompositionError::Decode { index, source })?;

    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(CompositionError::Dimensions { index });
    }

    let target_height = scaled_height(width, height);
    debug!(
        index,
        width,
        height,
        scaled_height = target_height,
        "normalizing page"
    );

    let rgba = decoded.to_rgba8();
    if width == TARGET_WIDTH && height == target_height {
        return Ok(rgba);
    }
    Ok(imageops::resize(
        &rgba,
        TARGET_WIDTH,
        target_height,
        FilterType::Lanczos3,
    ))
}

fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, CompositionError> {
    let mut out = Cursor::new(Vec::new());
    let encoder =
        PngEncoder::new_with_quality(&mut out, CompressionType::Default, PngFilter::Adaptive);
    canvas
        .write_with_encoder(encoder)
        .map_err(CompositionError::Encode)?;
    Ok(out.into_inner())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encoded(width: u32, height: u32, color: Rgba<u8>, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color));
        let img = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(img.to_rgb8())
        } else {
            img
        };
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_scaled_height_rounds_to_nearest() {
        assert_eq!(scaled_height(800, 1000), 1350);
        assert_eq!(scaled_height(800, 1200), 1620);
        assert_eq!(scaled_height(800, 900), 1215);
        assert_eq!(scaled_height(1080, 1500), 1500);
        // 333 * 1080 / 1000 = 359.64
        assert_eq!(scaled_height(1000, 333), 360);
    }

    #[test]
    fn test_scaled_height_never_zero() {
        assert_eq!(scaled_height(100_000, 1), 1);
    }

    #[test]
    fn test_compose_three_pages_of_800px() {
        let pages = vec![
            encoded(800, 1000, Rgba([255, 0, 0, 255]), ImageFormat::Png),
            encoded(800, 1200, Rgba([0, 255, 0, 255]), ImageFormat::Jpeg),
            encoded(800, 900, Rgba([0, 0, 255, 255]), ImageFormat::Png),
        ];

        let png = Compositor::new().compose(&pages).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);

        let out = image::load_from_memory(&png).unwrap();
        assert_eq!(out.dimensions(), (1080, 4185));

        let rgba = out.to_rgba8();
        // Sample the middle of each band.
        let red = rgba.get_pixel(540, 675);
        assert!(red[0] > 250 && red[2] < 5, "got {red:?}");
        assert!(rgba.get_pixel(540, 1350 + 810)[1] > 200);
        let blue = rgba.get_pixel(540, 1350 + 1620 + 600);
        assert!(blue[2] > 250 && blue[0] < 5, "got {blue:?}");
    }

    #[test]
    fn test_compose_upscales_narrow_pages() {
        let pages = vec![encoded(540, 400, Rgba([10, 10, 10, 255]), ImageFormat::Png)];
        let png = Compositor::new().compose(&pages).unwrap();
        let out = image::load_from_memory(&png).unwrap();
        assert_eq!(out.dimensions(), (1080, 800));
    }

    #[test]
    fn test_compose_transparent_page_lands_on_white() {
        let pages = vec![encoded(1080, 10, Rgba([0, 0, 0, 0]), ImageFormat::Png)];
        let png = Compositor::new().compose(&pages).unwrap();
        let out = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(*out.get_pixel(5, 5), BACKGROUND);
    }

    #[test]
    fn test_compose_rejects_empty_input() {
        let err = Compositor::new().compose(&[]).unwrap_err();
        assert!(matches!(err, CompositionError::NoPages));
    }

    #[test]
    fn test_compose_rejects_empty_page() {
        let pages = vec![
            encoded(800, 100, BACKGROUND, ImageFormat::Png),
            Vec::new(),
        ];
        let err = Compositor::new().compose(&pages).unwrap_err();
        assert!(matches!(err, CompositionError::Empty { index: 2 }));
    }

    #[test]
    fn test_compose_rejects_undecodable_page() {
        let pages = vec![b"<html>not an image</html>".to_vec()];
        let err = Compositor::new().compose(&pages).unwrap_err();
        assert!(matches!(err, CompositionError::Decode { index: 1, .. }));
    }

    #[test]
    fn test_content_type_of_sniffs_formats() {
        assert_eq!(
            content_type_of(&encoded(2, 2, BACKGROUND, ImageFormat::Png)),
            "image/png"
        );
        assert_eq!(
            content_type_of(&encoded(2, 2, BACKGROUND, ImageFormat::Jpeg)),
            "image/jpeg"
        );
        assert_eq!(content_type_of(b"plain"), "application/octet-stream");
    }
}
