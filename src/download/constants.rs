//! Constants for the download module (timeouts, concurrency bounds).

use std::time::Duration;

/// Hard timeout of a single page download attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Lower bound of the page-download concurrency.
pub const MIN_CONCURRENCY: usize = 2;

/// Upper bound of the page-download concurrency.
pub const MAX_CONCURRENCY: usize = 6;

/// `Accept` header sent to page hosts.
pub const IMAGE_ACCEPT: &str = "image/jpeg, image/png, image/webp, image/*";
