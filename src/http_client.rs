//! Shared HTTP client construction policy for upstream calls.
//!
//! Auth, manifest and page clients all go through [`build_http_client`] so
//! they agree on user-agent, compression and timeout handling.

use std::time::Duration;

use reqwest::Client;

use crate::user_agent;

/// Connect timeout for every upstream client.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Whole-request timeout for auth and manifest calls.
pub(crate) const API_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds an upstream client.
///
/// `read_timeout` bounds the whole request; `None` leaves it to the caller
/// to set a per-request timeout.
pub(crate) fn build_http_client(read_timeout: Option<Duration>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(user_agent::default_user_agent())
        .gzip(true);

    if let Some(timeout) = read_timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}
