//! CLI argument definitions using clap derive macros.
//!
//! Every setting can also come from the environment.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use chapter_stitch::auth::DEFAULT_AUTH_URL;
use chapter_stitch::chapter::DEFAULT_API_BASE_URL;

/// Which store backs the shared cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
    /// Process-local map; nothing is shared between instances.
    Memory,
    /// The `SQLite` database file, shared by every process that opens it.
    Sqlite,
}

/// Serve stitched chapter images and single pages over HTTP.
///
/// Chapter Stitch resolves chapter manifests from the upstream content API,
/// downloads the pages with bounded concurrency and stitches them into one
/// vertical image.
#[derive(Parser)]
#[command(name = "chapter-stitch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Address to listen on
    #[arg(long, env = "CHAPTER_STITCH_BIND", default_value = "127.0.0.1:3004")]
    pub bind: SocketAddr,

    /// Upstream content API root
    #[arg(long, env = "MANGADEX_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Upstream OAuth token endpoint
    #[arg(long, env = "MANGADEX_AUTH_URL", default_value = DEFAULT_AUTH_URL)]
    pub auth_url: String,

    /// OAuth client id
    #[arg(long, env = "MANGADEX_CLIENT_ID", default_value = "")]
    pub client_id: String,

    /// OAuth client secret
    #[arg(long, env = "MANGADEX_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    pub client_secret: String,

    /// Service account user name
    #[arg(long, env = "MANGADEX_USERNAME", default_value = "")]
    pub username: String,

    /// Service account password
    #[arg(long, env = "MANGADEX_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// SQLite database file (credentials and the sqlite cache)
    #[arg(long, env = "CHAPTER_STITCH_DB", default_value = "chapter-stitch.db")]
    pub db: PathBuf,

    /// Cache backend
    #[arg(long, env = "CHAPTER_STITCH_CACHE", value_enum, default_value_t = CacheBackend::Sqlite)]
    pub cache: CacheBackend,

    /// Concurrent page downloads (2-6); derived from the CPU count when unset
    #[arg(short = 'c', long, env = "CHAPTER_STITCH_CONCURRENCY", value_parser = clap::value_parser!(u8).range(2..=6))]
    pub concurrency: Option<u8>,

    /// Origin allowed to call the API from a browser
    #[arg(long, env = "FRONT_END_URL")]
    pub cors_origin: Option<String>,

    /// Referer sent with single-page image requests
    #[arg(long, env = "CHAPTER_STITCH_REFERER", default_value = "https://mangadex.org/")]
    pub referer: String,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .field("bind", &self.bind)
            .field("api_base_url", &self.api_base_url)
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("db", &self.db)
            .field("cache", &self.cache)
            .field("concurrency", &self.concurrency)
            .field("cors_origin", &self.cors_origin)
            .field("referer", &self.referer)
            .finish()
    }
}
