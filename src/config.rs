//! Immutable per-run configuration.
//!
//! A [`RunConfig`] is assembled once by the caller (CLI flags, defaults)
//! and handed to the crawler, probe, and transfer engine read-only.

use std::path::PathBuf;
use std::time::Duration;

use crate::download::constants::{
    DEFAULT_ARCH, DEFAULT_BASE_URL, DEFAULT_BUILD_PREFIX, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_READ_TIMEOUT, DEFAULT_VARIANT,
};
use crate::download::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WORKERS, RetryPolicy};

/// Resolved configuration for one fetch run. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Mirror root holding the date-partitioned build directories.
    pub base_url: String,
    /// Directory artifacts are stored under, as `{dir}/{date}/{build}/{file}`.
    pub download_dir: PathBuf,
    /// Concurrent transfer workers (at least 1).
    pub workers: usize,
    /// Optional interpreter ABI tag filter (e.g. `cp310`).
    pub python_tag: Option<String>,
    /// Architecture directory under each build.
    pub arch: String,
    /// Variant directory between build and architecture.
    pub variant: String,
    /// Build directory prefix under a date index.
    pub build_prefix: String,
    /// Attempt budget shared by page fetches, probes, and transfers.
    pub retries: u32,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// HTTP read timeout (per read operation).
    pub read_timeout: Duration,
    /// Enable HTTP/2 (some mirrors are unstable with it, so off by default).
    pub http2: bool,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Discover and probe only; never open the write path.
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            download_dir: PathBuf::from("downloads"),
            workers: DEFAULT_WORKERS,
            python_tag: None,
            arch: DEFAULT_ARCH.to_string(),
            variant: DEFAULT_VARIANT.to_string(),
            build_prefix: DEFAULT_BUILD_PREFIX.to_string(),
            retries: DEFAULT_MAX_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            http2: false,
            insecure: false,
            dry_run: false,
        }
    }
}

impl RunConfig {
    /// Base URL without its trailing slash, for joining path segments.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Retry policy derived from the configured attempt budget.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.retries)
    }
}
