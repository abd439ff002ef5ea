//! Two-level discovery over the mirror's date-partitioned indexes.
//!
//! Level 1 lists a date index and keeps build directories matching the
//! configured prefix and the latest-build suffix. Level 2 lists each
//! build's variant/arch index and keeps wheel links, optionally
//! filtered by interpreter tag. A directory whose index cannot be
//! fetched costs only itself; the crawl carries on.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::dates::BuildDate;
use crate::download::constants::{NEWEST_BUILD_SUFFIX, WHEEL_EXTENSION};
use crate::download::{HttpClient, RetryDecision, RetryPolicy, backoff_sleep};

mod links;

pub use links::extract_links;

/// One build directory discovered under a date index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDirectory {
    /// Owning date.
    pub date: BuildDate,
    /// Directory name as listed (keeps its trailing slash).
    pub name: String,
}

/// One downloadable artifact with its provenance.
///
/// The URL is the natural key; discovery never yields the same URL
/// twice within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLink {
    /// Fully-qualified URL.
    pub url: String,
    /// Owning date.
    pub date: BuildDate,
    /// Owning build directory name.
    pub build: String,
    /// Decoded artifact filename.
    pub filename: String,
}

/// Crawls date indexes for build directories and their artifact lists.
pub struct DirectoryCrawler<'a> {
    client: &'a HttpClient,
    config: &'a RunConfig,
    policy: RetryPolicy,
}

impl<'a> DirectoryCrawler<'a> {
    /// Creates a crawler over the given client and run configuration.
    #[must_use]
    pub fn new(client: &'a HttpClient, config: &'a RunConfig) -> Self {
        Self {
            client,
            config,
            policy: config.retry_policy(),
        }
    }

    /// Discovers every matching artifact under the given dates, in
    /// date order, deduplicated by URL.
    ///
    /// Cancellation is observed between page fetches; a cancelled crawl
    /// returns what it has found so far.
    pub async fn discover(&self, dates: &[BuildDate], cancel: &AtomicBool) -> Vec<ArtifactLink> {
        let mut seen = HashSet::new();
        let mut artifacts = Vec::new();
        'dates: for date in dates {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            for build in self.builds_for_date(date, cancel).await {
                if cancel.load(Ordering::SeqCst) {
                    break 'dates;
                }
                for link in self.artifacts_for_build(&build, cancel).await {
                    if seen.insert(link.url.clone()) {
                        artifacts.push(link);
                    } else {
                        debug!(url = %link.url, "duplicate artifact URL ignored");
                    }
                }
            }
        }
        info!(artifacts = artifacts.len(), "discovery complete");
        artifacts
    }

    /// Level 1: build directories listed under one date index.
    async fn builds_for_date(&self, date: &BuildDate, cancel: &AtomicBool) -> Vec<BuildDirectory> {
        let url = format!("{}/{}/{}/", self.config.base(), date.yyyymm(), date);
        let Some(html) = self.fetch_page(&url, cancel).await else {
            return Vec::new();
        };
        let builds: Vec<BuildDirectory> = extract_links(&html)
            .into_iter()
            .filter(|name| {
                name.starts_with(&self.config.build_prefix) && name.ends_with(NEWEST_BUILD_SUFFIX)
            })
            .map(|name| BuildDirectory {
                date: date.clone(),
                name,
            })
            .collect();
        info!(date = %date, builds = builds.len(), "build directories found");
        builds
    }

    /// Level 2: artifact links listed under one build directory.
    async fn artifacts_for_build(
        &self,
        build: &BuildDirectory,
        cancel: &AtomicBool,
    ) -> Vec<ArtifactLink> {
        // The build name keeps its trailing slash, so it joins directly
        // with the variant segment.
        let index_url = format!(
            "{}/{}/{}/{}{}/{}/",
            self.config.base(),
            build.date.yyyymm(),
            build.date,
            build.name,
            self.config.variant,
            self.config.arch
        );
        let Some(html) = self.fetch_page(&index_url, cancel).await else {
            return Vec::new();
        };
        let mut artifacts = Vec::new();
        for href in extract_links(&html) {
            if !href.ends_with(WHEEL_EXTENSION) {
                continue;
            }
            if let Some(tag) = &self.config.python_tag {
                if !has_interpreter_tag(&href, tag) {
                    continue;
                }
            }
            let url = if href.starts_with("http://") || href.starts_with("https://") {
                href.clone()
            } else {
                format!("{index_url}{href}")
            };
            artifacts.push(ArtifactLink {
                url,
                date: build.date.clone(),
                build: build.name.clone(),
                filename: decoded_filename(&href),
            });
        }
        info!(
            build = build.name.trim_matches('/'),
            wheels = artifacts.len(),
            "artifact links found"
        );
        artifacts
    }

    /// Fetches one index page, retrying per policy. Returns `None` once
    /// the budget is spent; the caller treats that as an empty
    /// directory rather than aborting the crawl.
    async fn fetch_page(&self, url: &str, cancel: &AtomicBool) -> Option<String> {
        let mut attempt = 0u32;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return None;
            }
            attempt += 1;
            match self.client.get_text(url).await {
                Ok(body) => return Some(body),
                Err(e) => match self.policy.should_retry(attempt) {
                    RetryDecision::Retry { delay, .. } => {
                        warn!(url, attempt, error = %e, "index fetch failed, retrying");
                        if backoff_sleep(delay, cancel).await {
                            return None;
                        }
                    }
                    RetryDecision::DoNotRetry { .. } => {
                        warn!(url, error = %e, "index fetch failed, skipping directory");
                        return None;
                    }
                },
            }
        }
    }
}

/// True when `name` carries the interpreter tag delimited by `-`, so
/// `cp310` matches `-cp310-` but never `-cp3100-`.
fn has_interpreter_tag(name: &str, tag: &str) -> bool {
    name.contains(&format!("-{tag}-"))
}

fn decoded_filename(href: &str) -> String {
    let last = href.rsplit('/').next().unwrap_or(href);
    urlencoding::decode(last).map_or_else(|_| last.to_string(), |decoded| decoded.into_owned())
}
