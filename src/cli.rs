//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser};

use nightly_fetch_core::download::constants::{
    DEFAULT_ARCH, DEFAULT_BASE_URL, DEFAULT_BUILD_PREFIX, DEFAULT_VARIANT, MIN_CONNECT_TIMEOUT,
    MIN_READ_TIMEOUT,
};
use nightly_fetch_core::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WORKERS, RunConfig};

/// Fetch nightly build wheels from a date-partitioned mirror.
///
/// Walks the mirror's `{yyyymm}/{yyyymmdd}/` indexes for the selected
/// dates, finds the latest build directories, and downloads the matching
/// wheels with resume support. Exactly one of `--start`/`--end` or
/// `--last` selects the dates.
#[derive(Parser, Debug)]
#[command(name = "nightly-fetch")]
#[command(author, version, about)]
#[command(group(
    ArgGroup::new("date_selection")
        .required(true)
        .args(["start", "last"]),
))]
pub struct Args {
    /// First date of an explicit range (YYYYMMDD)
    #[arg(long, value_name = "YYYYMMDD", requires = "end", conflicts_with = "last")]
    pub start: Option<String>,

    /// Last date of an explicit range (YYYYMMDD)
    #[arg(long, value_name = "YYYYMMDD", requires = "start", conflicts_with = "last")]
    pub end: Option<String>,

    /// Relative range ending today, like 7days, 2weeks, 3months
    #[arg(long, value_name = "SPAN")]
    pub last: Option<String>,

    /// Mirror root holding the date-partitioned build directories
    #[arg(long, value_name = "URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory to store artifacts under, as {dir}/{date}/{build}/{file}
    #[arg(short, long, value_name = "DIR", default_value = "downloads")]
    pub dir: PathBuf,

    /// Maximum concurrent downloads (1-100)
    #[arg(short, long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: u8,

    /// Only keep wheels built for this interpreter tag (e.g. cp310)
    #[arg(short = 't', long, value_name = "TAG")]
    pub python_tag: Option<String>,

    /// Architecture directory under each build
    #[arg(long, value_name = "ARCH", default_value = DEFAULT_ARCH)]
    pub arch: String,

    /// Variant directory between build and architecture
    #[arg(long, value_name = "NAME", default_value = DEFAULT_VARIANT)]
    pub variant: String,

    /// Build directory prefix under a date index
    #[arg(long, value_name = "PREFIX", default_value = DEFAULT_BUILD_PREFIX)]
    pub build_prefix: String,

    /// Attempts per request before giving up (1-10)
    #[arg(short, long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub retries: u8,

    /// HTTP connect timeout in seconds (1-300)
    #[arg(long, value_name = "SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=300))]
    pub connect_timeout: u64,

    /// HTTP read timeout in seconds (5-600)
    #[arg(long, value_name = "SECS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(5..=600))]
    pub read_timeout: u64,

    /// Enable HTTP/2 (some mirrors are unstable with it)
    #[arg(long)]
    pub http2: bool,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// List what would be downloaded without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Builds the resolved run configuration, clamping the timeouts to
    /// the supported minimums.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            base_url: self.base_url.clone(),
            download_dir: self.dir.clone(),
            workers: usize::from(self.workers),
            python_tag: self.python_tag.clone(),
            arch: self.arch.clone(),
            variant: self.variant.clone(),
            build_prefix: self.build_prefix.clone(),
            retries: u32::from(self.retries),
            connect_timeout: Duration::from_secs(self.connect_timeout).max(MIN_CONNECT_TIMEOUT),
            read_timeout: Duration::from_secs(self.read_timeout).max(MIN_READ_TIMEOUT),
            http2: self.http2,
            insecure: self.insecure,
            dry_run: self.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_explicit_range_parses() {
        let args =
            Args::try_parse_from(["nightly-fetch", "--start", "20250101", "--end", "20250107"])
                .unwrap();
        assert_eq!(args.start.as_deref(), Some("20250101"));
        assert_eq!(args.end.as_deref(), Some("20250107"));
        assert!(args.last.is_none());
    }

    #[test]
    fn test_cli_last_shorthand_parses() {
        let args = Args::try_parse_from(["nightly-fetch", "--last", "7days"]).unwrap();
        assert_eq!(args.last.as_deref(), Some("7days"));
        assert!(args.start.is_none());
        assert!(args.end.is_none());
    }

    #[test]
    fn test_cli_no_date_selection_rejected() {
        let result = Args::try_parse_from(["nightly-fetch"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_start_without_end_rejected() {
        let result = Args::try_parse_from(["nightly-fetch", "--start", "20250101"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_end_without_start_rejected() {
        let result = Args::try_parse_from(["nightly-fetch", "--end", "20250101"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_start_conflicts_with_last() {
        let result = Args::try_parse_from([
            "nightly-fetch",
            "--start",
            "20250101",
            "--end",
            "20250107",
            "--last",
            "7days",
        ]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["nightly-fetch", "--last", "1day"]).unwrap();
        assert_eq!(args.workers, 4); // DEFAULT_WORKERS
        assert_eq!(args.retries, 4); // DEFAULT_MAX_ATTEMPTS
        assert_eq!(args.connect_timeout, 10);
        assert_eq!(args.read_timeout, 60);
        assert_eq!(args.dir, PathBuf::from("downloads"));
        assert_eq!(args.arch, "aarch64");
        assert_eq!(args.variant, "unified");
        assert_eq!(args.build_prefix, "master_");
        assert!(args.python_tag.is_none());
        assert!(!args.http2);
        assert!(!args.insecure);
        assert!(!args.dry_run);
        assert!(!args.quiet);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_cli_workers_range_enforced() {
        let args = Args::try_parse_from(["nightly-fetch", "--last", "1day", "-w", "1"]).unwrap();
        assert_eq!(args.workers, 1);

        let args = Args::try_parse_from(["nightly-fetch", "--last", "1day", "-w", "100"]).unwrap();
        assert_eq!(args.workers, 100);

        let result = Args::try_parse_from(["nightly-fetch", "--last", "1day", "-w", "0"]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );

        let result = Args::try_parse_from(["nightly-fetch", "--last", "1day", "-w", "101"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_retries_range_enforced() {
        let args = Args::try_parse_from(["nightly-fetch", "--last", "1day", "-r", "10"]).unwrap();
        assert_eq!(args.retries, 10);

        // 0 would disable the initial attempt too, so it is rejected
        let result = Args::try_parse_from(["nightly-fetch", "--last", "1day", "-r", "0"]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_timeout_minimums_enforced() {
        let result =
            Args::try_parse_from(["nightly-fetch", "--last", "1day", "--connect-timeout", "0"]);
        assert!(result.is_err());

        let result =
            Args::try_parse_from(["nightly-fetch", "--last", "1day", "--read-timeout", "4"]);
        assert!(result.is_err());

        let args =
            Args::try_parse_from(["nightly-fetch", "--last", "1day", "--read-timeout", "5"])
                .unwrap();
        assert_eq!(args.read_timeout, 5);
    }

    #[test]
    fn test_cli_python_tag_flag() {
        let args =
            Args::try_parse_from(["nightly-fetch", "--last", "1day", "-t", "cp310"]).unwrap();
        assert_eq!(args.python_tag.as_deref(), Some("cp310"));

        let args =
            Args::try_parse_from(["nightly-fetch", "--last", "1day", "--python-tag", "cp39"])
                .unwrap();
        assert_eq!(args.python_tag.as_deref(), Some("cp39"));
    }

    #[test]
    fn test_cli_boolean_flags() {
        let args = Args::try_parse_from([
            "nightly-fetch",
            "--last",
            "1day",
            "--http2",
            "-k",
            "-n",
            "-q",
        ])
        .unwrap();
        assert!(args.http2);
        assert!(args.insecure);
        assert!(args.dry_run);
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["nightly-fetch", "--last", "1day", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["nightly-fetch", "--last", "1day", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        // --help causes early exit, so we check it returns an error with Help kind
        let result = Args::try_parse_from(["nightly-fetch", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["nightly-fetch", "--last", "1day", "--invalid-flag"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_run_config_carries_flags_through() {
        let args = Args::try_parse_from([
            "nightly-fetch",
            "--last",
            "1day",
            "-w",
            "8",
            "-r",
            "2",
            "-t",
            "cp311",
            "--dir",
            "/tmp/wheels",
            "--base-url",
            "https://mirror.example/version/",
            "--connect-timeout",
            "20",
            "--read-timeout",
            "90",
        ])
        .unwrap();
        let cfg = args.run_config();
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.python_tag.as_deref(), Some("cp311"));
        assert_eq!(cfg.download_dir, PathBuf::from("/tmp/wheels"));
        assert_eq!(cfg.base_url, "https://mirror.example/version/");
        assert_eq!(cfg.connect_timeout, Duration::from_secs(20));
        assert_eq!(cfg.read_timeout, Duration::from_secs(90));
    }
}
