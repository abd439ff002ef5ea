//! Constants for the download module (mirror layout, timeouts).

use std::time::Duration;

/// Default mirror root holding the date-partitioned build directories.
pub const DEFAULT_BASE_URL: &str = "https://repo.mindspore.cn/mindspore/mindspore/version/";

/// Suffix marking the latest build directory under a date index.
pub const NEWEST_BUILD_SUFFIX: &str = "_newest/";

/// Artifact file extension served under build directories.
pub const WHEEL_EXTENSION: &str = ".whl";

/// Default build directory prefix under a date index.
pub const DEFAULT_BUILD_PREFIX: &str = "master_";

/// Default variant directory between build and architecture.
pub const DEFAULT_VARIANT: &str = "unified";

/// Default architecture directory holding the wheels.
pub const DEFAULT_ARCH: &str = "aarch64";

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("nightly-fetch/", env!("CARGO_PKG_VERSION"));

/// Default HTTP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default HTTP read timeout (per read, not per transfer).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Lowest accepted connect timeout.
pub const MIN_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Lowest accepted read timeout.
pub const MIN_READ_TIMEOUT: Duration = Duration::from_secs(5);
