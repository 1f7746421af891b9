//! Shared constants used across stashbin crates.

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default ceiling for the rendered size of one paste, in bytes.
pub const DEFAULT_PASTE_SIZE: usize = 256 * 1024;

/// Default spam score (0-100) above which submissions are rejected.
pub const DEFAULT_SPAMSCORE: u32 = 50;

/// Default number of attempts when drawing a free slug.
pub const DEFAULT_SLUG_RETRIES: u32 = 10;

/// Default lower bound for adaptive slug width, in bytes.
pub const DEFAULT_SLUG_MIN_WIDTH: usize = 1;

/// Default period between active expiry sweeps.
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 1_800;

/// Width of slugs for callers that opt into long identifiers.
pub const LONG_SLUG_BYTES: usize = 16;

/// Width of removal tokens. Never scaled with corpus size.
pub const REMOVAL_TOKEN_BYTES: usize = 8;

/// Lexer used when a caller does not name one.
pub const DEFAULT_LEXER: &str = "text";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "STASHBIN_";
