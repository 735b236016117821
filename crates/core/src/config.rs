//! Global configuration constants for shelfdb.
//!
//! Index tuning defaults and input validation limits live here as
//! compile-time constants; runtime configuration (port, data directory,
//! embedding provider) is handled via CLI arguments and environment
//! variables in the server binary.

/// Default NSW target degree: each node keeps roughly this many neighbors.
///
/// Higher values improve recall but increase memory and insert cost.
pub const NSW_DEFAULT_M: usize = 8;

/// Default candidate list size during NSW insertion.
pub const NSW_DEFAULT_EF_CONSTRUCTION: usize = 32;

/// Default candidate list size during NSW search.
///
/// The effective value is `max(ef_search, k)` for a given query.
pub const NSW_DEFAULT_EF_SEARCH: usize = 32;

/// Maximum Lloyd iterations for an IVF k-means build.
pub const IVF_DEFAULT_MAX_ITERATIONS: usize = 25;

/// Default PRNG seed for IVF centroid initialization.
///
/// A fixed seed makes rebuilds reproducible; override per index when
/// attaching it.
pub const IVF_DEFAULT_SEED: u64 = 42;

/// Overfetch multiplier applied to `k` when a metadata filter is present.
///
/// Post-filtering discards candidates, so the collection asks the index for
/// `k * FILTER_OVERFETCH` results before filtering and truncating.
pub const FILTER_OVERFETCH: usize = 2;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`k`) per search request.
pub const MAX_K: usize = 1_000;

/// Maximum length of chunk content in bytes.
pub const MAX_CONTENT_LEN: usize = 1_000_000;

/// Maximum number of metadata keys per record.
pub const MAX_METADATA_KEYS: usize = 64;

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default directory for record storage.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum HTTP request body size in bytes (10 MB).
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Maximum number of concurrent in-flight requests.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;
