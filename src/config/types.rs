//! Configuration types for s3idx-rs.
//!
//! This module defines the structures used to represent application configuration
//! as parsed from an INI-format config file.

use std::path::PathBuf;

use chrono::Duration;

use crate::format::{DatetimeFormat, SizeFormat};

// =============================================================================
// Primitive Types
// =============================================================================

/// A byte size that can be parsed from strings like "100MB", "1GB", etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSize(pub u64);

// =============================================================================
// Config Sections
// =============================================================================

/// [cache] section - local durable listing cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub no_cache: bool,
    /// Upper bound on the LMDB map; writes beyond it are dropped.
    pub map_size: ByteSize,
}

/// [fetcher] section - how listings are paged and how long they are kept.
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub ttl: Duration,
    pub page_size: usize,
}

/// [s3] section - how to reach the listing service.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// [display] section - how sizes and timestamps are rendered.
#[derive(Debug, Clone, Default)]
pub struct DisplayConfig {
    pub size_format: SizeFormat,
    pub datetime_format: DatetimeFormat,
}

// =============================================================================
// Top-Level Config
// =============================================================================

/// Complete application configuration as parsed from config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub fetcher: FetcherSettings,
    pub s3: S3Settings,
    pub display: DisplayConfig,
}
