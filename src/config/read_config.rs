//! Configuration file reading and parsing.
//!
//! This module handles locating, reading, and parsing INI-format configuration files,
//! with support for layered overrides.

use std::env;
use std::path::{Path, PathBuf};

use chrono::Duration;
use configparser::ini::Ini;
use thiserror::Error;

use crate::fetcher::{parse_duration, DEFAULT_PAGE_SIZE};
use crate::format::{DatetimeFormat, FormatError, SizeFormat};

use super::{ByteSize, CacheConfig, Config, DisplayConfig, FetcherSettings, S3Settings};

// =============================================================================
// Constants - Default Values
// =============================================================================

const DEFAULT_CACHE_PATH: &str = "/tmp/s3idx-cache";
const DEFAULT_CACHE_NO_CACHE: bool = false;
const DEFAULT_CACHE_MAP_SIZE: u64 = 1024 * 1024 * 1024; // 1GB
const DEFAULT_FETCHER_TTL: &str = "10h";

const ENV_CONFIG_FILE: &str = "S3IDX_CONFIG_FILE";
const DEFAULT_CONFIG_FILENAME: &str = ".s3idxconfig";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid byte size '{value}': {message}")]
    InvalidByteSize { value: String, message: String },

    #[error("invalid integer '{value}': {source}")]
    InvalidInteger {
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("invalid boolean '{value}' for key '{key}'")]
    InvalidBoolean { key: String, value: String },

    #[error("invalid value for '{key}': {source}")]
    InvalidFormat { key: String, source: FormatError },

    #[error("page size must be positive")]
    ZeroPageSize,

    #[error("invalid override key '{key}': {message}")]
    InvalidOverrideKey { key: String, message: String },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate and layer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from CLI. If specified and doesn't exist, error.
    /// If None, fall back to S3IDX_CONFIG_FILE env var, then ~/.s3idxconfig.
    pub config_file: Option<PathBuf>,

    /// Additional override config file (layered on top of base config).
    pub override_file: Option<PathBuf>,

    /// Individual key=value overrides (applied last).
    /// Keys use dot-notation: "cache.path", "fetcher.ttl"
    pub overrides: Vec<(String, String)>,
}

// =============================================================================
// ByteSize Parsing
// =============================================================================

impl ByteSize {
    /// Parse a byte size from a string like "100MB", "1GB", "500KB", or plain "1024".
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidByteSize {
                value: s.to_string(),
                message: "empty string".to_string(),
            });
        }

        // Find where the numeric part ends
        let num_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());

        if num_end == 0 {
            return Err(ConfigError::InvalidByteSize {
                value: s.to_string(),
                message: "no numeric value".to_string(),
            });
        }

        let num_str = &s[..num_end];
        let suffix = s[num_end..].trim().to_uppercase();

        let base: u64 = num_str.parse().map_err(|e| ConfigError::InvalidByteSize {
            value: s.to_string(),
            message: format!("invalid number: {}", e),
        })?;

        let multiplier: u64 = match suffix.as_str() {
            "" | "B" => 1,
            "K" | "KB" => 1024,
            "M" | "MB" => 1024 * 1024,
            "G" | "GB" => 1024 * 1024 * 1024,
            "T" | "TB" => 1024 * 1024 * 1024 * 1024,
            _ => {
                return Err(ConfigError::InvalidByteSize {
                    value: s.to_string(),
                    message: format!("unknown suffix '{}'", suffix),
                });
            }
        };

        Ok(ByteSize(base.saturating_mul(multiplier)))
    }
}

// =============================================================================
// Value Parsing
// =============================================================================

fn parse_bool_value(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_page_size(value: &str) -> Result<usize> {
    let n: usize = value.trim().parse().map_err(|e| ConfigError::InvalidInteger {
        value: value.to_string(),
        source: e,
    })?;
    if n == 0 {
        return Err(ConfigError::ZeroPageSize);
    }
    Ok(n)
}

fn parse_size_format(key: &str, value: &str) -> Result<SizeFormat> {
    value.parse().map_err(|source| ConfigError::InvalidFormat {
        key: key.to_string(),
        source,
    })
}

fn parse_datetime_format(key: &str, value: &str) -> Result<DatetimeFormat> {
    value.parse().map_err(|source| ConfigError::InvalidFormat {
        key: key.to_string(),
        source,
    })
}

/// Apply a TTL string, keeping the previous value if it does not parse.
///
/// An unparseable TTL is not fatal: the warning is reported and the last
/// good value stays in effect.
fn apply_ttl(settings: &mut FetcherSettings, value: &str, warnings: &mut Vec<String>) {
    match parse_duration(value.trim()) {
        Some(ttl) => settings.ttl = ttl,
        None => warnings.push(format!(
            "ignoring unrecognized fetcher.ttl '{}'; keeping {}s",
            value,
            settings.ttl.num_seconds()
        )),
    }
}

// =============================================================================
// Config File Resolution
// =============================================================================

/// Information about how the config file was resolved.
#[derive(Debug)]
pub struct ResolvedConfigFile {
    /// The path to the config file, if one was found.
    pub path: Option<PathBuf>,
    /// Warning message if env var pointed to nonexistent file.
    pub warning: Option<String>,
}

/// Resolve which config file to use based on the ConfigSource and environment.
fn resolve_config_file(source: &ConfigSource) -> Result<ResolvedConfigFile> {
    // If explicit path provided, it must exist
    if let Some(ref path) = source.config_file {
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path.clone()),
                warning: None,
            });
        } else {
            return Err(ConfigError::FileNotFound(path.clone()));
        }
    }

    // Check environment variable
    if let Ok(env_path) = env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path),
                warning: None,
            });
        } else {
            // Warn but continue with defaults
            return Ok(ResolvedConfigFile {
                path: None,
                warning: Some(format!(
                    "config file specified by {} does not exist: {}",
                    ENV_CONFIG_FILE, env_path
                )),
            });
        }
    }

    // Check ~/.s3idxconfig
    if let Some(home) = home_dir() {
        let default_path = home.join(DEFAULT_CONFIG_FILENAME);
        if default_path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(default_path),
                warning: None,
            });
        }
    }

    Ok(ResolvedConfigFile {
        path: None,
        warning: None,
    })
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

// =============================================================================
// Default Config
// =============================================================================

/// Create a Config with all default values.
fn default_config() -> Config {
    Config {
        cache: CacheConfig {
            path: PathBuf::from(DEFAULT_CACHE_PATH),
            no_cache: DEFAULT_CACHE_NO_CACHE,
            map_size: ByteSize(DEFAULT_CACHE_MAP_SIZE),
        },
        fetcher: FetcherSettings {
            ttl: parse_duration(DEFAULT_FETCHER_TTL).unwrap_or_else(|| Duration::hours(10)),
            page_size: DEFAULT_PAGE_SIZE,
        },
        s3: S3Settings::default(),
        display: DisplayConfig::default(),
    }
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Apply an INI file's contents to a Config, layering on top of existing values.
fn apply_ini_to_config(config: &mut Config, ini: &Ini, warnings: &mut Vec<String>) -> Result<()> {
    // [cache] section
    if let Some(path) = ini.get("cache", "path") {
        config.cache.path = PathBuf::from(path);
    }
    for key in ["no_cache", "no-cache"] {
        if let Some(v) = ini.get("cache", key) {
            config.cache.no_cache = parse_bool_value(key, &v)?;
        }
    }
    if let Some(v) = ini.get("cache", "map_size") {
        config.cache.map_size = ByteSize::parse(&v)?;
    }

    // [fetcher] section
    if let Some(v) = ini.get("fetcher", "ttl") {
        apply_ttl(&mut config.fetcher, &v, warnings);
    }
    if let Some(v) = ini.get("fetcher", "page_size") {
        config.fetcher.page_size = parse_page_size(&v)?;
    }

    // [s3] section
    if let Some(v) = ini.get("s3", "endpoint_url") {
        config.s3.endpoint_url = Some(v);
    }
    if let Some(v) = ini.get("s3", "region") {
        config.s3.region = Some(v);
    }
    if let Some(v) = ini.get("s3", "force_path_style") {
        config.s3.force_path_style = parse_bool_value("force_path_style", &v)?;
    }
    if let Some(v) = ini.get("s3", "access_key_id") {
        config.s3.access_key_id = Some(v);
    }
    if let Some(v) = ini.get("s3", "secret_access_key") {
        config.s3.secret_access_key = Some(v);
    }

    // [display] section
    if let Some(v) = ini.get("display", "size_format") {
        config.display.size_format = parse_size_format("display.size_format", &v)?;
    }
    if let Some(v) = ini.get("display", "datetime_format") {
        config.display.datetime_format = parse_datetime_format("display.datetime_format", &v)?;
    }

    Ok(())
}

/// Load and parse an INI file.
fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e,
    })?;
    Ok(ini)
}

// =============================================================================
// Override Application
// =============================================================================

/// Apply a single key=value override to the config.
fn apply_override(
    config: &mut Config,
    key: &str,
    value: &str,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let unknown = || ConfigError::InvalidOverrideKey {
        key: key.to_string(),
        message: "unknown parameter".to_string(),
    };

    match key.split_once('.') {
        Some(("cache", param)) => match param {
            "path" => config.cache.path = PathBuf::from(value),
            "no_cache" | "no-cache" => config.cache.no_cache = parse_bool_value(param, value)?,
            "map_size" => config.cache.map_size = ByteSize::parse(value)?,
            _ => return Err(unknown()),
        },
        Some(("fetcher", param)) => match param {
            "ttl" => apply_ttl(&mut config.fetcher, value, warnings),
            "page_size" => config.fetcher.page_size = parse_page_size(value)?,
            _ => return Err(unknown()),
        },
        Some(("s3", param)) => match param {
            "endpoint_url" => config.s3.endpoint_url = Some(value.to_string()),
            "region" => config.s3.region = Some(value.to_string()),
            "force_path_style" => config.s3.force_path_style = parse_bool_value(param, value)?,
            "access_key_id" => config.s3.access_key_id = Some(value.to_string()),
            "secret_access_key" => config.s3.secret_access_key = Some(value.to_string()),
            _ => return Err(unknown()),
        },
        Some(("display", param)) => match param {
            "size_format" => config.display.size_format = parse_size_format(key, value)?,
            "datetime_format" => {
                config.display.datetime_format = parse_datetime_format(key, value)?
            }
            _ => return Err(unknown()),
        },
        _ => {
            return Err(ConfigError::InvalidOverrideKey {
                key: key.to_string(),
                message: "unrecognized key format".to_string(),
            })
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Result of reading configuration, including any warnings.
#[derive(Debug)]
pub struct ConfigResult {
    /// The parsed configuration.
    pub config: Config,
    /// Any warnings generated during config loading.
    pub warnings: Vec<String>,
}

/// Read and parse configuration from the specified sources.
///
/// Configuration is layered in this order:
/// 1. Built-in defaults
/// 2. Base config file (from CLI, env var, or ~/.s3idxconfig)
/// 3. Override config file (if specified)
/// 4. Individual overrides (applied last)
pub fn read_config(source: &ConfigSource) -> Result<ConfigResult> {
    let mut warnings = Vec::new();

    let mut config = default_config();

    let resolved = resolve_config_file(source)?;
    if let Some(warning) = resolved.warning {
        warnings.push(warning);
    }
    if let Some(ref path) = resolved.path {
        let ini = load_ini(path)?;
        apply_ini_to_config(&mut config, &ini, &mut warnings)?;
    }

    if let Some(ref override_path) = source.override_file {
        if !override_path.exists() {
            return Err(ConfigError::FileNotFound(override_path.clone()));
        }
        let ini = load_ini(override_path)?;
        apply_ini_to_config(&mut config, &ini, &mut warnings)?;
    }

    for (key, value) in &source.overrides {
        apply_override(&mut config, key, value, &mut warnings)?;
    }

    Ok(ConfigResult { config, warnings })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::NamedTempFile;

    fn ini(text: &str) -> Ini {
        let mut ini = Ini::new();
        ini.read(text.to_string()).unwrap();
        ini
    }

    #[test]
    fn test_bytesize_parse() {
        assert_eq!(ByteSize::parse("100").unwrap().0, 100);
        assert_eq!(ByteSize::parse("100KB").unwrap().0, 100 * 1024);
        assert_eq!(ByteSize::parse("1G").unwrap().0, 1024 * 1024 * 1024);
        assert_eq!(ByteSize::parse("  50mb  ").unwrap().0, 50 * 1024 * 1024);
        assert!(ByteSize::parse("").is_err());
        assert!(ByteSize::parse("MB").is_err());
        assert!(ByteSize::parse("100XB").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert_eq!(config.cache.path, PathBuf::from("/tmp/s3idx-cache"));
        assert!(!config.cache.no_cache);
        assert_eq!(config.cache.map_size, ByteSize(1024 * 1024 * 1024));
        assert_eq!(config.fetcher.ttl, Duration::hours(10));
        assert_eq!(config.fetcher.page_size, 1000);
        assert_eq!(config.display.size_format, SizeFormat::Iec);
        assert!(config.s3.endpoint_url.is_none());
    }

    #[test]
    fn test_parse_ini_config() {
        let ini = ini(r#"
[cache]
path = /custom/cache
no-cache = true
map_size = 64MB

[fetcher]
ttl = 1d
page_size = 200

[s3]
endpoint_url = http://localhost:9000
force_path_style = yes
access_key_id = AKIA
secret_access_key = secret

[display]
size_format = iso
datetime_format = relative
"#);

        let mut config = default_config();
        let mut warnings = Vec::new();
        apply_ini_to_config(&mut config, &ini, &mut warnings).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(config.cache.path, PathBuf::from("/custom/cache"));
        assert!(config.cache.no_cache);
        assert_eq!(config.cache.map_size, ByteSize(64 * 1024 * 1024));
        assert_eq!(config.fetcher.ttl, Duration::days(1));
        assert_eq!(config.fetcher.page_size, 200);
        assert_eq!(config.s3.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert!(config.s3.force_path_style);
        assert_eq!(config.s3.access_key_id.as_deref(), Some("AKIA"));
        assert_eq!(config.display.size_format, SizeFormat::Iso);
        assert_eq!(config.display.datetime_format, DatetimeFormat::Relative);
    }

    #[test]
    fn test_bad_ttl_keeps_previous_value() {
        let mut config = default_config();
        let mut warnings = Vec::new();
        apply_ini_to_config(&mut config, &ini("[fetcher]\nttl = 0bogus\n"), &mut warnings).unwrap();
        assert_eq!(config.fetcher.ttl, Duration::hours(10));
        assert_eq!(warnings.len(), 1);

        apply_override(&mut config, "fetcher.ttl", "30m", &mut warnings).unwrap();
        assert_eq!(config.fetcher.ttl, Duration::minutes(30));
        apply_override(&mut config, "fetcher.ttl", "5", &mut warnings).unwrap();
        assert_eq!(config.fetcher.ttl, Duration::minutes(30));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let mut config = default_config();
        let mut warnings = Vec::new();
        assert!(matches!(
            apply_ini_to_config(&mut config, &ini("[display]\nsize_format = kb\n"), &mut warnings),
            Err(ConfigError::InvalidFormat { .. })
        ));
        assert!(matches!(
            apply_override(&mut config, "fetcher.page_size", "0", &mut warnings),
            Err(ConfigError::ZeroPageSize)
        ));
        assert!(matches!(
            apply_override(&mut config, "s3.force_path_style", "maybe", &mut warnings),
            Err(ConfigError::InvalidBoolean { .. })
        ));
        assert!(matches!(
            apply_override(&mut config, "cache.nope", "1", &mut warnings),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
        assert!(matches!(
            apply_override(&mut config, "nosection", "1", &mut warnings),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
    }

    #[test]
    fn test_read_config_layers() {
        let mut base = NamedTempFile::new().unwrap();
        writeln!(base, "[cache]\npath = /base\n[fetcher]\npage_size = 50").unwrap();
        let mut overlay = NamedTempFile::new().unwrap();
        writeln!(overlay, "[cache]\npath = /overlay").unwrap();

        let source = ConfigSource {
            config_file: Some(base.path().to_path_buf()),
            override_file: Some(overlay.path().to_path_buf()),
            overrides: vec![("display.size_format".to_string(), "bytes".to_string())],
        };
        let result = read_config(&source).unwrap();
        assert_eq!(result.config.cache.path, PathBuf::from("/overlay"));
        assert_eq!(result.config.fetcher.page_size, 50);
        assert_eq!(result.config.display.size_format, SizeFormat::Bytes);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let source = ConfigSource {
            config_file: Some(PathBuf::from("/nonexistent/s3idx/config")),
            ..Default::default()
        };
        assert!(matches!(
            read_config(&source),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
