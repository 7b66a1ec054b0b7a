use crate::models::directive::Scheme;
use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    /// Scheme used for the origin URL when the request names none.
    pub default_scheme: Scheme,
    /// Encoder quality (0-100) when neither query arg nor header sets one.
    pub default_quality: u8,
    /// Compression level (0-9) when neither query arg nor header sets one.
    pub default_compression: u8,

    /// Pass zero-length origin bodies through untouched instead of feeding
    /// them to the engine.
    pub skip_empty_images: bool,
    /// Degrade transform failures on the fetch flow to the original payload.
    pub skip_resize_errors: bool,

    /// Per-request timeout for origin fetches, seconds.
    pub fetch_timeout_secs: u64,
    /// Outbound pool: idle connections kept per origin host.
    pub pool_max_idle_per_host: usize,
    /// Outbound pool: idle connection lifetime, seconds.
    pub pool_idle_timeout_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "On-the-fly image transformation proxy")]
pub struct Args {
    /// Host to bind to (overrides RESIZE_PROXY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides RESIZE_PROXY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Default origin scheme, http or https (overrides RESIZE_PROXY_DEFAULT_SCHEME)
    #[arg(long)]
    pub default_scheme: Option<Scheme>,

    /// Default encoder quality 0-100 (overrides RESIZE_PROXY_DEFAULT_QUALITY)
    #[arg(long)]
    pub default_quality: Option<u8>,

    /// Default compression level 0-9 (overrides RESIZE_PROXY_DEFAULT_COMPRESSION)
    #[arg(long)]
    pub default_compression: Option<u8>,

    /// Pass empty origin bodies through untouched (overrides RESIZE_PROXY_SKIP_EMPTY_IMAGES)
    #[arg(long)]
    pub skip_empty_images: Option<bool>,

    /// Answer the original image when a transform fails (overrides RESIZE_PROXY_SKIP_RESIZE_ERRORS)
    #[arg(long)]
    pub skip_resize_errors: Option<bool>,

    /// Origin fetch timeout in seconds (overrides RESIZE_PROXY_FETCH_TIMEOUT_SECS)
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,

    /// Idle origin connections kept per host (overrides RESIZE_PROXY_POOL_MAX_IDLE_PER_HOST)
    #[arg(long)]
    pub pool_max_idle_per_host: Option<usize>,

    /// Idle origin connection lifetime in seconds (overrides RESIZE_PROXY_POOL_IDLE_TIMEOUT_SECS)
    #[arg(long)]
    pub pool_idle_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into an AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("RESIZE_PROXY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("RESIZE_PROXY_PORT", 8080)?;
        let env_scheme = env_parse("RESIZE_PROXY_DEFAULT_SCHEME", Scheme::Http)?;
        let env_quality = env_parse("RESIZE_PROXY_DEFAULT_QUALITY", 80)?;
        let env_compression = env_parse("RESIZE_PROXY_DEFAULT_COMPRESSION", 6)?;
        let env_skip_empty = env_parse("RESIZE_PROXY_SKIP_EMPTY_IMAGES", false)?;
        let env_skip_errors = env_parse("RESIZE_PROXY_SKIP_RESIZE_ERRORS", false)?;
        let env_fetch_timeout = env_parse("RESIZE_PROXY_FETCH_TIMEOUT_SECS", 30)?;
        let env_pool_idle = env_parse("RESIZE_PROXY_POOL_MAX_IDLE_PER_HOST", 8)?;
        let env_pool_timeout = env_parse("RESIZE_PROXY_POOL_IDLE_TIMEOUT_SECS", 90)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            default_scheme: args.default_scheme.unwrap_or(env_scheme),
            default_quality: args.default_quality.unwrap_or(env_quality),
            default_compression: args.default_compression.unwrap_or(env_compression),
            skip_empty_images: args.skip_empty_images.unwrap_or(env_skip_empty),
            skip_resize_errors: args.skip_resize_errors.unwrap_or(env_skip_errors),
            fetch_timeout_secs: args.fetch_timeout_secs.unwrap_or(env_fetch_timeout),
            pool_max_idle_per_host: args.pool_max_idle_per_host.unwrap_or(env_pool_idle),
            pool_idle_timeout_secs: args.pool_idle_timeout_secs.unwrap_or(env_pool_timeout),
        };

        if cfg.default_quality > 100 {
            anyhow::bail!("default quality {} out of range 0-100", cfg.default_quality);
        }
        if cfg.default_compression > 9 {
            anyhow::bail!(
                "default compression {} out of range 0-9",
                cfg.default_compression
            );
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            default_scheme: Scheme::Http,
            default_quality: 80,
            default_compression: 6,
            skip_empty_images: false,
            skip_resize_errors: false,
            fetch_timeout_secs: 5,
            pool_max_idle_per_host: 2,
            pool_idle_timeout_secs: 5,
        }
    }
}

/// Read an env var and parse it, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("parsing {name} value `{value}`: {err}")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {name}")),
    }
}
