//! Configuration management
//!
//! Values are layered, lowest priority first: built-in defaults, an optional
//! TOML file (`--config`), then command-line flags and their environment
//! variables (`PORT`, `BUCKET_NAME`, ...).

use clap::{Parser, ValueEnum};
use gcsdrop_storage::storage::DEFAULT_METADATA_HOST;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Command-line arguments. Every flag falls back to an environment variable.
#[derive(Parser, Debug, Default)]
#[command(name = "gcsdrop")]
#[command(about = "Streams Cloud Storage objects as file downloads", long_about = None)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Bucket to serve objects from
    #[arg(short, long, env = "BUCKET_NAME")]
    pub bucket: Option<String>,

    /// Storage backend
    #[arg(long, value_enum, env = "STORAGE_BACKEND")]
    pub storage: Option<StorageBackend>,

    /// Cloud Storage emulator endpoint (host:port or URL)
    #[arg(long, env = "STORAGE_EMULATOR_HOST")]
    pub emulator_host: Option<String>,

    /// Static bearer token for Cloud Storage requests
    #[arg(long, env = "GCS_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Metadata server host used to obtain access tokens
    #[arg(long, env = "GCE_METADATA_HOST")]
    pub metadata_host: Option<String>,

    /// Directory whose files are preloaded into the memory backend
    #[arg(long, env = "SEED_DIR")]
    pub seed_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "GCSDROP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Which backend serves the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Gcs,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gcs => "gcs",
            Self::Memory => "memory",
        }
    }
}

/// Main configuration structure, built once at startup
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Empty when `BUCKET_NAME` is unset; downloads then fail with 500.
    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default)]
    pub emulator_host: Option<String>,

    #[serde(default)]
    pub access_token: Option<Secret>,

    #[serde(default = "default_metadata_host")]
    pub metadata_host: String,

    #[serde(default)]
    pub seed_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            backend: StorageBackend::default(),
            emulator_host: None,
            access_token: None,
            metadata_host: default_metadata_host(),
            seed_dir: None,
        }
    }
}

/// A credential that never shows up in `Debug` output
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_metadata_host() -> String {
    DEFAULT_METADATA_HOST.to_string()
}

impl Config {
    /// Load configuration from the optional file, then apply flags and environment
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        let config = builder
            .set_override_option("server.port", args.port.map(i64::from))?
            .set_override_option("server.host", args.host.clone())?
            .set_override_option("storage.bucket", args.bucket.clone())?
            .set_override_option(
                "storage.backend",
                args.storage.map(|b| b.as_str().to_string()),
            )?
            .set_override_option("storage.emulator_host", args.emulator_host.clone())?
            .set_override_option("storage.access_token", args.access_token.clone())?
            .set_override_option("storage.metadata_host", args.metadata_host.clone())?
            .set_override_option(
                "storage.seed_dir",
                args.seed_dir
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )?
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }
}
