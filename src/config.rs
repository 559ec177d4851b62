use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
    #[error(transparent)]
    DotEnvError(#[from] dotenvy::Error),
}

/// Where uploaded spot photos are kept.
#[derive(Clone, Debug, PartialEq)]
pub enum PhotoStorageConfig {
    /// Files under `<static_dir>/uploads`.
    Local { static_dir: PathBuf },
    /// Objects under `uploads/` in the given bucket.
    S3 { bucket_name: String },
}

#[derive(Clone, Debug)]
pub struct TableNames {
    pub spots: String,
    pub upvotes: String,
    pub comments: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            spots: "spots".to_string(),
            upvotes: "upvotes".to_string(),
            comments: "comments".to_string(),
        }
    }
}

/// Settings for the external satellite pass API and the default observer.
#[derive(Clone, Debug)]
pub struct SatelliteConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_lat: f64,
    pub default_lon: f64,
    pub default_alt: i32,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        // New Delhi
        Self {
            api_key: None,
            base_url: "https://api.n2yo.com/rest/v1".to_string(),
            default_lat: 28.6139,
            default_lon: 77.2090,
            default_alt: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub aws_region: String,
    // Optional endpoint for LocalStack
    pub localstack_endpoint: Option<String>,
    pub tables: TableNames,
    pub photo_storage: PhotoStorageConfig,
    pub max_upload_bytes: usize,
    pub satellite: SatelliteConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;

        let aws_region = lookup("AWS_DEFAULT_REGION").unwrap_or_else(|| "ap-south-1".to_string());
        let localstack_endpoint = lookup("AWS_ENDPOINT_URL");

        let defaults = TableNames::default();
        let tables = TableNames {
            spots: lookup("SPOTS_TABLE").unwrap_or(defaults.spots),
            upvotes: lookup("UPVOTES_TABLE").unwrap_or(defaults.upvotes),
            comments: lookup("COMMENTS_TABLE").unwrap_or(defaults.comments),
        };

        let photo_storage = match lookup("PHOTO_STORAGE").as_deref().unwrap_or("local") {
            "local" => PhotoStorageConfig::Local {
                static_dir: PathBuf::from(
                    lookup("STATIC_DIR").unwrap_or_else(|| "static".to_string()),
                ),
            },
            "s3" => PhotoStorageConfig::S3 {
                bucket_name: lookup("PHOTO_BUCKET_NAME")
                    .ok_or_else(|| ConfigError::MissingVar("PHOTO_BUCKET_NAME".into()))?,
            },
            other => {
                return Err(ConfigError::InvalidVar(
                    "PHOTO_STORAGE".into(),
                    format!("expected 'local' or 's3', got '{}'", other),
                ));
            }
        };

        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", "10485760")?;

        let sat_defaults = SatelliteConfig::default();
        let satellite = SatelliteConfig {
            api_key: lookup("N2YO_API_KEY").filter(|k| !k.trim().is_empty()),
            base_url: lookup("N2YO_BASE_URL").unwrap_or(sat_defaults.base_url),
            default_lat: parse_or(&lookup, "OBSERVER_LAT", "28.6139")?,
            default_lon: parse_or(&lookup, "OBSERVER_LON", "77.2090")?,
            default_alt: parse_or(&lookup, "OBSERVER_ALT", "0")?,
        };

        Ok(Config {
            bind_address,
            aws_region,
            localstack_endpoint,
            tables,
            photo_storage,
            max_upload_bytes,
            satellite,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidVar(key.into(), e.to_string()))
}
