use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage_dir: String,
    pub bucket: String,
    pub public_base_url: String,
    pub request_timeout: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Pet records and image upload API")]
pub struct Args {
    /// Host to bind to (overrides PET_RECORDS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PET_RECORDS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides PET_RECORDS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory where uploaded images are stored (overrides PET_RECORDS_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Bucket uploaded images are written to (overrides PET_RECORDS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Prefix of public image URLs, before the bucket (overrides PET_RECORDS_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Per-request deadline in seconds (overrides PET_RECORDS_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    /// CLI values win over environment values, which win over defaults.
    pub fn merge(args: Args) -> Result<Self> {
        let env_host = env::var("PET_RECORDS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("PET_RECORDS_PORT", 3000u16)?;
        let env_db = env::var("PET_RECORDS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/pet_records.db".into());
        let env_storage =
            env::var("PET_RECORDS_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_bucket = env::var("PET_RECORDS_BUCKET").unwrap_or_else(|_| "pet-images".into());
        let env_public = env::var("PET_RECORDS_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/objects".into());
        let env_timeout = env_parse("PET_RECORDS_REQUEST_TIMEOUT_SECS", 30u64)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            bucket: args.bucket.unwrap_or(env_bucket),
            public_base_url: args.public_base_url.unwrap_or(env_public),
            request_timeout: Duration::from_secs(args.request_timeout_secs.unwrap_or(env_timeout)),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
