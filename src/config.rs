use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const LOCAL_DB_DIR: &str = "db";
pub const LOCAL_DB_FILE: &str = "reelquest.db";
pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WarehouseKind {
    #[default]
    Sqlite,
    BigQuery,
}

impl WarehouseKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "sqlite" | "local" => Some(Self::Sqlite),
            "bigquery" | "bq" => Some(Self::BigQuery),
            _ => None,
        }
    }
}

/// How the TMDB credential travels: the v3 `api_key` query parameter, or a
/// v4 read-access token in the `Authorization` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TmdbAuth {
    #[default]
    QueryParam,
    Bearer,
}

impl TmdbAuth {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "query" | "api_key" => Some(Self::QueryParam),
            "bearer" | "header" => Some(Self::Bearer),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub warehouse: WarehouseKind,
    pub sqlite_path: PathBuf,
    pub bigquery_project: Option<String>,
    pub bigquery_dataset: Option<String>,
    pub bigquery_token: Option<String>,
    pub bigquery_token_file: Option<PathBuf>,
    pub bigquery_base_url: String,
    pub tmdb_api_key: Option<String>,
    pub tmdb_auth: TmdbAuth,
    pub tmdb_base_url: String,
    pub tmdb_image_base: String,
    pub http_timeout: Duration,
    pub cache_ttl: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            warehouse: WarehouseKind::default(),
            sqlite_path: local_db_path(),
            bigquery_project: None,
            bigquery_dataset: None,
            bigquery_token: None,
            bigquery_token_file: None,
            bigquery_base_url: BIGQUERY_BASE_URL.to_string(),
            tmdb_api_key: None,
            tmdb_auth: TmdbAuth::default(),
            tmdb_base_url: TMDB_BASE_URL.to_string(),
            tmdb_image_base: TMDB_IMAGE_BASE.to_string(),
            http_timeout: Duration::from_secs(15),
            cache_ttl: None,
        }
    }
}

impl AppConfig {
    /// Bearer token for BigQuery: inline value wins, then the token file.
    pub fn resolve_bigquery_token(&self) -> Option<String> {
        if let Some(tok) = self.bigquery_token.as_deref().map(str::trim) {
            if !tok.is_empty() {
                return Some(tok.to_string());
            }
        }
        let path = self.bigquery_token_file.as_ref()?;
        match fs::read_to_string(path) {
            Ok(raw) => Some(raw.trim().to_string()).filter(|t| !t.is_empty()),
            Err(err) => {
                warn!("failed to read BigQuery token file {}: {err}", path.display());
                None
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    warehouse: Option<String>,
    sqlite_path: Option<String>,
    bigquery_project: Option<String>,
    bigquery_dataset: Option<String>,
    bigquery_token: Option<String>,
    #[serde(alias = "bigquery_credentials_path")]
    bigquery_token_file: Option<String>,
    bigquery_base_url: Option<String>,
    tmdb_api_key: Option<String>,
    tmdb_auth: Option<String>,
    tmdb_base_url: Option<String>,
    tmdb_image_base: Option<String>,
    http_timeout_secs: Option<u64>,
    cache_ttl_secs: Option<u64>,
}

/// `config.json` in the working directory, then environment overrides.
pub fn load_config() -> AppConfig {
    let mut cfg = load_config_from(Path::new(CONFIG_FILE));
    apply_env_overrides(&mut cfg, |key| env::var(key).ok());
    cfg
}

pub fn load_config_from(cfg_path: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();

    match fs::read_to_string(cfg_path) {
        Ok(raw) => match serde_json::from_str::<RawConfig>(&raw) {
            Ok(parsed) => {
                merge_raw(&mut cfg, parsed);
                info!("Loaded config from {}", cfg_path.display());
            }
            Err(err) => {
                warn!(
                    "Failed to parse {} ({}). Using defaults.",
                    cfg_path.display(),
                    err
                );
            }
        },
        Err(_) => {
            info!("No {} found; using defaults", cfg_path.display());
        }
    }

    cfg
}

fn merge_raw(cfg: &mut AppConfig, parsed: RawConfig) {
    if let Some(kind) = parsed.warehouse {
        match WarehouseKind::from_str(&kind) {
            Some(k) => cfg.warehouse = k,
            None => warn!("Unknown warehouse `{kind}` in config; falling back to sqlite."),
        }
    }
    if let Some(p) = parsed.sqlite_path {
        cfg.sqlite_path = PathBuf::from(p);
    }
    if parsed.bigquery_project.is_some() {
        cfg.bigquery_project = parsed.bigquery_project;
    }
    if parsed.bigquery_dataset.is_some() {
        cfg.bigquery_dataset = parsed.bigquery_dataset;
    }
    if parsed.bigquery_token.is_some() {
        cfg.bigquery_token = parsed.bigquery_token;
    }
    if let Some(p) = parsed.bigquery_token_file {
        cfg.bigquery_token_file = Some(PathBuf::from(p));
    }
    if let Some(url) = parsed.bigquery_base_url {
        cfg.bigquery_base_url = url;
    }
    if parsed.tmdb_api_key.is_some() {
        cfg.tmdb_api_key = parsed.tmdb_api_key;
    }
    if let Some(mode) = parsed.tmdb_auth {
        match TmdbAuth::from_str(&mode) {
            Some(a) => cfg.tmdb_auth = a,
            None => warn!("Unknown tmdb_auth `{mode}` in config; using query parameter."),
        }
    }
    if let Some(url) = parsed.tmdb_base_url {
        cfg.tmdb_base_url = url;
    }
    if let Some(url) = parsed.tmdb_image_base {
        cfg.tmdb_image_base = url;
    }
    if let Some(secs) = parsed.http_timeout_secs {
        cfg.http_timeout = Duration::from_secs(secs.max(1));
    }
    if let Some(secs) = parsed.cache_ttl_secs {
        cfg.cache_ttl = Some(Duration::from_secs(secs));
    }
}

/// Environment wins over the file. `lookup` is injected so tests need not
/// touch the process environment.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(kind) = get("REELQUEST_WAREHOUSE") {
        match WarehouseKind::from_str(&kind) {
            Some(k) => cfg.warehouse = k,
            None => warn!("Unknown REELQUEST_WAREHOUSE `{kind}`; keeping {:?}.", cfg.warehouse),
        }
    }
    if let Some(p) = get("REELQUEST_SQLITE_PATH") {
        cfg.sqlite_path = PathBuf::from(p);
    }
    if let Some(v) = get("REELQUEST_BIGQUERY_PROJECT") {
        cfg.bigquery_project = Some(v);
    }
    if let Some(v) = get("REELQUEST_BIGQUERY_DATASET") {
        cfg.bigquery_dataset = Some(v);
    }
    if let Some(v) = get("REELQUEST_BIGQUERY_TOKEN") {
        cfg.bigquery_token = Some(v);
    }
    if let Some(v) = get("REELQUEST_BIGQUERY_TOKEN_FILE") {
        cfg.bigquery_token_file = Some(PathBuf::from(v));
    }
    if let Some(v) = get("REELQUEST_TMDB_API_KEY") {
        cfg.tmdb_api_key = Some(v);
    }
    if let Some(mode) = get("REELQUEST_TMDB_AUTH") {
        match TmdbAuth::from_str(&mode) {
            Some(a) => cfg.tmdb_auth = a,
            None => warn!("Unknown REELQUEST_TMDB_AUTH `{mode}`; keeping {:?}.", cfg.tmdb_auth),
        }
    }
    if let Some(v) = get("REELQUEST_CACHE_TTL_SECS") {
        match v.trim().parse::<u64>() {
            Ok(secs) => cfg.cache_ttl = Some(Duration::from_secs(secs)),
            Err(err) => warn!("Ignoring REELQUEST_CACHE_TTL_SECS `{v}`: {err}"),
        }
    }
}

pub fn local_db_path() -> PathBuf {
    PathBuf::from(LOCAL_DB_DIR).join(LOCAL_DB_FILE)
}
