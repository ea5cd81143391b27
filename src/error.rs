use thiserror::Error;

/// Failures talking to the data warehouse (connectivity, auth, query, decoding).
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse connection failed: {0}")]
    Connect(String),

    #[error("warehouse rejected credentials: {0}")]
    Auth(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("could not decode warehouse row: {0}")]
    Decode(String),

    #[error("warehouse misconfigured: {0}")]
    Config(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures of a single metadata-service lookup. Never escapes `MetadataClient`.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no TMDB API key configured")]
    MissingApiKey,

    #[error("TMDB http client unavailable")]
    ClientUnavailable,

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {path}")]
    Status { status: u16, path: String },

    #[error("malformed response from {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type WarehouseResult<T> = Result<T, WarehouseError>;
