use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OpenFlags, Row};
use tracing::debug;

use super::Warehouse;
use crate::catalogue::Movie;
use crate::error::{WarehouseError, WarehouseResult};
use crate::query::{Param, SearchResult, SqlTarget, Statement, SQLITE_LOWER_FN};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS movies (
    movieId      INTEGER PRIMARY KEY,
    title        TEXT    NOT NULL,
    genres       TEXT    NOT NULL DEFAULT '',
    language     TEXT    NOT NULL DEFAULT '',
    release_year INTEGER,
    tmdbId       INTEGER
);
CREATE TABLE IF NOT EXISTS ratings (
    movieId INTEGER NOT NULL REFERENCES movies(movieId),
    rating  REAL    NOT NULL CHECK (rating BETWEEN 0 AND 5)
);
CREATE INDEX IF NOT EXISTS idx_ratings_movie ON ratings(movieId);
"#;

/// Title matching folds case with Rust's Unicode rules, so "Élite" and "élite"
/// compare equal where SQLite's own `LOWER` would not.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        SQLITE_LOWER_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
        [name],
        |_row| Ok(()),
    )
    .is_ok()
}

/// Local SQLite file (or in-memory database) laid out like the warehouse.
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
    target: SqlTarget,
}

impl SqliteWarehouse {
    pub fn open_read_only(path: &Path) -> WarehouseResult<Self> {
        if !path.exists() {
            return Err(WarehouseError::Connect(format!(
                "SQLite warehouse not found at {}",
                path.display()
            )));
        }
        let flags_common = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        #[cfg(not(windows))]
        let flags = flags_common | OpenFlags::SQLITE_OPEN_URI;
        #[cfg(windows)]
        let flags = flags_common;

        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| WarehouseError::Connect(format!("open {}: {e}", path.display())))?;
        let _ = conn.busy_timeout(Duration::from_secs(10));
        Self::checked(conn)
    }

    /// Writable connection; creates the schema if missing. Used for seeding.
    pub fn open(path: &Path) -> WarehouseResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Self::checked(conn)
    }

    pub fn open_in_memory() -> WarehouseResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Self::checked(conn)
    }

    fn checked(conn: Connection) -> WarehouseResult<Self> {
        if !(table_exists(&conn, "movies") && table_exists(&conn, "ratings")) {
            return Err(WarehouseError::Query(
                "required tables missing (movies, ratings)".into(),
            ));
        }
        register_functions(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            target: SqlTarget::sqlite(),
        })
    }

    pub fn insert_movie(&self, movie: &Movie) -> WarehouseResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO movies (movieId, title, genres, language, release_year, tmdbId)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                movie.id,
                movie.title,
                movie.genres,
                movie.language,
                movie.release_year,
                movie.tmdb_id
            ],
        )?;
        Ok(())
    }

    pub fn insert_rating(&self, movie_id: i64, rating: f64) -> WarehouseResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO ratings (movieId, rating) VALUES (?1, ?2)",
            rusqlite::params![movie_id, rating],
        )?;
        Ok(())
    }

    fn query_rows<T, F>(&self, stmt: &Statement, map: F) -> WarehouseResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        debug!(sql = %stmt.sql, params = ?param_names(stmt), "sqlite query");
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut prepared = conn
            .prepare(&stmt.sql)
            .map_err(|e| WarehouseError::Query(format!("prepare failed: {e}")))?;

        let names: Vec<String> = stmt.params.iter().map(|(n, _)| format!("@{n}")).collect();
        let bound: Vec<(&str, &dyn ToSql)> = names
            .iter()
            .zip(stmt.params.iter())
            .map(|(name, (_, value))| (name.as_str(), param_to_sql(value)))
            .collect();

        let rows = prepared
            .query_map(bound.as_slice(), map)
            .map_err(|e| WarehouseError::Query(format!("query failed: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<T>>>()
            .map_err(|e| WarehouseError::Decode(e.to_string()))
    }
}

fn param_names(stmt: &Statement) -> Vec<&'static str> {
    stmt.params.iter().map(|(n, _)| *n).collect()
}

fn param_to_sql(value: &Param) -> &dyn ToSql {
    match value {
        Param::Text(s) => s,
        Param::Int(i) => i,
        Param::Float(f) => f,
    }
}

impl Warehouse for SqliteWarehouse {
    fn target(&self) -> &SqlTarget {
        &self.target
    }

    fn fetch_movies(&self, stmt: &Statement) -> WarehouseResult<Vec<Movie>> {
        self.query_rows(stmt, |row| {
            Ok(Movie {
                id: row.get(0)?,
                title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                genres: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                language: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                release_year: row.get(4)?,
                tmdb_id: row.get(5)?,
            })
        })
    }

    fn fetch_search(&self, stmt: &Statement) -> WarehouseResult<Vec<SearchResult>> {
        self.query_rows(stmt, |row| {
            Ok(SearchResult {
                title: row.get("title")?,
                average_rating: row.get("average_rating")?,
            })
        })
    }
}
