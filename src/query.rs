// src/query.rs — parameterized statements for the catalogue load and filtered search
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::digest_key;
use crate::error::WarehouseError;

/// Earliest release year offered by the year-range control.
pub const MIN_RELEASE_YEAR: i32 = 1891;
pub const MAX_RATING: f64 = 5.0;

/// Unicode-aware lowercase registered on every SQLite connection. The
/// built-in `LOWER` only folds ASCII.
pub const SQLITE_LOWER_FN: &str = "unicode_lower";

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,1024}$").expect("static identifier regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    BigQuery,
}

/// Where statements run: the SQL flavour plus rendered table references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlTarget {
    pub dialect: Dialect,
    movies: String,
    ratings: String,
}

impl SqlTarget {
    pub fn sqlite() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            movies: "movies".into(),
            ratings: "ratings".into(),
        }
    }

    /// `` `project.dataset.movies` `` style references. Project and dataset
    /// come from configuration and must be plain identifiers.
    pub fn bigquery(project: &str, dataset: &str) -> Result<Self, WarehouseError> {
        for (what, ident) in [("project", project), ("dataset", dataset)] {
            if !IDENT_RE.is_match(ident) {
                return Err(WarehouseError::Config(format!(
                    "invalid BigQuery {what} `{ident}`"
                )));
            }
        }
        Ok(Self {
            dialect: Dialect::BigQuery,
            movies: format!("`{project}.{dataset}.movies`"),
            ratings: format!("`{project}.{dataset}.ratings`"),
        })
    }

    pub fn movies_table(&self) -> &str {
        &self.movies
    }

    pub fn ratings_table(&self) -> &str {
        &self.ratings
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
}

/// SQL text plus its named (`@name`) arguments, in the order they appear.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(&'static str, Param)>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, name: &'static str, value: Param) {
        self.params.push((name, value));
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params
            .iter()
            .find_map(|(n, v)| (*n == name).then_some(v))
    }
}

/// Inclusive release-year bounds. Construction orders the ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    from: i32,
    to: i32,
}

impl YearRange {
    pub fn new(a: i32, b: i32) -> Self {
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }

    pub fn from(&self) -> i32 {
        self.from.min(self.to)
    }

    pub fn to(&self) -> i32 {
        self.from.max(self.to)
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.from()..=self.to()).contains(&year)
    }
}

/// The user's constraints for one search. Empty strings mean "no filter".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub title_prefix: String,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub years: Option<YearRange>,
    pub min_rating: Option<f64>,
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

impl FilterSet {
    pub fn title(prefix: impl Into<String>) -> Self {
        Self {
            title_prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_years(mut self, from: i32, to: i32) -> Self {
        self.years = Some(YearRange::new(from, to));
        self
    }

    pub fn with_min_rating(mut self, min: f64) -> Self {
        self.min_rating = Some(min);
        self
    }

    /// Lowercased prefix, or `None` when the field is blank. The text itself
    /// is not trimmed: "toy " must not match "Toys".
    pub fn effective_title_prefix(&self) -> Option<String> {
        if self.title_prefix.trim().is_empty() {
            None
        } else {
            Some(self.title_prefix.to_lowercase())
        }
    }

    pub fn effective_genre(&self) -> Option<&str> {
        non_blank(self.genre.as_deref())
    }

    pub fn effective_language(&self) -> Option<&str> {
        non_blank(self.language.as_deref())
    }

    pub fn effective_min_rating(&self) -> Option<f64> {
        self.min_rating.filter(|r| r.is_finite())
    }

    pub fn is_unfiltered(&self) -> bool {
        self.effective_title_prefix().is_none()
            && self.effective_genre().is_none()
            && self.effective_language().is_none()
            && self.years.is_none()
            && self.effective_min_rating().is_none()
    }

    /// Two filter sets that produce the same statement share a key.
    pub fn cache_key(&self) -> String {
        let canonical = Self {
            title_prefix: self.effective_title_prefix().unwrap_or_default(),
            genre: self.effective_genre().map(str::to_owned),
            language: self.effective_language().map(str::to_owned),
            years: self.years.map(|y| YearRange::new(y.from(), y.to())),
            min_rating: self.effective_min_rating(),
        };
        let raw = serde_json::to_string(&canonical).unwrap_or_else(|_| format!("{canonical:?}"));
        digest_key(&raw)
    }
}

/// One row of a search: a title and the mean of its ratings at query time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub average_rating: f64,
}

impl SearchResult {
    /// Rating rounded to one decimal, as displayed.
    pub fn display_rating(&self) -> f64 {
        (self.average_rating * 10.0).round() / 10.0
    }

    /// Whole stars for the rounded rating, 0..=5.
    pub fn stars(&self) -> usize {
        self.display_rating().clamp(0.0, MAX_RATING) as usize
    }
}

/// Full catalogue, one row per movie.
pub fn build_catalogue(target: &SqlTarget) -> Statement {
    Statement::new(format!(
        "SELECT movieId, title, genres, language, release_year, tmdbId\n\
         FROM {}\n\
         ORDER BY movieId ASC",
        target.movies_table()
    ))
}

/// Title plus mean rating per movie, filtered conjunctively by whatever the
/// set carries. Values are only ever bound, never written into the text.
pub fn build_search(filters: &FilterSet, target: &SqlTarget) -> Statement {
    let mut sql = format!(
        "SELECT mm.title AS title, AVG(mr.rating) AS average_rating\n\
         FROM {} mm\n\
         JOIN {} mr ON mm.movieId = mr.movieId\n\
         WHERE 1 = 1",
        target.movies_table(),
        target.ratings_table()
    );
    let mut params: Vec<(&'static str, Param)> = Vec::new();

    if let Some(prefix) = filters.effective_title_prefix() {
        let lower = match target.dialect {
            Dialect::Sqlite => SQLITE_LOWER_FN,
            Dialect::BigQuery => "LOWER",
        };
        sql.push_str(&format!(
            "\n  AND SUBSTR({lower}(mm.title), 1, LENGTH(@title_prefix)) = @title_prefix"
        ));
        params.push(("title_prefix", Param::Text(prefix)));
    }

    if let Some(genre) = filters.effective_genre() {
        let contains = match target.dialect {
            Dialect::Sqlite => "instr(mm.genres, @genre) > 0",
            Dialect::BigQuery => "STRPOS(mm.genres, @genre) > 0",
        };
        sql.push_str("\n  AND ");
        sql.push_str(contains);
        params.push(("genre", Param::Text(genre.to_owned())));
    }

    if let Some(language) = filters.effective_language() {
        sql.push_str("\n  AND mm.language = @language");
        params.push(("language", Param::Text(language.to_owned())));
    }

    if let Some(years) = filters.years {
        sql.push_str("\n  AND mm.release_year BETWEEN @year_from AND @year_to");
        params.push(("year_from", Param::Int(i64::from(years.from()))));
        params.push(("year_to", Param::Int(i64::from(years.to()))));
    }

    sql.push_str("\nGROUP BY mm.movieId, mm.title");

    // depends on the aggregate, so it has to follow GROUP BY
    if let Some(min) = filters.effective_min_rating() {
        sql.push_str("\nHAVING AVG(mr.rating) >= @min_rating");
        params.push(("min_rating", Param::Float(min)));
    }

    sql.push_str("\nORDER BY mm.title ASC, mm.movieId ASC");

    let mut stmt = Statement::new(sql);
    for (name, value) in params {
        stmt.bind(name, value);
    }
    stmt
}
