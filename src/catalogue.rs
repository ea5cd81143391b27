// src/catalogue.rs — in-memory movie catalogue loaded once from the warehouse
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::MemoCache;
use crate::error::WarehouseResult;
use crate::query::build_catalogue;
use crate::warehouse::Warehouse;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    /// Pipe-delimited, e.g. `Adventure|Animation|Children`.
    pub genres: String,
    pub language: String,
    pub release_year: Option<i32>,
    /// Identifier on the metadata service (TMDB), distinct from `id`.
    pub tmdb_id: Option<i64>,
}

impl Movie {
    pub fn genre_list(&self) -> Vec<&str> {
        parse_genres(&self.genres)
    }

    pub fn primary_genre(&self) -> Option<&str> {
        self.genre_list().into_iter().next()
    }
}

pub fn parse_genres(tags: &str) -> Vec<&str> {
    tags.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogueStats {
    pub total: usize,
    /// (language, count), most common first.
    pub by_language: Vec<(String, usize)>,
    /// (primary genre, count), most common first.
    pub by_primary_genre: Vec<(String, usize)>,
}

fn ranked_counts<'a>(items: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    items
        .counts()
        .into_iter()
        .map(|(k, n)| (k.to_owned(), n))
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect()
}

#[derive(Debug, Default)]
pub struct Catalogue {
    movies: Vec<Movie>,
    by_id: HashMap<i64, usize>,
    by_title: HashMap<String, usize>,
}

impl Catalogue {
    pub fn new(movies: Vec<Movie>) -> Self {
        let mut by_id = HashMap::with_capacity(movies.len());
        let mut by_title = HashMap::with_capacity(movies.len());
        for (idx, m) in movies.iter().enumerate() {
            by_id.entry(m.id).or_insert(idx);
            // first row wins for duplicate titles
            by_title.entry(m.title.clone()).or_insert(idx);
        }
        Self {
            movies,
            by_id,
            by_title,
        }
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn by_id(&self, id: i64) -> Option<&Movie> {
        self.by_id.get(&id).map(|&i| &self.movies[i])
    }

    pub fn by_title(&self, title: &str) -> Option<&Movie> {
        self.by_title.get(title).map(|&i| &self.movies[i])
    }

    /// Distinct genres across all rows, sorted.
    pub fn genres(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .movies
            .iter()
            .flat_map(|m| parse_genres(&m.genres))
            .collect();
        set.into_iter().map(str::to_owned).collect()
    }

    /// Distinct non-empty language codes, sorted.
    pub fn languages(&self) -> Vec<String> {
        self.movies
            .iter()
            .map(|m| m.language.trim())
            .filter(|l| !l.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    pub fn stats(&self) -> CatalogueStats {
        CatalogueStats {
            total: self.movies.len(),
            by_language: ranked_counts(
                self.movies
                    .iter()
                    .map(|m| m.language.trim())
                    .filter(|l| !l.is_empty()),
            ),
            by_primary_genre: ranked_counts(self.movies.iter().filter_map(Movie::primary_genre)),
        }
    }
}

/// Process-wide holder for the catalogue: one load, shared afterwards.
pub struct CatalogueLoader {
    cache: MemoCache<(), Arc<Catalogue>>,
}

impl CatalogueLoader {
    /// `ttl: None` keeps the catalogue for the life of the process.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            cache: MemoCache::new("catalogue", ttl),
        }
    }

    pub fn get(&self, warehouse: &dyn Warehouse) -> WarehouseResult<Arc<Catalogue>> {
        self.cache.get_or_try_insert_with((), || -> WarehouseResult<Arc<Catalogue>> {
            let started = Instant::now();
            let stmt = build_catalogue(warehouse.target());
            let movies = warehouse.fetch_movies(&stmt)?;
            info!(
                "catalogue loaded: {} movies in {:?}",
                movies.len(),
                started.elapsed()
            );
            Ok(Arc::new(Catalogue::new(movies)))
        })
    }

    /// Already-loaded catalogue, if any. Never touches the warehouse.
    pub fn loaded(&self) -> Option<Arc<Catalogue>> {
        self.cache.get(&())
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i64, title: &str, genres: &str, language: &str) -> Movie {
        Movie {
            id,
            title: title.into(),
            genres: genres.into(),
            language: language.into(),
            release_year: Some(1995),
            tmdb_id: Some(id * 10),
        }
    }

    fn sample() -> Catalogue {
        Catalogue::new(vec![
            movie(1, "Toy Story", "Adventure|Animation|Children", "en"),
            movie(2, "Toy Soldiers", "Action|Drama", "en"),
            movie(3, "Amélie", "Comedy|Romance", "fr"),
            movie(4, "Toy Story", "Animation", "en"),
            movie(5, "Untagged", "", " "),
        ])
    }

    #[test]
    fn indexes_by_id_and_title() {
        let cat = sample();
        assert_eq!(cat.len(), 5);
        assert_eq!(cat.by_id(3).map(|m| m.title.as_str()), Some("Amélie"));
        assert!(cat.by_id(99).is_none());
        // duplicate titles resolve to the first row
        assert_eq!(cat.by_title("Toy Story").map(|m| m.id), Some(1));
        assert!(cat.by_title("toy story").is_none());
    }

    #[test]
    fn distinct_choices_are_sorted() {
        let cat = sample();
        assert_eq!(
            cat.genres(),
            vec![
                "Action",
                "Adventure",
                "Animation",
                "Children",
                "Comedy",
                "Drama",
                "Romance"
            ]
        );
        assert_eq!(cat.languages(), vec!["en", "fr"]);
    }

    #[test]
    fn stats_rank_by_count_then_name() {
        let stats = sample().stats();
        assert_eq!(stats.total, 5);
        assert_eq!(
            stats.by_language,
            vec![("en".to_string(), 3), ("fr".to_string(), 1)]
        );
        assert_eq!(
            stats.by_primary_genre,
            vec![
                ("Action".to_string(), 1),
                ("Adventure".to_string(), 1),
                ("Animation".to_string(), 1),
                ("Comedy".to_string(), 1),
            ]
        );
    }

    #[test]
    fn genre_helpers_skip_blanks() {
        let m = movie(1, "X", " Drama || Crime ", "en");
        assert_eq!(m.genre_list(), vec!["Drama", "Crime"]);
        assert_eq!(m.primary_genre(), Some("Drama"));
        assert_eq!(movie(2, "Y", "", "en").primary_genre(), None);
    }
}
