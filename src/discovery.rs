// src/discovery.rs — service facade used by the UI; every failure becomes a notice plus a safe default
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cache::{CacheStats, MemoCache};
use crate::catalogue::{Catalogue, CatalogueLoader, CatalogueStats, Movie};
use crate::config::AppConfig;
use crate::error::WarehouseResult;
use crate::metadata::{MetadataBundle, MetadataClient};
use crate::notice::NoticeLog;
use crate::query::{build_search, FilterSet, SearchResult};
use crate::warehouse::{open_warehouse, Warehouse};

/// A selected search result, resolved back to its catalogue row and enriched.
#[derive(Clone, Debug, PartialEq)]
pub struct MovieDetail {
    pub movie: Movie,
    pub average_rating: f64,
    pub metadata: MetadataBundle,
}

/// Values offered by the genre and language pickers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterChoices {
    pub genres: Vec<String>,
    pub languages: Vec<String>,
}

pub struct Discovery {
    warehouse: Box<dyn Warehouse>,
    catalogue: CatalogueLoader,
    searches: MemoCache<String, Arc<Vec<SearchResult>>>,
    metadata: MetadataClient,
    notices: Arc<NoticeLog>,
}

impl Discovery {
    pub fn new(warehouse: Box<dyn Warehouse>, cfg: &AppConfig) -> Self {
        let notices = Arc::new(NoticeLog::new());
        Self {
            warehouse,
            catalogue: CatalogueLoader::new(cfg.cache_ttl),
            searches: MemoCache::new("search", cfg.cache_ttl),
            metadata: MetadataClient::new(cfg, Arc::clone(&notices)),
            notices,
        }
    }

    /// Open the configured warehouse. Nothing is queried yet.
    pub fn from_config(cfg: &AppConfig) -> WarehouseResult<Self> {
        let warehouse = open_warehouse(cfg)?;
        info!("warehouse ready: {:?}", warehouse.target().dialect);
        Ok(Self::new(warehouse, cfg))
    }

    pub fn notices(&self) -> &Arc<NoticeLog> {
        &self.notices
    }

    pub fn metadata(&self) -> &MetadataClient {
        &self.metadata
    }

    /// Matching titles with their mean rating, ordered by title. Failures are
    /// recorded and yield an empty list; they are not cached.
    pub fn search(&self, filters: &FilterSet) -> Arc<Vec<SearchResult>> {
        let key = filters.cache_key();
        let res = self.searches.get_or_try_insert_with(key, || {
            let stmt = build_search(filters, self.warehouse.target());
            self.warehouse.fetch_search(&stmt).map(Arc::new)
        });
        match res {
            Ok(rows) => rows,
            Err(err) => {
                error!("search failed: {err}");
                self.notices.error(format!("Search failed: {err}"));
                Arc::new(Vec::new())
            }
        }
    }

    /// The loaded catalogue, loading it on first use.
    pub fn catalogue(&self) -> Option<Arc<Catalogue>> {
        match self.catalogue.get(self.warehouse.as_ref()) {
            Ok(cat) => Some(cat),
            Err(err) => {
                error!("catalogue load failed: {err}");
                self.notices
                    .error(format!("Could not load the movie catalogue: {err}"));
                None
            }
        }
    }

    /// Catalogue if already loaded; never queries.
    pub fn loaded_catalogue(&self) -> Option<Arc<Catalogue>> {
        self.catalogue.loaded()
    }

    pub fn filter_choices(&self) -> FilterChoices {
        self.catalogue()
            .map(|cat| FilterChoices {
                genres: cat.genres(),
                languages: cat.languages(),
            })
            .unwrap_or_default()
    }

    pub fn stats(&self) -> Option<CatalogueStats> {
        self.catalogue().map(|cat| cat.stats())
    }

    /// Resolve a result row and fetch its poster, synopsis and trailer.
    /// `None` when the catalogue is unavailable or the title is unknown.
    pub fn details(&self, title: &str, average_rating: f64) -> Option<MovieDetail> {
        let cat = self.catalogue()?;
        let Some(movie) = cat.by_title(title).cloned() else {
            warn!("selected title not in catalogue: {title}");
            return None;
        };
        let metadata = match movie.tmdb_id {
            Some(id) => self.metadata.bundle(id),
            None => MetadataBundle::default(),
        };
        Some(MovieDetail {
            movie,
            average_rating,
            metadata,
        })
    }

    /// Drop the catalogue and every cached search so the next call re-queries.
    pub fn refresh(&self) {
        self.catalogue.invalidate();
        self.searches.clear();
        info!("catalogue and search caches cleared");
    }

    pub fn search_cache_stats(&self) -> CacheStats {
        self.searches.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarehouseError;
    use crate::query::{SqlTarget, Statement};
    use crate::warehouse::sqlite::tests::seeded;
    use crate::warehouse::SqliteWarehouse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};

    struct Unreachable {
        target: SqlTarget,
    }

    impl Warehouse for Unreachable {
        fn target(&self) -> &SqlTarget {
            &self.target
        }
        fn fetch_movies(&self, _: &Statement) -> WarehouseResult<Vec<Movie>> {
            Err(WarehouseError::Connect("connection refused".into()))
        }
        fn fetch_search(&self, _: &Statement) -> WarehouseResult<Vec<SearchResult>> {
            Err(WarehouseError::Connect("connection refused".into()))
        }
    }

    /// Counts search round-trips to the wrapped warehouse.
    struct Counting {
        inner: Box<dyn Warehouse>,
        searches: Arc<AtomicUsize>,
    }

    impl Warehouse for Counting {
        fn target(&self) -> &SqlTarget {
            self.inner.target()
        }
        fn fetch_movies(&self, stmt: &Statement) -> WarehouseResult<Vec<Movie>> {
            self.inner.fetch_movies(stmt)
        }
        fn fetch_search(&self, stmt: &Statement) -> WarehouseResult<Vec<SearchResult>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_search(stmt)
        }
    }

    fn cfg() -> AppConfig {
        AppConfig {
            tmdb_api_key: None,
            ..AppConfig::default()
        }
    }

    fn service() -> (Discovery, Arc<AtomicUsize>) {
        let searches = Arc::new(AtomicUsize::new(0));
        let wh = Counting {
            inner: Box::new(seeded()),
            searches: Arc::clone(&searches),
        };
        (Discovery::new(Box::new(wh), &cfg()), searches)
    }

    #[test]
    fn connectivity_failure_gives_empty_results_and_a_notice() {
        let d = Discovery::new(
            Box::new(Unreachable {
                target: SqlTarget::sqlite(),
            }),
            &cfg(),
        );
        assert!(d.search(&FilterSet::title("toy")).is_empty());
        assert!(d.catalogue().is_none());
        assert!(d.details("Toy Story", 4.5).is_none());
        assert_eq!(d.filter_choices(), FilterChoices::default());

        let notices = d.notices().drain();
        assert!(notices.len() >= 2);
        assert!(notices
            .iter()
            .all(|n| n.level == crate::notice::NoticeLevel::Error));
        assert!(notices[0].message.contains("connection refused"));
    }

    #[test]
    fn toy_scenarios() {
        let (d, _) = service();
        let rows = d.search(&FilterSet::title("toy"));
        let toys: Vec<(&str, f64)> = rows
            .iter()
            .filter(|r| r.title.starts_with("Toy "))
            .map(|r| (r.title.as_str(), r.average_rating))
            .collect();
        assert_eq!(toys, vec![("Toy Soldiers", 2.0), ("Toy Story", 4.5)]);

        let rated = d.search(&FilterSet::title("toy").with_min_rating(3.0));
        assert_eq!(rated.len(), 1);
        assert_eq!(rated[0].title, "Toy Story");
        assert_eq!(rated[0].average_rating, 4.5);
        assert!(d.notices().is_empty());
    }

    #[test]
    fn identical_filters_hit_the_cache() {
        let (d, calls) = service();
        let a = d.search(&FilterSet::title("Toy"));
        let b = d.search(&FilterSet::title("toy"));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        d.search(&FilterSet::title("toy").with_genre("Drama"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        d.refresh();
        d.search(&FilterSet::title("toy"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(d.search_cache_stats().hits, 1);
    }

    #[test]
    fn details_resolve_title_and_degrade_without_key() {
        let (d, _) = service();
        let detail = d.details("Toy Story", 4.5).unwrap();
        assert_eq!(detail.movie.id, 1);
        assert_eq!(detail.movie.tmdb_id, Some(1001));
        assert_eq!(detail.average_rating, 4.5);
        assert_eq!(detail.metadata, MetadataBundle::default());

        assert!(d.details("No Such Film", 1.0).is_none());
        // one warning about the missing key, nothing else
        assert_eq!(d.notices().len(), 1);
    }

    #[test]
    fn choices_and_stats_come_from_catalogue() {
        let (d, _) = service();
        assert!(d.loaded_catalogue().is_none());
        let choices = d.filter_choices();
        assert!(choices.genres.contains(&"Animation".to_string()));
        assert_eq!(choices.languages, vec!["en", "fr"]);
        assert!(d.loaded_catalogue().is_some());

        let stats = d.stats().unwrap();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.by_language[0], ("en".to_string(), 5));
    }

    /// Holds the first catalogue load open until released.
    struct Gated {
        inner: SqliteWarehouse,
        loads: Arc<AtomicUsize>,
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Warehouse for Gated {
        fn target(&self) -> &SqlTarget {
            self.inner.target()
        }
        fn fetch_movies(&self, stmt: &Statement) -> WarehouseResult<Vec<Movie>> {
            if self.loads.fetch_add(1, Ordering::SeqCst) == 0 {
                let _ = self.started.lock().unwrap().send(());
                let _ = self.release.lock().unwrap().recv();
            }
            self.inner.fetch_movies(stmt)
        }
        fn fetch_search(&self, stmt: &Statement) -> WarehouseResult<Vec<SearchResult>> {
            self.inner.fetch_search(stmt)
        }
    }

    #[test]
    fn refresh_during_catalogue_load_runs_one_load() {
        let loads = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let d = Discovery::new(
            Box::new(Gated {
                inner: seeded(),
                loads: Arc::clone(&loads),
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            }),
            &cfg(),
        );

        std::thread::scope(|s| {
            let first = s.spawn(|| d.catalogue());
            started_rx.recv().unwrap();
            d.refresh();
            let second = s.spawn(|| d.catalogue());
            release_tx.send(()).unwrap();

            let a = first.join().unwrap().unwrap();
            let b = second.join().unwrap().unwrap();
            assert!(Arc::ptr_eq(&a, &b));
        });
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        // a refresh after the load finished does reload
        d.refresh();
        assert!(d.catalogue().is_some());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
