// src/metadata.rs — TMDB poster / synopsis / trailer lookups, cached per movie
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheStats, MemoCache};
use crate::config::{AppConfig, TmdbAuth};
use crate::error::MetadataError;
use crate::notice::NoticeLog;

const YOUTUBE_WATCH: &str = "https://www.youtube.com/watch?v=";

/// Enrichment for one movie. Each part is independently absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataBundle {
    pub poster_url: Option<String>,
    pub synopsis: Option<String>,
    pub trailer_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Lookup {
    Poster,
    Synopsis,
    Trailer,
}

impl Lookup {
    const fn as_str(self) -> &'static str {
        match self {
            Lookup::Poster => "poster",
            Lookup::Synopsis => "synopsis",
            Lookup::Trailer => "trailer",
        }
    }
}

// ---- response shapes (only the fields we read) ----

#[derive(Debug, Default, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    posters: Vec<ImageEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageEntry {
    file_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailsResponse {
    overview: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    results: Vec<VideoEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoEntry {
    key: Option<String>,
    site: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn poster_url(images: &ImagesResponse, image_base: &str) -> Option<String> {
    let path = images.posters.first()?.file_path.as_deref()?.trim();
    if path.is_empty() {
        return None;
    }
    Some(format!("{}{}", image_base.trim_end_matches('/'), path))
}

fn synopsis(details: &DetailsResponse) -> Option<String> {
    details
        .overview
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// First YouTube video tagged as a trailer, in response order.
fn trailer_url(videos: &VideosResponse) -> Option<String> {
    videos
        .results
        .iter()
        .find(|v| v.kind.as_deref() == Some("Trailer") && v.site.as_deref() == Some("YouTube"))
        .and_then(|v| v.key.as_deref())
        .filter(|k| !k.is_empty())
        .map(|k| format!("{YOUTUBE_WATCH}{}", urlencoding::encode(k)))
}

pub struct MetadataClient {
    http: Option<Client>,
    api_key: Option<String>,
    auth: TmdbAuth,
    base_url: String,
    image_base: String,
    cache: MemoCache<(Lookup, i64), Option<String>>,
    notices: Arc<NoticeLog>,
    warned_missing_key: AtomicBool,
}

impl MetadataClient {
    pub fn new(cfg: &AppConfig, notices: Arc<NoticeLog>) -> Self {
        let http = match Client::builder()
            .user_agent("reelquest/metadata")
            .timeout(cfg.http_timeout)
            .build()
        {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("TMDB http client init failed: {e}");
                None
            }
        };
        Self {
            http,
            api_key: cfg
                .tmdb_api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_owned),
            auth: cfg.tmdb_auth,
            base_url: cfg.tmdb_base_url.trim_end_matches('/').to_string(),
            image_base: cfg.tmdb_image_base.clone(),
            cache: MemoCache::new("tmdb", cfg.cache_ttl),
            notices,
            warned_missing_key: AtomicBool::new(false),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn poster(&self, tmdb_id: i64) -> Option<String> {
        self.lookup(Lookup::Poster, tmdb_id)
    }

    pub fn synopsis(&self, tmdb_id: i64) -> Option<String> {
        self.lookup(Lookup::Synopsis, tmdb_id)
    }

    pub fn trailer(&self, tmdb_id: i64) -> Option<String> {
        self.lookup(Lookup::Trailer, tmdb_id)
    }

    /// All three lookups, issued concurrently.
    pub fn bundle(&self, tmdb_id: i64) -> MetadataBundle {
        std::thread::scope(|s| {
            let poster = s.spawn(|| self.poster(tmdb_id));
            let synopsis = s.spawn(|| self.synopsis(tmdb_id));
            let trailer_url = self.trailer(tmdb_id);
            MetadataBundle {
                poster_url: poster.join().unwrap_or(None),
                synopsis: synopsis.join().unwrap_or(None),
                trailer_url,
            }
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn lookup(&self, kind: Lookup, tmdb_id: i64) -> Option<String> {
        if self.api_key.is_none() {
            if !self.warned_missing_key.swap(true, Ordering::Relaxed) {
                warn!("{}", MetadataError::MissingApiKey);
                self.notices
                    .warn("No TMDB API key configured; posters, synopses and trailers are unavailable.");
            }
            return None;
        }

        match self
            .cache
            .get_or_try_insert_with((kind, tmdb_id), || self.fetch(kind, tmdb_id))
        {
            Ok(v) => v,
            Err(err) => {
                warn!(tmdb_id, "TMDB {} lookup failed: {err}", kind.as_str());
                self.notices
                    .warn(format!("Could not fetch {} from TMDB: {err}", kind.as_str()));
                None
            }
        }
    }

    fn fetch(&self, kind: Lookup, tmdb_id: i64) -> Result<Option<String>, MetadataError> {
        let out = match kind {
            Lookup::Poster => {
                let images: ImagesResponse = self.get_json(&format!("/movie/{tmdb_id}/images"))?;
                poster_url(&images, &self.image_base)
            }
            Lookup::Synopsis => {
                let details: DetailsResponse = self.get_json(&format!("/movie/{tmdb_id}"))?;
                synopsis(&details)
            }
            Lookup::Trailer => {
                let videos: VideosResponse = self.get_json(&format!("/movie/{tmdb_id}/videos"))?;
                trailer_url(&videos)
            }
        };
        debug!(tmdb_id, found = out.is_some(), "TMDB {}", kind.as_str());
        Ok(out)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetadataError> {
        let key = self.api_key.as_deref().ok_or(MetadataError::MissingApiKey)?;
        let http = self.http.as_ref().ok_or(MetadataError::ClientUnavailable)?;

        let req = http.get(format!("{}{}", self.base_url, path));
        let req = match self.auth {
            TmdbAuth::QueryParam => req.query(&[("api_key", key)]),
            TmdbAuth::Bearer => req.bearer_auth(key),
        };

        // the request URL may carry the key
        let resp = req.send().map_err(reqwest::Error::without_url)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MetadataError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        let body = resp.text().map_err(reqwest::Error::without_url)?;
        serde_json::from_str(&body).map_err(|source| MetadataError::Json {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(key: Option<&str>, base: &str) -> (MetadataClient, Arc<NoticeLog>) {
        let cfg = AppConfig {
            tmdb_api_key: key.map(str::to_owned),
            tmdb_base_url: base.to_string(),
            http_timeout: Duration::from_secs(2),
            ..AppConfig::default()
        };
        let notices = Arc::new(NoticeLog::new());
        (MetadataClient::new(&cfg, Arc::clone(&notices)), notices)
    }

    #[test]
    fn poster_uses_first_entry() {
        let images: ImagesResponse = serde_json::from_str(
            r#"{"id": 862, "posters": [
                {"file_path": "/uXDfjJbdP4ijW5hWSBrPrlKpxab.jpg", "vote_average": 5.3},
                {"file_path": "/second.jpg"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            poster_url(&images, "https://image.tmdb.org/t/p/w500").as_deref(),
            Some("https://image.tmdb.org/t/p/w500/uXDfjJbdP4ijW5hWSBrPrlKpxab.jpg")
        );

        let none: ImagesResponse = serde_json::from_str(r#"{"posters": []}"#).unwrap();
        assert_eq!(poster_url(&none, "x"), None);
        let missing: ImagesResponse = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(poster_url(&missing, "x"), None);
    }

    #[test]
    fn empty_overview_is_absent() {
        let d: DetailsResponse =
            serde_json::from_str(r#"{"title": "Toy Story", "overview": "Led by Woody..."}"#).unwrap();
        assert_eq!(synopsis(&d).as_deref(), Some("Led by Woody..."));

        let blank: DetailsResponse = serde_json::from_str(r#"{"overview": ""}"#).unwrap();
        assert_eq!(synopsis(&blank), None);
        let null: DetailsResponse = serde_json::from_str(r#"{"overview": null}"#).unwrap();
        assert_eq!(synopsis(&null), None);
    }

    #[test]
    fn trailer_needs_youtube_and_trailer_type() {
        let v: VideosResponse = serde_json::from_str(
            r#"{"results": [
                {"key": "teaser1", "site": "YouTube", "type": "Teaser"},
                {"key": "vimeo1", "site": "Vimeo", "type": "Trailer"},
                {"key": "v-ZVxo2o_0A", "site": "YouTube", "type": "Trailer"},
                {"key": "later", "site": "YouTube", "type": "Trailer"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            trailer_url(&v).as_deref(),
            Some("https://www.youtube.com/watch?v=v-ZVxo2o_0A")
        );

        let only_teasers: VideosResponse = serde_json::from_str(
            r#"{"results": [{"key": "t", "site": "YouTube", "type": "Teaser"}]}"#,
        )
        .unwrap();
        assert_eq!(trailer_url(&only_teasers), None);
    }

    #[test]
    fn missing_key_warns_once_and_returns_absent() {
        let (c, notices) = client(None, "http://127.0.0.1:9");
        assert!(!c.has_api_key());
        assert_eq!(c.poster(862), None);
        assert_eq!(c.bundle(862), MetadataBundle::default());
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn unreachable_service_gives_absent_and_is_not_cached() {
        let (c, notices) = client(Some("k"), "http://127.0.0.1:9");
        let bundle = c.bundle(862);
        assert_eq!(bundle, MetadataBundle::default());
        assert_eq!(c.cache_stats().entries, 0);
        assert_eq!(notices.len(), 3);
    }
}
