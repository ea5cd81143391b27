// src/warehouse/bigquery.rs — BigQuery REST (`jobs.query`) with named parameters
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::Warehouse;
use crate::catalogue::Movie;
use crate::error::{WarehouseError, WarehouseResult};
use crate::query::{Param, SearchResult, SqlTarget, Statement};

/// Upper bound for one statement, including completion polls and paging.
const QUERY_DEADLINE: Duration = Duration::from_secs(120);
const POLL_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<QueryParameter<'a>>,
    timeout_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameter<'a> {
    name: &'a str,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(Debug, Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValue {
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Default, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

fn encode_param<'a>(name: &'a str, value: &Param) -> QueryParameter<'a> {
    let (kind, value) = match value {
        Param::Text(s) => ("STRING", s.clone()),
        Param::Int(i) => ("INT64", i.to_string()),
        Param::Float(f) => ("FLOAT64", f.to_string()),
    };
    QueryParameter {
        name,
        parameter_type: ParameterType { kind },
        parameter_value: ParameterValue { value },
    }
}

fn encode_request(stmt: &Statement) -> QueryRequest<'_> {
    QueryRequest {
        query: &stmt.sql,
        use_legacy_sql: false,
        parameter_mode: "NAMED",
        query_parameters: stmt
            .params
            .iter()
            .map(|(name, value)| encode_param(name, value))
            .collect(),
        timeout_ms: POLL_TIMEOUT_MS,
    }
}

/// BigQuery error bodies look like `{"error": {"message": ...}}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(300).collect())
}

fn cell<'a>(row: &'a TableRow, idx: usize) -> Option<&'a str> {
    row.f.get(idx).and_then(|c| c.v.as_str())
}

fn cell_i64(row: &TableRow, idx: usize, column: &str) -> WarehouseResult<Option<i64>> {
    match cell(row, idx) {
        None => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|e| WarehouseError::Decode(format!("{column} `{s}`: {e}"))),
    }
}

fn decode_movie(row: &TableRow) -> WarehouseResult<Movie> {
    let id = cell_i64(row, 0, "movieId")?
        .ok_or_else(|| WarehouseError::Decode("movieId is null".into()))?;
    let release_year = cell_i64(row, 4, "release_year")?
        .map(|y| i32::try_from(y).map_err(|e| WarehouseError::Decode(format!("release_year {y}: {e}"))))
        .transpose()?;
    Ok(Movie {
        id,
        title: cell(row, 1).unwrap_or_default().to_owned(),
        genres: cell(row, 2).unwrap_or_default().to_owned(),
        language: cell(row, 3).unwrap_or_default().to_owned(),
        release_year,
        tmdb_id: cell_i64(row, 5, "tmdbId")?,
    })
}

fn decode_search(row: &TableRow) -> WarehouseResult<SearchResult> {
    let title = cell(row, 0)
        .ok_or_else(|| WarehouseError::Decode("title is null".into()))?
        .to_owned();
    let raw = cell(row, 1)
        .ok_or_else(|| WarehouseError::Decode(format!("average_rating is null for {title}")))?;
    let average_rating = raw
        .parse::<f64>()
        .map_err(|e| WarehouseError::Decode(format!("average_rating `{raw}`: {e}")))?;
    Ok(SearchResult {
        title,
        average_rating,
    })
}

pub struct BigQueryWarehouse {
    client: Client,
    base_url: String,
    project: String,
    token: String,
    target: SqlTarget,
}

impl BigQueryWarehouse {
    pub fn new(
        base_url: &str,
        project: &str,
        dataset: &str,
        token: String,
        timeout: Duration,
    ) -> WarehouseResult<Self> {
        let target = SqlTarget::bigquery(project, dataset)?;
        let client = Client::builder()
            .user_agent("reelquest/bigquery")
            .timeout(timeout.max(Duration::from_millis(POLL_TIMEOUT_MS + 5_000)))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            token,
            target,
        })
    }

    fn queries_url(&self) -> String {
        format!(
            "{}/projects/{}/queries",
            self.base_url,
            urlencoding::encode(&self.project)
        )
    }

    fn read(&self, resp: Response) -> WarehouseResult<QueryResponse> {
        let status = resp.status();
        let body = resp.text()?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(WarehouseError::Auth(error_message(&body)));
        }
        if !status.is_success() {
            return Err(WarehouseError::Query(format!(
                "HTTP {status}: {}",
                error_message(&body)
            )));
        }
        serde_json::from_str(&body).map_err(|e| WarehouseError::Decode(e.to_string()))
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> WarehouseResult<QueryResponse> {
        let resp = req.bearer_auth(&self.token).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                WarehouseError::Connect(e.to_string())
            } else {
                WarehouseError::Http(e)
            }
        })?;
        self.read(resp)
    }

    /// Run one statement to completion and return every row.
    fn run(&self, stmt: &Statement) -> WarehouseResult<Vec<TableRow>> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "bigquery query");
        let started = Instant::now();
        let first = self.send(self.client.post(self.queries_url()).json(&encode_request(stmt)))?;

        let mut rows = Vec::new();
        let mut complete = first.job_complete;
        let mut page_token = first.page_token;
        let job = first.job_reference;
        if complete {
            rows.extend(first.rows);
        }

        while !complete || page_token.is_some() {
            if started.elapsed() >= QUERY_DEADLINE {
                return Err(WarehouseError::Query(format!(
                    "query did not finish within {}s",
                    QUERY_DEADLINE.as_secs()
                )));
            }
            let job = job
                .as_ref()
                .ok_or_else(|| WarehouseError::Decode("incomplete job without jobReference".into()))?;

            let mut query: Vec<(&str, String)> = vec![("timeoutMs", POLL_TIMEOUT_MS.to_string())];
            if let Some(loc) = &job.location {
                query.push(("location", loc.clone()));
            }
            if let Some(tok) = page_token.take() {
                query.push(("pageToken", tok));
            }
            let url = format!("{}/{}", self.queries_url(), urlencoding::encode(&job.job_id));
            let page = self.send(self.client.get(url).query(&query))?;

            if page.job_complete {
                if !complete {
                    debug!("bigquery job {} complete after {:?}", job.job_id, started.elapsed());
                }
                complete = true;
                rows.extend(page.rows);
                page_token = page.page_token;
            }
        }

        Ok(rows)
    }
}

impl Warehouse for BigQueryWarehouse {
    fn target(&self) -> &SqlTarget {
        &self.target
    }

    fn fetch_movies(&self, stmt: &Statement) -> WarehouseResult<Vec<Movie>> {
        let rows = self.run(stmt)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_movie(row) {
                Ok(m) => out.push(m),
                Err(err) => warn!("skipping catalogue row: {err}"),
            }
        }
        Ok(out)
    }

    fn fetch_search(&self, stmt: &Statement) -> WarehouseResult<Vec<SearchResult>> {
        self.run(stmt)?.iter().map(decode_search).collect()
    }
}
