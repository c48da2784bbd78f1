//! Tabular resource retrieval and column projection.
//!
//! Resources are CSV files addressed by URL or filesystem path. The loader
//! decodes the body, parses it and keeps only the projected columns, in the
//! order they appear in the source header.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::{DatasetError, DatasetResult};
use crate::http_cache::HttpCache;
use crate::http_client::http_client;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Url(String),
    Path(PathBuf),
}

impl Resource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Resource::Url(trimmed.to_string())
        } else {
            Resource::Path(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Url(url) => f.write_str(url),
            Resource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Column subset requested from a resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Builds a projection from inclusion/exclusion lists. At most one list
    /// may be non-empty; both empty selects every column.
    pub fn new(include: &[&str], exclude: &[&str]) -> DatasetResult<Self> {
        match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Ok(Projection::All),
            (false, true) => Ok(Projection::include(include)),
            (true, false) => Ok(Projection::exclude(exclude)),
            (false, false) => Err(DatasetError::InvalidProjection),
        }
    }

    pub fn include(columns: &[&str]) -> Self {
        Projection::Include(columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn exclude(columns: &[&str]) -> Self {
        Projection::Exclude(columns.iter().map(|c| c.to_string()).collect())
    }

    fn kept_indices(&self, resource: &str, headers: &[String]) -> DatasetResult<Vec<usize>> {
        match self {
            Projection::All => Ok((0..headers.len()).collect()),
            Projection::Include(columns) => {
                for column in columns {
                    if !headers.iter().any(|h| h == column) {
                        return Err(DatasetError::missing_column(resource, column.as_str()));
                    }
                }
                let wanted: HashSet<&str> = columns.iter().map(String::as_str).collect();
                Ok(headers
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| wanted.contains(h.as_str()))
                    .map(|(idx, _)| idx)
                    .collect())
            }
            Projection::Exclude(columns) => {
                let dropped: HashSet<&str> = columns.iter().map(String::as_str).collect();
                Ok(headers
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| !dropped.contains(h.as_str()))
                    .map(|(idx, _)| idx)
                    .collect())
            }
        }
    }
}

/// A loaded, projected table of string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    resource: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> DatasetResult<usize> {
        self.column_index(name)
            .ok_or_else(|| DatasetError::missing_column(self.resource.as_str(), name))
    }

    /// Parses a CSV body into a table restricted to `projection`.
    pub fn parse(resource: &str, text: &str, projection: &Projection) -> DatasetResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let all_headers = reader
            .headers()
            .map_err(|err| malformed(resource, err))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();
        let kept = projection.kept_indices(resource, &all_headers)?;
        let headers = kept.iter().map(|idx| all_headers[*idx].clone()).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| malformed(resource, err))?;
            let row = kept
                .iter()
                .map(|idx| record.get(*idx).unwrap_or_default().trim().to_string())
                .collect();
            rows.push(row);
        }

        Ok(Self {
            resource: resource.to_string(),
            headers,
            rows,
        })
    }
}

fn malformed(resource: &str, err: csv::Error) -> DatasetError {
    DatasetError::MalformedTable {
        resource: resource.to_string(),
        reason: err.to_string(),
    }
}

/// Decodes a body as UTF-8, falling back to Latin-1 when the bytes are not
/// valid UTF-8. A leading byte-order mark is dropped.
pub fn decode_body(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|b| char::from(*b)).collect(),
    }
}

/// Raw byte retrieval behind the loader.
pub trait Fetch: Send + Sync {
    fn fetch(&self, resource: &Resource) -> DatasetResult<Vec<u8>>;
}

/// Fetches URLs over HTTP (optionally through the body cache) and paths from
/// the local filesystem.
#[derive(Debug, Clone)]
pub struct RemoteFetch {
    timeout: Duration,
    cache: Option<HttpCache>,
}

impl RemoteFetch {
    pub fn new(timeout: Duration, use_cache: bool) -> Self {
        let cache = if use_cache {
            HttpCache::in_user_cache_dir()
        } else {
            None
        };
        Self { timeout, cache }
    }

    /// Serve cached bodies when the network is unreachable.
    pub fn with_offline_fallback(mut self, enabled: bool) -> Self {
        self.cache = self
            .cache
            .map(|cache| cache.serve_stale_when_offline(enabled));
        self
    }
}

impl Fetch for RemoteFetch {
    fn fetch(&self, resource: &Resource) -> DatasetResult<Vec<u8>> {
        match resource {
            Resource::Url(url) => {
                let client = http_client(self.timeout)
                    .map_err(|err| DatasetError::unavailable(url.as_str(), format!("{err:#}")))?;
                if let Some(cache) = self.cache.as_ref() {
                    return cache
                        .fetch(client, url)
                        .map_err(|err| DatasetError::unavailable(url.as_str(), format!("{err:#}")));
                }
                let resp = client
                    .get(url)
                    .send()
                    .map_err(|err| DatasetError::unavailable(url.as_str(), err))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(DatasetError::unavailable(url.as_str(), format!("http {status}")));
                }
                resp.bytes()
                    .map(|b| b.to_vec())
                    .map_err(|err| DatasetError::unavailable(url.as_str(), err))
            }
            Resource::Path(path) => std::fs::read(path)
                .map_err(|err| DatasetError::unavailable(path.display().to_string(), err)),
        }
    }
}

/// In-memory bodies keyed by the resource's display form.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetch {
    bodies: HashMap<String, Vec<u8>>,
}

impl MemoryFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies.insert(resource.into(), body.into());
    }

    pub fn with(mut self, resource: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.insert(resource, body);
        self
    }
}

impl Fetch for MemoryFetch {
    fn fetch(&self, resource: &Resource) -> DatasetResult<Vec<u8>> {
        let key = resource.to_string();
        self.bodies
            .get(&key)
            .cloned()
            .ok_or_else(|| DatasetError::unavailable(key, "not found"))
    }
}

pub struct SourceLoader {
    fetch: Box<dyn Fetch>,
}

impl SourceLoader {
    pub fn new(fetch: impl Fetch + 'static) -> Self {
        Self {
            fetch: Box::new(fetch),
        }
    }

    pub fn load(&self, resource: &Resource, projection: &Projection) -> DatasetResult<Table> {
        let label = resource.to_string();
        let bytes = self.fetch.fetch(resource)?;
        let text = decode_body(&bytes);
        if text.trim().is_empty() {
            return Err(DatasetError::unavailable(label, "empty body"));
        }
        let table = Table::parse(&label, &text, projection)?;
        debug!(resource = %label, rows = table.len(), "loaded table");
        Ok(table)
    }
}
