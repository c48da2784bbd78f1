use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "fpl_seasons";
const BODY_DIR: &str = "http";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMeta {
    version: u32,
    url: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

struct CachedBody {
    meta: CacheMeta,
    body: Vec<u8>,
}

/// On-disk body cache keyed by URL.
#[derive(Debug, Clone)]
pub struct HttpCache {
    dir: PathBuf,
    serve_stale: bool,
}

impl HttpCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            serve_stale: false,
        }
    }

    /// Cache under the user cache directory, if one can be determined.
    pub fn in_user_cache_dir() -> Option<Self> {
        app_cache_dir().map(|dir| Self::new(dir.join(BODY_DIR)))
    }

    /// When enabled, a transport failure returns the cached body instead of
    /// an error. Off by default so an outage is never mistaken for data.
    pub fn serve_stale_when_offline(mut self, enabled: bool) -> Self {
        self.serve_stale = enabled;
        self
    }

    /// Fetches `url`, revalidating against the on-disk copy when one exists.
    pub fn fetch(&self, client: &Client, url: &str) -> Result<Vec<u8>> {
        let cached = self.load_entry(url);

        let mut req = client.get(url);
        if let Some(entry) = cached.as_ref() {
            if let Some(etag) = entry.meta.etag.as_ref() {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = entry.meta.last_modified.as_ref() {
                req = req.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let resp = match req.send() {
            Ok(resp) => resp,
            Err(err) => {
                if self.serve_stale
                    && let Some(entry) = cached
                {
                    warn!(url, error = %err, "request failed, serving stale cached body");
                    return Ok(entry.body);
                }
                return Err(err).context("request failed");
            }
        };

        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                debug!(url, "not modified");
                return Ok(entry.body);
            }
            return Err(anyhow!("received 304 without cache body"));
        }
        if !status.is_success() {
            return Err(anyhow!("http {status}"));
        }

        let headers = resp.headers().clone();
        let body = resp.bytes().context("failed reading body")?.to_vec();

        let meta = CacheMeta {
            version: CACHE_VERSION,
            url: url.to_string(),
            etag: header_string(&headers, ETAG),
            last_modified: header_string(&headers, LAST_MODIFIED),
            fetched_at: system_time_to_secs(SystemTime::now()).unwrap_or_default(),
        };
        if let Err(err) = self.save_entry(&meta, &body) {
            debug!(url, error = %err, "http cache write skipped");
        }
        Ok(body)
    }

    fn load_entry(&self, url: &str) -> Option<CachedBody> {
        let (meta_path, body_path) = self.entry_paths(url);
        let raw = fs::read_to_string(meta_path).ok()?;
        let meta = serde_json::from_str::<CacheMeta>(&raw).ok()?;
        if meta.version != CACHE_VERSION || meta.url != url {
            return None;
        }
        let body = fs::read(body_path).ok()?;
        Some(CachedBody { meta, body })
    }

    fn save_entry(&self, meta: &CacheMeta, body: &[u8]) -> Result<()> {
        let (meta_path, body_path) = self.entry_paths(&meta.url);
        fs::create_dir_all(&self.dir).context("create http cache dir")?;

        let tmp_body = body_path.with_extension("body.tmp");
        fs::write(&tmp_body, body).context("write cached body")?;
        fs::rename(&tmp_body, &body_path).context("swap cached body")?;

        let json = serde_json::to_string(meta).context("serialize cache meta")?;
        let tmp_meta = meta_path.with_extension("json.tmp");
        fs::write(&tmp_meta, json).context("write cache meta")?;
        fs::rename(&tmp_meta, &meta_path).context("swap cache meta")?;
        Ok(())
    }

    fn entry_paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = url_key(url);
        (
            self.dir.join(format!("{key}.json")),
            self.dir.join(format!("{key}.body")),
        )
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn url_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{digest:x}")
}

fn header_string(
    headers: &reqwest::header::HeaderMap,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    fn seeded(dir: &std::path::Path, url: &str, body: &[u8]) -> HttpCache {
        let cache = HttpCache::new(dir);
        let meta = CacheMeta {
            version: CACHE_VERSION,
            url: url.to_string(),
            etag: None,
            last_modified: None,
            fetched_at: 0,
        };
        cache.save_entry(&meta, body).unwrap();
        cache
    }

    /// URL on a port nothing listens on.
    fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}/gw1.csv")
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).to_ascii_lowercase()
    }

    #[test]
    fn url_key_is_stable_hex() {
        let a = url_key("https://example.com/2019-20/gws/gw1.csv");
        let b = url_key("https://example.com/2019-20/gws/gw1.csv");
        let c = url_key("https://example.com/2019-20/gws/gw2.csv");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn transport_failure_is_an_error_unless_stale_bodies_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let url = dead_url();
        let cache = seeded(dir.path(), &url, b"id\n1\n");

        assert!(cache.fetch(&client(), &url).is_err());

        let cache = cache.serve_stale_when_offline(true);
        assert_eq!(cache.fetch(&client(), &url).unwrap(), b"id\n1\n");
    }

    #[test]
    fn etag_is_revalidated_and_not_modified_serves_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/gw1.csv", listener.local_addr().unwrap());

        let server = thread::spawn(move || {
            let (mut first, _) = listener.accept().unwrap();
            read_request(&mut first);
            first
                .write_all(
                    b"HTTP/1.1 200 OK\r\nETag: \"v1\"\r\nContent-Length: 5\r\nConnection: close\r\n\r\nid\n1\n",
                )
                .unwrap();
            drop(first);

            let (mut second, _) = listener.accept().unwrap();
            let request = read_request(&mut second);
            second
                .write_all(
                    b"HTTP/1.1 304 Not Modified\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                )
                .unwrap();
            request
        });

        let cache = HttpCache::new(dir.path());
        assert_eq!(cache.fetch(&client(), &url).unwrap(), b"id\n1\n");
        assert_eq!(cache.fetch(&client(), &url).unwrap(), b"id\n1\n");

        let revalidation = server.join().unwrap();
        assert!(revalidation.contains("if-none-match: \"v1\""));
    }
}
