use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::endpoint::{Endpoint, endpoint_url};
use crate::error::PortalError;
use crate::fetcher::{DataFetcher, PortalClient};
use crate::store::{JsonLayout, read_json, write_json_atomic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDataset {
    pub cached_at: Option<DateTime<Utc>>,
    pub data: Dataset,
}

impl CachedDataset {
    pub fn fresh(data: Dataset) -> Self {
        Self {
            cached_at: Some(Utc::now()),
            data,
        }
    }

    pub fn uncached(data: Dataset) -> Self {
        Self {
            cached_at: None,
            data,
        }
    }
}

/// Responses keyed by their fully-qualified request URL.
pub trait ResponseCache {
    fn get(&self, url: &str) -> Option<CachedDataset>;
    fn put(&mut self, url: &str, dataset: CachedDataset) -> Result<(), PortalError>;
    fn clear(&mut self) -> Result<(), PortalError>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    entries: BTreeMap<String, CachedDataset>,
}

/// JSON-file cache loaded once on open and written through on every change.
#[derive(Debug)]
pub struct FileResponseCache {
    path: Utf8PathBuf,
    entries: BTreeMap<String, CachedDataset>,
}

impl FileResponseCache {
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, PortalError> {
        let path = path.into();
        let document: CacheDocument = read_json(&path, |message| PortalError::CacheParse {
            path: path.clone().into_std_path_buf(),
            message,
        })?
        .unwrap_or_default();
        tracing::debug!("opened response cache {path} ({} entries)", document.entries.len());
        Ok(Self {
            path,
            entries: document.entries,
        })
    }

    fn persist(&self, entries: &BTreeMap<String, CachedDataset>) -> Result<(), PortalError> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            entries: &'a BTreeMap<String, CachedDataset>,
        }
        write_json_atomic(&self.path, &Borrowed { entries }, JsonLayout::Compact)
    }
}

impl ResponseCache for FileResponseCache {
    fn get(&self, url: &str) -> Option<CachedDataset> {
        self.entries.get(url).cloned()
    }

    /// The entry is inserted in place and taken back out if the write fails.
    fn put(&mut self, url: &str, dataset: CachedDataset) -> Result<(), PortalError> {
        let previous = self.entries.insert(url.to_string(), dataset);
        if let Err(err) = self.persist(&self.entries) {
            match previous {
                Some(previous) => {
                    self.entries.insert(url.to_string(), previous);
                }
                None => {
                    self.entries.remove(url);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PortalError> {
        self.persist(&BTreeMap::new())?;
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
pub struct MemoryResponseCache {
    entries: BTreeMap<String, CachedDataset>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseCache for MemoryResponseCache {
    fn get(&self, url: &str) -> Option<CachedDataset> {
        self.entries.get(url).cloned()
    }

    fn put(&mut self, url: &str, dataset: CachedDataset) -> Result<(), PortalError> {
        self.entries.insert(url.to_string(), dataset);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PortalError> {
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Fetch-through-cache access to the portal API.
pub struct DataService<C, R> {
    api_url_prefix: String,
    fetcher: DataFetcher<C>,
    cache: R,
}

impl<C: PortalClient, R: ResponseCache> DataService<C, R> {
    pub fn new(api_url_prefix: impl Into<String>, client: C, cache: R) -> Self {
        Self {
            api_url_prefix: api_url_prefix.into(),
            fetcher: DataFetcher::new(client),
            cache,
        }
    }

    pub fn url(&self, endpoint: &Endpoint) -> String {
        endpoint.url(&self.api_url_prefix)
    }

    pub fn cache(&self) -> &R {
        &self.cache
    }

    pub fn get(&mut self, endpoint: &Endpoint, use_cache: bool) -> Result<CachedDataset, PortalError> {
        let url = self.url(endpoint);
        self.get_url(&url, use_cache)
    }

    /// Same as [`DataService::get`] for a relative endpoint string.
    pub fn get_path(&mut self, path: &str, use_cache: bool) -> Result<CachedDataset, PortalError> {
        let url = endpoint_url(&self.api_url_prefix, path);
        self.get_url(&url, use_cache)
    }

    fn get_url(&mut self, url: &str, use_cache: bool) -> Result<CachedDataset, PortalError> {
        tracing::debug!("will fetch data from {url}");
        if use_cache {
            if let Some(cached) = self.cache.get(url) {
                tracing::debug!("using cached dataset for {url}");
                return Ok(cached);
            }
        }

        let data = self.fetcher.fetch(url)?;
        if !use_cache {
            return Ok(CachedDataset::uncached(data));
        }
        let entry = CachedDataset::fresh(data);
        self.cache.put(url, entry.clone())?;
        Ok(entry)
    }

    pub fn clear(&mut self) -> Result<(), PortalError> {
        tracing::info!("clearing response cache ({} entries)", self.cache.len());
        self.cache.clear()
    }
}
