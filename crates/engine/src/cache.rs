use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

/// Resolved facets stay fresh for 30 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl: Duration,
    pub backend: CacheBackend,
    pub capacity: usize,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    File,
    Memory,
}

impl CacheConfig {
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn with_defaults() -> Self {
        Self {
            dir: PathBuf::from(".facets/cache"),
            ttl: DEFAULT_TTL,
            backend: CacheBackend::Memory,
            capacity: 512,
        }
    }

    pub fn open(&self) -> Arc<dyn FacetCache> {
        match self.backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new(self.capacity)),
            CacheBackend::File => Arc::new(FileCache::new(&self.dir)),
        }
    }
}

/// Key/group store with per-entry TTL. Misses, expired entries and unreadable entries
/// all read as `None`.
#[async_trait]
pub trait FacetCache: Send + Sync {
    async fn get(&self, key: &str, group: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, group: &str, ttl: Duration) -> Result<()>;
}

#[derive(Serialize, Deserialize, Debug)]
struct CacheEnvelope<T> {
    created_ms: u64,
    ttl_ms: u64,
    group: String,
    data: T,
}

impl<T> CacheEnvelope<T> {
    fn is_expired(&self) -> bool {
        unix_ms_now().saturating_sub(self.created_ms) > self.ttl_ms
    }
}

/// Bounded in-process cache with LRU eviction.
pub struct MemoryCache {
    inner: Mutex<MemCache>,
    capacity: usize,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemCache::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FacetCache for MemoryCache {
    async fn get(&self, key: &str, group: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot(key, group))
    }

    async fn set(&self, key: &str, value: Value, group: &str, ttl: Duration) -> Result<()> {
        let envelope = CacheEnvelope {
            created_ms: unix_ms_now(),
            ttl_ms: duration_ms(ttl),
            group: group.to_string(),
            data: value,
        };
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(&slot(key, group), envelope, self.capacity);
        Ok(())
    }
}

/// One JSON file per entry under `<dir>/<group hash>/<key>.json`.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn entry_path(&self, key: &str, group: &str) -> PathBuf {
        let group_dir = blake3::hash(group.as_bytes()).to_hex();
        self.dir
            .join(&group_dir.as_str()[..16])
            .join(format!("{}.json", safe_component(key)))
    }
}

#[async_trait]
impl FacetCache for FileCache {
    async fn get(&self, key: &str, group: &str) -> Option<Value> {
        let path = self.entry_path(key, group);
        let bytes = fs::read(&path).await.ok()?;
        let envelope: CacheEnvelope<Value> = match serde_json::from_slice(&bytes) {
            Ok(val) => val,
            Err(err) => {
                log::warn!("Facet cache entry corrupted {}: {err}", path.display());
                return None;
            }
        };
        if envelope.group != group || envelope.is_expired() {
            return None;
        }
        Some(envelope.data)
    }

    async fn set(&self, key: &str, value: Value, group: &str, ttl: Duration) -> Result<()> {
        let path = self.entry_path(key, group);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let envelope = CacheEnvelope {
            created_ms: unix_ms_now(),
            ttl_ms: duration_ms(ttl),
            group: group.to_string(),
            data: value,
        };
        let bytes = serde_json::to_vec(&envelope)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        if let Err(err) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

fn slot(key: &str, group: &str) -> String {
    format!("{group}\u{1f}{key}")
}

fn safe_component(raw: &str) -> String {
    let out: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        "_".to_string()
    } else {
        out
    }
}

fn duration_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

struct MemCache {
    map: HashMap<String, CacheEnvelope<Value>>,
    order: VecDeque<String>,
}

impl MemCache {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn touch(&mut self, slot: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == slot) {
            self.order.remove(pos);
        }
        self.order.push_front(slot.to_string());
    }

    fn insert(&mut self, slot: &str, envelope: CacheEnvelope<Value>, capacity: usize) {
        self.map.insert(slot.to_string(), envelope);
        self.touch(slot);
        while self.order.len() > capacity {
            if let Some(old) = self.order.pop_back() {
                self.map.remove(&old);
            }
        }
    }

    fn get(&mut self, slot: &str) -> Option<Value> {
        let expired = self.map.get(slot)?.is_expired();
        if expired {
            self.map.remove(slot);
            if let Some(pos) = self.order.iter().position(|k| k == slot) {
                self.order.remove(pos);
            }
            return None;
        }
        self.touch(slot);
        self.map.get(slot).map(|env| env.data.clone())
    }
}
