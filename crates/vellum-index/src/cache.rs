//! SQLite-backed embedding cache.
//!
//! Keyed by (content hash, provider, model) so a provider or model
//! switch is a different key, never an overwrite. Entries are immutable
//! once written — the only way a key stops being served is the content
//! changing, which is a new key. Persistence survives process restart;
//! WAL mode tolerates concurrent pipeline invocations. Concurrent misses
//! for the same key may both compute (duplicate cost, not a correctness
//! problem); last write wins.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use vellum_core::{content_hash, Result};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS embedding_cache (
    content_hash TEXT NOT NULL,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    created_at REAL NOT NULL,
    last_accessed REAL NOT NULL,
    PRIMARY KEY (content_hash, provider, model)
)";

fn now_epoch() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: u64,
    pub total_size_bytes: u64,
}

/// Persistent content-addressed cache for embedding vectors.
pub struct EmbeddingCache {
    conn: Mutex<Connection>,
}

impl EmbeddingCache {
    /// Open (or create) the cache at `db_path`. Parent directories are
    /// created as needed.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(SCHEMA, [])?;
        info!(path = %db_path.display(), "Embedding cache opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory cache for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Look up a single entry, touching `last_accessed` on hit.
    pub fn get(&self, hash: &str, provider: &str, model: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn.lock().expect("cache connection poisoned");
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM embedding_cache
                 WHERE content_hash = ?1 AND provider = ?2 AND model = ?3",
                params![hash, provider, model],
                |row| row.get(0),
            )
            .optional()?;
        let Some(blob) = blob else {
            return Ok(None);
        };
        conn.execute(
            "UPDATE embedding_cache SET last_accessed = ?1
             WHERE content_hash = ?2 AND provider = ?3 AND model = ?4",
            params![now_epoch(), hash, provider, model],
        )?;
        Ok(Some(blob_to_vector(&blob)))
    }

    /// Store an entry. Re-inserting an existing key replaces it (last
    /// write wins on a miss race).
    pub fn put(&self, hash: &str, provider: &str, model: &str, vector: &[f32]) -> Result<()> {
        let conn = self.conn.lock().expect("cache connection poisoned");
        let now = now_epoch();
        conn.execute(
            "INSERT OR REPLACE INTO embedding_cache
             (content_hash, provider, model, dimensions, embedding, created_at, last_accessed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                hash,
                provider,
                model,
                vector.len() as i64,
                vector_to_blob(vector),
                now,
                now
            ],
        )?;
        Ok(())
    }

    /// Batch lookup. Returns hash → vector for hits only.
    pub fn get_batch(
        &self,
        hashes: &[String],
        provider: &str,
        model: &str,
    ) -> Result<HashMap<String, Vec<f32>>> {
        let mut result = HashMap::new();
        if hashes.is_empty() {
            return Ok(result);
        }
        let conn = self.conn.lock().expect("cache connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT embedding FROM embedding_cache
             WHERE content_hash = ?1 AND provider = ?2 AND model = ?3",
        )?;
        let mut touch = conn.prepare(
            "UPDATE embedding_cache SET last_accessed = ?1
             WHERE content_hash = ?2 AND provider = ?3 AND model = ?4",
        )?;
        let now = now_epoch();
        for hash in hashes {
            let blob: Option<Vec<u8>> = stmt
                .query_row(params![hash, provider, model], |row| row.get(0))
                .optional()?;
            if let Some(blob) = blob {
                touch.execute(params![now, hash, provider, model])?;
                result.insert(hash.clone(), blob_to_vector(&blob));
            }
        }
        Ok(result)
    }

    /// Batch store.
    pub fn put_batch(
        &self,
        entries: &[(String, Vec<f32>)],
        provider: &str,
        model: &str,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().expect("cache connection poisoned");
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO embedding_cache
                 (content_hash, provider, model, dimensions, embedding, created_at, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let now = now_epoch();
            for (hash, vector) in entries {
                stmt.execute(params![
                    hash,
                    provider,
                    model,
                    vector.len() as i64,
                    vector_to_blob(vector),
                    now,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Hash `content` and return the cached vector, or invoke `compute`
    /// and store its result. Compute failures store nothing and
    /// propagate — there is no negative caching.
    pub async fn get_or_compute<F, Fut>(
        &self,
        content: &str,
        provider: &str,
        model: &str,
        compute: F,
    ) -> Result<Vec<f32>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<f32>>>,
    {
        let hash = content_hash(content);
        if let Some(vector) = self.get(&hash, provider, model)? {
            debug!(%provider, %model, "Embedding cache hit");
            return Ok(vector);
        }
        let vector = compute().await?;
        self.put(&hash, provider, model, &vector)?;
        Ok(vector)
    }

    /// Entry count and total embedding byte size.
    pub fn stats(&self) -> Result<CacheStats> {
        let conn = self.conn.lock().expect("cache connection poisoned");
        let (entries, bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(embedding)), 0) FROM embedding_cache",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let (entries, bytes) = (entries as u64, bytes as u64);
        Ok(CacheStats {
            total_entries: entries,
            total_size_bytes: bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_blob_round_trip() {
        let v = vec![0.0f32, 1.5, -2.25, f32::MAX];
        assert_eq!(blob_to_vector(&vector_to_blob(&v)), v);
    }

    #[test]
    fn test_get_miss_then_put_then_hit() {
        let cache = EmbeddingCache::in_memory().unwrap();
        assert!(cache.get("h1", "mock", "m").unwrap().is_none());
        cache.put("h1", "mock", "m", &[1.0, 2.0]).unwrap();
        assert_eq!(cache.get("h1", "mock", "m").unwrap(), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_provider_model_are_part_of_key() {
        let cache = EmbeddingCache::in_memory().unwrap();
        cache.put("h1", "openai", "small", &[1.0]).unwrap();
        assert!(cache.get("h1", "openai", "large").unwrap().is_none());
        assert!(cache.get("h1", "voyage", "small").unwrap().is_none());
        assert!(cache.get("h1", "openai", "small").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_or_compute_invokes_compute_at_most_once() {
        let cache = EmbeddingCache::in_memory().unwrap();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_compute("content", "mock", "m", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![0.5, 0.5])
            })
            .await
            .unwrap();
        let second = cache
            .get_or_compute("content", "mock", "m", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![9.0, 9.0])
            })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_failure_stores_nothing() {
        let cache = EmbeddingCache::in_memory().unwrap();
        let result = cache
            .get_or_compute("content", "mock", "m", || async {
                Err(vellum_core::Error::Provider("rate limited".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.stats().unwrap().total_entries, 0);

        // A later successful compute fills the entry.
        let vector = cache
            .get_or_compute("content", "mock", "m", || async { Ok(vec![1.0]) })
            .await
            .unwrap();
        assert_eq!(vector, vec![1.0]);
        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn test_batch_round_trip() {
        let cache = EmbeddingCache::in_memory().unwrap();
        let entries = vec![
            ("h1".to_string(), vec![1.0f32]),
            ("h2".to_string(), vec![2.0f32]),
        ];
        cache.put_batch(&entries, "mock", "m").unwrap();

        let hashes = vec!["h1".to_string(), "h2".to_string(), "h3".to_string()];
        let hits = cache.get_batch(&hashes, "mock", "m").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits["h1"], vec![1.0]);
        assert!(!hits.contains_key("h3"));
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cache").join("embeddings.db");
        {
            let cache = EmbeddingCache::open(&db).unwrap();
            cache.put("h1", "mock", "m", &[3.0, 4.0]).unwrap();
        }
        let cache = EmbeddingCache::open(&db).unwrap();
        assert_eq!(cache.get("h1", "mock", "m").unwrap(), Some(vec![3.0, 4.0]));
    }

    #[test]
    fn test_stats() {
        let cache = EmbeddingCache::in_memory().unwrap();
        cache.put("h1", "mock", "m", &[1.0, 2.0, 3.0]).unwrap();
        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_size_bytes, 12);
    }
}
