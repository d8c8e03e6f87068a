//! Durable cache for upstream panel data
//!
//! One cache entry per upstream credential triple (server URL, username,
//! password). An entry holds the last known-good category list plus one
//! stream list per category, each bucket with its own fetch timestamp,
//! and remembers the endpoint path that most recently produced a valid
//! response. Freshness is evaluated at read time against a uniform
//! window; nothing is expired proactively. A housekeeping sweep removes
//! entries untouched for 30 days.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::logger::{self, LogTag};

/// Separator for the derived cache key. Cannot occur inside a URL
/// authority or an Xtream username, so the derivation is collision-free
/// across distinct triples.
const CACHE_KEY_SEPARATOR: &str = "|";

/// Upstream credential triple identifying one panel account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub server_url: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Build a credential triple, normalizing the server URL by
    /// stripping a trailing slash. All readers and writers go through
    /// this constructor so the derived key is identical on both paths.
    pub fn new(server_url: &str, username: &str, password: &str) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Deterministic cache key for this triple
    pub fn cache_key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.server_url,
            self.username,
            self.password,
            sep = CACHE_KEY_SEPARATOR
        )
    }
}

/// Which bucket of a cache entry an operation targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Categories,
    /// Stream list for one category ("all" is the whole-panel sentinel)
    Streams { category_id: String },
}

/// A fresh cache read: records plus the endpoint and timestamp that
/// produced them
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub records: Vec<Value>,
    pub api_endpoint: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// SQLite-backed cache store
///
/// Caching is advisory: lookup failures degrade to a miss instead of
/// propagating, so a broken database never blocks an upstream fetch.
#[derive(Debug, Clone)]
pub struct CacheStore {
    db: Arc<Mutex<Connection>>,
    freshness_window: Duration,
}

impl CacheStore {
    /// Open (or create) the cache database at the given path
    pub fn open(path: &str, freshness_window: Duration) -> Result<Self, CacheStoreError> {
        let db = Connection::open(path)?;
        let store = Self {
            db: Arc::new(Mutex::new(db)),
            freshness_window,
        };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), CacheStoreError> {
        let db = self.db.lock().unwrap();

        db.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY,
                api_endpoint TEXT NOT NULL,
                categories TEXT,
                categories_fetched_at INTEGER,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS stream_buckets (
                cache_key TEXT NOT NULL,
                category_id TEXT NOT NULL,
                records TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                PRIMARY KEY (cache_key, category_id)
            )",
            [],
        )?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_stream_buckets_key ON stream_buckets(cache_key)",
            [],
        )?;

        Ok(())
    }

    /// Look up a bucket, returning it only if fresh.
    ///
    /// Never-fetched and stale are both reported as `None`; callers
    /// treat them identically as a miss. Store errors also degrade to
    /// `None` (logged), so the caller proceeds as if cold.
    pub fn lookup(&self, credentials: &Credentials, resource: &Resource) -> Option<CacheHit> {
        match self.try_lookup(credentials, resource) {
            Ok(hit) => hit,
            Err(e) => {
                logger::warning(
                    LogTag::Cache,
                    &format!("Cache lookup failed, treating as miss: {}", e),
                );
                None
            }
        }
    }

    fn try_lookup(
        &self,
        credentials: &Credentials,
        resource: &Resource,
    ) -> Result<Option<CacheHit>, CacheStoreError> {
        let key = credentials.cache_key();
        let db = self.db.lock().unwrap();

        let row: Option<(String, Option<String>, Option<i64>)> = match resource {
            Resource::Categories => db
                .query_row(
                    "SELECT api_endpoint, categories, categories_fetched_at
                     FROM cache_entries WHERE cache_key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?,
            Resource::Streams { category_id } => db
                .query_row(
                    "SELECT e.api_endpoint, b.records, b.fetched_at
                     FROM cache_entries e
                     JOIN stream_buckets b ON b.cache_key = e.cache_key
                     WHERE e.cache_key = ?1 AND b.category_id = ?2",
                    params![key, category_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?,
        };

        let (api_endpoint, records_json, fetched_at) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        // A bucket with no timestamp has never been fetched
        let (records_json, fetched_at) = match (records_json, fetched_at) {
            (Some(r), Some(t)) => (r, t),
            _ => return Ok(None),
        };

        if !is_fresh(fetched_at, Utc::now().timestamp(), self.freshness_window) {
            return Ok(None);
        }

        let records: Vec<Value> = serde_json::from_str(&records_json)?;
        let fetched_at = Utc
            .timestamp_opt(fetched_at, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(Some(CacheHit {
            records,
            api_endpoint,
            fetched_at,
        }))
    }

    /// Upsert the entry and replace the target bucket atomically.
    ///
    /// Creates the entry lazily on first store for a never-seen triple.
    /// The whole bucket is replaced, sibling buckets are untouched, and
    /// `api_endpoint` is updated to the path that produced this data.
    pub fn store(
        &self,
        credentials: &Credentials,
        resource: &Resource,
        records: &[Value],
        endpoint: &str,
    ) -> Result<(), CacheStoreError> {
        let key = credentials.cache_key();
        let records_json = serde_json::to_string(records)?;
        let now = Utc::now().timestamp();

        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        match resource {
            Resource::Categories => {
                tx.execute(
                    "INSERT INTO cache_entries
                        (cache_key, api_endpoint, categories, categories_fetched_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(cache_key) DO UPDATE SET
                        api_endpoint = excluded.api_endpoint,
                        categories = excluded.categories,
                        categories_fetched_at = excluded.categories_fetched_at,
                        updated_at = excluded.updated_at",
                    params![key, endpoint, records_json, now],
                )?;
            }
            Resource::Streams { category_id } => {
                tx.execute(
                    "INSERT INTO cache_entries (cache_key, api_endpoint, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(cache_key) DO UPDATE SET
                        api_endpoint = excluded.api_endpoint,
                        updated_at = excluded.updated_at",
                    params![key, endpoint, now],
                )?;
                tx.execute(
                    "INSERT OR REPLACE INTO stream_buckets
                        (cache_key, category_id, records, fetched_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![key, category_id, records_json, now],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Read the recorded endpoint path regardless of bucket freshness.
    ///
    /// Advisory fetch hint only; a stale hint never blocks re-probing.
    pub fn endpoint_hint(&self, credentials: &Credentials) -> Option<String> {
        let key = credentials.cache_key();
        let db = self.db.lock().unwrap();

        let result = db
            .query_row(
                "SELECT api_endpoint FROM cache_entries WHERE cache_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional();

        match result {
            Ok(hint) => hint,
            Err(e) => {
                logger::warning(LogTag::Cache, &format!("Endpoint hint read failed: {}", e));
                None
            }
        }
    }

    /// Delete one entry (and its stream buckets) by its literal key.
    /// Returns false if no entry existed.
    pub fn delete(&self, cache_key: &str) -> Result<bool, CacheStoreError> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        tx.execute(
            "DELETE FROM stream_buckets WHERE cache_key = ?1",
            params![cache_key],
        )?;
        let deleted = tx.execute(
            "DELETE FROM cache_entries WHERE cache_key = ?1",
            params![cache_key],
        )?;

        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Delete entries whose most recent update exceeds `max_age`.
    /// Disk hygiene, not correctness: stale entries are superseded in
    /// place on the next successful fetch regardless.
    pub fn sweep_expired(&self, max_age: Duration) -> Result<usize, CacheStoreError> {
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;

        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        tx.execute(
            "DELETE FROM stream_buckets WHERE cache_key IN
                (SELECT cache_key FROM cache_entries WHERE updated_at < ?1)",
            params![cutoff],
        )?;
        let deleted = tx.execute(
            "DELETE FROM cache_entries WHERE updated_at < ?1",
            params![cutoff],
        )?;

        tx.commit()?;
        Ok(deleted)
    }
}

/// Freshness rule: fetched and no older than the window
fn is_fresh(fetched_at: i64, now: i64, window: Duration) -> bool {
    now - fetched_at <= window.as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WINDOW_SECS: u64 = 300;

    fn test_store() -> CacheStore {
        CacheStore::open(":memory:", Duration::from_secs(WINDOW_SECS)).unwrap()
    }

    fn creds() -> Credentials {
        Credentials::new("http://panel.example.com:8000", "user1", "pass1")
    }

    fn sample_records() -> Vec<Value> {
        vec![
            json!({"category_id": "1", "category_name": "Sports"}),
            json!({"category_id": "2", "category_name": "News"}),
        ]
    }

    #[test]
    fn test_cache_key_derivation() {
        let c = creds();
        assert_eq!(
            c.cache_key(),
            "http://panel.example.com:8000|user1|pass1"
        );

        // Stable across calls
        assert_eq!(c.cache_key(), creds().cache_key());

        // Trailing slash normalized into the same key
        let slashed = Credentials::new("http://panel.example.com:8000/", "user1", "pass1");
        assert_eq!(slashed.cache_key(), c.cache_key());

        // Any differing field yields a distinct key
        let other_user = Credentials::new("http://panel.example.com:8000", "user2", "pass1");
        let other_pass = Credentials::new("http://panel.example.com:8000", "user1", "pass2");
        let other_host = Credentials::new("http://other.example.com:8000", "user1", "pass1");
        assert_ne!(other_user.cache_key(), c.cache_key());
        assert_ne!(other_pass.cache_key(), c.cache_key());
        assert_ne!(other_host.cache_key(), c.cache_key());
    }

    #[test]
    fn test_store_then_lookup_round_trip() {
        let store = test_store();
        let c = creds();
        let records = sample_records();

        store
            .store(&c, &Resource::Categories, &records, "/player_api.php")
            .unwrap();

        let hit = store.lookup(&c, &Resource::Categories).expect("fresh hit");
        assert_eq!(hit.records, records);
        assert_eq!(hit.api_endpoint, "/player_api.php");
    }

    #[test]
    fn test_never_fetched_is_a_miss() {
        let store = test_store();
        assert!(store.lookup(&creds(), &Resource::Categories).is_none());
        assert!(store
            .lookup(
                &creds(),
                &Resource::Streams {
                    category_id: "all".to_string()
                }
            )
            .is_none());
    }

    #[test]
    fn test_freshness_boundary() {
        let window = Duration::from_secs(WINDOW_SECS);
        let now = 1_000_000;

        // Exactly at the window edge is still fresh
        assert!(is_fresh(now - WINDOW_SECS as i64, now, window));
        // One second past the window is stale
        assert!(!is_fresh(now - WINDOW_SECS as i64 - 1, now, window));
    }

    #[test]
    fn test_stale_entry_reported_absent() {
        let store = test_store();
        let c = creds();

        store
            .store(&c, &Resource::Categories, &sample_records(), "/api.php")
            .unwrap();

        // Age the bucket to exactly one second past the window
        let stale = Utc::now().timestamp() - WINDOW_SECS as i64 - 1;
        store
            .db
            .lock()
            .unwrap()
            .execute(
                "UPDATE cache_entries SET categories_fetched_at = ?1",
                params![stale],
            )
            .unwrap();

        assert!(store.lookup(&c, &Resource::Categories).is_none());
        // The endpoint hint survives staleness
        assert_eq!(store.endpoint_hint(&c), Some("/api.php".to_string()));
    }

    #[test]
    fn test_bucket_freshness_is_independent() {
        let store = test_store();
        let c = creds();
        let sports = Resource::Streams {
            category_id: "sports".to_string(),
        };

        store
            .store(&c, &Resource::Categories, &sample_records(), "/api.php")
            .unwrap();
        store
            .store(&c, &sports, &[json!({"stream_id": 7})], "/api.php")
            .unwrap();

        // Age only the categories bucket
        let stale = Utc::now().timestamp() - WINDOW_SECS as i64 - 10;
        store
            .db
            .lock()
            .unwrap()
            .execute(
                "UPDATE cache_entries SET categories_fetched_at = ?1",
                params![stale],
            )
            .unwrap();

        assert!(store.lookup(&c, &Resource::Categories).is_none());
        assert!(store.lookup(&c, &sports).is_some());

        // Updating a stream bucket must not resurrect stale categories
        store
            .store(&c, &sports, &[json!({"stream_id": 8})], "/portal.php")
            .unwrap();
        assert!(store.lookup(&c, &Resource::Categories).is_none());

        let hit = store.lookup(&c, &sports).unwrap();
        assert_eq!(hit.records, vec![json!({"stream_id": 8})]);
        assert_eq!(hit.api_endpoint, "/portal.php");
    }

    #[test]
    fn test_stream_store_preserves_categories_bucket() {
        let store = test_store();
        let c = creds();
        let records = sample_records();

        store
            .store(&c, &Resource::Categories, &records, "/api.php")
            .unwrap();
        store
            .store(
                &c,
                &Resource::Streams {
                    category_id: "all".to_string(),
                },
                &[json!({"stream_id": 1})],
                "/player_api.php",
            )
            .unwrap();

        let hit = store.lookup(&c, &Resource::Categories).expect("still fresh");
        assert_eq!(hit.records, records);
        // Endpoint hint reflects the most recent successful fetch
        assert_eq!(hit.api_endpoint, "/player_api.php");
    }

    #[test]
    fn test_whole_bucket_replaced_not_merged() {
        let store = test_store();
        let c = creds();

        store
            .store(&c, &Resource::Categories, &sample_records(), "/api.php")
            .unwrap();
        let replacement = vec![json!({"category_id": "9"})];
        store
            .store(&c, &Resource::Categories, &replacement, "/api.php")
            .unwrap();

        let hit = store.lookup(&c, &Resource::Categories).unwrap();
        assert_eq!(hit.records, replacement);
    }

    #[test]
    fn test_delete_entry() {
        let store = test_store();
        let c = creds();

        store
            .store(&c, &Resource::Categories, &sample_records(), "/api.php")
            .unwrap();

        assert!(store.delete(&c.cache_key()).unwrap());
        assert!(store.lookup(&c, &Resource::Categories).is_none());

        // Absent key reports not found
        assert!(!store.delete(&c.cache_key()).unwrap());
    }

    #[test]
    fn test_sweep_deletes_only_aged_entries() {
        let store = test_store();
        let old = Credentials::new("http://old.example.com", "u", "p");
        let recent = Credentials::new("http://recent.example.com", "u", "p");

        store
            .store(&old, &Resource::Categories, &sample_records(), "/api.php")
            .unwrap();
        store
            .store(&recent, &Resource::Categories, &sample_records(), "/api.php")
            .unwrap();

        // Age one entry to 31 days, leave the other at 1 day
        let day = 86_400_i64;
        let now = Utc::now().timestamp();
        {
            let db = store.db.lock().unwrap();
            db.execute(
                "UPDATE cache_entries SET updated_at = ?1 WHERE cache_key = ?2",
                params![now - 31 * day, old.cache_key()],
            )
            .unwrap();
            db.execute(
                "UPDATE cache_entries SET updated_at = ?1 WHERE cache_key = ?2",
                params![now - day, recent.cache_key()],
            )
            .unwrap();
        }

        let deleted = store
            .sweep_expired(Duration::from_secs(30 * day as u64))
            .unwrap();
        assert_eq!(deleted, 1);

        assert!(store.endpoint_hint(&old).is_none());
        assert!(store.endpoint_hint(&recent).is_some());
    }

    #[test]
    fn test_disk_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let path = path.to_str().unwrap();
        let c = creds();

        {
            let store = CacheStore::open(path, Duration::from_secs(WINDOW_SECS)).unwrap();
            store
                .store(&c, &Resource::Categories, &sample_records(), "/portal.php")
                .unwrap();
        }

        let reopened = CacheStore::open(path, Duration::from_secs(WINDOW_SECS)).unwrap();
        let hit = reopened.lookup(&c, &Resource::Categories).expect("persisted");
        assert_eq!(hit.api_endpoint, "/portal.php");
    }
}
