use anyhow::Result;
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::models::ResumeFingerprint;

/// Cached per-(user, role, resume) analysis. Keeping the negative keyword
/// list next to the fingerprint means a cache hit skips every upfront
/// provider call.
#[derive(Debug, Clone)]
pub struct CachedConfig {
    pub fingerprint: ResumeFingerprint,
    pub negative_keywords: Vec<String>,
}

/// Content hash of the resume text. An edited resume must invalidate the
/// cache, so the hash is part of the key.
pub fn resume_hash(resume_text: &str) -> String {
    if resume_text.is_empty() {
        return "empty".to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(resume_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lookup store for derived hunt configuration. `get` misses (including
/// store errors) just mean the upfront analysis runs again.
pub trait FingerprintCache: Send + Sync {
    fn get(&self, user_id: &str, role: &str, resume_hash: &str) -> Result<Option<CachedConfig>>;
    fn put(&self, user_id: &str, role: &str, resume_hash: &str, config: &CachedConfig)
    -> Result<()>;
}

const TTL_DAYS: i64 = 30;

pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.init()?;
        Ok(cache)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let cache = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        cache.init()?;
        Ok(cache)
    }

    fn default_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "hunter") {
            Ok(proj_dirs.data_dir().join("hunter.db"))
        } else {
            Ok(PathBuf::from("hunter.db"))
        }
    }

    fn init(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS hunt_configs (
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                resume_hash TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                negative_keywords TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, role, resume_hash)
            );
            "#,
        )?;
        Ok(())
    }

    fn normalize_role(role: &str) -> String {
        role.trim().to_lowercase()
    }
}

impl FingerprintCache for SqliteCache {
    fn get(&self, user_id: &str, role: &str, resume_hash: &str) -> Result<Option<CachedConfig>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        let result = conn.query_row(
            "SELECT fingerprint, negative_keywords FROM hunt_configs
             WHERE user_id = ?1 AND role = ?2 AND resume_hash = ?3
               AND updated_at > datetime('now', ?4)",
            params![
                user_id,
                Self::normalize_role(role),
                resume_hash,
                format!("-{TTL_DAYS} days")
            ],
            |row| {
                let fingerprint: String = row.get(0)?;
                let keywords: String = row.get(1)?;
                Ok((fingerprint, keywords))
            },
        );
        match result {
            Ok((fingerprint, keywords)) => {
                let fingerprint: ResumeFingerprint = serde_json::from_str(&fingerprint)?;
                let negative_keywords: Vec<String> = serde_json::from_str(&keywords)?;
                Ok(Some(CachedConfig {
                    fingerprint,
                    negative_keywords,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(
        &self,
        user_id: &str,
        role: &str,
        resume_hash: &str,
        config: &CachedConfig,
    ) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        conn.execute(
            "INSERT INTO hunt_configs (user_id, role, resume_hash, fingerprint, negative_keywords, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
             ON CONFLICT (user_id, role, resume_hash) DO UPDATE SET
                 fingerprint = excluded.fingerprint,
                 negative_keywords = excluded.negative_keywords,
                 updated_at = excluded.updated_at",
            params![
                user_id,
                Self::normalize_role(role),
                resume_hash,
                serde_json::to_string(&config.fingerprint)?,
                serde_json::to_string(&config.negative_keywords)?,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> CachedConfig {
        CachedConfig {
            fingerprint: ResumeFingerprint {
                role: "React Developer".to_string(),
                expert_skills: vec!["react".to_string()],
                ..Default::default()
            }
            .with_defaults(),
            negative_keywords: vec!["unpaid".to_string(), "commission only".to_string()],
        }
    }

    #[test]
    fn resume_hash_is_stable_and_marks_empty() {
        assert_eq!(resume_hash(""), "empty");
        let a = resume_hash("5 years of React");
        let b = resume_hash("5 years of React");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, resume_hash("5 years of Rust"));
    }

    #[test]
    fn cache_round_trip() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let hash = resume_hash("resume text");

        assert!(cache.get("u1", "React Developer", &hash).unwrap().is_none());

        cache
            .put("u1", "React Developer", &hash, &sample_config())
            .unwrap();

        let hit = cache
            .get("u1", "React Developer", &hash)
            .unwrap()
            .expect("cache hit");
        assert_eq!(hit.fingerprint.role, "React Developer");
        assert_eq!(hit.negative_keywords.len(), 2);
    }

    #[test]
    fn role_lookup_is_case_insensitive() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let hash = resume_hash("resume text");
        cache
            .put("u1", "React Developer", &hash, &sample_config())
            .unwrap();
        assert!(
            cache
                .get("u1", "react developer", &hash)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn different_resume_hash_misses() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache
            .put("u1", "React Developer", &resume_hash("v1"), &sample_config())
            .unwrap();
        assert!(
            cache
                .get("u1", "React Developer", &resume_hash("v2"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn put_upserts_existing_entry() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let hash = resume_hash("resume text");
        cache
            .put("u1", "React Developer", &hash, &sample_config())
            .unwrap();

        let mut updated = sample_config();
        updated.negative_keywords.push("door to door".to_string());
        cache.put("u1", "React Developer", &hash, &updated).unwrap();

        let hit = cache.get("u1", "React Developer", &hash).unwrap().unwrap();
        assert_eq!(hit.negative_keywords.len(), 3);
    }
}
