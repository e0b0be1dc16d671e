use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ModelError, ModelResult};

/// A lease: a time-bounded exclusive claim on a named resource. Never
/// permanent; past `expires_at` the row is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    pub resource_type: String,
    pub resource_name: String,
    pub holder: String,
    pub session: String,
    pub expires_at: DateTime<Utc>,
}

/// Lease-based locks keyed by (resource_type, resource_name). Expiry is
/// check-on-access: expired rows are dropped before any acquire check, so a
/// crashed holder cannot deadlock the resource and no background timer is
/// needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockTable {
    locks: HashMap<(String, String), ResourceLock>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(
        &mut self,
        resource_type: &str,
        resource_name: &str,
        holder: &str,
        session: &str,
        ttl: Duration,
    ) -> ModelResult<ResourceLock> {
        self.acquire_at(resource_type, resource_name, holder, session, ttl, Utc::now())
    }

    /// Acquire with an explicit clock, used directly by tests.
    pub fn acquire_at(
        &mut self,
        resource_type: &str,
        resource_name: &str,
        holder: &str,
        session: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> ModelResult<ResourceLock> {
        let key = (resource_type.to_string(), resource_name.to_string());

        if let Some(existing) = self.locks.get(&key) {
            if existing.expires_at <= now {
                self.locks.remove(&key);
            } else if existing.holder != holder {
                return Err(ModelError::AlreadyLocked {
                    resource_type: resource_type.to_string(),
                    resource_name: resource_name.to_string(),
                    holder: existing.holder.clone(),
                    expires_at: existing.expires_at,
                });
            }
        }

        // fresh insert, or lease refresh by the same holder
        let lock = ResourceLock {
            resource_type: resource_type.to_string(),
            resource_name: resource_name.to_string(),
            holder: holder.to_string(),
            session: session.to_string(),
            expires_at: now + ttl,
        };
        self.locks.insert(key, lock.clone());
        Ok(lock)
    }

    /// Idempotent: releasing a missing lock, or one held by someone else,
    /// is a no-op.
    pub fn release(&mut self, resource_type: &str, resource_name: &str, holder: &str) {
        let key = (resource_type.to_string(), resource_name.to_string());
        if let Some(existing) = self.locks.get(&key) {
            if existing.holder == holder {
                self.locks.remove(&key);
            }
        }
    }

    /// The unexpired lock on a resource, if any.
    pub fn get_at(
        &self,
        resource_type: &str,
        resource_name: &str,
        now: DateTime<Utc>,
    ) -> Option<&ResourceLock> {
        let key = (resource_type.to_string(), resource_name.to_string());
        self.locks.get(&key).filter(|l| l.expires_at > now)
    }
}
