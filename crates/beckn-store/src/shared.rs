use serde::{Deserialize, Serialize};

use beckn_core::constants::{CHALLENGE_TTL_SECS, DEDUP_TTL_SECS, PUBKEY_CACHE_TTL_SECS};
use beckn_core::error::BecknError;

/// A TTL-bounded value. Expiry is checked at read time rather than via
/// sled's own key expiry (sled has none); a key past its `expires_at` is
/// treated as absent and lazily overwritten on next write.
#[derive(Serialize, Deserialize)]
struct Expiring<T> {
    value: T,
    expires_at: i64,
}

/// Process-wide shared storage: the public-key cache, one-time challenge
/// records, duplicate-message-id suppression, and sliding-window rate
/// counters. All four are "process-wide shared state with lifecycle
/// bounded by TTL" (§3) — modeled here as a single sled tree rather than a
/// Redis deployment, since the rest of the stack has no Redis client and
/// nothing else in the workspace motivates adding one (see DESIGN.md).
pub struct SharedStore {
    tree: sled::Tree,
}

impl SharedStore {
    pub fn open(db: &sled::Db) -> Result<Self, BecknError> {
        let tree = db
            .open_tree("shared")
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        Ok(Self { tree })
    }

    fn get_if_live<T: for<'de> Deserialize<'de>>(&self, key: &str, now: i64) -> Result<Option<T>, BecknError> {
        match self.tree.get(key.as_bytes()).map_err(|e| BecknError::Storage(e.to_string()))? {
            Some(bytes) => {
                let entry: Expiring<T> =
                    bincode::deserialize(&bytes).map_err(|e| BecknError::Serialization(e.to_string()))?;
                if entry.expires_at > now {
                    Ok(Some(entry.value))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: T, expires_at: i64) -> Result<(), BecknError> {
        let entry = Expiring { value, expires_at };
        let bytes = bincode::serialize(&entry).map_err(|e| BecknError::Serialization(e.to_string()))?;
        self.tree
            .insert(key.as_bytes(), bytes)
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        Ok(())
    }

    // ── Public-key cache: pubkey:{sid}:{kid} ────────────────────────────────

    fn pubkey_key(subscriber_id: &str, unique_key_id: &str) -> String {
        format!("pubkey:{subscriber_id}:{unique_key_id}")
    }

    pub fn get_cached_pubkey(
        &self,
        subscriber_id: &str,
        unique_key_id: &str,
        now: i64,
    ) -> Result<Option<String>, BecknError> {
        self.get_if_live(&Self::pubkey_key(subscriber_id, unique_key_id), now)
    }

    pub fn set_cached_pubkey(
        &self,
        subscriber_id: &str,
        unique_key_id: &str,
        value: &str,
        now: i64,
    ) -> Result<(), BecknError> {
        self.set(
            &Self::pubkey_key(subscriber_id, unique_key_id),
            value.to_string(),
            now + PUBKEY_CACHE_TTL_SECS as i64,
        )
    }

    pub fn invalidate_pubkey(&self, subscriber_id: &str, unique_key_id: &str) -> Result<(), BecknError> {
        self.tree
            .remove(Self::pubkey_key(subscriber_id, unique_key_id).as_bytes())
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        Ok(())
    }

    // ── Challenge: challenge:{sid} ───────────────────────────────────────────

    fn challenge_key(subscriber_id: &str) -> String {
        format!("challenge:{subscriber_id}")
    }

    pub fn store_challenge(&self, subscriber_id: &str, value: &str, now: i64) -> Result<(), BecknError> {
        self.set(
            &Self::challenge_key(subscriber_id),
            value.to_string(),
            now + CHALLENGE_TTL_SECS as i64,
        )
    }

    /// Atomically read-and-delete the challenge. Single-use regardless of
    /// outcome: the key is removed whether or not it had expired.
    pub fn take_challenge(&self, subscriber_id: &str, now: i64) -> Result<Option<String>, BecknError> {
        let key = Self::challenge_key(subscriber_id);
        let removed = self
            .tree
            .remove(key.as_bytes())
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        match removed {
            Some(bytes) => {
                let entry: Expiring<String> =
                    bincode::deserialize(&bytes).map_err(|e| BecknError::Serialization(e.to_string()))?;
                if entry.expires_at > now {
                    Ok(Some(entry.value))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    // ── Dedup: msg:dedup:{message_id} ────────────────────────────────────────

    fn dedup_key(message_id: &str) -> String {
        format!("msg:dedup:{message_id}")
    }

    pub fn dedup_exists(&self, message_id: &str, now: i64) -> Result<bool, BecknError> {
        Ok(self.get_if_live::<String>(&Self::dedup_key(message_id), now)?.is_some())
    }

    pub fn dedup_insert(&self, message_id: &str, action: &str, now: i64) -> Result<(), BecknError> {
        self.set(
            &Self::dedup_key(message_id),
            action.to_string(),
            now + DEDUP_TTL_SECS as i64,
        )
    }

    // ── Rate counter: ratelimit:{id} ─────────────────────────────────────────

    fn rate_key(id: &str) -> String {
        format!("ratelimit:{id}")
    }

    /// Increment the counter for `id`, resetting to 1 with a fresh window if
    /// the previous window has expired (or never existed). Returns the
    /// post-increment count and the window's expiry timestamp.
    pub fn incr_rate_counter(&self, id: &str, now: i64, window_secs: i64) -> Result<(u64, i64), BecknError> {
        let key = Self::rate_key(id);
        let updated = self
            .tree
            .update_and_fetch(key.as_bytes(), move |old| {
                let next = match old.and_then(|b| bincode::deserialize::<Expiring<u64>>(b).ok()) {
                    Some(entry) if entry.expires_at > now => Expiring {
                        value: entry.value + 1,
                        expires_at: entry.expires_at,
                    },
                    _ => Expiring {
                        value: 1,
                        expires_at: now + window_secs,
                    },
                };
                bincode::serialize(&next).ok()
            })
            .map_err(|e| BecknError::Storage(e.to_string()))?;

        let entry: Expiring<u64> = updated
            .map(|b| bincode::deserialize(&b))
            .transpose()
            .map_err(|e: bincode::Error| BecknError::Serialization(e.to_string()))?
            .ok_or_else(|| BecknError::Storage("rate counter update produced no value".into()))?;

        Ok((entry.value, entry.expires_at))
    }
}
