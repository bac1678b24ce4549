use std::path::Path;

use beckn_core::error::BecknError;
use beckn_core::types::{AuditRecord, Subscriber, SubscriberKey, TransactionRecord, TransactionStatus};

use crate::shared::SharedStore;

/// Persistent state database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   subscribers  — "sid|kid" utf8 bytes → bincode(Subscriber)
///   transactions — "tid|mid|action" utf8 bytes → bincode(TransactionRecord)
///   audit_logs   — be-u64 sequence bytes → bincode(AuditRecord)
///   meta         — utf8 key bytes → raw bytes (sequence counters)
///   shared       — see `SharedStore`
pub struct StoreDb {
    _db: sled::Db,
    subscribers: sled::Tree,
    transactions: sled::Tree,
    audit_logs: sled::Tree,
    meta: sled::Tree,
    shared: SharedStore,
}

impl StoreDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BecknError> {
        let db = sled::open(path).map_err(|e| BecknError::Storage(e.to_string()))?;
        let subscribers = db
            .open_tree("subscribers")
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        let transactions = db
            .open_tree("transactions")
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        let audit_logs = db
            .open_tree("audit_logs")
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        let meta = db
            .open_tree("meta")
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        let shared = SharedStore::open(&db)?;
        Ok(Self {
            _db: db,
            subscribers,
            transactions,
            audit_logs,
            meta,
            shared,
        })
    }

    /// TTL-bounded shared storage: pubkey cache, challenges, dedup, rate counters.
    pub fn shared(&self) -> &SharedStore {
        &self.shared
    }

    // ── Cache-aside key lookup (§4.4) ───────────────────────────────────────────

    /// Strictly cache-aside public-key lookup: a pubkey cache hit returns
    /// immediately; a miss loads the authoritative Subscriber row and
    /// repopulates the cache with a 300s TTL. Shared by the registry,
    /// participant adapter, and gateway — every component that needs to
    /// resolve a signer's public key.
    pub fn resolve_signing_key(
        &self,
        subscriber_id: &str,
        unique_key_id: &str,
        now: i64,
    ) -> Result<Option<String>, BecknError> {
        if let Some(cached) = self.shared.get_cached_pubkey(subscriber_id, unique_key_id, now)? {
            return Ok(Some(cached));
        }

        let key = SubscriberKey::new(subscriber_id, unique_key_id);
        let Some(subscriber) = self.get_subscriber(&key)? else {
            return Ok(None);
        };
        let Some(pub_key) = subscriber.signing_public_key else {
            return Ok(None);
        };

        self.shared.set_cached_pubkey(subscriber_id, unique_key_id, &pub_key, now)?;
        Ok(Some(pub_key))
    }

    /// Invalidate the cached key. Callers MUST call this within the same
    /// logical operation that mutates the subscriber's status or key
    /// material (§4.4 step 4).
    pub fn invalidate_key(&self, subscriber_id: &str, unique_key_id: &str) -> Result<(), BecknError> {
        self.shared.invalidate_pubkey(subscriber_id, unique_key_id)
    }

    // ── Subscribers ──────────────────────────────────────────────────────────

    pub fn get_subscriber(&self, key: &SubscriberKey) -> Result<Option<Subscriber>, BecknError> {
        match self
            .subscribers
            .get(key.storage_key().as_bytes())
            .map_err(|e| BecknError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let sub = bincode::deserialize(&bytes).map_err(|e| BecknError::Serialization(e.to_string()))?;
                Ok(Some(sub))
            }
            None => Ok(None),
        }
    }

    pub fn put_subscriber(&self, subscriber: &Subscriber) -> Result<(), BecknError> {
        let bytes = bincode::serialize(subscriber).map_err(|e| BecknError::Serialization(e.to_string()))?;
        self.subscribers
            .insert(subscriber.key().storage_key().as_bytes(), bytes)
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn subscriber_exists(&self, key: &SubscriberKey) -> bool {
        self.subscribers
            .contains_key(key.storage_key().as_bytes())
            .unwrap_or(false)
    }

    /// Scan the full table for subscribers matching a domain/city discovery
    /// query. A real deployment would index on `(status, domain, city)`;
    /// at the expected subscriber-table scale a tree scan is adequate and
    /// keeps the storage layer free of a secondary-index dependency.
    pub fn iter_subscribers(&self) -> Result<Vec<Subscriber>, BecknError> {
        self.subscribers
            .iter()
            .values()
            .map(|r| {
                let bytes = r.map_err(|e| BecknError::Storage(e.to_string()))?;
                bincode::deserialize(&bytes).map_err(|e| BecknError::Serialization(e.to_string()))
            })
            .collect()
    }

    // ── Transactions ─────────────────────────────────────────────────────────

    fn transaction_key(transaction_id: &str, message_id: &str, action: &str) -> String {
        format!("{transaction_id}|{message_id}|{action}")
    }

    /// Insert or update the row for `(transaction_id, message_id, action)`.
    /// Persist failures are logged by the caller and never propagated to the
    /// protocol response (§4.6 step 6, §7).
    pub fn put_transaction(&self, record: &TransactionRecord) -> Result<(), BecknError> {
        let key = Self::transaction_key(&record.transaction_id, &record.message_id, &record.action);
        let bytes = serde_json::to_vec(record).map_err(|e| BecknError::Serialization(e.to_string()))?;
        self.transactions
            .insert(key.as_bytes(), bytes)
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_transaction(
        &self,
        transaction_id: &str,
        message_id: &str,
        action: &str,
    ) -> Result<Option<TransactionRecord>, BecknError> {
        let key = Self::transaction_key(transaction_id, message_id, action);
        match self
            .transactions
            .get(key.as_bytes())
            .map_err(|e| BecknError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let rec = serde_json::from_slice(&bytes).map_err(|e| BecknError::Serialization(e.to_string()))?;
                Ok(Some(rec))
            }
            None => Ok(None),
        }
    }

    /// Update the status (and optionally latency) of an existing row.
    /// No-op if the row does not exist.
    pub fn update_transaction_status(
        &self,
        transaction_id: &str,
        message_id: &str,
        action: &str,
        status: TransactionStatus,
        latency_ms: Option<u64>,
    ) -> Result<(), BecknError> {
        if let Some(mut rec) = self.get_transaction(transaction_id, message_id, action)? {
            rec.status = status;
            if latency_ms.is_some() {
                rec.latency_ms = latency_ms;
            }
            self.put_transaction(&rec)?;
        }
        Ok(())
    }

    pub fn iter_transactions_for(&self, transaction_id: &str) -> Result<Vec<TransactionRecord>, BecknError> {
        let prefix = format!("{transaction_id}|");
        self.transactions
            .scan_prefix(prefix.as_bytes())
            .values()
            .map(|r| {
                let bytes = r.map_err(|e| BecknError::Storage(e.to_string()))?;
                serde_json::from_slice(&bytes).map_err(|e| BecknError::Serialization(e.to_string()))
            })
            .collect()
    }

    // ── Audit log ────────────────────────────────────────────────────────────

    fn next_audit_seq(&self) -> Result<u64, BecknError> {
        let seq = self
            .meta
            .update_and_fetch(b"audit_seq", |old| {
                let n = old.map(|b| u64::from_be_bytes(b.try_into().unwrap_or([0; 8]))).unwrap_or(0);
                Some((n + 1).to_be_bytes().to_vec())
            })
            .map_err(|e| BecknError::Storage(e.to_string()))?
            .map(|b| u64::from_be_bytes(b.as_ref().try_into().unwrap_or([0; 8])))
            .unwrap_or(1);
        Ok(seq)
    }

    /// Append an audit row. Never updated once written; insert failures are
    /// logged by the caller and never propagated (§7).
    pub fn append_audit(&self, record: &AuditRecord) -> Result<(), BecknError> {
        let seq = self.next_audit_seq()?;
        let bytes = serde_json::to_vec(record).map_err(|e| BecknError::Serialization(e.to_string()))?;
        self.audit_logs
            .insert(seq.to_be_bytes(), bytes)
            .map_err(|e| BecknError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn iter_audit(&self) -> Result<Vec<AuditRecord>, BecknError> {
        self.audit_logs
            .iter()
            .values()
            .map(|r| {
                let bytes = r.map_err(|e| BecknError::Storage(e.to_string()))?;
                serde_json::from_slice(&bytes).map_err(|e| BecknError::Serialization(e.to_string()))
            })
            .collect()
    }

    pub fn flush(&self) -> Result<(), BecknError> {
        self._db.flush().map_err(|e| BecknError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beckn_core::types::{Role, SubscriberStatus};

    fn temp_db() -> StoreDb {
        let dir = tempfile::tempdir().unwrap();
        StoreDb::open(dir.path().join("state.sled")).unwrap()
    }

    fn seed_subscriber(status: SubscriberStatus, domain: &str, city: &str) -> Subscriber {
        Subscriber {
            subscriber_id: "s1".into(),
            unique_key_id: "k1".into(),
            subscriber_url: "https://s1.example.com".into(),
            role: Role::Bpp,
            domain: domain.into(),
            city: city.into(),
            signing_public_key: Some("pub".into()),
            encr_public_key: Some("encpub".into()),
            status,
            valid_from: Some(0),
            valid_until: Some(i64::MAX),
            is_simulated: false,
            created_at: 0,
        }
    }

    #[test]
    fn put_and_get_subscriber_round_trips() {
        let db = temp_db();
        let sub = seed_subscriber(SubscriberStatus::Subscribed, "RET10", "std:080");
        db.put_subscriber(&sub).unwrap();
        let fetched = db.get_subscriber(&sub.key()).unwrap().unwrap();
        assert_eq!(fetched.subscriber_id, "s1");
        assert_eq!(fetched.status, SubscriberStatus::Subscribed);
    }

    #[test]
    fn unknown_subscriber_is_none() {
        let db = temp_db();
        let key = SubscriberKey::new("nope", "nope");
        assert!(db.get_subscriber(&key).unwrap().is_none());
    }

    #[test]
    fn resolve_signing_key_misses_then_caches() {
        let db = temp_db();
        let sub = seed_subscriber(SubscriberStatus::Subscribed, "RET10", "std:080");
        db.put_subscriber(&sub).unwrap();

        assert!(db.shared().get_cached_pubkey("s1", "k1", 1000).unwrap().is_none());
        let key = db.resolve_signing_key("s1", "k1", 1000).unwrap();
        assert_eq!(key.as_deref(), Some("pub"));
        assert_eq!(db.shared().get_cached_pubkey("s1", "k1", 1001).unwrap().as_deref(), Some("pub"));
    }

    #[test]
    fn resolve_signing_key_unknown_subscriber_is_none() {
        let db = temp_db();
        assert!(db.resolve_signing_key("nope", "nope", 1000).unwrap().is_none());
    }

    #[test]
    fn invalidate_key_clears_cache() {
        let db = temp_db();
        let sub = seed_subscriber(SubscriberStatus::Subscribed, "RET10", "std:080");
        db.put_subscriber(&sub).unwrap();
        db.resolve_signing_key("s1", "k1", 1000).unwrap();
        db.invalidate_key("s1", "k1").unwrap();
        assert!(db.shared().get_cached_pubkey("s1", "k1", 1001).unwrap().is_none());
    }

    #[test]
    fn transaction_status_updates_in_place() {
        let db = temp_db();
        let rec = TransactionRecord {
            transaction_id: "t1".into(),
            message_id: "m1".into(),
            action: "search".into(),
            domain: "RET10".into(),
            city: Some("std:080".into()),
            bap_id: Some("bap1".into()),
            bpp_id: None,
            request_body: serde_json::json!({}),
            status: TransactionStatus::Sent,
            latency_ms: None,
            recorded_at: 0,
        };
        db.put_transaction(&rec).unwrap();
        db.update_transaction_status("t1", "m1", "search", TransactionStatus::Ack, Some(42))
            .unwrap();
        let updated = db.get_transaction("t1", "m1", "search").unwrap().unwrap();
        assert_eq!(updated.status, TransactionStatus::Ack);
        assert_eq!(updated.latency_ms, Some(42));
    }

    #[test]
    fn audit_log_is_append_only_and_ordered() {
        let db = temp_db();
        for i in 0..3 {
            db.append_audit(&AuditRecord {
                actor: "registry".into(),
                action: format!("EVENT_{i}"),
                resource_type: "subscriber".into(),
                resource_id: "s1".into(),
                details: serde_json::json!({}),
                ip: None,
                timestamp: i,
            })
            .unwrap();
        }
        let all = db.iter_audit().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, "EVENT_0");
        assert_eq!(all[2].action, "EVENT_2");
    }
}
