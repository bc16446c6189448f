use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use wlc_core::{IdempotencyKey, Outcome, WlcError};

use crate::db::{decode, encode, WlcStore};

#[derive(Clone, Debug, Serialize, Deserialize)]
enum StoredState {
    Locked {
        expires_at: DateTime<Utc>,
    },
    Completed {
        outcome: Outcome,
        #[allow(dead_code)]
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

/// Result of [`WlcStore::idempotency_try_begin`].
#[derive(Debug)]
pub enum TryBeginResult {
    /// No record existed (or the prior one expired); the lock is now held.
    Acquired,
    /// A completed outcome already exists — the pipeline must not re-run.
    Cached(Outcome),
    /// Another worker currently holds the lock.
    InProgress,
}

fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at
}

impl WlcStore {
    /// Attempts to acquire the exclusive lock on `key` via a single
    /// conditional write (`compare_and_swap`), retrying on CAS races the
    /// way an optimistic-concurrency store normally does — the retry loop
    /// never changes the outcome, only who wins a simultaneous race.
    pub fn idempotency_try_begin(
        &self,
        key: &IdempotencyKey,
        lease_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<TryBeginResult, WlcError> {
        let k = key.as_str().as_bytes();
        loop {
            let current = self
                .idempotency
                .get(k)
                .map_err(|e| WlcError::Storage(e.to_string()))?;

            let parsed: Option<StoredState> = match &current {
                None => None,
                Some(bytes) => Some(decode(bytes)?),
            };

            let live = match &parsed {
                None => None,
                Some(StoredState::Locked { expires_at }) if !is_expired(*expires_at, now) => {
                    parsed.clone()
                }
                Some(StoredState::Completed { expires_at, .. })
                    if !is_expired(*expires_at, now) =>
                {
                    parsed.clone()
                }
                _ => None, // expired lock or expired outcome: treat as absent
            };

            match live {
                Some(StoredState::Locked { .. }) => return Ok(TryBeginResult::InProgress),
                Some(StoredState::Completed { outcome, .. }) => {
                    return Ok(TryBeginResult::Cached(outcome))
                }
                None => {
                    let new_state = StoredState::Locked {
                        expires_at: now + Duration::milliseconds(lease_ms as i64),
                    };
                    let new_bytes = encode(&new_state)?;
                    let cas = self
                        .idempotency
                        .compare_and_swap(k, current, Some(new_bytes))
                        .map_err(|e| WlcError::Storage(e.to_string()))?;
                    match cas {
                        Ok(()) => return Ok(TryBeginResult::Acquired),
                        Err(_) => continue, // lost the race, re-read and retry
                    }
                }
            }
        }
    }

    /// Stores the final outcome and releases the lock. Idempotent: calling
    /// this twice with the same outcome just overwrites an identical value.
    pub fn idempotency_commit(
        &self,
        key: &IdempotencyKey,
        outcome: Outcome,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<(), WlcError> {
        let state = StoredState::Completed {
            outcome,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        };
        self.idempotency
            .insert(key.as_str().as_bytes(), encode(&state)?)
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Releases the lock without storing an outcome, so a later call may
    /// retry the whole pipeline from scratch.
    pub fn idempotency_abort(&self, key: &IdempotencyKey) -> Result<(), WlcError> {
        self.idempotency
            .remove(key.as_str().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Overwrites a previously-cached outcome in place — used by the
    /// reconciler's stale-transaction sweep to turn a stuck `inProgress`
    /// lock into a terminal cached failure without waiting for the lease
    /// to expire naturally.
    pub fn idempotency_force_complete(
        &self,
        key: &IdempotencyKey,
        outcome: Outcome,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<(), WlcError> {
        self.idempotency_commit(key, outcome, ttl_secs, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlc_core::TransactionId;

    fn key(s: &str) -> IdempotencyKey {
        IdempotencyKey::parse(s).unwrap()
    }

    #[test]
    fn first_begin_acquires_then_second_sees_in_progress() {
        let store = WlcStore::open_temporary().unwrap();
        let k = key("dep-2026-07-28-userA-01");
        let now = Utc::now();
        assert!(matches!(
            store.idempotency_try_begin(&k, 30_000, now).unwrap(),
            TryBeginResult::Acquired
        ));
        assert!(matches!(
            store.idempotency_try_begin(&k, 30_000, now).unwrap(),
            TryBeginResult::InProgress
        ));
    }

    #[test]
    fn commit_then_begin_returns_cached() {
        let store = WlcStore::open_temporary().unwrap();
        let k = key("dep-2026-07-28-userA-02");
        let now = Utc::now();
        store.idempotency_try_begin(&k, 30_000, now).unwrap();
        let outcome = Outcome::Success {
            tx_id: TransactionId::new(),
            balance_after: wlc_money::Money::parse("100.0000").unwrap(),
        };
        store
            .idempotency_commit(&k, outcome.clone(), 86_400, now)
            .unwrap();
        match store.idempotency_try_begin(&k, 30_000, now).unwrap() {
            TryBeginResult::Cached(cached) => assert_eq!(cached, outcome),
            other => panic!("expected Cached, got {other:?}"),
        }
    }

    #[test]
    fn abort_allows_retry_from_scratch() {
        let store = WlcStore::open_temporary().unwrap();
        let k = key("dep-2026-07-28-userA-03");
        let now = Utc::now();
        store.idempotency_try_begin(&k, 30_000, now).unwrap();
        store.idempotency_abort(&k).unwrap();
        assert!(matches!(
            store.idempotency_try_begin(&k, 30_000, now).unwrap(),
            TryBeginResult::Acquired
        ));
    }

    #[test]
    fn expired_lease_can_be_stolen() {
        let store = WlcStore::open_temporary().unwrap();
        let k = key("dep-2026-07-28-userA-04");
        let t0 = Utc::now();
        store.idempotency_try_begin(&k, 1_000, t0).unwrap();
        let later = t0 + Duration::seconds(5);
        assert!(matches!(
            store.idempotency_try_begin(&k, 1_000, later).unwrap(),
            TryBeginResult::Acquired
        ));
    }
}
