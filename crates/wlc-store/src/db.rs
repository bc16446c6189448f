use std::path::Path;

use sled::Tree;
use wlc_core::WlcError;

use crate::accounts::AccountLockRegistry;

/// Durable key/value backing for the idempotency store, account store, and
/// ledger. One `sled::Db` per node, one named `Tree` per entity family —
/// the same shape as a conventional table-per-entity relational schema,
/// but embedded and transactional at the row level via sled's own
/// per-tree and per-key operations.
pub struct WlcStore {
    pub(crate) db: sled::Db,
    pub(crate) accounts: Tree,
    pub(crate) accounts_by_user_currency: Tree,
    pub(crate) transactions: Tree,
    pub(crate) transactions_by_idempotency_key: Tree,
    pub(crate) ledger: Tree,
    pub(crate) ledger_by_account: Tree,
    pub(crate) ledger_by_tx: Tree,
    pub(crate) approvals: Tree,
    pub(crate) approvals_by_tx: Tree,
    pub(crate) idempotency: Tree,
    pub(crate) audit: Tree,
    pub(crate) users: Tree,
    pub(crate) account_locks: AccountLockRegistry,
}

impl WlcStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WlcError> {
        let db = sled::open(path).map_err(|e| WlcError::Storage(e.to_string()))?;
        Self::from_db(db)
    }

    /// Opens an ephemeral, in-memory store. Used by tests and by the
    /// reconciler's own scenario tests.
    pub fn open_temporary() -> Result<Self, WlcError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, WlcError> {
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| WlcError::Storage(e.to_string()))
        };
        Ok(WlcStore {
            accounts: open_tree("accounts")?,
            accounts_by_user_currency: open_tree("accounts_by_user_currency")?,
            transactions: open_tree("transactions")?,
            transactions_by_idempotency_key: open_tree("transactions_by_idempotency_key")?,
            ledger: open_tree("ledger")?,
            ledger_by_account: open_tree("ledger_by_account")?,
            ledger_by_tx: open_tree("ledger_by_tx")?,
            approvals: open_tree("approvals")?,
            approvals_by_tx: open_tree("approvals_by_tx")?,
            idempotency: open_tree("idempotency")?,
            audit: open_tree("audit")?,
            users: open_tree("users")?,
            account_locks: AccountLockRegistry::default(),
            db,
        })
    }

    pub fn flush(&self) -> Result<(), WlcError> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| WlcError::Storage(e.to_string()))
    }
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, WlcError> {
    bincode::serialize(value).map_err(|e| WlcError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, WlcError> {
    bincode::deserialize(bytes).map_err(|e| WlcError::Serialization(e.to_string()))
}
