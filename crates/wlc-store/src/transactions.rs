use chrono::{DateTime, Utc};
use wlc_core::{AccountId, IdempotencyKey, Transaction, TransactionId, TransactionStatus, WlcError};

use crate::db::{decode, encode, WlcStore};

impl WlcStore {
    /// Transactions are not mutated under the account lock — only the
    /// `Account` balance triple and the ledger are. A transaction record
    /// is written once when it reaches a terminal-for-now state (failed,
    /// completed, awaitingApproval) and again when an approval workflow
    /// later resolves it.
    pub fn put_transaction(&self, tx: &Transaction) -> Result<(), WlcError> {
        self.transactions
            .insert(tx.id.inner().as_bytes(), encode(tx)?)
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        self.transactions_by_idempotency_key
            .insert(
                tx.idempotency_key.as_str().as_bytes(),
                tx.id.inner().as_bytes().to_vec(),
            )
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_transaction(&self, tx_id: TransactionId) -> Result<Option<Transaction>, WlcError> {
        match self
            .transactions
            .get(tx_id.inner().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_transaction_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Transaction>, WlcError> {
        let idx = self
            .transactions_by_idempotency_key
            .get(key.as_str().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        match idx {
            None => Ok(None),
            Some(id_bytes) => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&id_bytes);
                let tx_id = TransactionId::from_inner(wlc_idgen::Id::from_bytes(arr));
                self.get_transaction(tx_id)
            }
        }
    }

    /// Transactions created more than `threshold` ago and still stuck in
    /// `pending`/`processing`. Used by the reconciler's stale-transaction
    /// sweep; this is a full scan, acceptable at the scale this store is
    /// designed for (no secondary index on status — statuses churn too
    /// often to be worth indexing).
    pub fn find_stale_transactions(
        &self,
        now: DateTime<Utc>,
        threshold: chrono::Duration,
    ) -> Result<Vec<Transaction>, WlcError> {
        let mut out = Vec::new();
        for item in self.transactions.iter() {
            let (_, bytes) = item.map_err(|e| WlcError::Storage(e.to_string()))?;
            let tx: Transaction = decode(&bytes)?;
            let stuck = matches!(
                tx.status,
                TransactionStatus::Pending | TransactionStatus::Processing
            );
            if stuck && now - tx.created_at > threshold {
                out.push(tx);
            }
        }
        Ok(out)
    }

    /// All transactions recorded for one account, newest first. Used by
    /// the engine to compute rolling frequency/caps context and by tests.
    pub fn transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, WlcError> {
        let mut out = Vec::new();
        for item in self.transactions.iter() {
            let (_, bytes) = item.map_err(|e| WlcError::Storage(e.to_string()))?;
            let tx: Transaction = decode(&bytes)?;
            if tx.account_id == account_id {
                out.push(tx);
            }
        }
        out.sort_by_key(|t| t.created_at);
        out.reverse();
        Ok(out)
    }
}
