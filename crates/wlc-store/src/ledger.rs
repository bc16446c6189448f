use chrono::{DateTime, Utc};
use wlc_core::{AccountId, LedgerEntry, LedgerEntryId, TransactionId, WlcError};

use crate::accounts::AccountLockHandle;
use crate::db::{decode, encode, WlcStore};

fn account_key(account_id: AccountId, entry_id: LedgerEntryId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(account_id.inner().as_bytes());
    key[16..].copy_from_slice(entry_id.inner().as_bytes());
    key
}

fn tx_key(tx_id: TransactionId, entry_id: LedgerEntryId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(tx_id.inner().as_bytes());
    key[16..].copy_from_slice(entry_id.inner().as_bytes());
    key
}

impl WlcStore {
    /// Appends one or more ledger entries inside the same account-lock
    /// scope that produced the `balance_after` values they carry. The
    /// presence of `_handle` is the compile-time proof that the caller
    /// holds the account's row lock — the store itself never takes a
    /// lock here; no business logic may suspend between lock acquisition
    /// and commit.
    pub fn append_ledger_entries(
        &self,
        _handle: &AccountLockHandle,
        entries: &[LedgerEntry],
    ) -> Result<(), WlcError> {
        for entry in entries {
            let bytes = encode(entry)?;
            self.ledger
                .insert(entry.id.inner().as_bytes(), bytes)
                .map_err(|e| WlcError::Storage(e.to_string()))?;
            self.ledger_by_account
                .insert(
                    &account_key(entry.account_id, entry.id)[..],
                    entry.id.inner().as_bytes().to_vec(),
                )
                .map_err(|e| WlcError::Storage(e.to_string()))?;
            if let Some(tx_id) = entry.tx_id {
                self.ledger_by_tx
                    .insert(
                        &tx_key(tx_id, entry.id)[..],
                        entry.id.inner().as_bytes().to_vec(),
                    )
                    .map_err(|e| WlcError::Storage(e.to_string()))?;
            }
        }
        Ok(())
    }

    pub fn get_ledger_entry(
        &self,
        entry_id: LedgerEntryId,
    ) -> Result<Option<LedgerEntry>, WlcError> {
        match self
            .ledger
            .get(entry_id.inner().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn last_entry_for(
        &self,
        account_id: AccountId,
    ) -> Result<Option<LedgerEntry>, WlcError> {
        let mut prefix = [0u8; 16];
        prefix.copy_from_slice(account_id.inner().as_bytes());
        let last = self
            .ledger_by_account
            .scan_prefix(prefix)
            .last()
            .transpose()
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        match last {
            None => Ok(None),
            Some((_, id_bytes)) => {
                let id = entry_id_from_bytes(&id_bytes)?;
                self.get_ledger_entry(id)
            }
        }
    }

    /// Sums the signed contribution of every entry posted for `account_id`.
    /// Used only by the reconciler's integrity sweep and by tests — the
    /// engine never recomputes balances this way on the hot path.
    pub fn sum_signed(&self, account_id: AccountId) -> Result<i128, WlcError> {
        let mut total: i128 = 0;
        for entry in self.range(account_id, None, None)? {
            total += entry.signed_amount();
        }
        Ok(total)
    }

    pub fn find_by_tx(&self, tx_id: TransactionId) -> Result<Vec<LedgerEntry>, WlcError> {
        let mut prefix = [0u8; 16];
        prefix.copy_from_slice(tx_id.inner().as_bytes());
        let mut out = Vec::new();
        for item in self.ledger_by_tx.scan_prefix(prefix) {
            let (_, id_bytes) = item.map_err(|e| WlcError::Storage(e.to_string()))?;
            let id = entry_id_from_bytes(&id_bytes)?;
            if let Some(entry) = self.get_ledger_entry(id)? {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// Lexicographic range scan over one account's entries, since
    /// [`LedgerEntryId`] is time-sortable (C2). `from_time`/`to_time` of
    /// `None` mean unbounded; both ends are inclusive.
    pub fn range(
        &self,
        account_id: AccountId,
        from_time: Option<DateTime<Utc>>,
        to_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerEntry>, WlcError> {
        let mut prefix = [0u8; 16];
        prefix.copy_from_slice(account_id.inner().as_bytes());
        let mut out = Vec::new();
        for item in self.ledger_by_account.scan_prefix(prefix) {
            let (_, id_bytes) = item.map_err(|e| WlcError::Storage(e.to_string()))?;
            let id = entry_id_from_bytes(&id_bytes)?;
            if let Some(entry) = self.get_ledger_entry(id)? {
                if from_time.map(|f| entry.posted_at >= f).unwrap_or(true)
                    && to_time.map(|t| entry.posted_at <= t).unwrap_or(true)
                {
                    out.push(entry);
                }
            }
        }
        Ok(out)
    }

    /// Same as [`range`](Self::range) but supports the opaque pagination
    /// cursor used by `getLedger`: an encoded [`LedgerEntryId`] marking the
    /// last entry the caller already saw. Because ids sort by mint time,
    /// "after cursor" is just "id greater than cursor's id".
    pub fn range_after(
        &self,
        account_id: AccountId,
        from_time: Option<DateTime<Utc>>,
        to_time: Option<DateTime<Utc>>,
        cursor: Option<LedgerEntryId>,
        limit: usize,
    ) -> Result<(Vec<LedgerEntry>, Option<LedgerEntryId>), WlcError> {
        let mut entries = self.range(account_id, from_time, to_time)?;
        entries.sort_by_key(|e| e.id);
        let start = match cursor {
            None => 0,
            Some(c) => entries
                .iter()
                .position(|e| e.id > c)
                .unwrap_or(entries.len()),
        };
        let page: Vec<LedgerEntry> = entries[start..].iter().take(limit).cloned().collect();
        let next_cursor = if start + page.len() < entries.len() {
            page.last().map(|e| e.id)
        } else {
            None
        };
        Ok((page, next_cursor))
    }
}

fn entry_id_from_bytes(bytes: &[u8]) -> Result<LedgerEntryId, WlcError> {
    let mut arr = [0u8; 16];
    if bytes.len() != 16 {
        return Err(WlcError::Storage("corrupt ledger index entry".to_string()));
    }
    arr.copy_from_slice(bytes);
    Ok(LedgerEntryId::from_inner(wlc_idgen::Id::from_bytes(arr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlc_core::{Currency, LedgerSide, TransactionType, UserId};

    fn entry(account_id: AccountId, side: LedgerSide, amount: &str, balance_after: &str) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            account_id,
            user_id: UserId::new(),
            currency: Currency::Sweeps,
            tx_id: Some(TransactionId::new()),
            kind: TransactionType::Deposit,
            side,
            amount: wlc_money::Money::parse(amount).unwrap(),
            balance_after: wlc_money::Money::parse(balance_after).unwrap(),
            posted_at: Utc::now(),
            reversal_of: None,
            reason: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn sum_signed_reflects_credits_and_debits() {
        let store = WlcStore::open_temporary().unwrap();
        let account_id = AccountId::new();
        let handle = store.lock_account_for_update(account_id).await;
        let credit = entry(account_id, LedgerSide::Credit, "100.0000", "100.0000");
        let debit = entry(account_id, LedgerSide::Debit, "30.0000", "70.0000");
        store
            .append_ledger_entries(&handle, &[credit, debit])
            .unwrap();
        assert_eq!(store.sum_signed(account_id).unwrap(), 700_000);
    }

    #[tokio::test]
    async fn range_after_paginates_by_cursor() {
        let store = WlcStore::open_temporary().unwrap();
        let account_id = AccountId::new();
        let handle = store.lock_account_for_update(account_id).await;
        let mut last_id = None;
        for i in 0..5 {
            let e = entry(
                account_id,
                LedgerSide::Credit,
                "1.0000",
                &format!("{}.0000", i + 1),
            );
            last_id = Some(e.id);
            store.append_ledger_entries(&handle, &[e]).unwrap();
        }
        let (page1, cursor1) = store.range_after(account_id, None, None, None, 2).unwrap();
        assert_eq!(page1.len(), 2);
        assert!(cursor1.is_some());
        let (page2, _) = store
            .range_after(account_id, None, None, cursor1, 10)
            .unwrap();
        assert_eq!(page2.len(), 3);
        assert_eq!(page2.last().unwrap().id, last_id.unwrap());
    }
}
