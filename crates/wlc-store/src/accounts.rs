use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use wlc_core::{Account, AccountId, AccountStatus, Currency, UserId, WlcError};

use crate::db::{decode, encode, WlcStore};

fn user_currency_key(user_id: UserId, currency: Currency) -> Vec<u8> {
    let mut key = user_id.inner().as_bytes().to_vec();
    key.push(match currency {
        Currency::Gold => 0,
        Currency::Sweeps => 1,
    });
    key
}

/// A held account row lock. Mutations are rejected at the store boundary
/// unless the caller presents one of these, obtained from
/// [`WlcStore::lock_account_for_update`].
pub struct AccountLockHandle {
    pub account_id: AccountId,
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
pub struct AccountLockRegistry {
    locks: StdMutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

impl AccountLockRegistry {
    fn entry(&self, account_id: AccountId) -> Arc<AsyncMutex<()>> {
        let mut map = self.locks.lock().expect("account lock registry poisoned");
        map.entry(account_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

impl WlcStore {
    pub fn put_account(&self, account: &Account) -> Result<(), WlcError> {
        let key = account.id.inner().as_bytes().to_vec();
        self.accounts
            .insert(key, encode(account)?)
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        self.accounts_by_user_currency
            .insert(
                user_currency_key(account.user_id, account.currency),
                account.id.inner().as_bytes().to_vec(),
            )
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_account(&self, account_id: AccountId) -> Result<Option<Account>, WlcError> {
        match self
            .accounts
            .get(account_id.inner().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_account_by_user_currency(
        &self,
        user_id: UserId,
        currency: Currency,
    ) -> Result<Option<Account>, WlcError> {
        let idx = self
            .accounts_by_user_currency
            .get(user_currency_key(user_id, currency))
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        match idx {
            None => Ok(None),
            Some(id_bytes) => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&id_bytes);
                let account_id = AccountId::from_inner(wlc_idgen::Id::from_bytes(arr));
                self.get_account(account_id)
            }
        }
    }

    /// Acquires the per-account mutual-exclusion lock used by the wallet
    /// engine's pipeline. Held for the duration of one pipeline run; no
    /// suspension point occurs between acquiring it and committing.
    pub async fn lock_account_for_update(&self, account_id: AccountId) -> AccountLockHandle {
        let mutex = self.account_locks.entry(account_id);
        let guard = mutex.lock_owned().await;
        debug!(%account_id, "account lock acquired");
        AccountLockHandle {
            account_id,
            _guard: guard,
        }
    }

    pub fn mutate_account(
        &self,
        handle: &AccountLockHandle,
        mut f: impl FnMut(&mut Account),
    ) -> Result<Account, WlcError> {
        let mut account = self
            .get_account(handle.account_id)?
            .ok_or(WlcError::AccountNotFound(handle.account_id))?;
        f(&mut account);
        self.put_account(&account)?;
        Ok(account)
    }

    pub fn freeze_account(
        &self,
        handle: &AccountLockHandle,
        until: Option<DateTime<Utc>>,
        reason: impl Into<String>,
    ) -> Result<Account, WlcError> {
        let reason = reason.into();
        self.mutate_account(handle, |a| {
            a.status = AccountStatus::Frozen;
            a.frozen_until = until;
            a.frozen_reason = Some(reason.clone());
        })
    }

    pub fn unfreeze_account(
        &self,
        handle: &AccountLockHandle,
        _reason: impl Into<String>,
    ) -> Result<Account, WlcError> {
        self.mutate_account(handle, |a| {
            a.status = AccountStatus::Active;
            a.frozen_until = None;
            a.frozen_reason = None;
        })
    }

    /// Every account in the store. Full scan — used by the reconciler's
    /// integrity sweep, which by nature has to visit every row.
    pub fn all_accounts(&self) -> Result<Vec<Account>, WlcError> {
        let mut out = Vec::new();
        for item in self.accounts.iter() {
            let (_, bytes) = item.map_err(|e| WlcError::Storage(e.to_string()))?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// Batch reset of daily totals for every account whose
    /// `daily_reset_date` precedes `today`. Idempotent: accounts already
    /// reset for `today` are skipped.
    pub fn reset_daily_totals(&self, today: chrono::NaiveDate) -> Result<u64, WlcError> {
        let mut reset_count = 0u64;
        for item in self.accounts.iter() {
            let (_, bytes) = item.map_err(|e| WlcError::Storage(e.to_string()))?;
            let mut account: Account = decode(&bytes)?;
            if account.daily_reset_date < today {
                account.daily_deposit_total = wlc_money::Money::ZERO;
                account.daily_withdrawal_total = wlc_money::Money::ZERO;
                account.daily_reset_date = today;
                self.put_account(&account)?;
                reset_count += 1;
            }
        }
        Ok(reset_count)
    }
}
