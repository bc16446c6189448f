use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use wlc_money::Money;

use crate::currency::Currency;
use crate::ids::{AccountId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Frozen,
    Suspended,
    Closed,
}

/// A user's balance triple for one currency. Exactly one `Account` exists
/// per `(user_id, currency)`. Only the wallet engine mutates this, and only
/// while holding the account's row lock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub currency: Currency,
    pub balance: Money,
    pub available: Money,
    pub pending: Money,
    pub status: AccountStatus,
    pub frozen_until: Option<DateTime<Utc>>,
    pub frozen_reason: Option<String>,
    pub daily_deposit_total: Money,
    pub daily_withdrawal_total: Money,
    pub daily_reset_date: NaiveDate,
    pub last_tx_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(id: AccountId, user_id: UserId, currency: Currency, today: NaiveDate) -> Self {
        Account {
            id,
            user_id,
            currency,
            balance: Money::ZERO,
            available: Money::ZERO,
            pending: Money::ZERO,
            status: AccountStatus::Active,
            frozen_until: None,
            frozen_reason: None,
            daily_deposit_total: Money::ZERO,
            daily_withdrawal_total: Money::ZERO,
            daily_reset_date: today,
            last_tx_at: None,
        }
    }

    /// `balance == available + pending` must hold after every mutation;
    /// this is checked in tests and by the reconciler's integrity sweep,
    /// never silently repaired in production code.
    pub fn invariant_holds(&self) -> bool {
        match self.available.checked_add(self.pending) {
            Ok(sum) => sum == self.balance,
            Err(_) => false,
        }
    }

    pub fn is_frozen_at(&self, now: DateTime<Utc>) -> bool {
        match (self.status, self.frozen_until) {
            (AccountStatus::Frozen, Some(until)) => now < until,
            (AccountStatus::Frozen, None) => true,
            _ => false,
        }
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, AccountStatus::Active) && !self.is_frozen_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc() -> Account {
        Account::new(
            AccountId::new(),
            UserId::new(),
            Currency::Sweeps,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
    }

    #[test]
    fn fresh_account_satisfies_balance_invariant() {
        assert!(acc().invariant_holds());
    }

    #[test]
    fn detects_broken_invariant() {
        let mut a = acc();
        a.balance = Money::parse("10.0000").unwrap();
        assert!(!a.invariant_holds());
    }
}
