use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wlc_money::Money;

use crate::currency::Currency;
use crate::ids::{AccountId, LedgerEntryId, TransactionId, UserId};
use crate::transaction::TransactionType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerSide {
    Debit,
    Credit,
}

/// One immutable line in the double-entry journal. Never mutated after
/// creation; reversals are new entries that point back via `reversal_of`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub account_id: AccountId,
    pub user_id: UserId,
    pub currency: Currency,
    pub tx_id: Option<TransactionId>,
    pub kind: TransactionType,
    pub side: LedgerSide,
    pub amount: Money,
    pub balance_after: Money,
    pub posted_at: DateTime<Utc>,
    pub reversal_of: Option<LedgerEntryId>,
    pub reason: String,
}

impl LedgerEntry {
    /// Signed contribution to a running balance: credits add, debits
    /// subtract. Used only by the reconciler's integrity sweep.
    pub fn signed_amount(&self) -> i128 {
        let raw = self.amount.ten_thousandths() as i128;
        match self.side {
            LedgerSide::Credit => raw,
            LedgerSide::Debit => -raw,
        }
    }
}
