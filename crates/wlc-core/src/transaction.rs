use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wlc_money::Money;

use crate::currency::Currency;
use crate::ids::{AccountId, IdempotencyKey, TransactionId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Bet,
    Win,
    Bonus,
    Adjustment,
    Reversal,
}

impl TransactionType {
    /// Whether this transaction type represents a debit (money leaving the
    /// account's `available`/`balance`) by default. Engine operations pass
    /// their own direction explicitly; this is informational.
    pub fn is_debit_like(&self) -> bool {
        matches!(self, TransactionType::Withdrawal | TransactionType::Bet)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    AwaitingApproval,
    Approved,
    Rejected,
    Reversed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Failed
                | TransactionStatus::Cancelled
                | TransactionStatus::Rejected
                | TransactionStatus::Reversed
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub kind: TransactionType,
    pub currency: Currency,
    pub amount: Money,
    pub status: TransactionStatus,
    pub idempotency_key: IdempotencyKey,
    pub balance_before: Option<Money>,
    pub balance_after: Option<Money>,
    pub related_tx_id: Option<TransactionId>,
    pub approval_required: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
