use serde::{Deserialize, Serialize};
use wlc_money::Money;

use crate::currency::Currency;
use crate::ids::LedgerEntryId;
use crate::ledger::LedgerEntry;

/// One row of `getBalances`'s response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceView {
    pub currency: Currency,
    pub balance: Money,
    pub available: Money,
    pub pending: Money,
    pub withdrawable: bool,
}

/// A page of `getLedger`'s response. `next_cursor` is `None` once the
/// caller has reached the end of the requested time range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerPage {
    pub entries: Vec<LedgerEntry>,
    pub next_cursor: Option<LedgerEntryId>,
}
