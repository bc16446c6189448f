//! The operation-semantics dispatch table: a small pure mapping from
//! `(op)` to which of the account's three fields move and which way, plus
//! whether a ledger entry is posted and on which side. Kept as data, not
//! a branch-per-operation `match` scattered through the pipeline, and
//! definitely not a class hierarchy per operation.

use wlc_core::LedgerSide;
use wlc_money::{Money, MoneyError};

/// One of the six canonical money movements. `Reverse` is handled
/// separately in `engine.rs` because its direction depends on the
/// original entry's side, not on a fixed table row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineOp {
    Credit,
    Debit,
    Hold,
    ReleaseHold,
    ConfirmHold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delta {
    Add,
    Sub,
    None,
}

#[derive(Clone, Copy, Debug)]
pub struct OpEffect {
    pub balance: Delta,
    pub available: Delta,
    pub pending: Delta,
    pub ledger_side: Option<LedgerSide>,
}

pub fn op_effect(op: EngineOp) -> OpEffect {
    match op {
        EngineOp::Credit => OpEffect {
            balance: Delta::Add,
            available: Delta::Add,
            pending: Delta::None,
            ledger_side: Some(LedgerSide::Credit),
        },
        EngineOp::Debit => OpEffect {
            balance: Delta::Sub,
            available: Delta::Sub,
            pending: Delta::None,
            ledger_side: Some(LedgerSide::Debit),
        },
        EngineOp::Hold => OpEffect {
            balance: Delta::None,
            available: Delta::Sub,
            pending: Delta::Add,
            ledger_side: None,
        },
        EngineOp::ReleaseHold => OpEffect {
            balance: Delta::None,
            available: Delta::Add,
            pending: Delta::Sub,
            ledger_side: None,
        },
        EngineOp::ConfirmHold => OpEffect {
            balance: Delta::Sub,
            available: Delta::None,
            pending: Delta::Sub,
            ledger_side: Some(LedgerSide::Debit),
        },
    }
}

/// Applies one delta to a single field, returning the error that should
/// surface to the caller as `insufficientBalance` on subtraction
/// underflow. `Delta::None` is a no-op that always succeeds.
pub fn apply_delta(field: Money, delta: Delta, amount: Money) -> Result<Money, MoneyError> {
    match delta {
        Delta::Add => field.checked_add(amount),
        Delta::Sub => field.checked_sub(amount),
        Delta::None => Ok(field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_moves_available_to_pending_without_touching_balance() {
        let effect = op_effect(EngineOp::Hold);
        assert_eq!(effect.balance, Delta::None);
        assert_eq!(effect.available, Delta::Sub);
        assert_eq!(effect.pending, Delta::Add);
        assert!(effect.ledger_side.is_none());
    }

    #[test]
    fn confirm_hold_debits_balance_and_pending_only() {
        let effect = op_effect(EngineOp::ConfirmHold);
        assert_eq!(effect.balance, Delta::Sub);
        assert_eq!(effect.available, Delta::None);
        assert_eq!(effect.pending, Delta::Sub);
        assert_eq!(effect.ledger_side, Some(LedgerSide::Debit));
    }
}
