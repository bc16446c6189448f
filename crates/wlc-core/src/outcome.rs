use serde::{Deserialize, Serialize};
use wlc_money::Money;

use crate::ids::{ApprovalWorkflowId, TransactionId};

/// The tagged result every external-facing wallet engine operation
/// returns. A `WlcError` is only ever returned for conditions the caller
/// cannot meaningfully branch on (bad input shape, storage failure); every
/// normal business result — including denials — is an `Outcome`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success {
        tx_id: TransactionId,
        balance_after: Money,
    },
    Duplicate {
        original: Box<Outcome>,
    },
    PendingApproval {
        workflow_id: ApprovalWorkflowId,
    },
    Denied {
        code: String,
        message: String,
    },
    RetryableBusy,
    Internal {
        message: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn denied(code: impl Into<String>, message: impl Into<String>) -> Self {
        Outcome::Denied {
            code: code.into(),
            message: message.into(),
        }
    }
}
