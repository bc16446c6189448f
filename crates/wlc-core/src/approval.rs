use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ApprovalWorkflowId, TransactionId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalKind {
    Dual,
    Triple,
    ComplianceReview,
}

impl ApprovalKind {
    pub fn required_approvals(&self) -> u32 {
        match self {
            ApprovalKind::Dual => 2,
            ApprovalKind::Triple => 3,
            ApprovalKind::ComplianceReview => 1,
        }
    }

    /// Default time a workflow of this kind stays open before the
    /// reconciler expires it. Overridable via `WlcConfig`.
    pub fn default_expiry_secs(&self) -> i64 {
        match self {
            ApprovalKind::Dual => 24 * 3600,
            ApprovalKind::Triple => 48 * 3600,
            ApprovalKind::ComplianceReview => 72 * 3600,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    Pending,
    InProgress,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl ApprovalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApprovalState::Approved
                | ApprovalState::Rejected
                | ApprovalState::Expired
                | ApprovalState::Cancelled
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("workflow {0} has already reached a terminal state")]
    AlreadyTerminal(ApprovalWorkflowId),
    #[error("the initiator may not approve their own workflow")]
    InitiatorCannotApprove,
    #[error("approver has already submitted a decision on this workflow")]
    DuplicateApprover,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub id: ApprovalWorkflowId,
    pub tx_id: TransactionId,
    pub kind: ApprovalKind,
    pub required_approvals: u32,
    pub approvers: Vec<UserId>,
    pub initiated_by: UserId,
    pub state: ApprovalState,
    pub high_priority: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ApprovalWorkflow {
    pub fn new(
        id: ApprovalWorkflowId,
        tx_id: TransactionId,
        kind: ApprovalKind,
        initiated_by: UserId,
        now: DateTime<Utc>,
        expiry_secs: i64,
    ) -> Self {
        ApprovalWorkflow {
            id,
            tx_id,
            required_approvals: kind.required_approvals(),
            kind,
            approvers: Vec::new(),
            initiated_by,
            state: ApprovalState::Pending,
            high_priority: false,
            expires_at: now + chrono::Duration::seconds(expiry_secs),
            created_at: now,
            completed_at: None,
        }
    }

    pub fn received_approvals(&self) -> u32 {
        self.approvers.len() as u32
    }

    /// Records one approver's approval. Transitions to `Approved` once the
    /// required count is reached; otherwise moves to `InProgress`.
    pub fn submit_approval(
        &mut self,
        approver: UserId,
        now: DateTime<Utc>,
    ) -> Result<ApprovalState, ApprovalError> {
        if self.state.is_terminal() {
            return Err(ApprovalError::AlreadyTerminal(self.id));
        }
        if approver == self.initiated_by {
            return Err(ApprovalError::InitiatorCannotApprove);
        }
        if self.approvers.contains(&approver) {
            return Err(ApprovalError::DuplicateApprover);
        }
        self.approvers.push(approver);
        if self.received_approvals() >= self.required_approvals {
            self.state = ApprovalState::Approved;
            self.completed_at = Some(now);
        } else {
            self.state = ApprovalState::InProgress;
        }
        Ok(self.state)
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), ApprovalError> {
        if self.state.is_terminal() {
            return Err(ApprovalError::AlreadyTerminal(self.id));
        }
        self.state = ApprovalState::Rejected;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), ApprovalError> {
        if self.state.is_terminal() {
            return Err(ApprovalError::AlreadyTerminal(self.id));
        }
        self.state = ApprovalState::Cancelled;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), ApprovalError> {
        if self.state.is_terminal() {
            return Err(ApprovalError::AlreadyTerminal(self.id));
        }
        self.state = ApprovalState::Expired;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Extends the deadline and raises priority without changing `state`.
    /// Never valid on a workflow that has already reached a terminal state.
    pub fn escalate(&mut self, extra_secs: i64) -> Result<(), ApprovalError> {
        if self.state.is_terminal() {
            return Err(ApprovalError::AlreadyTerminal(self.id));
        }
        self.high_priority = true;
        self.expires_at = self.expires_at + chrono::Duration::seconds(extra_secs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_workflow(kind: ApprovalKind) -> ApprovalWorkflow {
        ApprovalWorkflow::new(
            ApprovalWorkflowId::new(),
            TransactionId::new(),
            kind,
            UserId::new(),
            Utc::now(),
            3600,
        )
    }

    #[test]
    fn rejects_initiator_approving_own_workflow() {
        let mut w = new_workflow(ApprovalKind::Dual);
        let err = w.submit_approval(w.initiated_by, Utc::now()).unwrap_err();
        assert_eq!(err, ApprovalError::InitiatorCannotApprove);
    }

    #[test]
    fn rejects_duplicate_approver() {
        let mut w = new_workflow(ApprovalKind::Triple);
        let approver = UserId::new();
        w.submit_approval(approver, Utc::now()).unwrap();
        let err = w.submit_approval(approver, Utc::now()).unwrap_err();
        assert_eq!(err, ApprovalError::DuplicateApprover);
    }

    #[test]
    fn reaches_approved_once_threshold_met() {
        let mut w = new_workflow(ApprovalKind::Dual);
        let state1 = w.submit_approval(UserId::new(), Utc::now()).unwrap();
        assert_eq!(state1, ApprovalState::InProgress);
        let state2 = w.submit_approval(UserId::new(), Utc::now()).unwrap();
        assert_eq!(state2, ApprovalState::Approved);
    }

    #[test]
    fn terminal_state_rejects_further_transitions() {
        let mut w = new_workflow(ApprovalKind::ComplianceReview);
        w.submit_approval(UserId::new(), Utc::now()).unwrap();
        assert_eq!(w.state, ApprovalState::Approved);
        assert!(w.reject(Utc::now()).is_err());
        assert!(w.escalate(60).is_err());
    }
}
