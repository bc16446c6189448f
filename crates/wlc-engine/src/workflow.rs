//! C8 Approval Workflow operations: submitting an approver's decision,
//! rejecting, and escalating. Each transition that resolves a workflow
//! (approved/rejected/expired/cancelled) triggers the matching
//! compensating action on the hold staged in `stage_approval` —
//! `confirm_hold` on approval, `release_hold` on anything else — and that
//! compensation is itself idempotent, keyed off `workflowId + the state it
//! is compensating for` so a retried transition never double-applies it.

use chrono::Utc;
use tracing::info;
use wlc_core::{ApprovalState, Outcome, Severity, WlcError};

use crate::engine::WalletEngine;

/// Builds the idempotency key a workflow's compensating action commits
/// under. Public so the reconciler's expiry sweep can drive the same
/// `release_hold` call under the same key when it expires a workflow
/// outside of `submit_approval`'s lazy check.
pub fn compensation_key(workflow_id: wlc_core::ApprovalWorkflowId, state: &str) -> String {
    // IdempotencyKey requires 16-255 chars; the 26-char sortable id alone
    // already clears that, the prefix just keeps it legible in logs.
    format!("wf-{workflow_id}-{state}")
}

impl WalletEngine {
    /// Records one approver's decision. Returns `Outcome::PendingApproval`
    /// again while more approvals are still required, `Outcome::Success`
    /// once the workflow reaches `Approved` and the hold has been
    /// confirmed into a completed movement.
    pub async fn submit_approval(
        &self,
        workflow_id: wlc_core::ApprovalWorkflowId,
        approver_id: wlc_core::UserId,
    ) -> Result<Outcome, WlcError> {
        let mut workflow = self
            .store
            .get_approval_workflow(workflow_id)?
            .ok_or(WlcError::WorkflowNotFound(workflow_id))?;
        if workflow.state.is_terminal() {
            return Err(WlcError::WorkflowAlreadyCompleted(workflow_id));
        }

        let role = self.directory.role_of(approver_id)?;
        if !role.satisfies(workflow.kind) {
            return Err(WlcError::ApproverNotQualified);
        }

        let now = Utc::now();
        if now >= workflow.expires_at {
            workflow.expire(now)?;
            self.store.put_approval_workflow(&workflow)?;
            self.compensate_release(&workflow, "expired").await?;
            return Ok(Outcome::denied("workflowExpired", "this approval workflow has expired"));
        }

        let new_state = workflow.submit_approval(approver_id, now)?;
        self.store.put_approval_workflow(&workflow)?;

        info!(workflow_id = %workflow_id, approver_id = %approver_id, state = ?new_state, "approval submitted");

        match new_state {
            ApprovalState::Approved => {
                self.compensate_confirm(&workflow).await
            }
            _ => Ok(Outcome::PendingApproval { workflow_id }),
        }
    }

    /// Rejects a workflow outright. Any approver qualified for the
    /// workflow's kind may reject it; a single rejection is terminal
    /// (unlike approval, which accumulates).
    pub async fn reject_approval(
        &self,
        workflow_id: wlc_core::ApprovalWorkflowId,
        approver_id: wlc_core::UserId,
        reason: &str,
    ) -> Result<Outcome, WlcError> {
        let mut workflow = self
            .store
            .get_approval_workflow(workflow_id)?
            .ok_or(WlcError::WorkflowNotFound(workflow_id))?;
        let role = self.directory.role_of(approver_id)?;
        if !role.satisfies(workflow.kind) {
            return Err(WlcError::ApproverNotQualified);
        }

        let now = Utc::now();
        workflow.reject(now)?;
        self.store.put_approval_workflow(&workflow)?;

        self.audit.record(
            Some(workflow.initiated_by),
            "approvalRejected",
            Severity::Medium,
            format!("workflow {workflow_id} rejected by {approver_id}: {reason}"),
        )?;

        self.compensate_release(&workflow, "rejected").await
    }

    /// Escalates a workflow still in progress: marks it high priority and
    /// pushes its deadline back. Used when a reconciler sweep or an
    /// operator decides a pending review needs more runway before it
    /// expires out from under the requester.
    pub async fn escalate_approval(
        &self,
        workflow_id: wlc_core::ApprovalWorkflowId,
        extra_secs: i64,
    ) -> Result<(), WlcError> {
        let mut workflow = self
            .store
            .get_approval_workflow(workflow_id)?
            .ok_or(WlcError::WorkflowNotFound(workflow_id))?;
        workflow.escalate(extra_secs)?;
        self.store.put_approval_workflow(&workflow)?;
        self.audit.record(
            Some(workflow.initiated_by),
            "approvalEscalated",
            Severity::Low,
            format!("workflow {workflow_id} escalated, deadline extended by {extra_secs}s"),
        )?;
        Ok(())
    }

    /// Cancels a workflow before any approver has acted, e.g. the
    /// requester withdrawing the request. Also releases the hold.
    pub async fn cancel_approval(
        &self,
        workflow_id: wlc_core::ApprovalWorkflowId,
    ) -> Result<Outcome, WlcError> {
        let mut workflow = self
            .store
            .get_approval_workflow(workflow_id)?
            .ok_or(WlcError::WorkflowNotFound(workflow_id))?;
        let now = Utc::now();
        workflow.cancel(now)?;
        self.store.put_approval_workflow(&workflow)?;
        self.compensate_release(&workflow, "cancelled").await
    }

    async fn compensate_confirm(&self, workflow: &wlc_core::ApprovalWorkflow) -> Result<Outcome, WlcError> {
        let key = compensation_key(workflow.id, "approved");
        self.confirm_hold(workflow.tx_id, &key).await
    }

    async fn compensate_release(
        &self,
        workflow: &wlc_core::ApprovalWorkflow,
        state_label: &str,
    ) -> Result<Outcome, WlcError> {
        let key = compensation_key(workflow.id, state_label);
        self.release_hold(workflow.tx_id, &key).await
    }
}
