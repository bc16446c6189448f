use chrono::{DateTime, Utc};
use wlc_core::{ApprovalWorkflow, ApprovalWorkflowId, TransactionId, WlcError};

use crate::db::{decode, encode, WlcStore};

impl WlcStore {
    pub fn put_approval_workflow(&self, workflow: &ApprovalWorkflow) -> Result<(), WlcError> {
        self.approvals
            .insert(workflow.id.inner().as_bytes(), encode(workflow)?)
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        self.approvals_by_tx
            .insert(
                workflow.tx_id.inner().as_bytes(),
                workflow.id.inner().as_bytes().to_vec(),
            )
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_approval_workflow(
        &self,
        workflow_id: ApprovalWorkflowId,
    ) -> Result<Option<ApprovalWorkflow>, WlcError> {
        match self
            .approvals
            .get(workflow_id.inner().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_approval_workflow_by_tx(
        &self,
        tx_id: TransactionId,
    ) -> Result<Option<ApprovalWorkflow>, WlcError> {
        let idx = self
            .approvals_by_tx
            .get(tx_id.inner().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        match idx {
            None => Ok(None),
            Some(id_bytes) => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&id_bytes);
                let workflow_id =
                    ApprovalWorkflowId::from_inner(wlc_idgen::Id::from_bytes(arr));
                self.get_approval_workflow(workflow_id)
            }
        }
    }

    /// Every workflow not yet in a terminal state whose deadline has
    /// passed. Full scan: approvals are low-volume compared to ledger
    /// entries, so no secondary expiry index is warranted.
    pub fn find_expired_workflows(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApprovalWorkflow>, WlcError> {
        let mut out = Vec::new();
        for item in self.approvals.iter() {
            let (_, bytes) = item.map_err(|e| WlcError::Storage(e.to_string()))?;
            let workflow: ApprovalWorkflow = decode(&bytes)?;
            if !workflow.state.is_terminal() && workflow.expires_at < now {
                out.push(workflow);
            }
        }
        Ok(out)
    }
}
