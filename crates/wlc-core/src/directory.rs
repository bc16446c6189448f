use crate::error::WlcError;
use crate::ids::UserId;
use crate::user::User;

/// A role an approver may hold, checked by the approval workflow before
/// accepting a submission. Roles are assigned externally (the same place
/// that manages KYC documents and auth sessions); the WLC only reads
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ApproverRole {
    /// May approve dual/triple-approval workflows.
    Standard,
    /// May approve dual/triple workflows and compliance-review workflows.
    ComplianceOfficer,
}

impl ApproverRole {
    pub fn satisfies(&self, kind: crate::approval::ApprovalKind) -> bool {
        match kind {
            crate::approval::ApprovalKind::Dual | crate::approval::ApprovalKind::Triple => true,
            crate::approval::ApprovalKind::ComplianceReview => {
                matches!(self, ApproverRole::ComplianceOfficer)
            }
        }
    }
}

/// External collaborator boundary: the WLC never owns user records, only
/// reads them. A production deployment backs this with whatever store the
/// auth/KYC system already uses; `wlc-store` ships an in-memory/`sled`
/// implementation only so the demonstration binary and tests have
/// something to read from.
pub trait UserDirectory: Send + Sync {
    fn get_user(&self, user_id: UserId) -> Result<User, WlcError>;
}

/// External collaborator boundary for approver role lookups, kept
/// separate from [`UserDirectory`] because role assignment (who may sign
/// off on a compliance review) is typically a distinct admin system.
pub trait ApproverDirectory: Send + Sync {
    fn role_of(&self, user_id: UserId) -> Result<ApproverRole, WlcError>;
}
