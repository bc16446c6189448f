use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AuditEntryId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Append-only record of a policy decision or engine-internal anomaly.
/// Write-only from the WLC's own perspective; downstream consumers read
/// and resolve these externally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAuditEntry {
    pub id: AuditEntryId,
    pub user_id: Option<UserId>,
    pub event: String,
    pub severity: Severity,
    pub details: String,
    pub occurred_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
}
