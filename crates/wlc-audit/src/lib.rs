//! Append-only compliance audit journal (C9). The WLC only ever writes
//! here; severity drives which events a caller surfaces through
//! `tracing` so a downstream alerting pipeline can pick them up, but
//! resolution/retention is someone else's job — this crate exposes just
//! enough to append, read, and mark an entry resolved.

use chrono::Utc;
use tracing::{error, info, warn};
use wlc_core::{AuditEntryId, ComplianceAuditEntry, Severity, UserId, WlcError};
use wlc_store::WlcStore;

/// Thin façade over the audit tree. Holds no state of its own beyond the
/// store handle — safe to clone cheaply and pass down the engine's
/// pipeline as an explicit observer value rather than an ambient/global
/// interceptor.
#[derive(Clone)]
pub struct AuditLog {
    store: std::sync::Arc<WlcStore>,
}

impl AuditLog {
    pub fn new(store: std::sync::Arc<WlcStore>) -> Self {
        AuditLog { store }
    }

    /// Records one audit entry and emits a `tracing` event at a level
    /// matched to severity — `info!` for low/medium, `warn!` for high,
    /// `error!` for critical — so an operator tailing logs sees the
    /// signal without needing to poll the audit tree.
    pub fn record(
        &self,
        user_id: Option<UserId>,
        event: impl Into<String>,
        severity: Severity,
        details: impl Into<String>,
    ) -> Result<ComplianceAuditEntry, WlcError> {
        let event = event.into();
        let details = details.into();
        let entry = ComplianceAuditEntry {
            id: AuditEntryId::new(),
            user_id,
            event: event.clone(),
            severity,
            details: details.clone(),
            occurred_at: Utc::now(),
            resolved_at: None,
            resolution: None,
        };
        self.store.append_audit_entry(&entry)?;
        match severity {
            Severity::Low | Severity::Medium => info!(%event, %details, ?severity, "audit event"),
            Severity::High => warn!(%event, %details, ?severity, "audit event"),
            Severity::Critical => error!(%event, %details, ?severity, "audit event"),
        }
        Ok(entry)
    }

    pub fn resolve(
        &self,
        id: AuditEntryId,
        resolution: impl Into<String>,
    ) -> Result<ComplianceAuditEntry, WlcError> {
        let mut entry = self
            .store
            .get_audit_entry(id)?
            .ok_or_else(|| WlcError::Other(format!("audit entry {id} not found")))?;
        entry.resolved_at = Some(Utc::now());
        entry.resolution = Some(resolution.into());
        self.store.put_audit_entry(&entry)?;
        Ok(entry)
    }

    pub fn list(&self) -> Result<Vec<ComplianceAuditEntry>, WlcError> {
        self.store.list_audit_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_resolve_round_trips() {
        let store = std::sync::Arc::new(WlcStore::open_temporary().unwrap());
        let log = AuditLog::new(store);
        let entry = log
            .record(None, "stateRestrictionViolation", Severity::High, "WA user blocked")
            .unwrap();
        assert!(entry.resolved_at.is_none());
        let resolved = log.resolve(entry.id, "reviewed, no action needed").unwrap();
        assert!(resolved.resolved_at.is_some());
        assert_eq!(log.list().unwrap().len(), 1);
    }
}
