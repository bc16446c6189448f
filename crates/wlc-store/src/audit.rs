use wlc_core::{AuditEntryId, ComplianceAuditEntry, WlcError};

use crate::db::{decode, encode, WlcStore};

impl WlcStore {
    pub fn append_audit_entry(&self, entry: &ComplianceAuditEntry) -> Result<(), WlcError> {
        self.audit
            .insert(entry.id.inner().as_bytes(), encode(entry)?)
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_audit_entry(
        &self,
        id: AuditEntryId,
    ) -> Result<Option<ComplianceAuditEntry>, WlcError> {
        match self
            .audit
            .get(id.inner().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_audit_entry(&self, entry: &ComplianceAuditEntry) -> Result<(), WlcError> {
        // Resolution updates are the one allowed in-place write on an
        // otherwise append-only tree; the entry's identity and history
        // never change, only `resolved_at`/`resolution`.
        self.append_audit_entry(entry)
    }

    pub fn list_audit_entries(&self) -> Result<Vec<ComplianceAuditEntry>, WlcError> {
        let mut out = Vec::new();
        for item in self.audit.iter() {
            let (_, bytes) = item.map_err(|e| WlcError::Storage(e.to_string()))?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }
}
