use wlc_core::{ApproverDirectory, ApproverRole, User, UserDirectory, UserId, WlcError};

use crate::db::{decode, encode, WlcStore};

/// `wlc-store` does not own user records in a real deployment — the
/// auth/KYC system is an external collaborator. This tree exists only so
/// the demonstration binary and the test suite have somewhere to seed
/// users without standing up a second service; nothing in the engine
/// writes to it.
impl WlcStore {
    pub fn upsert_user(&self, user: &User) -> Result<(), WlcError> {
        self.users
            .insert(user.id.inner().as_bytes(), encode(user)?)
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_user_record(&self, user_id: UserId) -> Result<Option<User>, WlcError> {
        match self
            .users
            .get(user_id.inner().as_bytes())
            .map_err(|e| WlcError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Assigns (or clears, by re-inserting `Standard`) an approver role.
    /// Stored as a one-byte suffix key under the same tree as the user
    /// record, keyed separately so role lookups never need to deserialize
    /// the full `User`.
    pub fn set_approver_role(&self, user_id: UserId, role: ApproverRole) -> Result<(), WlcError> {
        let mut key = user_id.inner().as_bytes().to_vec();
        key.push(0xff); // role-record marker, distinct from the plain user key
        self.users
            .insert(key, encode(&role)?)
            .map_err(|e| WlcError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_approver_role(&self, user_id: UserId) -> Result<Option<ApproverRole>, WlcError> {
        let mut key = user_id.inner().as_bytes().to_vec();
        key.push(0xff);
        match self
            .users
            .get(key)
            .map_err(|e| WlcError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl UserDirectory for WlcStore {
    fn get_user(&self, user_id: UserId) -> Result<User, WlcError> {
        self.get_user_record(user_id)?
            .ok_or(WlcError::Other(format!("user {user_id} not found")))
    }
}

impl ApproverDirectory for WlcStore {
    fn role_of(&self, user_id: UserId) -> Result<ApproverRole, WlcError> {
        Ok(self
            .get_approver_role(user_id)?
            .unwrap_or(ApproverRole::Standard))
    }
}
