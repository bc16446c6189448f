use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KycLevel {
    None,
    Basic,
    Enhanced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Suspended,
    Locked,
    SelfExcluded,
}

/// The WLC only ever reads `User`; accounts are created and onboarded
/// elsewhere. `state` is a two-letter US state/territory code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub state: String,
    pub kyc_level: KycLevel,
    pub status: UserStatus,
    pub self_exclusion_until: Option<DateTime<Utc>>,
    pub date_of_birth: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_self_excluded_at(&self, now: DateTime<Utc>) -> bool {
        match (self.status, self.self_exclusion_until) {
            (UserStatus::SelfExcluded, Some(until)) => now < until,
            (UserStatus::SelfExcluded, None) => true,
            _ => false,
        }
    }

    pub fn age_years_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.date_of_birth.map(|dob| {
            let days = (now - dob).num_days();
            days / 365
        })
    }
}
