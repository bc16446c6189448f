use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use wlc_money::Money;

/// The full configuration surface the wallet engine and policy evaluator
/// read. Held behind [`ConfigHandle`] as an immutable snapshot; reloading
/// swaps the whole snapshot atomically rather than mutating fields in
/// place, so an in-flight pipeline run always sees a self-consistent view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WlcConfig {
    pub blocked_sweeps_states: HashSet<String>,
    pub enhanced_kyc_states: HashSet<String>,
    pub min_deposit: Money,
    pub max_deposit: Money,
    pub min_withdrawal: Money,
    pub max_withdrawal: Money,
    pub daily_deposit_cap: Money,
    pub daily_withdrawal_cap: Money,
    pub monthly_withdrawal_cap: Money,
    pub dual_approval_threshold: Money,
    pub triple_approval_threshold: Money,
    pub enhanced_kyc_threshold: Money,
    pub max_ops_per_day_per_type: u32,
    pub idempotency_ttl_default_secs: i64,
    pub idempotency_ttl_high_value_secs: i64,
    pub approval_expiry_dual_secs: i64,
    pub approval_expiry_triple_secs: i64,
    pub approval_expiry_compliance_review_secs: i64,
    pub request_deadline_ms: u64,
    pub lock_lease_ms: u64,
    pub daily_reset_time_utc_secs: u32,
    pub minimum_age_years: i64,
    pub stale_transaction_threshold_secs: i64,
}

impl Default for WlcConfig {
    fn default() -> Self {
        WlcConfig {
            blocked_sweeps_states: ["WA", "ID"].iter().map(|s| s.to_string()).collect(),
            enhanced_kyc_states: HashSet::new(),
            min_deposit: Money::parse("1.0000").unwrap(),
            max_deposit: Money::parse("10000.0000").unwrap(),
            min_withdrawal: Money::parse("20.0000").unwrap(),
            max_withdrawal: Money::parse("5000.0000").unwrap(),
            daily_deposit_cap: Money::parse("10000.0000").unwrap(),
            daily_withdrawal_cap: Money::parse("5000.0000").unwrap(),
            monthly_withdrawal_cap: Money::parse("25000.0000").unwrap(),
            dual_approval_threshold: Money::parse("1000.0000").unwrap(),
            triple_approval_threshold: Money::parse("5000.0000").unwrap(),
            enhanced_kyc_threshold: Money::parse("2000.0000").unwrap(),
            max_ops_per_day_per_type: 20,
            idempotency_ttl_default_secs: 24 * 3600,
            idempotency_ttl_high_value_secs: 7 * 24 * 3600,
            approval_expiry_dual_secs: 24 * 3600,
            approval_expiry_triple_secs: 48 * 3600,
            approval_expiry_compliance_review_secs: 72 * 3600,
            request_deadline_ms: 10_000,
            lock_lease_ms: 30_000,
            daily_reset_time_utc_secs: 0,
            minimum_age_years: 21,
            stale_transaction_threshold_secs: 15 * 60,
        }
    }
}

/// An atomically-swappable handle to the current configuration snapshot.
/// Cloning a `ConfigHandle` is cheap (it clones an `Arc`); every clone
/// observes reloads performed through any other clone.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ArcSwap<WlcConfig>>);

impl ConfigHandle {
    pub fn new(config: WlcConfig) -> Self {
        ConfigHandle(Arc::new(ArcSwap::from_pointee(config)))
    }

    /// Loads the current snapshot. Called once at the start of each
    /// pipeline run so a single request sees a consistent configuration
    /// even if a reload happens concurrently.
    pub fn load(&self) -> Arc<WlcConfig> {
        self.0.load_full()
    }

    pub fn reload(&self, config: WlcConfig) {
        self.0.store(Arc::new(config));
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        ConfigHandle::new(WlcConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_is_visible_to_existing_clones() {
        let handle = ConfigHandle::default();
        let clone = handle.clone();
        let mut cfg = (*handle.load()).clone();
        cfg.max_deposit = Money::parse("1.0000").unwrap();
        handle.reload(cfg);
        assert_eq!(clone.load().max_deposit, Money::parse("1.0000").unwrap());
    }
}
