//! C10: periodic background sweeps that keep the ledger and the account
//! table honest without sitting on the hot path of any money movement.
//! Every job here is the same shape as the wallet engine's own pipeline
//! steps, just triggered by a clock instead of a caller: read the store
//! directly (the account lock still gates any mutation), act, log.
//!
//! Runnable either as one-shot calls (what the scenario tests below and
//! an operator's `wlc-node reconcile` subcommand use) or as a
//! `tokio::time::interval` loop for a long-running process.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{error, info, warn};
use wlc_core::{AccountId, AccountStatus, ConfigHandle, Outcome, Severity, TransactionStatus, WlcError};
use wlc_engine::WalletEngine;
use wlc_store::WlcStore;

/// Outcome of one [`Reconciler::run_integrity_sweep`] pass.
#[derive(Debug, Default, Clone)]
pub struct IntegritySweepReport {
    pub accounts_checked: u64,
    pub mismatches: Vec<AccountId>,
}

/// Outcome of one [`Reconciler::run_once`] pass, combining all four jobs.
#[derive(Debug, Default, Clone)]
pub struct ReconcileReport {
    pub integrity: IntegritySweepReport,
    pub daily_resets: u64,
    pub expired_workflows: u64,
    pub stale_transactions: u64,
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<WlcStore>,
    engine: WalletEngine,
    audit: wlc_audit::AuditLog,
    config: ConfigHandle,
}

impl Reconciler {
    pub fn new(store: Arc<WlcStore>, engine: WalletEngine, audit: wlc_audit::AuditLog, config: ConfigHandle) -> Self {
        Reconciler {
            store,
            engine,
            audit,
            config,
        }
    }

    /// Verifies `balance == sumSigned(ledger)` for every account (every
    /// account is created at `Money::ZERO`, so the "initial balance" term
    /// is always zero — the running ledger sum alone is the expected
    /// balance). Mismatches are frozen and recorded as
    /// `critical` audit entries; already-frozen accounts are left as-is
    /// and still reported so a human can see how long they've been stuck.
    pub async fn run_integrity_sweep(&self) -> Result<IntegritySweepReport, WlcError> {
        let accounts = self.store.all_accounts()?;
        let mut mismatches = Vec::new();
        for account in &accounts {
            let sum = self.store.sum_signed(account.id)?;
            let expected = account.balance.ten_thousandths() as i128;
            if sum == expected {
                continue;
            }
            mismatches.push(account.id);
            error!(account_id = %account.id, ledger_sum = sum, balance = expected, "integrity mismatch");

            if !matches!(account.status, AccountStatus::Frozen) {
                let handle = self.store.lock_account_for_update(account.id).await;
                self.store.freeze_account(
                    &handle,
                    None,
                    format!("integrity sweep: ledger sum {sum} != balance {expected}"),
                )?;
            }
            self.audit.record(
                Some(account.user_id),
                "integrityViolation",
                Severity::Critical,
                format!("account {} ledger sum {sum} != balance {expected}", account.id),
            )?;
        }
        Ok(IntegritySweepReport {
            accounts_checked: accounts.len() as u64,
            mismatches,
        })
    }

    /// Zeroes `dailyDepositTotal`/`dailyWithdrawalTotal` for every account
    /// whose `dailyResetDate` precedes `today`. Idempotent per call.
    pub fn run_daily_reset(&self, today: NaiveDate) -> Result<u64, WlcError> {
        let reset_count = self.store.reset_daily_totals(today)?;
        if reset_count > 0 {
            info!(reset_count, %today, "daily totals reset");
        }
        Ok(reset_count)
    }

    /// Expires every approval workflow whose deadline has passed and
    /// releases the hold it was staging, via the same idempotency-keyed
    /// compensation the workflow itself uses on a rejection
    /// (`wf-{workflowId}-expired`), so a workflow that expires right as a
    /// late approval comes in can never double-release.
    pub async fn run_approval_expiry_sweep(&self, now: DateTime<Utc>) -> Result<u64, WlcError> {
        let expired = self.store.find_expired_workflows(now)?;
        let mut count = 0u64;
        for mut workflow in expired {
            workflow.expire(now)?;
            self.store.put_approval_workflow(&workflow)?;
            let key = wlc_engine::compensation_key(workflow.id, "expired");
            self.engine.release_hold(workflow.tx_id, &key).await?;
            info!(workflow_id = %workflow.id, tx_id = %workflow.tx_id, "approval workflow expired, hold released");
            count += 1;
        }
        Ok(count)
    }

    /// Marks transactions stuck in `pending`/`processing` past the
    /// configured threshold as `failed(timeout)`, and force-completes
    /// their idempotency record so a retry with the same key sees a
    /// terminal denial instead of waiting out a stale `inProgress` lock.
    pub fn run_stale_transaction_sweep(&self, now: DateTime<Utc>) -> Result<u64, WlcError> {
        let threshold = Duration::seconds(self.config.load().stale_transaction_threshold_secs);
        let stale = self.store.find_stale_transactions(now, threshold)?;
        let ttl = self.config.load().idempotency_ttl_default_secs;
        let mut count = 0u64;
        for mut tx in stale {
            tx.status = TransactionStatus::Failed;
            tx.failure_reason = Some("timeout".to_string());
            tx.processed_at = Some(now);
            self.store.put_transaction(&tx)?;

            let outcome = Outcome::denied("timeout", "transaction exceeded the stale-transaction threshold");
            self.store.idempotency_force_complete(&tx.idempotency_key, outcome, ttl, now)?;

            warn!(tx_id = %tx.id, "stale transaction marked failed(timeout)");
            count += 1;
        }
        Ok(count)
    }

    /// Runs all four jobs once, in integrity / daily-reset / approval-expiry
    /// / stale-transaction order.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReconcileReport, WlcError> {
        let integrity = self.run_integrity_sweep().await?;
        let daily_resets = self.run_daily_reset(now.date_naive())?;
        let expired_workflows = self.run_approval_expiry_sweep(now).await?;
        let stale_transactions = self.run_stale_transaction_sweep(now)?;
        Ok(ReconcileReport {
            integrity,
            daily_resets,
            expired_workflows,
            stale_transactions,
        })
    }

    /// Drives [`Self::run_once`] on a fixed period until the process
    /// exits. Intended for `wlc-node`; a sweep failure is logged and
    /// swallowed so one bad tick never takes the loop down.
    pub async fn run_loop(self, period: StdDuration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            match self.run_once(now).await {
                Ok(report) => info!(?report, "reconciler sweep completed"),
                Err(e) => error!(error = %e, "reconciler sweep failed"),
            }
        }
    }
}
