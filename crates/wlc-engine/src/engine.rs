//! C7 Wallet Engine: the canonical money-movement pipeline shared by every
//! external operation. Every mutation is validated and staged in memory
//! first, and only then written, so a mid-pipeline failure never leaves a
//! half-applied account behind.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, warn};
use wlc_core::{
    Account, AccountStatus, ApprovalKind, ApprovalWorkflow, ApprovalWorkflowId,
    ApproverDirectory, Currency, IdempotencyKey, LedgerEntry, LedgerEntryId, LedgerSide, Outcome,
    Severity, Transaction, TransactionId, TransactionStatus, TransactionType, User, UserDirectory,
    WlcError,
};
use wlc_money::Money;
use wlc_policy::{ApprovalKindHint, Decision, Op as PolicyOp, PolicyContext};
use wlc_store::{AccountLockHandle, TryBeginResult, WlcStore};

use crate::effects::{apply_delta, op_effect, EngineOp};

/// Combined external-collaborator boundary: anything that can answer both
/// "who is this user" and "what role does this approver hold". `WlcStore`
/// implements both traits for the demonstration binary and tests; a real
/// deployment points this at the auth/KYC system instead.
pub trait Directory: UserDirectory + ApproverDirectory {}
impl<T: UserDirectory + ApproverDirectory + ?Sized> Directory for T {}

#[derive(Clone)]
pub struct WalletEngine {
    pub(crate) store: Arc<WlcStore>,
    pub(crate) config: wlc_core::ConfigHandle,
    pub(crate) audit: wlc_audit::AuditLog,
    pub(crate) directory: Arc<dyn Directory>,
}

impl WalletEngine {
    pub fn new(
        store: Arc<WlcStore>,
        config: wlc_core::ConfigHandle,
        audit: wlc_audit::AuditLog,
        directory: Arc<dyn Directory>,
    ) -> Self {
        WalletEngine {
            store,
            config,
            audit,
            directory,
        }
    }

    pub fn store(&self) -> &Arc<WlcStore> {
        &self.store
    }

    pub fn audit(&self) -> &wlc_audit::AuditLog {
        &self.audit
    }

    pub async fn credit(
        &self,
        user_id: wlc_core::UserId,
        currency: Currency,
        amount: &str,
        kind: TransactionType,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        self.execute(
            user_id,
            currency,
            amount,
            kind,
            EngineOp::Credit,
            reason,
            idempotency_key,
        )
        .await
    }

    pub async fn debit(
        &self,
        user_id: wlc_core::UserId,
        currency: Currency,
        amount: &str,
        kind: TransactionType,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        self.execute(
            user_id,
            currency,
            amount,
            kind,
            EngineOp::Debit,
            reason,
            idempotency_key,
        )
        .await
    }

    pub async fn hold(
        &self,
        user_id: wlc_core::UserId,
        currency: Currency,
        amount: &str,
        reference: &str,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        self.execute(
            user_id,
            currency,
            amount,
            TransactionType::Withdrawal,
            EngineOp::Hold,
            reference,
            idempotency_key,
        )
        .await
    }

    /// Releases a hold, restoring its amount from `pending` back to
    /// `available`. `hold_tx_id` is the transaction id returned by
    /// [`Self::hold`] (or, for approval-gated debits, the transaction the
    /// pipeline created when it staged the hold).
    pub async fn release_hold(
        &self,
        hold_tx_id: TransactionId,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        self.resolve_hold(hold_tx_id, EngineOp::ReleaseHold, idempotency_key)
            .await
    }

    pub async fn confirm_hold(
        &self,
        hold_tx_id: TransactionId,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        self.resolve_hold(hold_tx_id, EngineOp::ConfirmHold, idempotency_key)
            .await
    }

    /// Reverses a completed credit or debit. The reversal direction is the
    /// opposite of the original ledger entry's side — a reversed credit
    /// posts a debit and vice versa — so, unlike the other five
    /// operations, `reverse` has no fixed row in the effects table.
    pub async fn reverse(
        &self,
        original_tx_id: TransactionId,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        let idem_key = IdempotencyKey::parse(idempotency_key)?;
        let now = Utc::now();
        let lease_ms = self.config.load().lock_lease_ms;

        match self.store.idempotency_try_begin(&idem_key, lease_ms, now)? {
            TryBeginResult::Cached(outcome) => {
                return Ok(Outcome::Duplicate {
                    original: Box::new(outcome),
                })
            }
            TryBeginResult::InProgress => return Ok(Outcome::RetryableBusy),
            TryBeginResult::Acquired => {}
        }

        let result = self
            .run_with_deadline(self.reverse_inner(original_tx_id, reason, &idem_key, now))
            .await;
        let amount = self
            .store
            .get_transaction(original_tx_id)?
            .map(|tx| tx.amount)
            .unwrap_or(Money::ZERO);
        self.finish(&idem_key, now, amount, result)
    }

    async fn reverse_inner(
        &self,
        original_tx_id: TransactionId,
        reason: &str,
        idem_key: &IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<Outcome, WlcError> {
        let original_tx = self
            .store
            .get_transaction(original_tx_id)?
            .ok_or(WlcError::TransactionNotFound(original_tx_id))?;
        if original_tx.status != TransactionStatus::Completed {
            return Ok(Outcome::denied(
                "notReversible",
                "only a completed transaction may be reversed",
            ));
        }
        let original_entries = self.store.find_by_tx(original_tx_id)?;
        let original_entry = original_entries
            .into_iter()
            .find(|e| e.reversal_of.is_none())
            .ok_or_else(|| WlcError::Other("original ledger entry not found".to_string()))?;

        let handle = self.store.lock_account_for_update(original_tx.account_id).await;
        let account = self
            .store
            .get_account(handle.account_id)?
            .ok_or(WlcError::AccountNotFound(handle.account_id))?;

        let reversal_side = match original_entry.side {
            LedgerSide::Credit => LedgerSide::Debit,
            LedgerSide::Debit => LedgerSide::Credit,
        };
        let amount = original_entry.amount;

        let new_balance = match reversal_side {
            LedgerSide::Debit => account.balance.checked_sub(amount),
            LedgerSide::Credit => account.balance.checked_add(amount),
        };
        let new_available = match reversal_side {
            LedgerSide::Debit => account.available.checked_sub(amount),
            LedgerSide::Credit => account.available.checked_add(amount),
        };
        let (new_balance, new_available) = match (new_balance, new_available) {
            (Ok(b), Ok(a)) => (b, a),
            _ => return Ok(insufficient_balance_outcome()),
        };

        let reversal_tx = Transaction {
            id: TransactionId::new(),
            user_id: original_tx.user_id,
            account_id: original_tx.account_id,
            kind: TransactionType::Reversal,
            currency: original_tx.currency,
            amount,
            status: TransactionStatus::Completed,
            idempotency_key: idem_key.clone(),
            balance_before: Some(account.balance),
            balance_after: Some(new_balance),
            related_tx_id: Some(original_tx_id),
            approval_required: false,
            failure_reason: None,
            created_at: now,
            processed_at: Some(now),
        };
        let reversal_entry = LedgerEntry {
            id: LedgerEntryId::new(),
            account_id: account.id,
            user_id: account.user_id,
            currency: account.currency,
            tx_id: Some(reversal_tx.id),
            kind: TransactionType::Reversal,
            side: reversal_side,
            amount,
            balance_after: new_balance,
            posted_at: now,
            reversal_of: Some(original_entry.id),
            reason: reason.to_string(),
        };

        self.store.mutate_account(&handle, |a| {
            a.balance = new_balance;
            a.available = new_available;
            a.last_tx_at = Some(now);
        })?;
        self.store.append_ledger_entries(&handle, &[reversal_entry])?;
        self.store.put_transaction(&reversal_tx)?;

        self.audit.record(
            Some(account.user_id),
            "reversal",
            Severity::Medium,
            format!("reversed transaction {original_tx_id}"),
        )?;

        info!(tx_id = %reversal_tx.id, account_id = %account.id, "reversal completed");
        Ok(Outcome::Success {
            tx_id: reversal_tx.id,
            balance_after: new_balance,
        })
    }

    /// The shared pipeline for credit/debit/hold: idempotency check,
    /// account lock, policy evaluation, then apply or stage.
    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        user_id: wlc_core::UserId,
        currency: Currency,
        amount_str: &str,
        kind: TransactionType,
        op: EngineOp,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        let amount = Money::parse(amount_str)?;
        amount.require_positive()?;
        let idem_key = IdempotencyKey::parse(idempotency_key)?;
        let now = Utc::now();
        let lease_ms = self.config.load().lock_lease_ms;

        match self.store.idempotency_try_begin(&idem_key, lease_ms, now)? {
            TryBeginResult::Cached(outcome) => {
                return Ok(Outcome::Duplicate {
                    original: Box::new(outcome),
                })
            }
            TryBeginResult::InProgress => return Ok(Outcome::RetryableBusy),
            TryBeginResult::Acquired => {}
        }

        let result = self
            .run_with_deadline(self.execute_inner(user_id, currency, amount, kind, op, reason, &idem_key, now))
            .await;
        self.finish(&idem_key, now, amount, result)
    }

    /// Bounds one pipeline run to the configured request deadline. The
    /// caller's cancellation is honored only up to this point — once the
    /// deadline fires, the in-flight future is dropped, which releases the
    /// account lock (and, for the hold-staging/apply paths, leaves no
    /// idempotency outcome committed), so a retry with the same key starts
    /// clean rather than ever observing a half-applied movement.
    async fn run_with_deadline(
        &self,
        fut: impl std::future::Future<Output = Result<Outcome, WlcError>>,
    ) -> Result<Outcome, WlcError> {
        let deadline_ms = self.config.load().request_deadline_ms;
        match tokio::time::timeout(StdDuration::from_millis(deadline_ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(WlcError::DeadlineExceeded),
        }
    }

    /// Commits or aborts the idempotency lock based on whether the inner
    /// pipeline produced a business outcome (commit) or a hard error
    /// (abort, so a retry can start over from scratch). `amount` is the
    /// movement amount the pipeline evaluated, used only to pick the TTL —
    /// an outcome at or above the dual-approval threshold is cached for
    /// the high-value TTL instead of the default one, since a retried
    /// high-value request is the one most likely to arrive well after the
    /// default window.
    fn finish(
        &self,
        idem_key: &IdempotencyKey,
        now: DateTime<Utc>,
        amount: Money,
        result: Result<Outcome, WlcError>,
    ) -> Result<Outcome, WlcError> {
        match result {
            Ok(outcome) => {
                let config = self.config.load();
                let ttl = if amount >= config.dual_approval_threshold {
                    config.idempotency_ttl_high_value_secs
                } else {
                    config.idempotency_ttl_default_secs
                };
                self.store
                    .idempotency_commit(idem_key, outcome.clone(), ttl, now)?;
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "pipeline run failed after lock acquisition, aborting idempotency lock");
                self.store.idempotency_abort(idem_key)?;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_inner(
        &self,
        user_id: wlc_core::UserId,
        currency: Currency,
        amount: Money,
        kind: TransactionType,
        op: EngineOp,
        reason: &str,
        idem_key: &IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<Outcome, WlcError> {
        let account = self.get_or_create_account(user_id, currency, now)?;
        let handle = self.store.lock_account_for_update(account.id).await;
        info!(account_id = %account.id, op = op_name(op), "account lock acquired");

        let account = self
            .store
            .get_account(handle.account_id)?
            .ok_or(WlcError::AccountNotFound(handle.account_id))?;
        let user = self.directory.get_user(user_id)?;

        let config = self.config.load();
        let ctx = self.build_policy_context(&user, &account, currency, op, kind, amount, now)?;
        let policy_outcome = wlc_policy::evaluate(&ctx, &config);

        if let Some(signal) = &policy_outcome.audit_signal {
            let severity = if signal.severity_high {
                Severity::High
            } else {
                Severity::Medium
            };
            self.audit
                .record(Some(user_id), signal.event.clone(), severity, signal.details.clone())?;
        }

        match policy_outcome.decision {
            Decision::DenyTerminal { code, message } => {
                let tx = self.failed_transaction(&account, user_id, kind, currency, amount, idem_key, &code, now);
                self.store.put_transaction(&tx)?;
                if policy_outcome.audit_signal.is_none() {
                    self.audit.record(
                        Some(user_id),
                        "policyDenied",
                        Severity::Medium,
                        format!("{code}: {message}"),
                    )?;
                }
                Ok(Outcome::denied(code, message))
            }
            Decision::DenyWithApproval(hint) => self.stage_approval(
                &handle, &account, user_id, currency, amount, kind, idem_key, hint, now,
            ),
            Decision::Allow => self.apply_allowed(
                &handle, &account, user_id, currency, amount, kind, op, reason, idem_key, now,
            ),
        }
    }

    fn get_or_create_account(
        &self,
        user_id: wlc_core::UserId,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Result<Account, WlcError> {
        if let Some(account) = self.store.get_account_by_user_currency(user_id, currency)? {
            return Ok(account);
        }
        let account = Account::new(wlc_core::AccountId::new(), user_id, currency, now.date_naive());
        self.store.put_account(&account)?;
        Ok(account)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_policy_context<'a>(
        &self,
        user: &'a User,
        account: &'a Account,
        currency: Currency,
        op: EngineOp,
        kind: TransactionType,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<PolicyContext<'a>, WlcError> {
        let policy_op = match op {
            EngineOp::Credit => PolicyOp::Credit,
            EngineOp::Debit => PolicyOp::Debit,
            EngineOp::Hold => PolicyOp::Hold,
            EngineOp::ReleaseHold => PolicyOp::Release,
            EngineOp::ConfirmHold => PolicyOp::Confirm,
        };
        let is_debit_operation = matches!(op, EngineOp::Debit | EngineOp::Hold | EngineOp::ConfirmHold);
        let is_withdrawal_request = matches!(kind, TransactionType::Withdrawal) && is_debit_operation;

        let history = self.store.transactions_for_account(account.id)?;
        let is_new_account = history.is_empty();
        let day_ago = now - chrono::Duration::hours(24);
        let ops_of_this_type_last_24h = history
            .iter()
            .filter(|t| t.kind == kind && t.created_at >= day_ago)
            .count() as u32;

        // Monthly withdrawal total is not a persisted `Account` field (the
        // spec's data model only tracks the daily running totals) — it is
        // derived on the fly from the current calendar month's ledger
        // entries, the same cost the reconciler already pays for the
        // integrity sweep's full-range scan.
        let month_start = now
            .date_naive()
            .with_day(1)
            .unwrap_or_else(|| now.date_naive())
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        let month_entries = self.store.range(account.id, Some(month_start), Some(now))?;
        let monthly_withdrawal_so_far: Money = month_entries
            .iter()
            .filter(|e| e.kind == TransactionType::Withdrawal && e.side == LedgerSide::Debit)
            .try_fold(Money::ZERO, |acc, e| acc.checked_add(e.amount))
            .unwrap_or(Money::ZERO);

        let projected_daily_deposit_total = if matches!(op, EngineOp::Credit) {
            account
                .daily_deposit_total
                .checked_add(amount)
                .unwrap_or(account.daily_deposit_total)
        } else {
            account.daily_deposit_total
        };
        let projected_daily_withdrawal_total = if is_withdrawal_request {
            account
                .daily_withdrawal_total
                .checked_add(amount)
                .unwrap_or(account.daily_withdrawal_total)
        } else {
            account.daily_withdrawal_total
        };
        let projected_monthly_withdrawal_total = if is_withdrawal_request {
            monthly_withdrawal_so_far
                .checked_add(amount)
                .unwrap_or(monthly_withdrawal_so_far)
        } else {
            monthly_withdrawal_so_far
        };

        Ok(PolicyContext {
            user,
            account,
            currency,
            op: policy_op,
            is_withdrawal_request,
            is_debit_operation,
            amount,
            now,
            projected_daily_deposit_total,
            projected_daily_withdrawal_total,
            projected_monthly_withdrawal_total,
            ops_of_this_type_last_24h,
            is_new_account,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn failed_transaction(
        &self,
        account: &Account,
        user_id: wlc_core::UserId,
        kind: TransactionType,
        currency: Currency,
        amount: Money,
        idem_key: &IdempotencyKey,
        failure_reason: &str,
        now: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            user_id,
            account_id: account.id,
            kind,
            currency,
            amount,
            status: TransactionStatus::Failed,
            idempotency_key: idem_key.clone(),
            balance_before: Some(account.balance),
            balance_after: Some(account.balance),
            related_tx_id: None,
            approval_required: false,
            failure_reason: Some(failure_reason.to_string()),
            created_at: now,
            processed_at: Some(now),
        }
    }

    /// Stages a hold for the amount regardless of the original operation
    /// (credit/debit/hold) — an approval-gated movement always parks the
    /// amount in `pending` until the workflow resolves.
    #[allow(clippy::too_many_arguments)]
    fn stage_approval(
        &self,
        handle: &AccountLockHandle,
        account: &Account,
        user_id: wlc_core::UserId,
        currency: Currency,
        amount: Money,
        kind: TransactionType,
        idem_key: &IdempotencyKey,
        hint: ApprovalKindHint,
        now: DateTime<Utc>,
    ) -> Result<Outcome, WlcError> {
        let hold_effect = op_effect(EngineOp::Hold);
        let new_available = match apply_delta(account.available, hold_effect.available, amount) {
            Ok(v) => v,
            Err(_) => return Ok(insufficient_balance_outcome()),
        };
        let new_pending = match apply_delta(account.pending, hold_effect.pending, amount) {
            Ok(v) => v,
            Err(_) => return Ok(insufficient_balance_outcome()),
        };

        let tx = Transaction {
            id: TransactionId::new(),
            user_id,
            account_id: account.id,
            kind,
            currency,
            amount,
            status: TransactionStatus::AwaitingApproval,
            idempotency_key: idem_key.clone(),
            balance_before: Some(account.balance),
            balance_after: Some(account.balance),
            related_tx_id: None,
            approval_required: true,
            failure_reason: None,
            created_at: now,
            processed_at: None,
        };

        let approval_kind = match hint {
            ApprovalKindHint::Dual => ApprovalKind::Dual,
            ApprovalKindHint::Triple => ApprovalKind::Triple,
            ApprovalKindHint::ComplianceReview => ApprovalKind::ComplianceReview,
        };
        let expiry_secs = match approval_kind {
            ApprovalKind::Dual => self.config.load().approval_expiry_dual_secs,
            ApprovalKind::Triple => self.config.load().approval_expiry_triple_secs,
            ApprovalKind::ComplianceReview => self.config.load().approval_expiry_compliance_review_secs,
        };
        let workflow = ApprovalWorkflow::new(
            ApprovalWorkflowId::new(),
            tx.id,
            approval_kind,
            user_id,
            now,
            expiry_secs,
        );

        self.store.mutate_account(handle, |a| {
            a.available = new_available;
            a.pending = new_pending;
            a.last_tx_at = Some(now);
        })?;
        self.store.put_transaction(&tx)?;
        self.store.put_approval_workflow(&workflow)?;

        info!(workflow_id = %workflow.id, tx_id = %tx.id, kind = ?approval_kind, "approval workflow staged");
        Ok(Outcome::PendingApproval {
            workflow_id: workflow.id,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_allowed(
        &self,
        handle: &AccountLockHandle,
        account: &Account,
        user_id: wlc_core::UserId,
        currency: Currency,
        amount: Money,
        kind: TransactionType,
        op: EngineOp,
        reason: &str,
        idem_key: &IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<Outcome, WlcError> {
        let effect = op_effect(op);
        let new_balance = match apply_delta(account.balance, effect.balance, amount) {
            Ok(v) => v,
            Err(_) => return Ok(insufficient_balance_outcome()),
        };
        let new_available = match apply_delta(account.available, effect.available, amount) {
            Ok(v) => v,
            Err(_) => return Ok(insufficient_balance_outcome()),
        };
        let new_pending = match apply_delta(account.pending, effect.pending, amount) {
            Ok(v) => v,
            Err(_) => return Ok(insufficient_balance_outcome()),
        };

        // A bare hold is not itself a resolution — it stays `Pending`
        // until a later `releaseHold`/`confirmHold` call resolves it.
        // Credit/debit complete immediately; there is no separate
        // approval-gated path through this function (that's
        // `stage_approval`, above).
        let status = if matches!(op, EngineOp::Hold) {
            TransactionStatus::Pending
        } else {
            TransactionStatus::Completed
        };

        let tx = Transaction {
            id: TransactionId::new(),
            user_id,
            account_id: account.id,
            kind,
            currency,
            amount,
            status,
            idempotency_key: idem_key.clone(),
            balance_before: Some(account.balance),
            balance_after: Some(new_balance),
            related_tx_id: None,
            approval_required: false,
            failure_reason: None,
            created_at: now,
            processed_at: Some(now),
        };

        let mut entries = Vec::new();
        if let Some(side) = effect.ledger_side {
            entries.push(LedgerEntry {
                id: LedgerEntryId::new(),
                account_id: account.id,
                user_id,
                currency,
                tx_id: Some(tx.id),
                kind,
                side,
                amount,
                balance_after: new_balance,
                posted_at: now,
                reversal_of: None,
                reason: reason.to_string(),
            });
        }

        let is_deposit = matches!(op, EngineOp::Credit);
        let is_withdrawal_completion =
            matches!(op, EngineOp::Debit | EngineOp::ConfirmHold) && matches!(kind, TransactionType::Withdrawal);

        self.store.mutate_account(handle, |a| {
            a.balance = new_balance;
            a.available = new_available;
            a.pending = new_pending;
            a.last_tx_at = Some(now);
            if is_deposit {
                a.daily_deposit_total = a.daily_deposit_total.checked_add(amount).unwrap_or(a.daily_deposit_total);
            }
            if is_withdrawal_completion {
                a.daily_withdrawal_total =
                    a.daily_withdrawal_total.checked_add(amount).unwrap_or(a.daily_withdrawal_total);
            }
        })?;
        if !entries.is_empty() {
            self.store.append_ledger_entries(handle, &entries)?;
        }
        self.store.put_transaction(&tx)?;

        info!(tx_id = %tx.id, account_id = %account.id, op = op_name(op), "movement completed");
        Ok(Outcome::Success {
            tx_id: tx.id,
            balance_after: new_balance,
        })
    }

    async fn resolve_hold(
        &self,
        hold_tx_id: TransactionId,
        op: EngineOp,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        let idem_key = IdempotencyKey::parse(idempotency_key)?;
        let now = Utc::now();
        let lease_ms = self.config.load().lock_lease_ms;

        match self.store.idempotency_try_begin(&idem_key, lease_ms, now)? {
            TryBeginResult::Cached(outcome) => {
                return Ok(Outcome::Duplicate {
                    original: Box::new(outcome),
                })
            }
            TryBeginResult::InProgress => return Ok(Outcome::RetryableBusy),
            TryBeginResult::Acquired => {}
        }

        let result = self.run_with_deadline(self.resolve_hold_inner(hold_tx_id, op, now)).await;
        let amount = self
            .store
            .get_transaction(hold_tx_id)?
            .map(|tx| tx.amount)
            .unwrap_or(Money::ZERO);
        self.finish(&idem_key, now, amount, result)
    }

    async fn resolve_hold_inner(
        &self,
        hold_tx_id: TransactionId,
        op: EngineOp,
        now: DateTime<Utc>,
    ) -> Result<Outcome, WlcError> {
        let hold_tx = self
            .store
            .get_transaction(hold_tx_id)?
            .ok_or(WlcError::HoldNotFound(hold_tx_id))?;
        if !matches!(
            hold_tx.status,
            TransactionStatus::Pending | TransactionStatus::AwaitingApproval
        ) {
            return Ok(Outcome::denied(
                "holdAlreadyResolved",
                "this hold has already been released or confirmed",
            ));
        }

        let handle = self.store.lock_account_for_update(hold_tx.account_id).await;
        let account = self
            .store
            .get_account(handle.account_id)?
            .ok_or(WlcError::AccountNotFound(handle.account_id))?;

        let effect = op_effect(op);
        let new_balance = match apply_delta(account.balance, effect.balance, hold_tx.amount) {
            Ok(v) => v,
            Err(_) => return Ok(insufficient_balance_outcome()),
        };
        let new_available = match apply_delta(account.available, effect.available, hold_tx.amount) {
            Ok(v) => v,
            Err(_) => return Ok(insufficient_balance_outcome()),
        };
        let new_pending = match apply_delta(account.pending, effect.pending, hold_tx.amount) {
            Ok(v) => v,
            Err(_) => return Ok(insufficient_balance_outcome()),
        };

        let mut resolved_tx = hold_tx.clone();
        resolved_tx.status = if matches!(op, EngineOp::ConfirmHold) {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Cancelled
        };
        resolved_tx.balance_after = Some(new_balance);
        resolved_tx.processed_at = Some(now);

        let mut entries = Vec::new();
        if let Some(side) = effect.ledger_side {
            entries.push(LedgerEntry {
                id: LedgerEntryId::new(),
                account_id: account.id,
                user_id: account.user_id,
                currency: account.currency,
                tx_id: Some(resolved_tx.id),
                kind: resolved_tx.kind,
                side,
                amount: hold_tx.amount,
                balance_after: new_balance,
                posted_at: now,
                reversal_of: None,
                reason: format!("{} of hold {hold_tx_id}", op_name(op)),
            });
        }

        let is_withdrawal_completion =
            matches!(op, EngineOp::ConfirmHold) && matches!(hold_tx.kind, TransactionType::Withdrawal);
        self.store.mutate_account(&handle, |a| {
            a.balance = new_balance;
            a.available = new_available;
            a.pending = new_pending;
            a.last_tx_at = Some(now);
            if is_withdrawal_completion {
                a.daily_withdrawal_total = a
                    .daily_withdrawal_total
                    .checked_add(hold_tx.amount)
                    .unwrap_or(a.daily_withdrawal_total);
            }
        })?;
        if !entries.is_empty() {
            self.store.append_ledger_entries(&handle, &entries)?;
        }
        self.store.put_transaction(&resolved_tx)?;

        info!(tx_id = %resolved_tx.id, op = op_name(op), "hold resolved");
        Ok(Outcome::Success {
            tx_id: resolved_tx.id,
            balance_after: new_balance,
        })
    }

    /// Frozen-account recovery path after the reconciler's integrity
    /// sweep: the only way to write to an account that has been frozen
    /// for a ledger/account mismatch. Succeeds only if the resulting
    /// ledger sum still matches the adjusted balance.
    pub async fn post_adjustment(
        &self,
        account_id: wlc_core::AccountId,
        signed_amount: &str,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<Outcome, WlcError> {
        let idem_key = IdempotencyKey::parse(idempotency_key)?;
        let now = Utc::now();
        let lease_ms = self.config.load().lock_lease_ms;

        match self.store.idempotency_try_begin(&idem_key, lease_ms, now)? {
            TryBeginResult::Cached(outcome) => {
                return Ok(Outcome::Duplicate {
                    original: Box::new(outcome),
                })
            }
            TryBeginResult::InProgress => return Ok(Outcome::RetryableBusy),
            TryBeginResult::Acquired => {}
        }

        let result = self
            .run_with_deadline(self.post_adjustment_inner(account_id, signed_amount, reason, &idem_key, now))
            .await;
        let amount = Money::parse(signed_amount.trim_start().trim_start_matches('-')).unwrap_or(Money::ZERO);
        self.finish(&idem_key, now, amount, result)
    }

    async fn post_adjustment_inner(
        &self,
        account_id: wlc_core::AccountId,
        signed_amount: &str,
        reason: &str,
        idem_key: &IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<Outcome, WlcError> {
        let negative = signed_amount.trim_start().starts_with('-');
        let magnitude = signed_amount.trim_start().trim_start_matches('-');
        let amount = Money::parse(magnitude)?;

        let handle = self.store.lock_account_for_update(account_id).await;
        let account = self
            .store
            .get_account(handle.account_id)?
            .ok_or(WlcError::AccountNotFound(account_id))?;
        if !matches!(account.status, AccountStatus::Frozen) {
            return Ok(Outcome::denied(
                "notFrozen",
                "manual adjustments are only accepted on frozen accounts",
            ));
        }

        let (new_balance, side) = if negative {
            match account.balance.checked_sub(amount) {
                Ok(b) => (b, LedgerSide::Debit),
                Err(_) => return Ok(insufficient_balance_outcome()),
            }
        } else {
            match account.balance.checked_add(amount) {
                Ok(b) => (b, LedgerSide::Credit),
                Err(_) => return Ok(insufficient_balance_outcome()),
            }
        };

        let tx = Transaction {
            id: TransactionId::new(),
            user_id: account.user_id,
            account_id: account.id,
            kind: TransactionType::Adjustment,
            currency: account.currency,
            amount,
            status: TransactionStatus::Completed,
            idempotency_key: idem_key.clone(),
            balance_before: Some(account.balance),
            balance_after: Some(new_balance),
            related_tx_id: None,
            approval_required: false,
            failure_reason: None,
            created_at: now,
            processed_at: Some(now),
        };
        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            account_id: account.id,
            user_id: account.user_id,
            currency: account.currency,
            tx_id: Some(tx.id),
            kind: TransactionType::Adjustment,
            side,
            amount,
            balance_after: new_balance,
            posted_at: now,
            reversal_of: None,
            reason: reason.to_string(),
        };
        self.store.append_ledger_entries(&handle, &[entry])?;

        let sum = self.store.sum_signed(account.id)?;
        if sum != new_balance.ten_thousandths() as i128 {
            return Err(WlcError::IntegrityViolation(
                account.id,
                format!("adjustment left ledger sum {sum} != balance {}", new_balance.ten_thousandths()),
            ));
        }

        self.store.mutate_account(&handle, |a| {
            a.balance = new_balance;
            a.available = new_balance.saturating_sub(a.pending);
            a.status = AccountStatus::Active;
            a.frozen_until = None;
            a.frozen_reason = None;
            a.last_tx_at = Some(now);
        })?;
        self.store.put_transaction(&tx)?;
        self.audit.record(
            Some(account.user_id),
            "manualAdjustment",
            Severity::High,
            format!("account {account_id} unfrozen by adjustment {}", tx.id),
        )?;

        Ok(Outcome::Success {
            tx_id: tx.id,
            balance_after: new_balance,
        })
    }

    pub fn get_balances(&self, user_id: wlc_core::UserId) -> Result<Vec<wlc_core::BalanceView>, WlcError> {
        let mut out = Vec::new();
        for currency in [Currency::Gold, Currency::Sweeps] {
            if let Some(account) = self.store.get_account_by_user_currency(user_id, currency)? {
                out.push(wlc_core::BalanceView {
                    currency,
                    balance: account.balance,
                    available: account.available,
                    pending: account.pending,
                    withdrawable: currency.withdrawable(),
                });
            }
        }
        Ok(out)
    }

    pub fn get_ledger(
        &self,
        user_id: wlc_core::UserId,
        currency: Currency,
        from_time: Option<DateTime<Utc>>,
        to_time: Option<DateTime<Utc>>,
        cursor: Option<LedgerEntryId>,
    ) -> Result<wlc_core::LedgerPage, WlcError> {
        let account = self
            .store
            .get_account_by_user_currency(user_id, currency)?
            .ok_or_else(|| WlcError::Other("no account for this currency".to_string()))?;
        let (entries, next_cursor) = self.store.range_after(account.id, from_time, to_time, cursor, 100)?;
        Ok(wlc_core::LedgerPage { entries, next_cursor })
    }
}

fn insufficient_balance_outcome() -> Outcome {
    Outcome::denied("insufficientBalance", "insufficient balance for this movement")
}

fn op_name(op: EngineOp) -> &'static str {
    match op {
        EngineOp::Credit => "credit",
        EngineOp::Debit => "debit",
        EngineOp::Hold => "hold",
        EngineOp::ReleaseHold => "releaseHold",
        EngineOp::ConfirmHold => "confirmHold",
    }
}
