//! Scenario tests for the four background jobs, against a temporary
//! in-memory `sled` store — the same no-mocking style used by
//! `wlc-engine`'s scenario tests.

use std::sync::Arc;

use chrono::{Duration, Utc};
use wlc_core::{
    AccountStatus, ApprovalKind, ApprovalWorkflow, ApprovalWorkflowId, Currency, KycLevel, Outcome,
    TransactionType, User, UserId, UserStatus, WlcConfig,
};
use wlc_engine::WalletEngine;
use wlc_reconciler::Reconciler;
use wlc_store::WlcStore;

fn harness() -> (Reconciler, WalletEngine, Arc<WlcStore>) {
    let store = Arc::new(WlcStore::open_temporary().unwrap());
    let config = wlc_core::ConfigHandle::new(WlcConfig::default());
    let audit = wlc_audit::AuditLog::new(store.clone());
    let engine = WalletEngine::new(store.clone(), config.clone(), audit.clone(), store.clone());
    let reconciler = Reconciler::new(store.clone(), engine.clone(), audit, config);
    (reconciler, engine, store)
}

fn seed_user(store: &WlcStore, kyc: KycLevel) -> UserId {
    let user = User {
        id: UserId::new(),
        state: "CA".to_string(),
        kyc_level: kyc,
        status: UserStatus::Active,
        self_exclusion_until: None,
        date_of_birth: Some(Utc::now() - Duration::days(365 * 30)),
    };
    store.upsert_user(&user).unwrap();
    user.id
}

fn key(label: &str) -> String {
    format!("{label}-{}", wlc_idgen::generate(wlc_idgen::now_ms()))
}

#[tokio::test]
async fn integrity_sweep_freezes_an_account_whose_balance_no_longer_matches_the_ledger() {
    let (reconciler, engine, store) = harness();
    let user_id = seed_user(&store, KycLevel::Basic);
    engine
        .credit(user_id, Currency::Gold, "100.0000", TransactionType::Deposit, "seed", &key("seed"))
        .await
        .unwrap();

    let mut account = store.get_account_by_user_currency(user_id, Currency::Gold).unwrap().unwrap();
    // Simulate out-of-band corruption: the balance no longer agrees with
    // what the ledger says it should be.
    account.balance = wlc_money::Money::parse("999.0000").unwrap();
    account.available = account.balance;
    store.put_account(&account).unwrap();

    let report = reconciler.run_integrity_sweep().await.unwrap();
    assert_eq!(report.mismatches, vec![account.id]);

    let frozen = store.get_account(account.id).unwrap().unwrap();
    assert_eq!(frozen.status, AccountStatus::Frozen);

    let entries = engine.audit().list().unwrap();
    assert!(entries.iter().any(|e| e.event == "integrityViolation"));

    let outcome = engine
        .credit(user_id, Currency::Gold, "1.0000", TransactionType::Deposit, "retry", &key("retry"))
        .await
        .unwrap();
    match outcome {
        Outcome::Denied { code, .. } => assert_eq!(code, "accountFrozen"),
        other => panic!("expected Denied(accountFrozen), got {other:?}"),
    }
}

#[tokio::test]
async fn integrity_sweep_is_silent_when_books_balance() {
    let (reconciler, engine, store) = harness();
    let user_id = seed_user(&store, KycLevel::Basic);
    engine
        .credit(user_id, Currency::Gold, "40.0000", TransactionType::Deposit, "seed", &key("seed"))
        .await
        .unwrap();

    let report = reconciler.run_integrity_sweep().await.unwrap();
    assert!(report.mismatches.is_empty());
    assert!(report.accounts_checked >= 1);
}

#[tokio::test]
async fn daily_reset_zeroes_totals_and_is_idempotent_for_the_same_day() {
    let (reconciler, engine, store) = harness();
    let user_id = seed_user(&store, KycLevel::Basic);
    engine
        .credit(user_id, Currency::Gold, "40.0000", TransactionType::Deposit, "seed", &key("seed"))
        .await
        .unwrap();

    let account = store.get_account_by_user_currency(user_id, Currency::Gold).unwrap().unwrap();
    assert_eq!(account.daily_deposit_total.to_string(), "40.0000");

    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    let first = reconciler.run_daily_reset(tomorrow).unwrap();
    assert_eq!(first, 1);
    let account = store.get_account_by_user_currency(user_id, Currency::Gold).unwrap().unwrap();
    assert_eq!(account.daily_deposit_total.to_string(), "0.0000");

    let second = reconciler.run_daily_reset(tomorrow).unwrap();
    assert_eq!(second, 0);
}

#[tokio::test]
async fn approval_expiry_sweep_releases_the_hold_for_a_workflow_past_its_deadline() {
    let (reconciler, engine, store) = harness();
    let user_id = seed_user(&store, KycLevel::Enhanced);
    engine
        .credit(user_id, Currency::Sweeps, "5000.0000", TransactionType::Bonus, "seed", &key("seed"))
        .await
        .unwrap();

    let config = WlcConfig::default();
    let amount = config.dual_approval_threshold.to_string();
    let outcome = engine
        .debit(user_id, Currency::Sweeps, &amount, TransactionType::Withdrawal, "cashout", &key("wd"))
        .await
        .unwrap();
    let workflow_id = match outcome {
        Outcome::PendingApproval { workflow_id } => workflow_id,
        other => panic!("expected PendingApproval, got {other:?}"),
    };

    // Back-date the workflow so the sweep sees it as expired without
    // waiting out the real clock.
    let mut workflow = store.get_approval_workflow(workflow_id).unwrap().unwrap();
    workflow.expires_at = Utc::now() - Duration::seconds(1);
    store.put_approval_workflow(&workflow).unwrap();

    let count = reconciler.run_approval_expiry_sweep(Utc::now()).await.unwrap();
    assert_eq!(count, 1);

    let balances = engine.get_balances(user_id).unwrap();
    let sweeps = balances.iter().find(|b| b.currency == Currency::Sweeps).unwrap();
    assert_eq!(sweeps.pending.to_string(), "0.0000");
    assert_eq!(sweeps.available.to_string(), "5000.0000");

    let workflow = store.get_approval_workflow(workflow_id).unwrap().unwrap();
    assert_eq!(workflow.state, wlc_core::ApprovalState::Expired);
}

#[tokio::test]
async fn approval_expiry_sweep_ignores_workflows_still_within_their_deadline() {
    let (reconciler, _engine, store) = harness();
    let initiator = seed_user(&store, KycLevel::Enhanced);
    let workflow = ApprovalWorkflow::new(
        ApprovalWorkflowId::new(),
        wlc_core::TransactionId::new(),
        ApprovalKind::Dual,
        initiator,
        Utc::now(),
        24 * 3600,
    );
    store.put_approval_workflow(&workflow).unwrap();

    let count = reconciler.run_approval_expiry_sweep(Utc::now()).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn stale_transaction_sweep_fails_a_transaction_stuck_past_the_threshold() {
    let (reconciler, engine, store) = harness();
    let user_id = seed_user(&store, KycLevel::Enhanced);

    engine
        .credit(user_id, Currency::Sweeps, "100.0000", TransactionType::Bonus, "seed", &key("seed"))
        .await
        .unwrap();
    let outcome = engine
        .hold(user_id, Currency::Sweeps, "10.0000", "stuck reservation", &key("hold"))
        .await
        .unwrap();
    let tx_id = match outcome {
        Outcome::Success { tx_id, .. } => tx_id,
        other => panic!("expected Success, got {other:?}"),
    };

    let mut tx = store.get_transaction(tx_id).unwrap().unwrap();
    tx.created_at = Utc::now() - Duration::hours(1);
    store.put_transaction(&tx).unwrap();

    let count = reconciler.run_stale_transaction_sweep(Utc::now()).unwrap();
    assert_eq!(count, 1);

    let resolved = store.get_transaction(tx_id).unwrap().unwrap();
    assert_eq!(resolved.status, wlc_core::TransactionStatus::Failed);
    assert_eq!(resolved.failure_reason.as_deref(), Some("timeout"));
}
