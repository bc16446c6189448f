//! wlc-node — the WLC operator binary.
//!
//! There is no HTTP/RPC surface here: this is a `clap` CLI wired directly
//! onto `WalletEngine`, the same in-process API a real caller would
//! embed. It opens the `sled` database, seeds/reads demonstration user
//! records (the auth/KYC system is an external collaborator WLC only
//! reads from — this binary stands in for it), and doubles as the
//! reconciler's host process via `serve`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use wlc_core::{
    ApprovalWorkflowId, ApproverRole, Currency, KycLevel, LedgerEntryId, TransactionId,
    TransactionType, User, UserId, UserStatus, WlcConfig,
};
use wlc_engine::WalletEngine;
use wlc_reconciler::Reconciler;
use wlc_store::WlcStore;

#[derive(Parser, Debug)]
#[command(name = "wlc-node", version, about = "Wallet & Ledger Core — operator CLI")]
struct Args {
    /// Directory for the persistent sled database.
    #[arg(long, default_value = "~/.wlc/data", global = true)]
    data_dir: PathBuf,

    /// Path to a JSON config overriding `WlcConfig::default()`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Registers (or updates) a demonstration user record.
    SeedUser {
        #[arg(long)]
        state: String,
        #[arg(long, default_value = "none")]
        kyc: String,
        #[arg(long, default_value_t = 30)]
        age_years: i64,
    },

    /// Marks a user as an approver, optionally a compliance officer.
    SetApproverRole {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = false)]
        compliance_officer: bool,
    },

    /// Credits an account (deposit/bonus/win/...).
    Credit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "deposit")]
        kind: String,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long)]
        idempotency_key: String,
    },

    /// Debits an account (withdrawal/bet/...).
    Debit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "withdrawal")]
        kind: String,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long)]
        idempotency_key: String,
    },

    /// Places a hold, moving funds from available to pending.
    Hold {
        #[arg(long)]
        user: String,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        reference: String,
        #[arg(long)]
        idempotency_key: String,
    },

    /// Releases a hold back into available.
    ReleaseHold {
        #[arg(long)]
        hold_tx: String,
        #[arg(long)]
        idempotency_key: String,
    },

    /// Confirms a hold, consuming it as a completed debit.
    ConfirmHold {
        #[arg(long)]
        hold_tx: String,
        #[arg(long)]
        idempotency_key: String,
    },

    /// Reverses a completed transaction.
    Reverse {
        #[arg(long)]
        original_tx: String,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long)]
        idempotency_key: String,
    },

    /// Posts a manual balance adjustment to a frozen account.
    PostAdjustment {
        #[arg(long)]
        account: String,
        /// Signed decimal amount, e.g. "-50.0000" or "50.0000".
        #[arg(long)]
        signed_amount: String,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long)]
        idempotency_key: String,
    },

    /// Prints a user's balances across both currencies.
    Balances {
        #[arg(long)]
        user: String,
    },

    /// Prints a page of ledger entries for one currency.
    Ledger {
        #[arg(long)]
        user: String,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Records an approver's decision on a pending workflow.
    SubmitApproval {
        #[arg(long)]
        workflow: String,
        #[arg(long)]
        approver: String,
    },

    /// Rejects a pending workflow outright.
    RejectApproval {
        #[arg(long)]
        workflow: String,
        #[arg(long)]
        approver: String,
        #[arg(long, default_value = "")]
        reason: String,
    },

    /// Extends a workflow's deadline and marks it high priority.
    EscalateApproval {
        #[arg(long)]
        workflow: String,
        #[arg(long)]
        extra_secs: i64,
    },

    /// Runs every reconciler sweep once and prints the report.
    Reconcile,

    /// Runs the reconciler on a fixed interval until killed.
    Serve {
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wlc=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let store = Arc::new(WlcStore::open(&data_dir).context("opening wallet database")?);
    let config = load_config(args.config.as_deref())?;
    let audit = wlc_audit::AuditLog::new(store.clone());
    let engine = WalletEngine::new(store.clone(), config.clone(), audit.clone(), store.clone());
    let reconciler = Reconciler::new(store.clone(), engine.clone(), audit, config);

    match args.command {
        Command::SeedUser { state, kyc, age_years } => {
            let kyc_level = parse_kyc(&kyc)?;
            let user = User {
                id: UserId::new(),
                state,
                kyc_level,
                status: UserStatus::Active,
                self_exclusion_until: None,
                date_of_birth: Some(Utc::now() - Duration::days(365 * age_years)),
            };
            store.upsert_user(&user).context("seeding user")?;
            println!("user {}", user.id);
        }

        Command::SetApproverRole { user, compliance_officer } => {
            let user_id = parse_user_id(&user)?;
            let role = if compliance_officer {
                ApproverRole::ComplianceOfficer
            } else {
                ApproverRole::Standard
            };
            store.set_approver_role(user_id, role).context("setting approver role")?;
            println!("ok");
        }

        Command::Credit { user, currency, amount, kind, reason, idempotency_key } => {
            let outcome = engine
                .credit(
                    parse_user_id(&user)?,
                    parse_currency(&currency)?,
                    &amount,
                    parse_kind(&kind)?,
                    &reason,
                    &idempotency_key,
                )
                .await
                .context("credit failed")?;
            print_outcome(&outcome);
        }

        Command::Debit { user, currency, amount, kind, reason, idempotency_key } => {
            let outcome = engine
                .debit(
                    parse_user_id(&user)?,
                    parse_currency(&currency)?,
                    &amount,
                    parse_kind(&kind)?,
                    &reason,
                    &idempotency_key,
                )
                .await
                .context("debit failed")?;
            print_outcome(&outcome);
        }

        Command::Hold { user, currency, amount, reference, idempotency_key } => {
            let outcome = engine
                .hold(parse_user_id(&user)?, parse_currency(&currency)?, &amount, &reference, &idempotency_key)
                .await
                .context("hold failed")?;
            print_outcome(&outcome);
        }

        Command::ReleaseHold { hold_tx, idempotency_key } => {
            let outcome = engine
                .release_hold(parse_tx_id(&hold_tx)?, &idempotency_key)
                .await
                .context("release_hold failed")?;
            print_outcome(&outcome);
        }

        Command::ConfirmHold { hold_tx, idempotency_key } => {
            let outcome = engine
                .confirm_hold(parse_tx_id(&hold_tx)?, &idempotency_key)
                .await
                .context("confirm_hold failed")?;
            print_outcome(&outcome);
        }

        Command::Reverse { original_tx, reason, idempotency_key } => {
            let outcome = engine
                .reverse(parse_tx_id(&original_tx)?, &reason, &idempotency_key)
                .await
                .context("reverse failed")?;
            print_outcome(&outcome);
        }

        Command::PostAdjustment { account, signed_amount, reason, idempotency_key } => {
            let account_id = wlc_core::AccountId::parse(&account).context("invalid account id")?;
            let outcome = engine
                .post_adjustment(account_id, &signed_amount, &reason, &idempotency_key)
                .await
                .context("post_adjustment failed")?;
            print_outcome(&outcome);
        }

        Command::Balances { user } => {
            let balances = engine.get_balances(parse_user_id(&user)?).context("get_balances failed")?;
            for b in balances {
                println!(
                    "{:?}  balance={} available={} pending={} withdrawable={}",
                    b.currency, b.balance, b.available, b.pending, b.withdrawable
                );
            }
        }

        Command::Ledger { user, currency, cursor } => {
            let cursor = cursor.map(|c| LedgerEntryId::parse(&c)).transpose().context("invalid cursor")?;
            let page = engine
                .get_ledger(parse_user_id(&user)?, parse_currency(&currency)?, None, None, cursor)
                .context("get_ledger failed")?;
            for entry in &page.entries {
                println!(
                    "{}  {:?} {:?} {}  balance_after={}",
                    entry.posted_at, entry.kind, entry.side, entry.amount, entry.balance_after
                );
            }
            if let Some(next) = page.next_cursor {
                println!("next_cursor={next}");
            }
        }

        Command::SubmitApproval { workflow, approver } => {
            let outcome = engine
                .submit_approval(parse_workflow_id(&workflow)?, parse_user_id(&approver)?)
                .await
                .context("submit_approval failed")?;
            print_outcome(&outcome);
        }

        Command::RejectApproval { workflow, approver, reason } => {
            let outcome = engine
                .reject_approval(parse_workflow_id(&workflow)?, parse_user_id(&approver)?, &reason)
                .await
                .context("reject_approval failed")?;
            print_outcome(&outcome);
        }

        Command::EscalateApproval { workflow, extra_secs } => {
            engine
                .escalate_approval(parse_workflow_id(&workflow)?, extra_secs)
                .await
                .context("escalate_approval failed")?;
            println!("ok");
        }

        Command::Reconcile => {
            let now: DateTime<Utc> = Utc::now();
            let report = reconciler.run_once(now).await.context("reconciler sweep failed")?;
            println!("{report:#?}");
        }

        Command::Serve { interval_secs } => {
            info!(interval_secs, "reconciler loop starting");
            reconciler.run_loop(StdDuration::from_secs(interval_secs)).await;
        }
    }

    store.flush().context("flushing database")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<wlc_core::ConfigHandle> {
    let config = match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)
                .with_context(|| format!("reading config from {}", p.display()))?;
            serde_json::from_str(&json).context("parsing config JSON")?
        }
        None => WlcConfig::default(),
    };
    Ok(wlc_core::ConfigHandle::new(config))
}

fn print_outcome(outcome: &wlc_core::Outcome) {
    println!("{outcome:?}");
}

fn parse_user_id(s: &str) -> anyhow::Result<UserId> {
    UserId::parse(s).map_err(|e| anyhow::anyhow!("invalid user id {s}: {e}"))
}

fn parse_tx_id(s: &str) -> anyhow::Result<TransactionId> {
    TransactionId::parse(s).map_err(|e| anyhow::anyhow!("invalid transaction id {s}: {e}"))
}

fn parse_workflow_id(s: &str) -> anyhow::Result<ApprovalWorkflowId> {
    ApprovalWorkflowId::parse(s).map_err(|e| anyhow::anyhow!("invalid workflow id {s}: {e}"))
}

fn parse_currency(s: &str) -> anyhow::Result<Currency> {
    match s.to_ascii_lowercase().as_str() {
        "gold" => Ok(Currency::Gold),
        "sweeps" => Ok(Currency::Sweeps),
        other => bail!("unknown currency {other}, expected gold|sweeps"),
    }
}

fn parse_kyc(s: &str) -> anyhow::Result<KycLevel> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(KycLevel::None),
        "basic" => Ok(KycLevel::Basic),
        "enhanced" => Ok(KycLevel::Enhanced),
        other => bail!("unknown kyc level {other}, expected none|basic|enhanced"),
    }
}

fn parse_kind(s: &str) -> anyhow::Result<TransactionType> {
    match s.to_ascii_lowercase().as_str() {
        "deposit" => Ok(TransactionType::Deposit),
        "withdrawal" => Ok(TransactionType::Withdrawal),
        "bet" => Ok(TransactionType::Bet),
        "win" => Ok(TransactionType::Win),
        "bonus" => Ok(TransactionType::Bonus),
        "adjustment" => Ok(TransactionType::Adjustment),
        "reversal" => Ok(TransactionType::Reversal),
        other => bail!("unknown transaction kind {other}"),
    }
}

/// Expands a leading `~` to the user's home directory (`HOME`/`USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
