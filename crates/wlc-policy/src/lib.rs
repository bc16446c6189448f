//! Pure policy evaluation: no I/O, no clock reads beyond what the caller
//! injects in [`PolicyContext`]. Given the same context and configuration
//! this always returns the same [`Decision`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wlc_core::{Account, AccountStatus, Currency, KycLevel, User, UserStatus, WlcConfig};
use wlc_money::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Credit,
    Debit,
    Hold,
    Release,
    Confirm,
}

impl Op {
    fn is_withdrawal_like(&self) -> bool {
        matches!(self, Op::Debit | Op::Hold)
    }
}

/// Everything the evaluator needs, precomputed by the caller so the
/// function itself stays pure. Projected totals are "what the daily/
/// monthly running total would become if this operation were applied",
/// computed by the engine from stored account state before policy runs.
pub struct PolicyContext<'a> {
    pub user: &'a User,
    pub account: &'a Account,
    pub currency: Currency,
    pub op: Op,
    pub is_withdrawal_request: bool,
    /// True for any operation that removes money from `available`
    /// (debit, hold, confirm), regardless of the transaction's `kind` —
    /// the age gate applies to every debit, not just ones tagged
    /// `Withdrawal` (a `Bet` debit is still a debit).
    pub is_debit_operation: bool,
    pub amount: Money,
    pub now: DateTime<Utc>,
    pub projected_daily_deposit_total: Money,
    pub projected_daily_withdrawal_total: Money,
    pub projected_monthly_withdrawal_total: Money,
    pub ops_of_this_type_last_24h: u32,
    pub is_new_account: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalKindHint {
    Dual,
    Triple,
    ComplianceReview,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    DenyTerminal { code: String, message: String },
    DenyWithApproval(ApprovalKindHint),
}

/// An audit signal the evaluator recommends be recorded; the evaluator
/// itself never writes — the caller decides whether/how to persist it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditSignal {
    pub event: String,
    pub severity_high: bool,
    pub details: String,
}

pub struct PolicyOutcome {
    pub decision: Decision,
    pub audit_signal: Option<AuditSignal>,
}

fn deny(code: &str, message: impl Into<String>) -> PolicyOutcome {
    PolicyOutcome {
        decision: Decision::DenyTerminal {
            code: code.to_string(),
            message: message.into(),
        },
        audit_signal: None,
    }
}

/// Runs the ordered, first-match-wins check list from the policy design.
pub fn evaluate(ctx: &PolicyContext<'_>, config: &WlcConfig) -> PolicyOutcome {
    // 1. User status.
    match ctx.user.status {
        UserStatus::Suspended => return deny("userSuspended", "user account is suspended"),
        UserStatus::Locked => return deny("userLocked", "user account is locked"),
        UserStatus::SelfExcluded if ctx.user.is_self_excluded_at(ctx.now) => {
            return deny("userSelfExcluded", "user is within a self-exclusion period")
        }
        _ => {}
    }

    // 2. Account status.
    match ctx.account.status {
        AccountStatus::Closed => return deny("accountClosed", "account is closed"),
        AccountStatus::Suspended => return deny("accountSuspended", "account is suspended"),
        AccountStatus::Frozen if ctx.account.is_frozen_at(ctx.now) => {
            return deny("accountFrozen", "account is frozen")
        }
        _ => {}
    }

    // 3. Currency legality.
    if ctx.is_withdrawal_request && !ctx.currency.withdrawable() {
        return deny(
            "currencyNotWithdrawable",
            format!("{} is not a withdrawable currency", ctx.currency),
        );
    }

    // 4. Sweeps residency — applies to every operation, not just withdrawals.
    if matches!(ctx.currency, Currency::Sweeps)
        && config.blocked_sweeps_states.contains(&ctx.user.state)
    {
        return PolicyOutcome {
            decision: Decision::DenyTerminal {
                code: "stateRestriction".to_string(),
                message: format!("SWEEPS play is not permitted in {}", ctx.user.state),
            },
            audit_signal: Some(AuditSignal {
                event: "stateRestrictionViolation".to_string(),
                severity_high: true,
                details: format!(
                    "user {} attempted a SWEEPS operation from blocked state {}",
                    ctx.user.id, ctx.user.state
                ),
            }),
        };
    }

    // 5. Age — any debit-polarity operation, not just withdrawals.
    if ctx.is_debit_operation {
        if let Some(age) = ctx.user.age_years_at(ctx.now) {
            if age < config.minimum_age_years {
                return deny("underAge", "user does not meet the minimum age requirement");
            }
        }
    }

    // 6. KYC.
    if ctx.is_withdrawal_request {
        if ctx.user.kyc_level < KycLevel::Basic {
            return deny("kycRequired", "withdrawal requires at least basic KYC");
        }
        if ctx.amount >= config.enhanced_kyc_threshold.ten_thousandths()
            && ctx.user.kyc_level < KycLevel::Enhanced
        {
            return deny(
                "enhancedKycRequired",
                "this amount requires enhanced KYC verification",
            );
        }
    }

    // 7. Amount bounds.
    if ctx.op == Op::Credit {
        if ctx.amount < config.min_deposit.ten_thousandths()
            || ctx.amount > config.max_deposit.ten_thousandths()
        {
            return deny("amountOutOfBounds", "deposit amount is outside allowed bounds");
        }
    }
    if ctx.op.is_withdrawal_like() && ctx.is_withdrawal_request {
        if ctx.amount < config.min_withdrawal.ten_thousandths()
            || ctx.amount > config.max_withdrawal.ten_thousandths()
        {
            return deny(
                "amountOutOfBounds",
                "withdrawal amount is outside allowed bounds",
            );
        }
    }

    // 8. Daily / monthly caps.
    if ctx.op == Op::Credit && ctx.projected_daily_deposit_total > config.daily_deposit_cap.ten_thousandths() {
        return deny("dailyDepositCapExceeded", "daily deposit cap would be exceeded");
    }
    if ctx.is_withdrawal_request {
        if ctx.projected_daily_withdrawal_total
            > config.daily_withdrawal_cap.ten_thousandths()
        {
            return deny(
                "dailyWithdrawalCapExceeded",
                "daily withdrawal cap would be exceeded",
            );
        }
        if ctx.projected_monthly_withdrawal_total
            > config.monthly_withdrawal_cap.ten_thousandths()
        {
            return deny(
                "monthlyWithdrawalCapExceeded",
                "monthly withdrawal cap would be exceeded",
            );
        }
    }

    // 9. Frequency.
    if ctx.ops_of_this_type_last_24h >= config.max_ops_per_day_per_type {
        return deny("frequencyLimitExceeded", "too many operations of this type in 24 hours");
    }

    // 10. Approval thresholds.
    if ctx.is_withdrawal_request {
        let suspicious = (ctx.is_new_account
            && ctx.amount >= config.dual_approval_threshold.ten_thousandths())
            || (config.enhanced_kyc_states.contains(&ctx.user.state)
                && ctx.amount >= config.enhanced_kyc_threshold.ten_thousandths());

        if ctx.amount >= config.triple_approval_threshold.ten_thousandths() {
            return PolicyOutcome {
                decision: Decision::DenyWithApproval(ApprovalKindHint::Triple),
                audit_signal: None,
            };
        }
        if ctx.amount >= config.dual_approval_threshold.ten_thousandths() {
            return PolicyOutcome {
                decision: Decision::DenyWithApproval(ApprovalKindHint::Dual),
                audit_signal: None,
            };
        }
        if suspicious {
            return PolicyOutcome {
                decision: Decision::DenyWithApproval(ApprovalKindHint::ComplianceReview),
                audit_signal: Some(AuditSignal {
                    event: "suspiciousActivitySignal".to_string(),
                    severity_high: false,
                    details: "new account or elevated-risk state flagged for review".to_string(),
                }),
            };
        }
    }

    PolicyOutcome {
        decision: Decision::Allow,
        audit_signal: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wlc_core::{AccountId, TransactionType, UserId};

    fn user(state: &str, kyc: KycLevel) -> User {
        User {
            id: UserId::new(),
            state: state.to_string(),
            kyc_level: kyc,
            status: UserStatus::Active,
            self_exclusion_until: None,
            date_of_birth: Some(Utc::now() - chrono::Duration::days(365 * 30)),
        }
    }

    fn account(currency: Currency) -> Account {
        Account::new(
            AccountId::new(),
            UserId::new(),
            currency,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
    }

    fn base_ctx<'a>(
        user: &'a User,
        account: &'a Account,
        op: Op,
        is_withdrawal: bool,
        amount: Money,
    ) -> PolicyContext<'a> {
        PolicyContext {
            user,
            account,
            currency: account.currency,
            op,
            is_withdrawal_request: is_withdrawal,
            is_debit_operation: matches!(op, Op::Debit | Op::Hold | Op::Confirm),
            amount,
            now: Utc::now(),
            projected_daily_deposit_total: amount,
            projected_daily_withdrawal_total: amount,
            projected_monthly_withdrawal_total: amount,
            ops_of_this_type_last_24h: 0,
            is_new_account: false,
        }
    }

    #[test]
    fn denies_sweeps_for_blocked_state_including_credit() {
        let u = user("WA", KycLevel::Enhanced);
        let a = account(Currency::Sweeps);
        let ctx = base_ctx(&u, &a, Op::Credit, false, Money::parse("10.0000").unwrap());
        let outcome = evaluate(&ctx, &WlcConfig::default());
        assert!(matches!(
            outcome.decision,
            Decision::DenyTerminal { ref code, .. } if code == "stateRestriction"
        ));
    }

    #[test]
    fn denies_withdrawal_without_kyc() {
        let u = user("CA", KycLevel::None);
        let a = account(Currency::Sweeps);
        let ctx = base_ctx(&u, &a, Op::Debit, true, Money::parse("50.0000").unwrap());
        let outcome = evaluate(&ctx, &WlcConfig::default());
        assert!(matches!(
            outcome.decision,
            Decision::DenyTerminal { ref code, .. } if code == "kycRequired"
        ));
    }

    #[test]
    fn denies_gold_withdrawal_as_currency_not_withdrawable() {
        let u = user("CA", KycLevel::Enhanced);
        let a = account(Currency::Gold);
        let ctx = base_ctx(&u, &a, Op::Debit, true, Money::parse("100.0000").unwrap());
        let outcome = evaluate(&ctx, &WlcConfig::default());
        assert!(matches!(
            outcome.decision,
            Decision::DenyTerminal { ref code, .. } if code == "currencyNotWithdrawable"
        ));
    }

    #[test]
    fn requires_dual_approval_above_threshold() {
        let u = user("CA", KycLevel::Enhanced);
        let a = account(Currency::Sweeps);
        let config = WlcConfig::default();
        let mut ctx = base_ctx(&u, &a, Op::Debit, true, config.dual_approval_threshold);
        ctx.projected_daily_withdrawal_total = ctx.amount;
        ctx.projected_monthly_withdrawal_total = ctx.amount;
        let outcome = evaluate(&ctx, &config);
        assert_eq!(
            outcome.decision,
            Decision::DenyWithApproval(ApprovalKindHint::Dual)
        );
    }

    #[test]
    fn allows_ordinary_gold_credit() {
        let u = user("CA", KycLevel::None);
        let a = account(Currency::Gold);
        let ctx = base_ctx(&u, &a, Op::Credit, false, Money::parse("100.0000").unwrap());
        let outcome = evaluate(&ctx, &WlcConfig::default());
        assert_eq!(outcome.decision, Decision::Allow);
    }

    #[test]
    fn transaction_type_is_debit_like_matches_withdrawal_and_bet() {
        assert!(TransactionType::Withdrawal.is_debit_like());
        assert!(TransactionType::Bet.is_debit_like());
        assert!(!TransactionType::Deposit.is_debit_like());
    }
}
