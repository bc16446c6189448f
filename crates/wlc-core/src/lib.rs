//! Shared domain vocabulary for the wallet and ledger core: the entities
//! from the data model, the error taxonomy, the external outcome type,
//! and the configuration snapshot.

pub mod account;
pub mod approval;
pub mod audit;
pub mod config;
pub mod currency;
pub mod directory;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod outcome;
pub mod transaction;
pub mod user;
pub mod views;

pub use account::{Account, AccountStatus};
pub use approval::{ApprovalError, ApprovalKind, ApprovalState, ApprovalWorkflow};
pub use audit::{ComplianceAuditEntry, Severity};
pub use config::{ConfigHandle, WlcConfig};
pub use currency::Currency;
pub use directory::{ApproverDirectory, ApproverRole, UserDirectory};
pub use error::WlcError;
pub use ids::{
    AccountId, ApprovalWorkflowId, AuditEntryId, IdempotencyKey, LedgerEntryId, TransactionId,
    UserId,
};
pub use ledger::{LedgerEntry, LedgerSide};
pub use outcome::Outcome;
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use user::{KycLevel, User, UserStatus};
pub use views::{BalanceView, LedgerPage};
