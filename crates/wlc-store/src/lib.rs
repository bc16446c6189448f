//! Durable `sled`-backed storage for the idempotency store (C4), the
//! account store (C5), and the ledger (C6), plus the transaction and
//! approval-workflow records the engine needs alongside them. One
//! `sled::Db`, one named tree per entity family — see [`db::WlcStore`].

pub mod accounts;
pub mod approvals;
pub mod audit;
pub mod db;
pub mod idempotency;
pub mod ledger;
pub mod transactions;
pub mod users;

pub use accounts::{AccountLockHandle, AccountLockRegistry};
pub use db::WlcStore;
pub use idempotency::TryBeginResult;
