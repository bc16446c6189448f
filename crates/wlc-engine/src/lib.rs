//! C7/C8: the wallet engine pipeline and the approval workflow state
//! machine it drives. Everything here runs behind one account lock at a
//! time (`wlc-store::AccountLockHandle`) and talks to the policy
//! evaluator (`wlc-policy`), the durable store (`wlc-store`), and the
//! compliance audit journal (`wlc-audit`) — never to each other's
//! internals directly.

pub mod effects;
pub mod engine;
pub mod workflow;

pub use effects::{apply_delta, op_effect, Delta, EngineOp, OpEffect};
pub use engine::{Directory, WalletEngine};
pub use workflow::compensation_key;
