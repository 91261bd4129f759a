//! Allocates an agent's credit balances against an amount owed, and settles
//! the result with the back-office ledger.
//!
//! Balances are loaded once into a `Snapshot`. Allocations happen against it,
//! either interactively (`AllocationSession::toggle`) or automatically, oldest
//! balance first (`AllocationSession::auto`). A complete session is turned into
//! a settlement payload and sent by a `PaymentDesk`.

pub mod adjustment;
pub mod allocation;
pub mod api;
pub mod config;
pub mod desk;
pub mod error;
pub mod input;
pub mod ledger;
pub mod money;
pub mod output;
pub mod run;
pub mod settlement;
