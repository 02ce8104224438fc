//! Cashdesk Ledger
//!
//! Persistent user balances and deposit/withdrawal requests. Every mutation
//! runs inside a unit of work ([`LedgerTx`]) so that a status transition and
//! its balance side effect commit or roll back together.

pub mod store;
pub mod balance;
pub mod engine;
pub mod memory;
pub mod postgres;

pub use store::{LedgerStore, LedgerTx};
pub use balance::{Adjustment, BalanceChange, BalanceChangeType};
pub use engine::LedgerEngine;
pub use memory::MemoryStore;
pub use postgres::PgStore;
