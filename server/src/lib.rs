//! Cashdesk Server
//!
//! The wallet service: user registration and login, deposit and withdrawal
//! requests, and admin review. Approval of a request and its balance effect
//! commit as one unit of work, so a request moves the balance at most once.

pub mod config;
pub mod metrics;
pub mod validation;
pub mod auth;
pub mod deposit;
pub mod withdrawal;
pub mod service;
pub mod rpc;

pub use config::{AdminConfig, ServerConfig};
pub use service::Cashdesk;
