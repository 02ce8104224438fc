//! Cashdesk Common Types
//!
//! This crate contains the shared domain types used across Cashdesk,
//! including identifiers, the money type, the request status state machine,
//! payment channels and the error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod status;
pub mod payment;
pub mod records;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use status::*;
pub use payment::*;
pub use records::*;
pub use error::*;
