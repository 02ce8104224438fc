//! Simulation scenarios.

use std::fmt;

use clap::ValueEnum;

/// A contention scenario to replay against the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Several admins approve the same pending deposit at once.
    DoubleApproval,
    /// Two withdrawals each worth the whole balance are approved at once.
    Overcommit,
    /// Random deposits, withdrawals and decisions interleaved.
    Mixed,
}

impl Scenario {
    pub fn description(&self) -> &'static str {
        match self {
            Scenario::DoubleApproval => "concurrent approvals of one deposit credit exactly once",
            Scenario::Overcommit => "over-committed withdrawals never drive a balance negative",
            Scenario::Mixed => "balances equal approved deposits minus approved withdrawals",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scenario::DoubleApproval => "double-approval",
            Scenario::Overcommit => "overcommit",
            Scenario::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// Outcome of one scenario run.
#[derive(Debug, Default)]
pub struct Report {
    /// Invariant violations found, one line each.
    pub violations: Vec<String>,
}

impl Report {
    pub fn violation(&mut self, message: impl Into<String>) {
        self.violations.push(message.into());
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}
