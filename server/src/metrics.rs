//! Metrics collection for service monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Service metrics.
#[derive(Default)]
pub struct Metrics {
    /// Users registered.
    pub users_registered: AtomicU64,
    /// Failed user or admin logins.
    pub logins_failed: AtomicU64,
    /// Deposit requests created.
    pub deposits_created: AtomicU64,
    /// Deposits approved (balance credited).
    pub deposits_approved: AtomicU64,
    /// Deposits rejected.
    pub deposits_rejected: AtomicU64,
    /// Withdrawal requests created.
    pub withdrawals_created: AtomicU64,
    /// Withdrawals approved (balance debited).
    pub withdrawals_approved: AtomicU64,
    /// Withdrawals rejected.
    pub withdrawals_rejected: AtomicU64,
    /// Processing calls refused because the request was no longer pending.
    pub processing_conflicts: AtomicU64,
    /// Withdrawals refused for insufficient balance, at creation or approval.
    pub insufficient_funds: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn user_registered(&self) {
        Self::bump(&self.users_registered);
    }

    pub fn login_failed(&self) {
        Self::bump(&self.logins_failed);
    }

    pub fn deposit_created(&self) {
        Self::bump(&self.deposits_created);
    }

    /// Record a processed deposit.
    pub fn deposit_processed(&self, approved: bool) {
        if approved {
            Self::bump(&self.deposits_approved);
        } else {
            Self::bump(&self.deposits_rejected);
        }
    }

    pub fn withdrawal_created(&self) {
        Self::bump(&self.withdrawals_created);
    }

    /// Record a processed withdrawal.
    pub fn withdrawal_processed(&self, approved: bool) {
        if approved {
            Self::bump(&self.withdrawals_approved);
        } else {
            Self::bump(&self.withdrawals_rejected);
        }
    }

    pub fn processing_conflict(&self) {
        Self::bump(&self.processing_conflicts);
    }

    pub fn insufficient_funds(&self) {
        Self::bump(&self.insufficient_funds);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            users_registered: self.users_registered.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            deposits_created: self.deposits_created.load(Ordering::Relaxed),
            deposits_approved: self.deposits_approved.load(Ordering::Relaxed),
            deposits_rejected: self.deposits_rejected.load(Ordering::Relaxed),
            withdrawals_created: self.withdrawals_created.load(Ordering::Relaxed),
            withdrawals_approved: self.withdrawals_approved.load(Ordering::Relaxed),
            withdrawals_rejected: self.withdrawals_rejected.load(Ordering::Relaxed),
            processing_conflicts: self.processing_conflicts.load(Ordering::Relaxed),
            insufficient_funds: self.insufficient_funds.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub users_registered: u64,
    pub logins_failed: u64,
    pub deposits_created: u64,
    pub deposits_approved: u64,
    pub deposits_rejected: u64,
    pub withdrawals_created: u64,
    pub withdrawals_approved: u64,
    pub withdrawals_rejected: u64,
    pub processing_conflicts: u64,
    pub insufficient_funds: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
