use serde::{Deserialize, Serialize};

/// Aggregate report for one renewal pass, returned by both the scheduled
/// tick and the manual admin trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RenewalResult {
    pub total_checked: usize,
    pub successful_renewals: usize,
    pub failed_renewals: usize,
    pub skipped_renewals: usize,
    pub errors: Vec<String>,
}

/// Terminal state of one per-subscription renewal attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RenewalOutcome {
    Renewed,
    RetryScheduled,
    Suspended,
    /// No default active payment method existed; the engine cleared
    /// auto_renewal instead of charging.
    AutoRenewalDisabled,
    Skipped(String),
}
