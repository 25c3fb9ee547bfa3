//! Episode statistics: action audits, batch summaries, per-class performance
//! and threat tables.

mod actions;
mod class_performance;
mod summary;
mod threat;

pub use actions::{audit_actions, is_real_action, ActionAudit};
pub use class_performance::{class_performance, ClassStats, PARTY_WIN};
pub use summary::{summarize, BatchSummary, DurationStats};
pub use threat::{threat_table, ThreatEntry};

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
