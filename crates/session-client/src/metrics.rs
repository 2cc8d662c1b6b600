//! Refresh and logout counters
//!
//! - `session_refresh_total` (counter): label `outcome` (`success`, `failure`)
//! - `session_refresh_waiters_total` (counter): requests parked behind a reissue
//! - `session_logout_total` (counter): forced logouts broadcast
//!
//! Without an installed recorder these calls are no-ops.

pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("session_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_waiter() {
    metrics::counter!("session_refresh_waiters_total").increment(1);
}

pub fn record_logout() {
    metrics::counter!("session_logout_total").increment(1);
}
