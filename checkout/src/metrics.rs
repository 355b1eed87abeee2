//! Checkout metrics.
//!
//! ## Counters
//! - `checkout_reservations_total{status}` - Holds by outcome (created, expired)
//! - `checkout_sessions_total{status}` - Sessions by outcome (completed, cancelled)
//! - `checkout_tickets_registered_total` - Tickets in finalized registrations
//! - `checkout_remote_failures_total{operation}` - Failed service calls
//! - `checkout_stale_responses_total{operation}` - Responses discarded as stale
//!
//! Nothing is exported from here; install a recorder in the host application.

use metrics::describe_counter;

/// Register metric descriptions with the installed recorder.
///
/// Call once at startup, after installing a recorder.
pub fn register_checkout_metrics() {
    describe_counter!(
        "checkout_reservations_total",
        "Reservation holds by status (created, expired)"
    );
    describe_counter!(
        "checkout_sessions_total",
        "Checkout sessions by outcome (completed, cancelled)"
    );
    describe_counter!(
        "checkout_tickets_registered_total",
        "Tickets in finalized registrations"
    );
    describe_counter!(
        "checkout_remote_failures_total",
        "Reservation service calls that failed, by operation"
    );
    describe_counter!(
        "checkout_stale_responses_total",
        "Service responses discarded because the session moved on, by operation"
    );

    tracing::debug!("Checkout metrics registered");
}

/// Record a hold placed for `quantity` tickets.
pub fn record_reservation_created(quantity: u32) {
    metrics::counter!("checkout_reservations_total", "status" => "created").increment(1);
    tracing::trace!(quantity, "Recorded reservation_created metric");
}

/// Record a hold that lapsed before checkout finished.
pub fn record_reservation_expired() {
    metrics::counter!("checkout_reservations_total", "status" => "expired").increment(1);
}

/// Record a finalized registration.
pub fn record_session_completed(quantity: u32) {
    metrics::counter!("checkout_sessions_total", "status" => "completed").increment(1);
    metrics::counter!("checkout_tickets_registered_total").increment(u64::from(quantity));
}

/// Record an attendee leaving checkout.
pub fn record_session_cancelled() {
    metrics::counter!("checkout_sessions_total", "status" => "cancelled").increment(1);
}

/// Record a failed service call.
pub fn record_remote_failure(operation: &'static str) {
    metrics::counter!("checkout_remote_failures_total", "operation" => operation).increment(1);
}

/// Record a response that arrived after the session moved on.
pub fn record_stale_response(operation: &'static str) {
    metrics::counter!("checkout_stale_responses_total", "operation" => operation).increment(1);
}
