//! Environment for the checkout session.

use crate::service::ReservationService;
use crate::types::SessionOutcome;
use stagepass_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Called once when a session completes or is cancelled
pub type CompletionCallback = Arc<dyn Fn(SessionOutcome) + Send + Sync>;

/// Dependencies injected into the checkout reducer
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Clock for countdown and expiry checks
    pub clock: Arc<dyn Clock>,
    /// Remote reservation backend
    pub service: Arc<dyn ReservationService>,
    /// Completion callback
    pub on_complete: CompletionCallback,
    /// Countdown recompute period
    pub countdown_tick: Duration,
}

impl CheckoutEnvironment {
    /// Creates a new `CheckoutEnvironment` with a one second countdown tick
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        service: Arc<dyn ReservationService>,
        on_complete: CompletionCallback,
    ) -> Self {
        Self {
            clock,
            service,
            on_complete,
            countdown_tick: Duration::from_secs(1),
        }
    }

    /// Override the countdown tick period
    #[must_use]
    pub fn with_countdown_tick(mut self, tick: Duration) -> Self {
        self.countdown_tick = tick;
        self
    }
}

impl std::fmt::Debug for CheckoutEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutEnvironment")
            .field("countdown_tick", &self.countdown_tick)
            .finish_non_exhaustive()
    }
}
