//! Async facade over one checkout session's store.

use super::actions::CheckoutAction;
use super::environment::{CheckoutEnvironment, CompletionCallback};
use super::reducer::{COUNTDOWN, CheckoutReducer};
use super::state::{CheckoutSnapshot, CheckoutState};
use crate::config::Config;
use crate::countdown::Countdown;
use crate::error::CheckoutResult;
use crate::service::ReservationService;
use crate::types::{EventListing, PaymentIntentId, TicketTypeId};
use stagepass_core::environment::Clock;
use stagepass_runtime::{Store, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

type CheckoutStore = Store<CheckoutState, CheckoutAction, CheckoutEnvironment, CheckoutReducer>;

/// Drives one checkout session
///
/// Each command resolves once the remote call it started has answered and
/// the answer has been applied, then returns a snapshot. Validation failures
/// are returned as [`CheckoutError`](crate::CheckoutError) without touching the
/// network; remote failures show up in [`CheckoutSnapshot::error`].
///
/// Dropping the coordinator closes the session: the countdown stops, further
/// results are discarded and any hold, including one still being placed, is
/// released in the background. The completion callback does not fire.
pub struct CheckoutCoordinator {
    store: CheckoutStore,
    shutdown_timeout: Duration,
}

impl CheckoutCoordinator {
    /// Start a session at ticket selection
    #[must_use]
    pub fn new(listing: EventListing, environment: CheckoutEnvironment) -> Self {
        let store = Store::new(CheckoutState::new(listing), CheckoutReducer::new(), environment);
        let shutdown_timeout = store.config().default_shutdown_timeout;
        Self {
            store,
            shutdown_timeout,
        }
    }

    /// Start a session with tick period and shutdown timeout taken from `config`
    #[must_use]
    pub fn from_config(
        listing: EventListing,
        config: &Config,
        clock: Arc<dyn Clock>,
        service: Arc<dyn ReservationService>,
        on_complete: CompletionCallback,
    ) -> Self {
        let environment = CheckoutEnvironment::new(clock, service, on_complete)
            .with_countdown_tick(config.session.countdown_tick());
        let store_config =
            StoreConfig::default().with_shutdown_timeout(config.session.shutdown_timeout());
        let shutdown_timeout = store_config.default_shutdown_timeout;

        Self {
            store: Store::with_config(
                CheckoutState::new(listing),
                CheckoutReducer::new(),
                environment,
                store_config,
            ),
            shutdown_timeout,
        }
    }

    /// Change tier and quantity for the next reservation
    ///
    /// # Errors
    ///
    /// [`InvalidQuantity`](crate::CheckoutError::InvalidQuantity) for zero,
    /// [`SessionClosed`](crate::CheckoutError::SessionClosed) once the session ended.
    pub async fn select_ticket(
        &self,
        ticket_type_id: Option<TicketTypeId>,
        quantity: u32,
    ) -> CheckoutResult<CheckoutSnapshot> {
        self.dispatch(CheckoutAction::SelectTicket {
            ticket_type_id,
            quantity,
        })
        .await
    }

    /// Place a hold for the current selection
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not at ticket selection, another
    /// operation is in flight, or a ticket type is required and missing.
    pub async fn reserve(&self) -> CheckoutResult<CheckoutSnapshot> {
        self.dispatch(CheckoutAction::Reserve).await
    }

    /// Continue from the order summary
    ///
    /// Free reservations are finalized directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not at the order summary, another
    /// operation is in flight, or the hold already lapsed (the session is
    /// then back at ticket selection).
    pub async fn proceed_to_payment(&self) -> CheckoutResult<CheckoutSnapshot> {
        self.dispatch(CheckoutAction::ProceedToPayment).await
    }

    /// Finalize the registration
    ///
    /// Without `payment_intent_id` the session's own payment intent is used.
    ///
    /// # Errors
    ///
    /// Returns an error if no reservation is held, payment is still required,
    /// or another operation is in flight.
    pub async fn finalize(
        &self,
        payment_intent_id: Option<PaymentIntentId>,
    ) -> CheckoutResult<CheckoutSnapshot> {
        self.dispatch(CheckoutAction::Finalize { payment_intent_id }).await
    }

    /// Leave checkout
    ///
    /// Returns as soon as the session is closed. Releasing the hold runs in the
    /// background and its failure is only logged. The completion callback
    /// fires either way.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`](crate::CheckoutError::SessionClosed) if the session already ended.
    pub async fn cancel_session(&self) -> CheckoutResult<CheckoutSnapshot> {
        let (_, rejection) = self
            .store
            .send_and_inspect(CheckoutAction::CancelSession, |s| s.rejection.clone())
            .await?;
        if let Some(error) = rejection {
            return Err(error);
        }
        Ok(self.snapshot().await)
    }

    /// Current session state
    pub async fn snapshot(&self) -> CheckoutSnapshot {
        self.store.state(CheckoutState::snapshot).await
    }

    /// Time left on the hold, as of the last timer tick
    pub async fn countdown(&self) -> Option<Countdown> {
        self.store.state(|s| s.countdown).await
    }

    /// Whether the countdown timer task is running
    #[must_use]
    pub fn is_timer_running(&self) -> bool {
        self.store.is_task_active(&COUNTDOWN)
    }

    /// Observe every action produced by background work
    ///
    /// Network results and timer ticks are delivered; commands are not.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutAction> {
        self.store.subscribe_actions()
    }

    /// Stop the timer, release any hold, refuse further commands and wait for
    /// in-flight calls
    ///
    /// Like dropping the coordinator, this does not fire the completion callback.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`](stagepass_runtime::StoreError::ShutdownTimeout)
    /// if calls are still running after the configured timeout.
    pub async fn shutdown(&self) -> CheckoutResult<()> {
        self.store.close_with(CheckoutAction::Teardown);
        self.store.shutdown(self.shutdown_timeout).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, action), fields(command = action.name()))]
    async fn dispatch(&self, action: CheckoutAction) -> CheckoutResult<CheckoutSnapshot> {
        let (mut handle, rejection) = self
            .store
            .send_and_inspect(action, |s| s.rejection.clone())
            .await?;
        if let Some(error) = rejection {
            return Err(error);
        }

        handle.wait().await;
        Ok(self.snapshot().await)
    }
}

impl Drop for CheckoutCoordinator {
    fn drop(&mut self) {
        if !self.store.is_shut_down() {
            self.store.close_with(CheckoutAction::Teardown);
        }
    }
}

impl std::fmt::Debug for CheckoutCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutCoordinator")
            .field("timer_running", &self.is_timer_running())
            .finish_non_exhaustive()
    }
}
