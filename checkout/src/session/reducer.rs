//! Reducer for the checkout session.
//!
//! Commands are validated against the current state before anything reaches
//! the network. A refused command leaves the reason in
//! [`CheckoutState::rejection`] and returns no effects.
//!
//! Every remote call is dispatched under a fresh attempt number. Its result
//! comes back as an action carrying that number and is only applied if the
//! number still matches the pending operation.

use super::actions::CheckoutAction;
use super::environment::CheckoutEnvironment;
use super::state::{CheckoutState, OperationKind, Stage, Step};
use crate::countdown::{self, Countdown};
use crate::error::CheckoutError;
use crate::metrics;
use crate::service::{
    FinalizeRequest, ReservationService, ReserveRequest, ServiceError, ServiceFuture,
    ServiceResult,
};
use crate::types::{
    Confirmation, PaymentIntent, PaymentIntentId, Reservation, ReservationId, SessionNotice,
    SessionOutcome, TicketSelection, TicketTypeId,
};
use futures::FutureExt;
use stagepass_core::effect::{Effect, EffectId};
use stagepass_core::reducer::Reducer;
use stagepass_core::{SmallVec, smallvec};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Id of the countdown task while a hold is live
pub const COUNTDOWN: EffectId = EffectId::from_static("checkout.countdown");

type Effects = SmallVec<[Effect<CheckoutAction>; 4]>;

/// Reducer for the checkout session
#[derive(Clone, Debug, Default)]
pub struct CheckoutReducer;

impl CheckoutReducer {
    /// Creates a new `CheckoutReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    // ========================================================================
    // Guards
    // ========================================================================

    fn ensure_open(state: &CheckoutState) -> Result<(), CheckoutError> {
        if state.is_closed() {
            return Err(CheckoutError::SessionClosed);
        }
        Ok(())
    }

    fn ensure_idle(state: &CheckoutState) -> Result<(), CheckoutError> {
        if state.is_processing() {
            return Err(CheckoutError::OperationInProgress);
        }
        Ok(())
    }

    // ========================================================================
    // Effects
    // ========================================================================

    /// Run a service call on the effect task and map its outcome to an action
    ///
    /// A panic inside the call is reported as a failure so the pending
    /// operation is always released.
    fn remote_call<T, C, F>(
        service: &Arc<dyn ReservationService>,
        call: C,
        into_action: F,
    ) -> Effect<CheckoutAction>
    where
        T: Send + 'static,
        C: FnOnce(&dyn ReservationService) -> ServiceFuture<T> + Send + 'static,
        F: FnOnce(ServiceResult<T>) -> CheckoutAction + Send + 'static,
    {
        let service = Arc::clone(service);
        Effect::Future(Box::pin(async move {
            let result = AssertUnwindSafe(async move { call(service.as_ref()).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!("Reservation service call panicked");
                    Err(ServiceError::Internal(
                        "the request could not be completed".to_string(),
                    ))
                });
            Some(into_action(result))
        }))
    }

    fn notify(env: &CheckoutEnvironment, outcome: SessionOutcome) -> Effect<CheckoutAction> {
        let on_complete = Arc::clone(&env.on_complete);
        Effect::Future(Box::pin(async move {
            if std::panic::catch_unwind(AssertUnwindSafe(|| on_complete(outcome))).is_err() {
                tracing::error!("Completion callback panicked");
            }
            None
        }))
    }

    fn start_countdown(
        env: &CheckoutEnvironment,
        reservation_id: ReservationId,
    ) -> Effect<CheckoutAction> {
        Effect::Interval {
            period: env.countdown_tick,
            action: Box::new(CheckoutAction::Tick { reservation_id }),
        }
        .cancellable(COUNTDOWN)
    }

    fn release_hold(
        env: &CheckoutEnvironment,
        attempt: Option<u64>,
        reservation_id: ReservationId,
    ) -> Effect<CheckoutAction> {
        let id = reservation_id.clone();
        Self::remote_call(
            &env.service,
            move |service| service.cancel_reservation(id),
            move |result| CheckoutAction::CancellationSettled {
                attempt,
                reservation_id,
                error: result.err(),
            },
        )
    }

    fn dispatch_finalize(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
        reservation_id: ReservationId,
        payment_intent_id: Option<PaymentIntentId>,
    ) -> Effects {
        let attempt = state.begin(OperationKind::Finalize);
        tracing::info!(
            attempt,
            reservation_id = %reservation_id,
            paid = payment_intent_id.is_some(),
            "Finalizing registration"
        );

        let request = FinalizeRequest {
            event_id: state.listing.event_id.clone(),
            reservation_id,
            payment_intent_id,
        };

        smallvec![Self::remote_call(
            &env.service,
            move |service| service.finalize_registration(request),
            move |result| match result {
                Ok(confirmation) => CheckoutAction::RegistrationFinalized {
                    attempt,
                    confirmation,
                },
                Err(error) => CheckoutAction::FinalizationFailed { attempt, error },
            },
        )]
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn select_ticket(
        state: &mut CheckoutState,
        ticket_type_id: Option<TicketTypeId>,
        quantity: u32,
    ) -> Result<Effects, CheckoutError> {
        Self::ensure_open(state)?;
        if quantity == 0 {
            return Err(CheckoutError::InvalidQuantity);
        }

        tracing::debug!(ticket_type_id = ?ticket_type_id, quantity, "Selection changed");
        state.selection = TicketSelection {
            ticket_type_id,
            quantity,
        };
        Ok(SmallVec::new())
    }

    fn reserve(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
    ) -> Result<Effects, CheckoutError> {
        Self::ensure_open(state)?;
        Self::ensure_idle(state)?;
        if state.step() != Step::TicketSelection {
            return Err(CheckoutError::InvalidStep {
                command: "reserve",
                step: state.step(),
            });
        }
        if state.listing.requires_ticket_type() && state.selection.ticket_type_id.is_none() {
            return Err(CheckoutError::MissingTicketType);
        }

        let attempt = state.begin(OperationKind::Reserve);
        state.notice = None;

        let request = ReserveRequest {
            event_id: state.listing.event_id.clone(),
            ticket_type_id: state.selection.ticket_type_id.clone(),
            quantity: state.selection.quantity,
        };
        tracing::info!(
            attempt,
            ticket_type_id = ?request.ticket_type_id,
            quantity = request.quantity,
            "Reserving tickets"
        );

        Ok(smallvec![Self::remote_call(
            &env.service,
            move |service| service.reserve_tickets(request),
            move |result| match result {
                Ok(reservation) => CheckoutAction::ReservationCreated {
                    attempt,
                    reservation,
                },
                Err(error) => CheckoutAction::ReservationFailed { attempt, error },
            },
        )])
    }

    fn proceed_to_payment(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
    ) -> Result<Effects, CheckoutError> {
        Self::ensure_open(state)?;
        Self::ensure_idle(state)?;
        let reservation = match &state.stage {
            Stage::OrderSummary { reservation } => reservation.clone(),
            other => {
                return Err(CheckoutError::InvalidStep {
                    command: "proceed to payment",
                    step: other.step(),
                });
            },
        };

        if countdown::is_elapsed(reservation.expires_at, env.clock.now()) {
            let effects = Self::expire(state);
            state.rejection = Some(CheckoutError::ReservationExpired);
            return Ok(effects);
        }

        if reservation.is_free() {
            tracing::info!(reservation_id = %reservation.id, "Free reservation, skipping payment");
            return Ok(Self::dispatch_finalize(state, env, reservation.id, None));
        }

        let attempt = state.begin(OperationKind::CreatePaymentIntent);
        let event_id = state.listing.event_id.clone();
        let reservation_id = reservation.id;
        tracing::info!(
            attempt,
            reservation_id = %reservation_id,
            amount = %reservation.total_amount,
            "Requesting payment intent"
        );

        Ok(smallvec![Self::remote_call(
            &env.service,
            move |service| service.create_payment_intent(event_id, reservation_id),
            move |result| match result {
                Ok(payment_intent) => CheckoutAction::PaymentIntentCreated {
                    attempt,
                    payment_intent,
                },
                Err(error) => CheckoutAction::PaymentIntentFailed { attempt, error },
            },
        )])
    }

    fn finalize(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
        payment_intent_id: Option<PaymentIntentId>,
    ) -> Result<Effects, CheckoutError> {
        Self::ensure_open(state)?;
        Self::ensure_idle(state)?;

        let (reservation_id, payment_intent_id) = match &state.stage {
            Stage::OrderSummary { reservation } if reservation.is_free() => {
                (reservation.id.clone(), payment_intent_id)
            },
            Stage::OrderSummary { .. } => return Err(CheckoutError::PaymentRequired),
            Stage::Payment {
                reservation,
                payment_intent,
            } => (
                reservation.id.clone(),
                Some(payment_intent_id.unwrap_or_else(|| payment_intent.id.clone())),
            ),
            Stage::TicketSelection => return Err(CheckoutError::NoReservation),
            Stage::Success { .. } => return Err(CheckoutError::SessionClosed),
        };

        Ok(Self::dispatch_finalize(state, env, reservation_id, payment_intent_id))
    }

    fn cancel_session(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
    ) -> Result<Effects, CheckoutError> {
        Self::ensure_open(state)?;

        if let Some(pending) = state.pending {
            tracing::debug!(
                kind = ?pending.kind,
                attempt = pending.attempt,
                "Cancelling with an operation in flight, its response will be discarded"
            );
        }
        let held = state.reservation().map(|r| r.id.clone());

        state.invalidate_pending();
        state.cancelled = true;
        state.stage = Stage::TicketSelection;
        state.countdown = None;
        metrics::record_session_cancelled();

        // The callback does not wait for the release; teardown never blocks on the network.
        let mut effects: Effects = smallvec![
            Effect::Cancel(COUNTDOWN),
            Self::notify(env, SessionOutcome::Cancelled),
        ];
        match held {
            Some(reservation_id) => {
                let attempt = state.begin(OperationKind::Cancel);
                tracing::info!(attempt, reservation_id = %reservation_id, "Cancelling session, releasing hold");
                effects.push(Self::release_hold(env, Some(attempt), reservation_id));
            },
            None => tracing::info!("Cancelling session"),
        }
        Ok(effects)
    }

    /// Close the session without an attendee present
    ///
    /// Whatever is in flight is invalidated, so a hold that arrives later is
    /// released as an orphan rather than held.
    fn teardown(state: &mut CheckoutState, env: &CheckoutEnvironment) -> Effects {
        let mut effects: Effects = smallvec![Effect::Cancel(COUNTDOWN)];
        if state.is_closed() {
            return effects;
        }

        let held = state.reservation().map(|r| r.id.clone());
        state.invalidate_pending();
        state.cancelled = true;
        state.stage = Stage::TicketSelection;
        state.countdown = None;

        match held {
            Some(reservation_id) => {
                tracing::info!(reservation_id = %reservation_id, "Session torn down, releasing hold");
                effects.push(Self::release_hold(env, None, reservation_id));
            },
            None => tracing::info!("Session torn down"),
        }
        effects
    }

    // ========================================================================
    // Results
    // ========================================================================

    fn reservation_created(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
        attempt: u64,
        reservation: Reservation,
    ) -> Effects {
        if !state.settle(attempt) {
            tracing::warn!(
                attempt,
                reservation_id = %reservation.id,
                "Discarding stale reservation, releasing the orphaned hold"
            );
            metrics::record_stale_response("reserve");
            return smallvec![Self::release_hold(env, None, reservation.id)];
        }

        let reservation_id = reservation.id.clone();
        tracing::info!(
            reservation_id = %reservation_id,
            expires_at = %reservation.expires_at,
            total = %reservation.total_amount,
            "Reservation held"
        );
        metrics::record_reservation_created(reservation.quantity);

        state.countdown = Some(Countdown::until(reservation.expires_at, env.clock.now()));
        state.stage = Stage::OrderSummary { reservation };

        smallvec![Self::start_countdown(env, reservation_id)]
    }

    fn payment_intent_created(
        state: &mut CheckoutState,
        attempt: u64,
        payment_intent: PaymentIntent,
    ) -> Effects {
        if !state.settle(attempt) {
            tracing::warn!(attempt, "Discarding stale payment intent");
            metrics::record_stale_response("create_payment_intent");
            return SmallVec::new();
        }

        state.stage = match std::mem::replace(&mut state.stage, Stage::TicketSelection) {
            Stage::OrderSummary { reservation } => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    payment_intent_id = %payment_intent.id,
                    "Awaiting payment"
                );
                Stage::Payment {
                    reservation,
                    payment_intent,
                }
            },
            other => {
                tracing::warn!(step = %other.step(), "Payment intent arrived outside the order summary");
                other
            },
        };
        SmallVec::new()
    }

    fn registration_finalized(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
        attempt: u64,
        confirmation: Confirmation,
    ) -> Effects {
        if !state.settle(attempt) {
            tracing::warn!(
                attempt,
                confirmation_id = %confirmation.id,
                "Discarding stale registration"
            );
            metrics::record_stale_response("finalize");
            return SmallVec::new();
        }

        let quantity = state.reservation().map_or(0, |r| r.quantity);
        tracing::info!(confirmation_id = %confirmation.id, quantity, "Registration complete");
        metrics::record_session_completed(quantity);

        state.stage = Stage::Success {
            confirmation: confirmation.clone(),
        };
        state.countdown = None;
        state.notice = None;

        smallvec![
            Effect::Cancel(COUNTDOWN),
            Self::notify(env, SessionOutcome::Completed(confirmation)),
        ]
    }

    fn remote_failed(
        state: &mut CheckoutState,
        attempt: u64,
        operation: &'static str,
        error: &ServiceError,
    ) -> Effects {
        if !state.settle(attempt) {
            tracing::warn!(attempt, operation, %error, "Discarding stale failure");
            metrics::record_stale_response(operation);
            return SmallVec::new();
        }

        tracing::info!(attempt, operation, %error, "Reservation service call failed");
        metrics::record_remote_failure(operation);
        state.error = Some(error.to_string());
        SmallVec::new()
    }

    fn cancellation_settled(
        state: &mut CheckoutState,
        attempt: Option<u64>,
        reservation_id: &ReservationId,
        error: Option<&ServiceError>,
    ) -> Effects {
        if let Some(attempt) = attempt {
            state.settle(attempt);
        }
        match error {
            Some(error) => {
                tracing::warn!(reservation_id = %reservation_id, %error, "Failed to release reservation");
            },
            None => tracing::debug!(reservation_id = %reservation_id, "Reservation released"),
        }
        SmallVec::new()
    }

    // ========================================================================
    // Timer
    // ========================================================================

    fn tick(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
        reservation_id: &ReservationId,
    ) -> Effects {
        let Some(held) = state.reservation() else {
            tracing::debug!("Countdown tick without a held reservation, stopping timer");
            return smallvec![Effect::Cancel(COUNTDOWN)];
        };
        if &held.id != reservation_id {
            tracing::debug!(reservation_id = %reservation_id, "Ignoring tick for a previous reservation");
            return SmallVec::new();
        }

        let expires_at = held.expires_at;
        let now = env.clock.now();
        state.countdown = Some(Countdown::until(expires_at, now));

        if countdown::is_elapsed(expires_at, now) {
            Self::expire(state)
        } else {
            SmallVec::new()
        }
    }

    /// Drop the hold and return to ticket selection
    ///
    /// No-op without a held reservation, so a second expiry changes nothing.
    fn expire(state: &mut CheckoutState) -> Effects {
        let Some(reservation) = state.reservation() else {
            tracing::debug!("Expire ignored, no reservation held");
            return SmallVec::new();
        };
        let reservation_id = reservation.id.clone();

        if let Some(pending) = state.pending {
            tracing::warn!(
                kind = ?pending.kind,
                attempt = pending.attempt,
                "Hold lapsed with an operation in flight, its response will be discarded"
            );
        }

        state.invalidate_pending();
        state.stage = Stage::TicketSelection;
        state.countdown = None;
        state.error = None;
        state.notice = Some(SessionNotice::SessionExpired);

        tracing::info!(reservation_id = %reservation_id, "Reservation expired");
        metrics::record_reservation_expired();

        smallvec![Effect::Cancel(COUNTDOWN)]
    }
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if action.is_command() {
            state.rejection = None;
        }
        let name = action.name();

        let result = match action {
            // ========== Commands ==========
            CheckoutAction::SelectTicket {
                ticket_type_id,
                quantity,
            } => Self::select_ticket(state, ticket_type_id, quantity),
            CheckoutAction::Reserve => Self::reserve(state, env),
            CheckoutAction::ProceedToPayment => Self::proceed_to_payment(state, env),
            CheckoutAction::Finalize { payment_intent_id } => {
                Self::finalize(state, env, payment_intent_id)
            },
            CheckoutAction::CancelSession => Self::cancel_session(state, env),

            // ========== Results ==========
            CheckoutAction::ReservationCreated {
                attempt,
                reservation,
            } => Ok(Self::reservation_created(state, env, attempt, reservation)),
            CheckoutAction::ReservationFailed { attempt, error } => {
                Ok(Self::remote_failed(state, attempt, "reserve", &error))
            },
            CheckoutAction::PaymentIntentCreated {
                attempt,
                payment_intent,
            } => Ok(Self::payment_intent_created(state, attempt, payment_intent)),
            CheckoutAction::PaymentIntentFailed { attempt, error } => Ok(Self::remote_failed(
                state,
                attempt,
                "create_payment_intent",
                &error,
            )),
            CheckoutAction::RegistrationFinalized {
                attempt,
                confirmation,
            } => Ok(Self::registration_finalized(state, env, attempt, confirmation)),
            CheckoutAction::FinalizationFailed { attempt, error } => {
                Ok(Self::remote_failed(state, attempt, "finalize", &error))
            },
            CheckoutAction::CancellationSettled {
                attempt,
                reservation_id,
                error,
            } => Ok(Self::cancellation_settled(
                state,
                attempt,
                &reservation_id,
                error.as_ref(),
            )),

            // ========== Timer ==========
            CheckoutAction::Tick { reservation_id } => Ok(Self::tick(state, env, &reservation_id)),
            CheckoutAction::Expire => Ok(Self::expire(state)),

            // ========== Lifecycle ==========
            CheckoutAction::Teardown => Ok(Self::teardown(state, env)),
        };

        result.unwrap_or_else(|error| {
            tracing::debug!(command = name, %error, step = %state.step(), "Command rejected");
            state.rejection = Some(error);
            SmallVec::new()
        })
    }
}
