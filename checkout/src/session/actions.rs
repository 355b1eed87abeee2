//! Actions for the checkout session.
//!
//! Commands come from the attendee through the coordinator. Results are fed
//! back by effects and carry the attempt number they were dispatched under.

use crate::service::ServiceError;
use crate::types::{Confirmation, PaymentIntent, PaymentIntentId, Reservation, ReservationId, TicketTypeId};

/// Actions for the checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutAction {
    // ========== Commands ==========
    /// Change tier and quantity for the next reservation
    SelectTicket {
        /// Tier, or `None` for general admission
        ticket_type_id: Option<TicketTypeId>,
        /// Number of tickets
        quantity: u32,
    },

    /// Place a hold for the current selection
    Reserve,

    /// Move from the order summary to payment (or straight to finalize when free)
    ProceedToPayment,

    /// Finalize the registration
    Finalize {
        /// Payment confirmation; defaults to the session's payment intent
        payment_intent_id: Option<PaymentIntentId>,
    },

    /// Leave checkout, releasing any hold
    CancelSession,

    // ========== Results ==========
    /// The service placed the hold
    ReservationCreated {
        /// Attempt the request was sent under
        attempt: u64,
        /// The hold
        reservation: Reservation,
    },

    /// The service refused or failed to place the hold
    ReservationFailed {
        /// Attempt the request was sent under
        attempt: u64,
        /// Failure
        error: ServiceError,
    },

    /// The service issued a payment intent
    PaymentIntentCreated {
        /// Attempt the request was sent under
        attempt: u64,
        /// The intent
        payment_intent: PaymentIntent,
    },

    /// The payment intent request failed
    PaymentIntentFailed {
        /// Attempt the request was sent under
        attempt: u64,
        /// Failure
        error: ServiceError,
    },

    /// The registration went through
    RegistrationFinalized {
        /// Attempt the request was sent under
        attempt: u64,
        /// Registration proof
        confirmation: Confirmation,
    },

    /// The registration was refused or failed
    FinalizationFailed {
        /// Attempt the request was sent under
        attempt: u64,
        /// Failure
        error: ServiceError,
    },

    /// A best-effort hold release finished, one way or the other
    CancellationSettled {
        /// Attempt of the cancel operation; `None` for orphaned holds
        attempt: Option<u64>,
        /// Released hold
        reservation_id: ReservationId,
        /// Failure, if any; only ever logged
        error: Option<ServiceError>,
    },

    // ========== Timer ==========
    /// Countdown tick for the hold it was started for
    Tick {
        /// Hold the countdown belongs to
        reservation_id: ReservationId,
    },

    /// The hold lapsed; return to ticket selection
    Expire,

    // ========== Lifecycle ==========
    /// The coordinator went away; stop the timer and release any hold
    ///
    /// Unlike [`CancelSession`](Self::CancelSession) the completion callback
    /// does not fire.
    Teardown,
}

impl CheckoutAction {
    /// Whether this action is an attendee command
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::SelectTicket { .. }
                | Self::Reserve
                | Self::ProceedToPayment
                | Self::Finalize { .. }
                | Self::CancelSession
        )
    }

    /// Name used in logs and errors
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SelectTicket { .. } => "select tickets",
            Self::Reserve => "reserve",
            Self::ProceedToPayment => "proceed to payment",
            Self::Finalize { .. } => "finalize",
            Self::CancelSession => "cancel",
            Self::ReservationCreated { .. } => "reservation created",
            Self::ReservationFailed { .. } => "reservation failed",
            Self::PaymentIntentCreated { .. } => "payment intent created",
            Self::PaymentIntentFailed { .. } => "payment intent failed",
            Self::RegistrationFinalized { .. } => "registration finalized",
            Self::FinalizationFailed { .. } => "finalization failed",
            Self::CancellationSettled { .. } => "cancellation settled",
            Self::Tick { .. } => "tick",
            Self::Expire => "expire",
            Self::Teardown => "teardown",
        }
    }
}
