//! Checkout session state.

use crate::countdown::Countdown;
use crate::error::CheckoutError;
use crate::types::{
    Confirmation, EventListing, PaymentIntent, Reservation, SessionNotice, TicketSelection,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the attendee is in checkout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    /// Choosing tier and quantity
    TicketSelection,
    /// Reviewing a held reservation
    OrderSummary,
    /// Paying for the held reservation
    Payment,
    /// Registration finalized (terminal)
    Success,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TicketSelection => "ticket selection",
            Self::OrderSummary => "order summary",
            Self::Payment => "payment",
            Self::Success => "success",
        };
        f.write_str(name)
    }
}

/// The step together with the data that only exists in that step
///
/// A reservation can only be reached through `OrderSummary` or `Payment`, so
/// leaving those steps drops it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// No hold yet
    TicketSelection,
    /// Hold placed, awaiting the attendee
    OrderSummary {
        /// The held reservation
        reservation: Reservation,
    },
    /// Hold placed and payment intent issued
    Payment {
        /// The held reservation
        reservation: Reservation,
        /// Intent to confirm on finalize
        payment_intent: PaymentIntent,
    },
    /// Registration finalized
    Success {
        /// Registration proof
        confirmation: Confirmation,
    },
}

impl Stage {
    /// The step this stage belongs to
    #[must_use]
    pub const fn step(&self) -> Step {
        match self {
            Self::TicketSelection => Step::TicketSelection,
            Self::OrderSummary { .. } => Step::OrderSummary,
            Self::Payment { .. } => Step::Payment,
            Self::Success { .. } => Step::Success,
        }
    }

    /// The held reservation, if any
    #[must_use]
    pub const fn reservation(&self) -> Option<&Reservation> {
        match self {
            Self::OrderSummary { reservation } | Self::Payment { reservation, .. } => {
                Some(reservation)
            },
            Self::TicketSelection | Self::Success { .. } => None,
        }
    }

    /// The payment intent, if any
    #[must_use]
    pub const fn payment_intent(&self) -> Option<&PaymentIntent> {
        match self {
            Self::Payment { payment_intent, .. } => Some(payment_intent),
            _ => None,
        }
    }
}

/// Network operation a session can have in flight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Placing a hold
    Reserve,
    /// Requesting a payment intent
    CreatePaymentIntent,
    /// Finalizing the registration
    Finalize,
    /// Releasing the hold on cancel
    Cancel,
}

/// The single in-flight operation and the attempt its response must carry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingOperation {
    /// What is in flight
    pub kind: OperationKind,
    /// Attempt number issued when it was dispatched
    pub attempt: u64,
}

/// State of one checkout session
#[derive(Clone, Debug)]
pub struct CheckoutState {
    /// Event being checked out
    pub listing: EventListing,
    /// What the next reserve will ask for
    pub selection: TicketSelection,
    /// Current step and its data
    pub stage: Stage,
    /// Operation in flight; `Some` means processing
    pub pending: Option<PendingOperation>,
    /// Last attempt number issued
    pub attempt: u64,
    /// Message of the last remote failure, cleared on the next attempt
    pub error: Option<String>,
    /// Non-error notice for the attendee
    pub notice: Option<SessionNotice>,
    /// Last countdown computed by the timer while a hold is live
    pub countdown: Option<Countdown>,
    /// Set once the attendee left checkout
    pub cancelled: bool,
    /// Why the last command was refused, if it was
    pub rejection: Option<CheckoutError>,
}

impl CheckoutState {
    /// Fresh session at ticket selection
    #[must_use]
    pub fn new(listing: EventListing) -> Self {
        let selection = TicketSelection::default_for(&listing);
        Self {
            listing,
            selection,
            stage: Stage::TicketSelection,
            pending: None,
            attempt: 0,
            error: None,
            notice: None,
            countdown: None,
            cancelled: false,
            rejection: None,
        }
    }

    /// Current step
    #[must_use]
    pub const fn step(&self) -> Step {
        self.stage.step()
    }

    /// Held reservation
    #[must_use]
    pub const fn reservation(&self) -> Option<&Reservation> {
        self.stage.reservation()
    }

    /// Whether a network operation is in flight
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the session accepts no further commands
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.cancelled || matches!(self.stage, Stage::Success { .. })
    }

    /// Mark `kind` as in flight under a new attempt number
    ///
    /// Any earlier pending attempt is superseded and its response will be
    /// discarded.
    pub(crate) fn begin(&mut self, kind: OperationKind) -> u64 {
        self.attempt += 1;
        self.pending = Some(PendingOperation {
            kind,
            attempt: self.attempt,
        });
        self.error = None;
        self.attempt
    }

    /// Release the pending operation if `attempt` is the one in flight
    ///
    /// Returns `false` for stale responses, which must not be applied.
    pub(crate) fn settle(&mut self, attempt: u64) -> bool {
        match self.pending {
            Some(pending) if pending.attempt == attempt => {
                self.pending = None;
                true
            },
            _ => false,
        }
    }

    /// Forget whatever is in flight so its response is treated as stale
    pub(crate) fn invalidate_pending(&mut self) {
        self.pending = None;
    }

    /// Point-in-time copy for callers
    #[must_use]
    pub fn snapshot(&self) -> CheckoutSnapshot {
        CheckoutSnapshot {
            step: self.step(),
            selection: self.selection.clone(),
            reservation: self.reservation().cloned(),
            payment_intent: self.stage.payment_intent().cloned(),
            confirmation: match &self.stage {
                Stage::Success { confirmation } => Some(confirmation.clone()),
                _ => None,
            },
            processing: self.is_processing(),
            error: self.error.clone(),
            notice: self.notice,
            countdown: self.countdown,
            cancelled: self.cancelled,
        }
    }
}

/// Read-only view of a session, as handed to a UI
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutSnapshot {
    /// Current step
    pub step: Step,
    /// Current ticket selection
    pub selection: TicketSelection,
    /// Held reservation
    pub reservation: Option<Reservation>,
    /// Payment intent, in the payment step
    pub payment_intent: Option<PaymentIntent>,
    /// Registration proof, once finalized
    pub confirmation: Option<Confirmation>,
    /// Whether a network operation is in flight
    pub processing: bool,
    /// Last remote failure message
    pub error: Option<String>,
    /// Non-error notice (expiry)
    pub notice: Option<SessionNotice>,
    /// Time left on the hold, as last computed by the timer
    pub countdown: Option<Countdown>,
    /// Whether the attendee left checkout
    pub cancelled: bool,
}
