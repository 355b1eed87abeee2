//! Errors returned by the checkout coordinator.

use stagepass_runtime::StoreError;
use thiserror::Error;

use crate::session::Step;

/// Reasons a checkout command is rejected before reaching the network
///
/// Remote failures are not errors at this level: they are recorded on the
/// session as a message so the attendee can retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// The event has several ticket types and none was selected
    #[error("Please select a ticket type")]
    MissingTicketType,

    /// Quantity must be a positive integer
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// The command is not valid in the current step
    #[error("Cannot {command} during {step}")]
    InvalidStep {
        /// Rejected command
        command: &'static str,
        /// Step the session was in
        step: Step,
    },

    /// Another network operation is still in flight
    #[error("Another operation is already in progress")]
    OperationInProgress,

    /// The command needs a reservation and none is held
    #[error("No reservation is held")]
    NoReservation,

    /// The hold lapsed before the command was issued
    #[error("Your reservation has expired")]
    ReservationExpired,

    /// The reservation has a non-zero total and no payment intent exists
    #[error("Payment is required for this reservation")]
    PaymentRequired,

    /// The session already completed or was cancelled
    #[error("The checkout session has ended")]
    SessionClosed,

    /// The session's store rejected the command
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for coordinator commands
pub type CheckoutResult<T> = Result<T, CheckoutError>;
