//! Reservation service boundary.
//!
//! The coordinator consumes the remote backend as four async operations. The
//! [`ReservationService`] trait is implemented over HTTP for production use
//! and in memory for tests and local runs.

use crate::types::{
    Confirmation, EventId, PaymentIntent, PaymentIntentId, Reservation, ReservationId,
    TicketTypeId,
};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

pub mod http;
pub mod mock;

pub use http::HttpReservationService;
pub use mock::{MockReservationService, ServiceCall};

/// Reservation service result
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Boxed future returned by every service operation
pub type ServiceFuture<T> = Pin<Box<dyn Future<Output = ServiceResult<T>> + Send>>;

/// Failure of a remote call
///
/// The `Display` output is the human-readable message shown to the attendee.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service answered with a non-success status
    #[error("{message}")]
    Rejected {
        /// HTTP status (or equivalent)
        status: u16,
        /// Message from the response body, or a generic one
        message: String,
    },

    /// The request never got an answer
    #[error("Network error: {0}")]
    Network(String),

    /// The request timed out
    #[error("The reservation service did not respond in time")]
    Timeout,

    /// The response could not be understood
    #[error("Unexpected response from the reservation service: {0}")]
    InvalidResponse(String),

    /// The client itself failed while making the call
    #[error("Reservation service failure: {0}")]
    Internal(String),
}

/// Input of [`ReservationService::reserve_tickets`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveRequest {
    /// Event to reserve for
    pub event_id: EventId,
    /// Tier, or `None` for general admission
    pub ticket_type_id: Option<TicketTypeId>,
    /// Number of tickets
    pub quantity: u32,
}

/// Input of [`ReservationService::finalize_registration`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeRequest {
    /// Event the reservation belongs to
    pub event_id: EventId,
    /// Reservation to consume
    pub reservation_id: ReservationId,
    /// Payment confirmation; absent for free reservations
    pub payment_intent_id: Option<PaymentIntentId>,
}

/// The remote reservation backend
///
/// Implementations must be cheap to share: the coordinator holds one behind
/// an `Arc` and calls it from spawned tasks.
pub trait ReservationService: Send + Sync {
    /// Place a hold on tickets
    ///
    /// # Errors
    ///
    /// Returns error if the hold cannot be placed (sold out, network, ...)
    fn reserve_tickets(&self, request: ReserveRequest) -> ServiceFuture<Reservation>;

    /// Create a payment intent for a non-zero reservation
    ///
    /// # Errors
    ///
    /// Returns error if the intent cannot be created
    fn create_payment_intent(
        &self,
        event_id: EventId,
        reservation_id: ReservationId,
    ) -> ServiceFuture<PaymentIntent>;

    /// Consume a reservation and register the attendee
    ///
    /// # Errors
    ///
    /// Returns error if the registration is refused (expired hold, failed payment, ...)
    fn finalize_registration(&self, request: FinalizeRequest) -> ServiceFuture<Confirmation>;

    /// Release a hold
    ///
    /// # Errors
    ///
    /// Returns error if the release fails; callers treat this as best effort
    fn cancel_reservation(&self, reservation_id: ReservationId) -> ServiceFuture<()>;
}
