//! # Stagepass Checkout
//!
//! Ticket reservation and checkout for Stagepass events.
//!
//! A session walks an attendee from ticket selection through a time-boxed
//! reservation hold and payment to a finalized registration. The hold's
//! expiry comes from the reservation service; a countdown timer returns the
//! session to ticket selection when it lapses.
//!
//! ## Example
//!
//! ```ignore
//! use stagepass_checkout::{CheckoutCoordinator, CheckoutEnvironment, MockReservationService};
//!
//! let coordinator = CheckoutCoordinator::new(listing, environment);
//! coordinator.select_ticket(Some("early-bird".into()), 2).await?;
//! coordinator.reserve().await?;
//! let snapshot = coordinator.proceed_to_payment().await?;
//! ```

pub mod config;
pub mod countdown;
pub mod error;
pub mod metrics;
pub mod service;
pub mod session;
pub mod types;

pub use config::Config;
pub use countdown::Countdown;
pub use error::{CheckoutError, CheckoutResult};
pub use service::{
    HttpReservationService, MockReservationService, ReservationService, ServiceCall, ServiceError,
};
pub use session::{
    CheckoutAction, CheckoutCoordinator, CheckoutEnvironment, CheckoutSnapshot, CheckoutState,
    CompletionCallback, Step,
};
pub use types::{
    Amount, Confirmation, EventId, EventListing, NegativeAmount, PaymentIntent, PaymentIntentId,
    Reservation, ReservationId, SessionNotice, SessionOutcome, TicketSelection, TicketType,
    TicketTypeId,
};
