//! Checkout session: one attendee moving from ticket selection to a
//! finalized registration.
//!
//! ```text
//! TicketSelection ──reserve──▶ OrderSummary ──proceed──▶ Payment ──finalize──▶ Success
//!                                   │                                        ▲
//!                                   └────── free: proceed finalizes ─────────┘
//!
//! OrderSummary | Payment ──expire──▶ TicketSelection
//! ```
//!
//! The session is a reducer hosted in a [`Store`](stagepass_runtime::Store).
//! [`CheckoutCoordinator`] is the async entry point most callers want.

pub mod actions;
pub mod coordinator;
pub mod environment;
pub mod reducer;
pub mod state;

pub use actions::CheckoutAction;
pub use coordinator::CheckoutCoordinator;
pub use environment::{CheckoutEnvironment, CompletionCallback};
pub use reducer::{COUNTDOWN, CheckoutReducer};
pub use state::{CheckoutSnapshot, CheckoutState, OperationKind, PendingOperation, Stage, Step};
