//! Domain types for event checkout.
//!
//! Identifiers are issued by the remote reservation service and treated as
//! opaque strings. Amounts are non-negative decimals in whatever currency the
//! event is priced in; the service may send them with or without a fraction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "` from a server-issued value")]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the id as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a listed event (gig, show, workshop)
    EventId
);
string_id!(
    /// Identifier of a ticket tier within an event
    TicketTypeId
);
string_id!(
    /// Identifier of a reservation hold
    ReservationId
);
string_id!(
    /// Identifier of a payment intent
    PaymentIntentId
);
string_id!(
    /// Identifier of a finalized registration
    ConfirmationId
);

// ============================================================================
// Amounts
// ============================================================================

/// Non-negative amount as sent by the reservation service
///
/// Decodes from any non-negative JSON number (`0`, `25`, `12.5`) or a decimal
/// string. Zero means free admission and is compared exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

/// A negative amount was supplied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("amount must not be negative, got {0}")]
pub struct NegativeAmount(Decimal);

impl Amount {
    /// Zero amount (free admission)
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Whole-unit amount
    #[must_use]
    pub fn from_units(units: u64) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Price of `quantity` items at this unit price, `None` on overflow
    #[must_use]
    pub fn times(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = NegativeAmount;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(NegativeAmount(value));
        }
        Ok(Self(value))
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

// ============================================================================
// Event listing
// ============================================================================

/// A ticket tier offered for an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    /// Tier id
    pub id: TicketTypeId,
    /// Display name ("Early bird", "Front row")
    pub name: String,
    /// Price per ticket
    pub price: Amount,
}

/// The event being checked out, with the tiers it offers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListing {
    /// Event id
    pub event_id: EventId,
    /// Event title
    pub title: String,
    /// Offered tiers; empty means general admission only
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
}

impl EventListing {
    /// Creates a listing
    #[must_use]
    pub fn new(event_id: EventId, title: impl Into<String>, ticket_types: Vec<TicketType>) -> Self {
        Self {
            event_id,
            title: title.into(),
            ticket_types,
        }
    }

    /// Whether a reservation must name a ticket type
    #[must_use]
    pub fn requires_ticket_type(&self) -> bool {
        self.ticket_types.len() > 1
    }

    /// Looks up a tier by id
    #[must_use]
    pub fn ticket_type(&self, id: &TicketTypeId) -> Option<&TicketType> {
        self.ticket_types.iter().find(|t| &t.id == id)
    }
}

/// What the attendee intends to reserve
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSelection {
    /// Chosen tier; `None` means general admission
    pub ticket_type_id: Option<TicketTypeId>,
    /// Number of tickets, always at least one
    pub quantity: u32,
}

impl TicketSelection {
    /// Initial selection for a listing: one ticket, preselecting the tier
    /// when the event has exactly one
    #[must_use]
    pub fn default_for(listing: &EventListing) -> Self {
        let ticket_type_id = match listing.ticket_types.as_slice() {
            [only] => Some(only.id.clone()),
            _ => None,
        };
        Self {
            ticket_type_id,
            quantity: 1,
        }
    }
}

// ============================================================================
// Reservation and payment
// ============================================================================

/// A time-boxed hold on ticket inventory, issued by the reservation service
///
/// `expires_at` is authoritative; it is never recomputed locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Reservation id
    #[serde(rename = "reservationId")]
    pub id: ReservationId,
    /// Event the hold belongs to
    pub event_id: EventId,
    /// Reserved tier; `None` means general admission
    #[serde(default)]
    pub ticket_type_id: Option<TicketTypeId>,
    /// Number of tickets held
    pub quantity: u32,
    /// Total to pay
    pub total_amount: Amount,
    /// When the hold lapses
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    /// Checks if the hold has lapsed at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether checkout can skip payment
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.total_amount.is_zero()
    }
}

/// Opaque payment authorization for a non-zero reservation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Intent id, passed back on finalize
    #[serde(rename = "paymentIntentId")]
    pub id: PaymentIntentId,
    /// Secret handed to the payment sheet, when the provider issues one
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Proof of a finalized registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    /// Registration id
    #[serde(rename = "registrationId")]
    pub id: ConfirmationId,
    /// Reservation that was consumed
    pub reservation_id: ReservationId,
}

// ============================================================================
// Session outcomes
// ============================================================================

/// User-visible notices that are not errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionNotice {
    /// The reservation hold lapsed and the session returned to ticket selection
    SessionExpired,
}

impl fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionExpired => {
                f.write_str("Your reservation has expired. Please select your tickets again.")
            },
        }
    }
}

/// How a checkout session ended, reported through the completion callback
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Registration finalized
    Completed(Confirmation),
    /// The attendee left checkout
    Cancelled,
}
