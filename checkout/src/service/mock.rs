//! In-memory reservation service for tests and local runs.
//!
//! Succeeds by default, issuing holds that expire a fixed duration after the
//! injected clock's current time. Results can be scripted per operation, and
//! every call is recorded so tests can assert what reached the "network".

use super::{
    FinalizeRequest, ReservationService, ReserveRequest, ServiceError, ServiceFuture,
    ServiceResult,
};
use crate::types::{
    Amount, Confirmation, ConfirmationId, EventId, EventListing, PaymentIntent, PaymentIntentId,
    Reservation, ReservationId, TicketTypeId,
};
use stagepass_core::environment::Clock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// A call received by [`MockReservationService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    /// `reserve_tickets`
    Reserve {
        /// Requested tier
        ticket_type_id: Option<TicketTypeId>,
        /// Requested quantity
        quantity: u32,
    },
    /// `create_payment_intent`
    CreatePaymentIntent {
        /// Reservation the intent is for
        reservation_id: ReservationId,
    },
    /// `finalize_registration`
    Finalize {
        /// Reservation consumed
        reservation_id: ReservationId,
        /// Payment confirmation sent
        payment_intent_id: Option<PaymentIntentId>,
    },
    /// `cancel_reservation`
    Cancel {
        /// Reservation released
        reservation_id: ReservationId,
    },
}

#[derive(Default)]
struct Scripted {
    reserve: VecDeque<ServiceResult<Reservation>>,
    payment_intents: VecDeque<ServiceResult<PaymentIntent>>,
    finalize: VecDeque<ServiceResult<Confirmation>>,
    cancel: VecDeque<ServiceResult<()>>,
}

struct Inner {
    clock: Arc<dyn Clock>,
    hold_duration: chrono::Duration,
    unit_price: Amount,
    prices: HashMap<TicketTypeId, Amount>,
    latency: Duration,
    scripted: Mutex<Scripted>,
    calls: Mutex<Vec<ServiceCall>>,
    next_id: Mutex<u64>,
    gate: watch::Sender<bool>,
}

/// Scriptable in-memory [`ReservationService`]
///
/// Clones share scripts, the call journal and the response gate.
#[derive(Clone)]
pub struct MockReservationService {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockReservationService {
    /// Create a service whose holds last five minutes and cost nothing
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                clock,
                hold_duration: chrono::Duration::minutes(5),
                unit_price: Amount::ZERO,
                prices: HashMap::new(),
                latency: Duration::ZERO,
                scripted: Mutex::new(Scripted::default()),
                calls: Mutex::new(Vec::new()),
                next_id: Mutex::new(0),
                gate,
            }),
        }
    }

    fn configure(self, f: impl FnOnce(&mut Inner)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                f(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            },
            Err(shared) => {
                tracing::warn!("MockReservationService already shared, configuration ignored");
                Self { inner: shared }
            },
        }
    }

    /// Price tickets by tier as listed for the event
    #[must_use]
    pub fn with_listing(self, listing: &EventListing) -> Self {
        let prices = listing
            .ticket_types
            .iter()
            .map(|t| (t.id.clone(), t.price))
            .collect();
        self.configure(|inner| inner.prices = prices)
    }

    /// Price for general admission tickets
    #[must_use]
    pub fn with_unit_price(self, price: Amount) -> Self {
        self.configure(|inner| inner.unit_price = price)
    }

    /// How long generated holds last
    #[must_use]
    pub fn with_hold_duration(self, duration: chrono::Duration) -> Self {
        self.configure(|inner| inner.hold_duration = duration)
    }

    /// Simulated network latency for every call
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.configure(|inner| inner.latency = latency)
    }

    /// Script the next `reserve_tickets` result
    pub fn enqueue_reserve(&self, result: ServiceResult<Reservation>) {
        lock(&self.inner.scripted).reserve.push_back(result);
    }

    /// Script the next `create_payment_intent` result
    pub fn enqueue_payment_intent(&self, result: ServiceResult<PaymentIntent>) {
        lock(&self.inner.scripted).payment_intents.push_back(result);
    }

    /// Script the next `finalize_registration` result
    pub fn enqueue_finalize(&self, result: ServiceResult<Confirmation>) {
        lock(&self.inner.scripted).finalize.push_back(result);
    }

    /// Script the next `cancel_reservation` result
    pub fn enqueue_cancel(&self, result: ServiceResult<()>) {
        lock(&self.inner.scripted).cancel.push_back(result);
    }

    /// Hold every response until [`release`](Self::release) is called
    ///
    /// Calls are still journaled when they arrive.
    pub fn hold_responses(&self) {
        self.inner.gate.send_replace(false);
    }

    /// Let held and future responses through
    pub fn release(&self) {
        self.inner.gate.send_replace(true);
    }

    /// Every call received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        lock(&self.inner.calls).clone()
    }

    /// Number of calls matching `predicate`
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&ServiceCall) -> bool) -> usize {
        lock(&self.inner.calls).iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: ServiceCall) {
        tracing::debug!(?call, "Mock reservation service call");
        lock(&self.inner.calls).push(call);
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut next = lock(&self.inner.next_id);
        *next += 1;
        format!("{prefix}-{}", *next)
    }

    fn price_of(&self, ticket_type_id: Option<&TicketTypeId>) -> Amount {
        ticket_type_id
            .and_then(|id| self.inner.prices.get(id).copied())
            .unwrap_or(self.inner.unit_price)
    }

    /// Wrap a result computed at call time into a delayed, gated future
    fn respond<T: Send + 'static>(&self, result: ServiceResult<T>) -> ServiceFuture<T> {
        let latency = self.inner.latency;
        let mut gate = self.inner.gate.subscribe();

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let released = gate.wait_for(|open| *open).await.is_ok();
            if !released {
                return Err(ServiceError::Network("mock service dropped".to_string()));
            }
            result
        })
    }
}

impl std::fmt::Debug for MockReservationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockReservationService")
            .field("calls", &lock(&self.inner.calls).len())
            .finish_non_exhaustive()
    }
}

impl ReservationService for MockReservationService {
    fn reserve_tickets(&self, request: ReserveRequest) -> ServiceFuture<Reservation> {
        self.record(ServiceCall::Reserve {
            ticket_type_id: request.ticket_type_id.clone(),
            quantity: request.quantity,
        });

        let scripted = lock(&self.inner.scripted).reserve.pop_front();
        let result = scripted.unwrap_or_else(|| {
            let total_amount = self
                .price_of(request.ticket_type_id.as_ref())
                .times(request.quantity)
                .ok_or_else(|| ServiceError::Internal("reservation total overflowed".to_string()))?;
            Ok(Reservation {
                id: ReservationId::new(self.next_id("res")),
                event_id: request.event_id,
                ticket_type_id: request.ticket_type_id,
                quantity: request.quantity,
                total_amount,
                expires_at: self.inner.clock.now() + self.inner.hold_duration,
            })
        });

        self.respond(result)
    }

    fn create_payment_intent(
        &self,
        _event_id: EventId,
        reservation_id: ReservationId,
    ) -> ServiceFuture<PaymentIntent> {
        self.record(ServiceCall::CreatePaymentIntent { reservation_id });

        let scripted = lock(&self.inner.scripted).payment_intents.pop_front();
        let result = scripted.unwrap_or_else(|| {
            let id = self.next_id("pi");
            Ok(PaymentIntent {
                client_secret: Some(format!("{id}_secret")),
                id: PaymentIntentId::new(id),
            })
        });

        self.respond(result)
    }

    fn finalize_registration(&self, request: FinalizeRequest) -> ServiceFuture<Confirmation> {
        self.record(ServiceCall::Finalize {
            reservation_id: request.reservation_id.clone(),
            payment_intent_id: request.payment_intent_id,
        });

        let scripted = lock(&self.inner.scripted).finalize.pop_front();
        let result = scripted.unwrap_or_else(|| {
            Ok(Confirmation {
                id: ConfirmationId::new(self.next_id("reg")),
                reservation_id: request.reservation_id,
            })
        });

        self.respond(result)
    }

    fn cancel_reservation(&self, reservation_id: ReservationId) -> ServiceFuture<()> {
        self.record(ServiceCall::Cancel { reservation_id });

        let scripted = lock(&self.inner.scripted).cancel.pop_front();
        self.respond(scripted.unwrap_or(Ok(())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::types::TicketType;
    use stagepass_testing::test_clock;

    fn service() -> MockReservationService {
        MockReservationService::new(Arc::new(test_clock()))
    }

    fn request(ticket_type: Option<&str>, quantity: u32) -> ReserveRequest {
        ReserveRequest {
            event_id: EventId::new("evt-1"),
            ticket_type_id: ticket_type.map(TicketTypeId::new),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_generated_reservation_uses_clock_and_prices() {
        let listing = EventListing::new(
            EventId::new("evt-1"),
            "Jazz brunch",
            vec![
                TicketType {
                    id: TicketTypeId::new("A"),
                    name: "Standard".to_string(),
                    price: Amount::from_units(10),
                },
                TicketType {
                    id: TicketTypeId::new("B"),
                    name: "Table".to_string(),
                    price: Amount::from_units(40),
                },
            ],
        );
        let service = service().with_listing(&listing);

        let reservation = service.reserve_tickets(request(Some("B"), 3)).await.unwrap();

        assert_eq!(reservation.id, ReservationId::new("res-1"));
        assert_eq!(reservation.total_amount, Amount::from_units(120));
        assert_eq!(
            reservation.expires_at,
            test_clock().now() + chrono::Duration::minutes(5)
        );
    }

    #[tokio::test]
    async fn test_scripted_results_are_used_in_order() {
        let service = service();
        service.enqueue_reserve(Err(ServiceError::Rejected {
            status: 409,
            message: "Sold out".to_string(),
        }));

        let first = service.reserve_tickets(request(None, 1)).await;
        let second = service.reserve_tickets(request(None, 1)).await;

        assert_eq!(first.unwrap_err().to_string(), "Sold out");
        assert!(second.is_ok());
        assert_eq!(service.count_calls(|c| matches!(c, ServiceCall::Reserve { .. })), 2);
    }

    #[tokio::test]
    async fn test_held_responses_wait_for_release() {
        let service = service();
        service.hold_responses();

        let pending = tokio::spawn(service.cancel_reservation(ReservationId::new("r1")));
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        assert_eq!(
            service.calls(),
            vec![ServiceCall::Cancel {
                reservation_id: ReservationId::new("r1")
            }]
        );

        service.release();
        assert!(pending.await.unwrap().is_ok());
    }
}
