//! HTTP/JSON client for the reservation service.
//!
//! Routes (relative to the configured base URL):
//!
//! | Operation | Request |
//! |---|---|
//! | reserve | `POST /events/{eventId}/reservations` |
//! | payment intent | `POST /events/{eventId}/payment-intents` |
//! | finalize | `POST /events/{eventId}/registrations` |
//! | cancel | `DELETE /reservations/{reservationId}` |
//!
//! Ids are percent-encoded, so each fills exactly one path segment.

use super::{
    FinalizeRequest, ReservationService, ReserveRequest, ServiceError, ServiceFuture,
    ServiceResult,
};
use crate::config::ApiConfig;
use crate::types::{
    Amount, Confirmation, ConfirmationId, EventId, PaymentIntent, PaymentIntentId, Reservation,
    ReservationId, TicketTypeId,
};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reservation service reached over HTTPS
///
/// Cloning shares the underlying connection pool.
#[derive(Clone, Debug)]
pub struct HttpReservationService {
    client: Client,
    base_url: Url,
    token: Option<Arc<str>>,
}

impl HttpReservationService {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Internal`] if the TLS backend cannot be
    /// initialised or the base URL is unusable.
    pub fn new(config: &ApiConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Self::with_client(client, &config.base_url, config.token.clone())
    }

    /// Wrap an existing `reqwest` client
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Internal`] if `base_url` does not parse or
    /// cannot take a path (e.g. `mailto:`).
    pub fn with_client(
        client: Client,
        base_url: &str,
        token: Option<String>,
    ) -> ServiceResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::Internal(format!("invalid base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Internal(format!(
                "base URL {base_url} cannot take a path"
            )));
        }

        Ok(Self {
            client,
            base_url,
            token: token.map(Arc::from),
        })
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReserveBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket_type_id: Option<&'a TicketTypeId>,
    quantity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentIntentBody<'a> {
    reservation_id: &'a ReservationId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeBody<'a> {
    reservation_id: &'a ReservationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_intent_id: Option<&'a PaymentIntentId>,
}

/// Reservation as returned by the service; echoed request fields are optional
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationResponse {
    reservation_id: ReservationId,
    event_id: Option<EventId>,
    ticket_type_id: Option<TicketTypeId>,
    quantity: Option<u32>,
    total_amount: Amount,
    expires_at: DateTime<Utc>,
}

impl ReservationResponse {
    fn into_reservation(self, request: ReserveRequest) -> Reservation {
        Reservation {
            id: self.reservation_id,
            event_id: self.event_id.unwrap_or(request.event_id),
            ticket_type_id: self.ticket_type_id.or(request.ticket_type_id),
            quantity: self.quantity.unwrap_or(request.quantity),
            total_amount: self.total_amount,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmationResponse {
    #[serde(alias = "confirmationId", alias = "id")]
    registration_id: ConfirmationId,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

// ============================================================================
// Response handling
// ============================================================================

fn transport_error(error: &reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout
    } else if error.is_decode() {
        ServiceError::InvalidResponse(error.to_string())
    } else {
        ServiceError::Network(error.to_string())
    }
}

/// Map a non-success response to [`ServiceError::Rejected`]
async fn check_status(response: Response) -> ServiceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "Request failed: {}",
                status.canonical_reason().unwrap_or("unknown status")
            )
        });

    Err(ServiceError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ServiceResult<T> {
    let response = request.send().await.map_err(|e| transport_error(&e))?;
    let response = check_status(response).await?;
    response.json::<T>().await.map_err(|e| transport_error(&e))
}

impl ReservationService for HttpReservationService {
    fn reserve_tickets(&self, request: ReserveRequest) -> ServiceFuture<Reservation> {
        let url = self.endpoint(&["events", request.event_id.as_str(), "reservations"]);
        let http = self.authorize(self.client.post(url).json(&ReserveBody {
            ticket_type_id: request.ticket_type_id.as_ref(),
            quantity: request.quantity,
        }));

        Box::pin(async move {
            let response: ReservationResponse = send_json(http).await?;
            let reservation = response.into_reservation(request);
            tracing::debug!(
                reservation_id = %reservation.id,
                expires_at = %reservation.expires_at,
                "Reservation created"
            );
            Ok(reservation)
        })
    }

    fn create_payment_intent(
        &self,
        event_id: EventId,
        reservation_id: ReservationId,
    ) -> ServiceFuture<PaymentIntent> {
        let url = self.endpoint(&["events", event_id.as_str(), "payment-intents"]);
        let http = self.authorize(self.client.post(url).json(&PaymentIntentBody {
            reservation_id: &reservation_id,
        }));

        Box::pin(async move { send_json::<PaymentIntent>(http).await })
    }

    fn finalize_registration(&self, request: FinalizeRequest) -> ServiceFuture<Confirmation> {
        let url = self.endpoint(&["events", request.event_id.as_str(), "registrations"]);
        let http = self.authorize(self.client.post(url).json(&FinalizeBody {
            reservation_id: &request.reservation_id,
            payment_intent_id: request.payment_intent_id.as_ref(),
        }));

        Box::pin(async move {
            let response: ConfirmationResponse = send_json(http).await?;
            Ok(Confirmation {
                id: response.registration_id,
                reservation_id: request.reservation_id,
            })
        })
    }

    fn cancel_reservation(&self, reservation_id: ReservationId) -> ServiceFuture<()> {
        let url = self.endpoint(&["reservations", reservation_id.as_str()]);
        let http = self.authorize(self.client.delete(url));

        Box::pin(async move {
            let response = http.send().await.map_err(|e| transport_error(&e))?;
            check_status(response).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;

    #[test]
    fn test_reserve_body_omits_missing_ticket_type() {
        let body = ReserveBody {
            ticket_type_id: None,
            quantity: 2,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"quantity":2}"#);

        let tier = TicketTypeId::new("A");
        let body = ReserveBody {
            ticket_type_id: Some(&tier),
            quantity: 1,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"ticketTypeId":"A","quantity":1}"#
        );
    }

    #[test]
    fn test_minimal_reservation_response_is_completed_from_request() {
        let response: ReservationResponse = serde_json::from_str(
            r#"{"reservationId":"r1","totalAmount":0,"expiresAt":"2025-01-01T00:05:00Z"}"#,
        )
        .unwrap();
        let request = ReserveRequest {
            event_id: EventId::new("evt-1"),
            ticket_type_id: Some(TicketTypeId::new("A")),
            quantity: 2,
        };

        let reservation = response.into_reservation(request);

        assert_eq!(reservation.id, ReservationId::new("r1"));
        assert_eq!(reservation.event_id, EventId::new("evt-1"));
        assert_eq!(reservation.ticket_type_id, Some(TicketTypeId::new("A")));
        assert_eq!(reservation.quantity, 2);
        assert!(reservation.is_free());
    }

    fn service(base_url: &str) -> HttpReservationService {
        HttpReservationService::with_client(Client::new(), base_url, None).unwrap()
    }

    #[test]
    fn test_base_url_with_or_without_trailing_slash() {
        for base in ["http://host/api", "http://host/api/"] {
            assert_eq!(
                service(base).endpoint(&["reservations", "r1"]).as_str(),
                "http://host/api/reservations/r1"
            );
        }
    }

    #[test]
    fn test_ids_are_encoded_as_single_segments() {
        let url = service("http://host/api").endpoint(&["reservations", "a/b?c#d"]);
        assert_eq!(url.as_str(), "http://host/api/reservations/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = service("http://host/api").endpoint(&["events", "../admin", "reservations"]);
        assert_eq!(url.path(), "/api/events/..%2Fadmin/reservations");
    }

    #[test]
    fn test_unusable_base_url_is_rejected() {
        assert!(HttpReservationService::with_client(Client::new(), "not a url", None).is_err());
        assert!(HttpReservationService::with_client(Client::new(), "mailto:ops@host", None).is_err());
    }
}
