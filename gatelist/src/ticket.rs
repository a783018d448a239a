//! Ticket payload contract.
//!
//! The QR renderer is an external collaborator; what it encodes (and what a
//! venue scanner hands back) is this JSON payload. Resolution accepts either
//! the structured payload or a bare ticket code typed by an operator, and
//! both funnel through [`gatelist_core::TicketId::parse`] so malformed
//! identifiers are rejected before any store lookup.

use crate::error::CheckInError;
use chrono::{DateTime, Utc};
use gatelist_core::{Booking, TicketId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `type` discriminator every valid payload carries.
pub const TICKET_PAYLOAD_TYPE: &str = "TICKET";

/// The structured value embedded in a ticket QR code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPayload {
    /// Always [`TICKET_PAYLOAD_TYPE`]
    #[serde(rename = "type")]
    pub kind: String,
    /// The booking's ticket code
    #[serde(rename = "ticketId")]
    pub ticket_id: String,
    /// When the payload was produced
    #[serde(rename = "issuedAt")]
    pub issued_at: DateTime<Utc>,
}

impl TicketPayload {
    /// Build the payload for a booking's ticket.
    #[must_use]
    pub fn for_booking(booking: &Booking, issued_at: DateTime<Utc>) -> Self {
        Self {
            kind: TICKET_PAYLOAD_TYPE.to_owned(),
            ticket_id: booking.ticket_id.as_str().to_owned(),
            issued_at,
        }
    }

    /// Encode as the JSON string the QR renderer consumes.
    #[must_use]
    pub fn encode(&self) -> String {
        // A struct of strings and a timestamp always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Resolve raw scanner/operator input to a sanitized ticket id.
///
/// Structured payloads (JSON objects) must carry `type: "TICKET"` and a
/// well-formed `ticketId`; anything else is `InvalidFormat`. Input that is
/// not a JSON object at all falls back to being treated as a manually typed
/// ticket code.
///
/// # Errors
///
/// [`CheckInError::InvalidFormat`] on any malformed input.
pub(crate) fn ticket_from_scan(raw: &str) -> Result<TicketId, CheckInError> {
    let trimmed = raw.trim();

    if trimmed.starts_with('{') {
        let value: Value =
            serde_json::from_str(trimmed).map_err(|_| CheckInError::InvalidFormat)?;
        if value.get("type").and_then(Value::as_str) != Some(TICKET_PAYLOAD_TYPE) {
            return Err(CheckInError::InvalidFormat);
        }
        let ticket = value
            .get("ticketId")
            .and_then(Value::as_str)
            .ok_or(CheckInError::InvalidFormat)?;
        return TicketId::parse(ticket).ok_or(CheckInError::InvalidFormat);
    }

    TicketId::parse(trimmed).ok_or(CheckInError::InvalidFormat)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gatelist_core::{EventId, SubjectId};

    fn booking() -> Booking {
        Booking::confirmed(SubjectId::new(), EventId::new(), Utc::now())
    }

    #[test]
    fn payload_round_trips_through_scan() {
        let booking = booking();
        let payload = TicketPayload::for_booking(&booking, Utc::now());
        let resolved = ticket_from_scan(&payload.encode()).unwrap();
        assert_eq!(resolved, booking.ticket_id);
    }

    #[test]
    fn bare_ticket_code_resolves_as_manual_entry() {
        let booking = booking();
        let resolved = ticket_from_scan(booking.ticket_id.as_str()).unwrap();
        assert_eq!(resolved, booking.ticket_id);
    }

    #[test]
    fn unrecognized_payload_type_is_rejected() {
        let raw = r#"{"type": "BADGE", "ticketId": "TKT-abc", "issuedAt": "2026-01-01T00:00:00Z"}"#;
        assert_eq!(ticket_from_scan(raw).unwrap_err(), CheckInError::InvalidFormat);
    }

    #[test]
    fn payload_missing_ticket_id_is_rejected() {
        let raw = r#"{"type": "TICKET", "issuedAt": "2026-01-01T00:00:00Z"}"#;
        assert_eq!(ticket_from_scan(raw).unwrap_err(), CheckInError::InvalidFormat);
    }

    #[test]
    fn truncated_json_is_rejected_not_treated_as_manual() {
        // Starts like a payload, so it never falls back to manual entry.
        let raw = r#"{"type": "TICKET", "ticketId": "#;
        assert_eq!(ticket_from_scan(raw).unwrap_err(), CheckInError::InvalidFormat);
    }

    #[test]
    fn garbage_manual_entry_is_rejected_before_lookup() {
        assert_eq!(
            ticket_from_scan("TKT-abc; DROP TABLE").unwrap_err(),
            CheckInError::InvalidFormat
        );
        assert_eq!(ticket_from_scan("").unwrap_err(), CheckInError::InvalidFormat);
    }
}
