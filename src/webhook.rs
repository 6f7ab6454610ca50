// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Payment gateway webhooks.
//!
//! Gateways deliver events at least once. Each event id is processed at most once;
//! a delivery whose handling fails releases its id so the next re-delivery retries.

use crate::base::BookingId;
use crate::engine::Engine;
use crate::error::BookingError;
use crate::idempotency::{Claim, IdempotencyLedger};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Raw event envelope as posted by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeAuthorized {
    pub booking_id: BookingId,
    pub charge_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeSucceeded {
    pub charge_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeCanceled {
    pub booking_id: BookingId,
    pub charge_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeRefunded {
    pub charge_ref: String,
    pub refund_ref: String,
    pub amount: Decimal,
}

/// Events the engine acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    ChargeAuthorized(ChargeAuthorized),
    ChargeSucceeded(ChargeSucceeded),
    ChargeCanceled(ChargeCanceled),
    ChargeRefunded(ChargeRefunded),
    Unknown,
}

fn data<T: DeserializeOwned>(event: &GatewayEvent) -> Result<T, BookingError> {
    serde_json::from_value(event.data.clone()).map_err(|e| {
        BookingError::Validation(format!("malformed {} event {}: {e}", event.kind, event.id))
    })
}

impl GatewayEvent {
    pub fn payload(&self) -> Result<EventPayload, BookingError> {
        Ok(match self.kind.as_str() {
            "charge.authorized" => EventPayload::ChargeAuthorized(data(self)?),
            "charge.succeeded" => EventPayload::ChargeSucceeded(data(self)?),
            "charge.canceled" => EventPayload::ChargeCanceled(data(self)?),
            "charge.refunded" => EventPayload::ChargeRefunded(data(self)?),
            _ => EventPayload::Unknown,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    /// The event id was seen before.
    Duplicate,
    /// Event type the engine does not act on, or an event the booking has
    /// already moved past.
    Ignored,
}

pub struct WebhookHandler {
    engine: Arc<Engine>,
    seen: IdempotencyLedger<String>,
}

impl WebhookHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            seen: IdempotencyLedger::new(),
        }
    }

    pub fn handle(&self, event: &GatewayEvent) -> Result<WebhookOutcome, BookingError> {
        match self.seen.claim(event.id.clone()) {
            Claim::Acquired => {}
            Claim::InFlight | Claim::Done(_) => {
                debug!(event = %event.id, kind = %event.kind, "duplicate webhook delivery");
                return Ok(WebhookOutcome::Duplicate);
            }
        }

        match self.apply(event) {
            Ok(outcome) => {
                self.seen.commit(event.id.clone(), Utc::now());
                Ok(outcome)
            }
            Err(e) => {
                warn!(event = %event.id, kind = %event.kind, error = %e, "webhook handling failed");
                self.seen.release(&event.id);
                Err(e)
            }
        }
    }

    fn apply(&self, event: &GatewayEvent) -> Result<WebhookOutcome, BookingError> {
        match event.payload()? {
            EventPayload::ChargeAuthorized(e) => {
                let result = self.engine.authorize(e.booking_id, &e.charge_ref);
                if let Some(outcome) = stale(event, result.map(drop))? {
                    return Ok(outcome);
                }
            }
            EventPayload::ChargeSucceeded(e) => {
                self.engine.confirm_charge(&e.charge_ref)?;
            }
            EventPayload::ChargeCanceled(e) => {
                let result = self.engine.void_authorization(e.booking_id, &e.charge_ref);
                if let Some(outcome) = stale(event, result.map(drop))? {
                    return Ok(outcome);
                }
            }
            EventPayload::ChargeRefunded(e) => {
                self.engine
                    .record_refund(&e.charge_ref, &e.refund_ref, e.amount)?;
            }
            EventPayload::Unknown => {
                debug!(event = %event.id, kind = %event.kind, "webhook ignored");
                return Ok(WebhookOutcome::Ignored);
            }
        }
        info!(event = %event.id, kind = %event.kind, "webhook processed");
        Ok(WebhookOutcome::Processed)
    }
}

/// Acknowledges a lifecycle event the booking has already moved past.
///
/// Redelivering it can never succeed, so it is ignored instead of failed.
fn stale(
    event: &GatewayEvent,
    result: Result<(), BookingError>,
) -> Result<Option<WebhookOutcome>, BookingError> {
    match result {
        Ok(()) => Ok(None),
        Err(error @ BookingError::InvalidState { .. }) => {
            warn!(event = %event.id, kind = %event.kind, %error, "stale webhook ignored");
            Ok(Some(WebhookOutcome::Ignored))
        }
        Err(e) => Err(e),
    }
}
