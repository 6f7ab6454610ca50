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

//! Booking entity and its lifecycle.
//!
//! ```text
//!  Pending ──authorize──► Authorized ──finalize(>0%)──► Completed ──capture──► Completed (+ amount_captured)
//!                             │
//!                             ├──finalize(0%)─────────► Cancelled
//!                             └──charge canceled──────► Cancelled
//! ```
//!
//! [`BookingRecord`] holds the data and the guarded primitives that move it between
//! states. Those primitives never perform I/O; the engine calls them while holding the
//! booking's mutex and performs gateway calls and bookkeeping around them.

use crate::base::{BookingId, Currency, ListingId, Payee, PayerId, SessionId};
use crate::calculator::{CompletionPercentage, Financials};
use crate::catalog::{Listing, PayeeProfile};
use crate::error::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Requested, no funds authorized yet.
    Pending,
    Authorized,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Authorized => "AUTHORIZED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing details frozen when the booking is first authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    pub title: String,
    pub provider_name: Option<String>,
    pub image: Option<String>,
    pub sport: String,
}

impl ListingSnapshot {
    pub fn capture(listing: &Listing, owner: Option<&PayeeProfile>) -> Self {
        Self {
            title: listing.title.clone(),
            provider_name: owner.map(|profile| {
                profile
                    .display_name
                    .clone()
                    .unwrap_or_else(|| profile.email.clone())
            }),
            image: listing.image.clone(),
            sport: listing.sport.clone(),
        }
    }
}

/// Input for placing a booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub payer: PayerId,
    pub listing: ListingId,
    #[serde(default)]
    pub session: Option<SessionId>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub guests: u32,
}

/// Whether a transition was applied now or had already been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Now,
    Previously,
}

/// Booking data. Mutated only through the engine while the booking mutex is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: BookingId,
    pub payer: PayerId,
    pub listing: ListingId,
    pub payee: Payee,
    pub session: Option<SessionId>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub guests: u32,

    pub currency: Currency,
    pub total_price: Decimal,
    pub estimated_platform_fee: Option<Decimal>,
    pub estimated_provider_amount: Option<Decimal>,
    pub completion_percentage: Option<CompletionPercentage>,
    pub adjustment_reason: String,
    /// Commission applied at finalization.
    pub commission_rate: Option<Decimal>,
    pub adjusted_total_price: Option<Decimal>,
    pub platform_fee: Option<Decimal>,
    pub provider_amount: Option<Decimal>,
    pub amount_captured: Option<Decimal>,
    /// Display mirror of the latest fee figure.
    pub service_fee: Decimal,
    /// Display mirror of the latest payout figure.
    pub provider_payout: Decimal,

    pub charge_ref: Option<String>,
    pub capture_ref: Option<String>,
    pub status: BookingStatus,
    pub listing_snapshot: Option<ListingSnapshot>,

    pub payment_authorized_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Set once the finalization notifications were handed to the outbox.
    pub final_emails_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingRecord {
    pub fn new(
        id: BookingId,
        request: &NewBooking,
        listing: &Listing,
        total_price: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payer: request.payer,
            listing: request.listing,
            payee: listing.owner,
            session: request.session,
            start_date: request.start_date,
            end_date: request.end_date,
            guests: request.guests,
            currency: listing.currency,
            total_price,
            estimated_platform_fee: None,
            estimated_provider_amount: None,
            completion_percentage: None,
            adjustment_reason: String::new(),
            commission_rate: None,
            adjusted_total_price: None,
            platform_fee: None,
            provider_amount: None,
            amount_captured: None,
            service_fee: Decimal::ZERO,
            provider_payout: Decimal::ZERO,
            charge_ref: None,
            capture_ref: None,
            status: BookingStatus::Pending,
            listing_snapshot: None,
            payment_authorized_at: None,
            completed_at: None,
            cancelled_at: None,
            paid_at: None,
            final_emails_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn assert_invariants(&self) {
        if let (Some(adjusted), Some(fee), Some(payout)) = (
            self.adjusted_total_price,
            self.platform_fee,
            self.provider_amount,
        ) {
            debug_assert!(
                adjusted <= self.total_price,
                "Invariant violated: adjusted total {} exceeds total price {}",
                adjusted,
                self.total_price
            );
            debug_assert_eq!(
                fee + payout,
                adjusted,
                "Invariant violated: fee and payout do not add up to the adjusted total"
            );
        }
    }

    fn reject(&self, reason: &'static str) -> BookingError {
        BookingError::invalid_state(self.id, self.status, reason)
    }

    /// Whether finalization already ran to the end, notifications included.
    pub fn is_finalized(&self) -> bool {
        self.final_emails_sent_at.is_some()
    }

    /// Moves a pending booking to `Authorized`.
    ///
    /// A repeated authorization carrying the same charge reference is a replay and
    /// changes nothing.
    pub(crate) fn authorize(
        &mut self,
        charge_ref: &str,
        estimate: Financials,
        snapshot: ListingSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Applied, BookingError> {
        match self.status {
            BookingStatus::Pending => {}
            BookingStatus::Authorized if self.charge_ref.as_deref() == Some(charge_ref) => {
                return Ok(Applied::Previously);
            }
            BookingStatus::Authorized => {
                return Err(self.reject("already authorized with a different charge"));
            }
            _ => return Err(self.reject("only pending bookings can be authorized")),
        }

        self.status = BookingStatus::Authorized;
        self.charge_ref = Some(charge_ref.to_string());
        self.payment_authorized_at = Some(now);
        self.estimated_platform_fee = Some(estimate.platform_fee);
        self.estimated_provider_amount = Some(estimate.provider_amount);
        self.service_fee = estimate.platform_fee;
        self.provider_payout = estimate.provider_amount;
        if self.listing_snapshot.is_none() {
            self.listing_snapshot = Some(snapshot);
        }
        self.updated_at = now;
        Ok(Applied::Now)
    }

    /// Checks every guard finalization requires.
    pub(crate) fn ensure_finalizable(&self) -> Result<(), BookingError> {
        if self.status != BookingStatus::Authorized {
            return Err(self.reject("booking is not in an authorized state"));
        }
        if self.amount_captured.is_some() || self.paid_at.is_some() {
            return Err(self.reject("booking already captured and cannot be modified"));
        }
        if self.completed_at.is_some() || self.cancelled_at.is_some() {
            return Err(self.reject("booking already finalized"));
        }
        Ok(())
    }

    /// Stores the declared completion and the final figures.
    pub(crate) fn finalize(
        &mut self,
        completion: CompletionPercentage,
        reason: &str,
        commission_rate: Decimal,
        figures: Financials,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        self.ensure_finalizable()?;

        self.completion_percentage = Some(completion);
        self.adjustment_reason = reason.to_string();
        self.commission_rate = Some(commission_rate);
        self.adjusted_total_price = Some(figures.adjusted_total);
        self.platform_fee = Some(figures.platform_fee);
        self.provider_amount = Some(figures.provider_amount);
        self.service_fee = figures.platform_fee;
        self.provider_payout = figures.provider_amount;

        if completion == CompletionPercentage::NONE {
            self.status = BookingStatus::Cancelled;
            self.cancelled_at = Some(now);
        } else {
            self.status = BookingStatus::Completed;
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        self.assert_invariants();
        Ok(())
    }

    pub(crate) fn mark_final_emails_sent(&mut self, now: DateTime<Utc>) {
        self.final_emails_sent_at = Some(now);
        self.updated_at = now;
    }

    /// Returns the charge reference and the amount a capture must collect.
    pub(crate) fn capture_request(&self) -> Result<(String, Decimal), BookingError> {
        if self.status != BookingStatus::Completed {
            return Err(self.reject("booking must be completed before capture"));
        }
        if self.amount_captured.is_some() {
            return Err(self.reject("payment already captured"));
        }
        let charge_ref = self
            .charge_ref
            .clone()
            .ok_or_else(|| self.reject("no authorized charge to capture"))?;
        let amount = self.adjusted_total_price.ok_or_else(|| {
            BookingError::Consistency(format!(
                "completed booking {} has no adjusted total",
                self.id
            ))
        })?;
        Ok((charge_ref, amount))
    }

    pub(crate) fn record_capture(
        &mut self,
        captured: Decimal,
        capture_ref: &str,
        now: DateTime<Utc>,
    ) {
        self.amount_captured = Some(captured);
        self.capture_ref = Some(capture_ref.to_string());
        self.updated_at = now;
    }

    pub(crate) fn record_paid(&mut self, now: DateTime<Utc>) {
        self.paid_at = Some(now);
        self.updated_at = now;
    }

    /// Cancels a booking whose authorization was voided before finalization.
    pub(crate) fn void_authorization(&mut self, now: DateTime<Utc>) -> Result<Applied, BookingError> {
        match self.status {
            BookingStatus::Pending | BookingStatus::Authorized => {
                self.status = BookingStatus::Cancelled;
                self.cancelled_at = Some(now);
                self.updated_at = now;
                Ok(Applied::Now)
            }
            BookingStatus::Cancelled if self.completion_percentage.is_none() => {
                Ok(Applied::Previously)
            }
            _ => Err(self.reject("finalized bookings cannot be voided")),
        }
    }
}

/// A booking guarded by its own mutex.
///
/// Every transition for one booking runs with this lock held, so transitions on
/// the same booking are serialized while different bookings proceed in parallel.
#[derive(Debug)]
pub struct Booking {
    inner: Mutex<BookingRecord>,
}

impl Booking {
    pub fn new(record: BookingRecord) -> Self {
        Self {
            inner: Mutex::new(record),
        }
    }

    /// Copy of the current data.
    pub fn snapshot(&self) -> BookingRecord {
        self.inner.lock().clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BookingRecord> {
        self.inner.lock()
    }
}
