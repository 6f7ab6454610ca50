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

//! Booking lifecycle engine.
//!
//! The [`Engine`] owns every booking and drives it through its transitions:
//!
//! - **place**: records a pending booking request priced from the catalog.
//! - **authorize**: the gateway reserved the funds; an estimate is stored.
//! - **finalize**: the provider declared completion; final figures are computed, the
//!   payout row is created and the finalization notifications are queued.
//! - **capture**: the adjusted total is collected from the traveler.
//! - **transfer / mark paid**: the payout reaches the payee.
//!
//! # Thread Safety
//!
//! Bookings live in a [`DashMap`] as `Arc<Booking>`. A transition clones the `Arc`
//! out of the map and then holds the booking's mutex until the new state, payout row,
//! transactions and queued notifications are all recorded. Concurrent calls for the
//! same booking are therefore serialized while other bookings proceed in parallel.
//! Ledgers are only touched with the booking mutex held and never call back into a
//! booking.
//!
//! A transition works on a copy of the booking data and writes it back only after
//! every fallible step succeeded, so a failed call leaves the booking unchanged.

use crate::admin::{AdminInbox, AdminNotificationKind};
use crate::base::{BookingId, ListingId, Payee, PayoutId};
use crate::booking::{Applied, Booking, BookingRecord, BookingStatus, ListingSnapshot, NewBooking};
use crate::calculator::{self, CompletionPercentage, PriceQuote, round_money};
use crate::catalog::Catalog;
use crate::commission;
use crate::error::BookingError;
use crate::gateway::{Capture, PaymentGateway, TimedGateway};
use crate::notification::{Audience, BookingContext, EmailJob, EmailQueue, NotificationKind};
use crate::payout::{MerchantPayout, PayeeSummary, PayoutLedger};
use crate::receipt::{CaptureReceipt, FinalizeReceipt, Outcome};
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::transaction_log::TransactionLog;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Booking lifecycle engine.
///
/// # Invariants
///
/// - `completion_percentage` is set at most once per booking.
/// - `platform_fee + provider_amount == adjusted_total_price <= total_price`.
/// - Exactly one payout row exists per finalized booking and its amounts never change.
/// - Only completed bookings are captured, and at most once.
pub struct Engine {
    bookings: DashMap<BookingId, Arc<Booking>>,
    catalog: Arc<dyn Catalog>,
    gateway: TimedGateway,
    payouts: PayoutLedger,
    transactions: TransactionLog,
    inbox: AdminInbox,
    outbox: EmailQueue,
    support_email: String,
    next_id: AtomicU64,
}

impl Engine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        gateway: Arc<dyn PaymentGateway>,
        outbox: EmailQueue,
    ) -> Self {
        Engine {
            bookings: DashMap::new(),
            catalog,
            gateway: TimedGateway::new(gateway, DEFAULT_GATEWAY_TIMEOUT),
            payouts: PayoutLedger::new(),
            transactions: TransactionLog::new(),
            inbox: AdminInbox::new(),
            outbox,
            support_email: "support@localhost".to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Recipient of admin notifications.
    pub fn with_support_email(mut self, email: impl Into<String>) -> Self {
        self.support_email = email.into();
        self
    }

    /// Deadline applied to every gateway call.
    pub fn with_gateway_timeout(self, timeout: Duration) -> Self {
        Engine {
            gateway: self.gateway.with_timeout(timeout),
            ..self
        }
    }

    fn entry(&self, id: BookingId) -> Result<Arc<Booking>, BookingError> {
        self.bookings
            .get(&id)
            .map(|booking| Arc::clone(booking.value()))
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))
    }

    /// Price preview for `guests` places on a listing. Nothing is stored.
    pub fn quote(&self, listing: ListingId, guests: u32) -> Result<PriceQuote, BookingError> {
        let listing = self
            .catalog
            .listing(listing)
            .ok_or_else(|| BookingError::NotFound(format!("listing {listing}")))?;
        let rate = commission::rate(self.catalog.payee(listing.owner).as_ref());
        calculator::quote(listing.price, guests, rate, listing.currency)
    }

    /// Records a booking request. The booking starts `Pending`.
    pub fn place_booking(&self, request: NewBooking) -> Result<BookingRecord, BookingError> {
        if request.guests == 0 {
            return Err(BookingError::Validation(
                "guests must be at least 1".to_string(),
            ));
        }
        if let Some(end) = request.end_date {
            if end < request.start_date {
                return Err(BookingError::Validation(
                    "end_date must not precede start_date".to_string(),
                ));
            }
        }
        let listing = self
            .catalog
            .listing(request.listing)
            .ok_or_else(|| BookingError::NotFound(format!("listing {}", request.listing)))?;

        let id = BookingId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let total_price = round_money(listing.price * Decimal::from(request.guests));
        let record = BookingRecord::new(id, &request, &listing, total_price, Utc::now());
        self.bookings
            .insert(id, Arc::new(Booking::new(record.clone())));
        info!(booking = %id, listing = %request.listing, %total_price, "booking placed");
        Ok(record)
    }

    /// Reserves the booking total with the gateway, then authorizes the booking.
    ///
    /// An already authorized booking is echoed without another gateway call.
    pub fn checkout(&self, id: BookingId) -> Result<Outcome<BookingRecord>, BookingError> {
        let booking = self.entry(id)?;
        let mut record = booking.lock();
        if record.status == BookingStatus::Authorized {
            debug!(booking = %id, "checkout replayed");
            return Ok(Outcome::replayed(record.clone()));
        }
        if record.status != BookingStatus::Pending {
            let error = BookingError::invalid_state(id, record.status, "only pending bookings can be paid");
            warn!(booking = %id, %error, "checkout rejected");
            return Err(error);
        }

        let payer_ref = format!("payer:{}", record.payer);
        let charge_ref = self
            .gateway
            .authorize(record.total_price, record.currency, &payer_ref)
            .inspect_err(|e| warn!(booking = %id, error = %e, "authorization failed"))?;
        self.authorize_locked(&mut record, &charge_ref)
    }

    /// Records a gateway authorization for a pending booking.
    ///
    /// Re-delivery with the same charge reference is echoed unchanged.
    pub fn authorize(
        &self,
        id: BookingId,
        charge_ref: &str,
    ) -> Result<Outcome<BookingRecord>, BookingError> {
        if charge_ref.trim().is_empty() {
            return Err(BookingError::Validation(
                "charge reference must not be empty".to_string(),
            ));
        }
        let booking = self.entry(id)?;
        let mut record = booking.lock();
        self.authorize_locked(&mut record, charge_ref)
    }

    fn authorize_locked(
        &self,
        record: &mut BookingRecord,
        charge_ref: &str,
    ) -> Result<Outcome<BookingRecord>, BookingError> {
        let id = record.id;
        if record.status == BookingStatus::Authorized
            && record.charge_ref.as_deref() == Some(charge_ref)
        {
            debug!(booking = %id, charge_ref, "authorization replayed");
            return Ok(Outcome::replayed(record.clone()));
        }

        let profile = self.catalog.payee(record.payee);
        let snapshot = match (&record.listing_snapshot, self.catalog.listing(record.listing)) {
            (Some(existing), _) => existing.clone(),
            (None, Some(listing)) => ListingSnapshot::capture(&listing, profile.as_ref()),
            (None, None) => {
                return Err(BookingError::NotFound(format!("listing {}", record.listing)));
            }
        };
        let estimate = calculator::estimate(record.total_price, commission::rate(profile.as_ref()));

        let now = Utc::now();
        let mut next = record.clone();
        if next.authorize(charge_ref, estimate, snapshot, now)? == Applied::Previously {
            return Ok(Outcome::replayed(record.clone()));
        }
        self.transactions.append(Transaction::new(
            id,
            TransactionKind::Charge,
            TransactionStatus::Pending,
            next.total_price,
            next.currency,
            charge_ref,
            now,
        ))?;
        *record = next;

        self.enqueue(record, &NotificationKind::AUTHORIZED);
        info!(
            booking = %id,
            charge_ref,
            estimated_fee = %estimate.platform_fee,
            estimated_payout = %estimate.provider_amount,
            "booking authorized"
        );
        Ok(Outcome::applied(record.clone()))
    }

    /// Applies the provider's declared completion.
    ///
    /// Once finalization ran, every later call returns the stored receipt unchanged,
    /// whatever its arguments.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidState`] if the booking is not authorized, was
    ///   captured, or was already cancelled.
    /// - [`BookingError::Consistency`] if a payout row already exists.
    pub fn finalize(
        &self,
        id: BookingId,
        completion: CompletionPercentage,
        reason: &str,
    ) -> Result<Outcome<FinalizeReceipt>, BookingError> {
        let booking = self.entry(id)?;
        let mut record = booking.lock();

        if record.is_finalized() {
            debug!(booking = %id, "finalize replayed");
            return FinalizeReceipt::from_record(&record).map(Outcome::replayed);
        }
        record
            .ensure_finalizable()
            .inspect_err(|e| warn!(booking = %id, error = %e, "finalize rejected"))?;

        // Re-derived from the current subscription state, not the estimate.
        let rate = commission::rate(self.catalog.payee(record.payee).as_ref());
        let figures = calculator::calculate(record.total_price, completion, rate);

        let now = Utc::now();
        let mut next = record.clone();
        next.finalize(completion, reason, rate, figures, now)?;
        let payout = self
            .payouts
            .create(&next, now)
            .inspect_err(|e| error!(booking = %id, error = %e, "payout creation failed"))?;
        *record = next;

        self.enqueue(&record, &NotificationKind::FINALIZED);
        record.mark_final_emails_sent(now);

        let kind = AdminNotificationKind::for_completion(completion);
        let (title, message) = match kind {
            AdminNotificationKind::Cancelled => (
                "Booking cancelled",
                format!("Booking {id} was declared not delivered (0%). {reason}"),
            ),
            AdminNotificationKind::Partial => (
                "Booking partially completed",
                format!(
                    "Booking {id} completed at {completion}. Payout due {} {}. {reason}",
                    payout.amount_due, payout.currency
                ),
            ),
            _ => (
                "Booking finalized",
                format!(
                    "Booking {id} completed. Payout due {} {}.",
                    payout.amount_due, payout.currency
                ),
            ),
        };
        self.inbox.push(kind, id, title, message.trim_end(), now);

        info!(
            booking = %id,
            %completion,
            commission_rate = %rate,
            adjusted_total = %figures.adjusted_total,
            platform_fee = %figures.platform_fee,
            provider_amount = %figures.provider_amount,
            payout = %payout.id,
            "booking finalized"
        );
        FinalizeReceipt::from_record(&record).map(Outcome::applied)
    }

    /// Collects the adjusted total from the traveler.
    ///
    /// The status stays `Completed`. A gateway failure or timeout leaves the booking
    /// unchanged; after a timeout use [`Engine::reconcile_capture`].
    pub fn capture(&self, id: BookingId) -> Result<Outcome<CaptureReceipt>, BookingError> {
        let booking = self.entry(id)?;
        let mut record = booking.lock();

        if record.amount_captured.is_some() {
            debug!(booking = %id, "capture replayed");
            return CaptureReceipt::from_record(&record, self.transfer_ref(id)).map(Outcome::replayed);
        }
        let (charge_ref, amount) = record
            .capture_request()
            .inspect_err(|e| warn!(booking = %id, error = %e, "capture rejected"))?;
        if self.payouts.for_booking(id).is_none() {
            let error = BookingError::Consistency(format!("completed booking {id} has no payout"));
            error!(booking = %id, %error, "capture aborted");
            return Err(error);
        }

        let capture = self
            .gateway
            .capture(&charge_ref, amount)
            .inspect_err(|e| warn!(booking = %id, error = %e, "capture failed"))?;
        self.record_capture(&mut record, &charge_ref, &capture)
            .map(Outcome::applied)
    }

    /// Settles a capture whose outcome is unknown by reading it back from the gateway.
    ///
    /// Returns `Ok(None)` if the gateway has no capture for the charge.
    pub fn reconcile_capture(&self, id: BookingId) -> Result<Option<CaptureReceipt>, BookingError> {
        let booking = self.entry(id)?;
        let mut record = booking.lock();

        if record.amount_captured.is_some() {
            return CaptureReceipt::from_record(&record, self.transfer_ref(id)).map(Some);
        }
        let (charge_ref, _) = record.capture_request()?;
        match self.gateway.lookup_capture(&charge_ref)? {
            Some(capture) => {
                info!(booking = %id, capture_ref = %capture.reference, "capture reconciled");
                self.record_capture(&mut record, &charge_ref, &capture).map(Some)
            }
            None => {
                debug!(booking = %id, "no capture at gateway");
                Ok(None)
            }
        }
    }

    fn record_capture(
        &self,
        record: &mut BookingRecord,
        charge_ref: &str,
        capture: &Capture,
    ) -> Result<CaptureReceipt, BookingError> {
        let id = record.id;
        let now = Utc::now();
        if Some(capture.amount) != record.adjusted_total_price {
            warn!(booking = %id, captured = %capture.amount, "captured amount differs from adjusted total");
        }

        match self.transactions.append(Transaction::new(
            id,
            TransactionKind::Capture,
            TransactionStatus::Succeeded,
            capture.amount,
            record.currency,
            capture.reference.as_str(),
            now,
        )) {
            Ok(()) => {}
            Err(BookingError::DuplicateTransaction(reference)) => {
                debug!(booking = %id, %reference, "capture transaction already recorded");
            }
            Err(e) => return Err(e),
        }
        if let Err(e) = self
            .transactions
            .set_status(charge_ref, TransactionStatus::Succeeded, now)
        {
            warn!(booking = %id, error = %e, "charge transaction not updated");
        }
        record.record_capture(capture.amount, &capture.reference, now);

        self.inbox.push(
            AdminNotificationKind::PaymentCaptured,
            id,
            "Payment captured",
            format!("Captured {} {} for booking {id}.", capture.amount, record.currency),
            now,
        );
        info!(booking = %id, amount = %capture.amount, capture_ref = %capture.reference, "payment captured");
        CaptureReceipt::from_record(record, self.transfer_ref(id))
    }

    /// Sends the pending payout to the payee's gateway account.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidState`] before capture or when the payee has no payout
    /// account.
    pub fn transfer_payout(&self, id: BookingId) -> Result<Outcome<MerchantPayout>, BookingError> {
        let booking = self.entry(id)?;
        let mut record = booking.lock();

        let payout = self.payouts.for_booking(id).ok_or_else(|| {
            BookingError::invalid_state(id, record.status, "booking has no payout")
        })?;
        if payout.is_paid() {
            debug!(booking = %id, payout = %payout.id, "transfer replayed");
            return Ok(Outcome::replayed(payout));
        }
        if record.amount_captured.is_none() {
            return Err(BookingError::invalid_state(
                id,
                record.status,
                "payment must be captured before the payout is transferred",
            ));
        }
        let account = self
            .catalog
            .payee(record.payee)
            .and_then(|profile| profile.payout_account)
            .ok_or_else(|| {
                BookingError::invalid_state(id, record.status, "payee has no payout account")
            })?;

        let transfer_ref = self
            .gateway
            .transfer(payout.amount_due, payout.currency, &account)
            .inspect_err(|e| warn!(booking = %id, error = %e, "transfer failed"))?;

        // The money has moved: the payout is settled whatever the log says.
        let now = Utc::now();
        match self.transactions.append(
            Transaction::new(
                id,
                TransactionKind::Transfer,
                TransactionStatus::Succeeded,
                payout.amount_due,
                payout.currency,
                transfer_ref.as_str(),
                now,
            )
            .with_payee(record.payee),
        ) {
            Ok(()) => {}
            Err(BookingError::DuplicateTransaction(reference)) => {
                debug!(booking = %id, %reference, "transfer transaction already recorded");
            }
            Err(e) => error!(booking = %id, %transfer_ref, error = %e, "transfer transaction not recorded"),
        }
        let paid = self.payouts.mark_transferred(payout.id, &transfer_ref, now)?;
        record.record_paid(now);
        info!(booking = %id, payout = %paid.id, %transfer_ref, amount = %paid.amount_due, "payout transferred");
        Ok(Outcome::applied(paid))
    }

    /// Captures the booking and, when asked and possible, transfers the payout.
    ///
    /// A failed transfer does not undo the capture; the receipt then carries no
    /// transfer reference and the transfer can be retried on its own.
    pub fn capture_and_transfer(
        &self,
        id: BookingId,
        transfer: bool,
    ) -> Result<CaptureReceipt, BookingError> {
        let mut receipt = self.capture(id)?.value;
        if !transfer || receipt.gateway_transfer_ref.is_some() {
            return Ok(receipt);
        }
        let payee = self.entry(id)?.lock().payee;
        let can_receive = self
            .catalog
            .payee(payee)
            .is_some_and(|profile| profile.payout_account.is_some());
        if !can_receive {
            debug!(booking = %id, %payee, "payee cannot receive transfers");
            return Ok(receipt);
        }
        match self.transfer_payout(id) {
            Ok(outcome) => receipt.gateway_transfer_ref = outcome.value.transfer_ref,
            Err(e) => warn!(booking = %id, error = %e, "transfer after capture failed"),
        }
        Ok(receipt)
    }

    /// Marks a payout paid outside the gateway.
    ///
    /// # Errors
    ///
    /// [`BookingError::AlreadyPaid`] if it already was.
    pub fn mark_payout_paid(&self, payout: PayoutId) -> Result<MerchantPayout, BookingError> {
        let row = self
            .payouts
            .get(payout)
            .ok_or_else(|| BookingError::NotFound(format!("payout {payout}")))?;
        let booking = self.entry(row.booking)?;
        let mut record = booking.lock();

        let now = Utc::now();
        let paid = self.payouts.mark_paid(payout, now)?;
        record.record_paid(now);
        info!(booking = %row.booking, %payout, amount = %paid.amount_due, "payout marked paid");
        Ok(paid)
    }

    /// Bulk variant of [`Engine::mark_payout_paid`]. Rows already paid are skipped.
    /// Returns how many rows changed.
    pub fn mark_payouts_paid(&self, payouts: &[PayoutId]) -> usize {
        payouts
            .iter()
            .filter(|id| match self.mark_payout_paid(**id) {
                Ok(_) => true,
                Err(BookingError::AlreadyPaid(_)) => {
                    debug!(payout = %id, "payout already paid, skipped");
                    false
                }
                Err(e) => {
                    warn!(payout = %id, error = %e, "payout not marked paid");
                    false
                }
            })
            .count()
    }

    pub fn payee_summary(&self, payee: Payee) -> PayeeSummary {
        self.payouts.summary(payee)
    }

    /// Marks the charge confirmed by the gateway.
    pub fn confirm_charge(&self, charge_ref: &str) -> Result<Transaction, BookingError> {
        let charge = self
            .transactions
            .get(charge_ref)
            .ok_or_else(|| BookingError::NotFound(format!("transaction {charge_ref}")))?;
        let booking = self.entry(charge.booking)?;
        let _record = booking.lock();
        if charge.status == TransactionStatus::Succeeded {
            return Ok(charge);
        }
        self.transactions
            .set_status(charge_ref, TransactionStatus::Succeeded, Utc::now())
    }

    /// Cancels a booking whose authorization the gateway voided.
    pub fn void_authorization(
        &self,
        id: BookingId,
        charge_ref: &str,
    ) -> Result<Outcome<BookingRecord>, BookingError> {
        let booking = self.entry(id)?;
        let mut record = booking.lock();
        let foreign_charge = self
            .transactions
            .get(charge_ref)
            .is_some_and(|charge| charge.booking != id);
        if foreign_charge
            || record.charge_ref.as_deref().is_some_and(|existing| existing != charge_ref)
        {
            let error =
                BookingError::invalid_state(id, record.status, "charge does not belong to this booking");
            warn!(booking = %id, charge_ref, %error, "void rejected");
            return Err(error);
        }

        let now = Utc::now();
        let mut next = record.clone();
        match next.void_authorization(now)? {
            Applied::Previously => return Ok(Outcome::replayed(record.clone())),
            Applied::Now => {}
        }
        if self.transactions.contains(charge_ref) {
            self.transactions
                .set_status(charge_ref, TransactionStatus::Failed, now)?;
        }
        *record = next;
        info!(booking = %id, charge_ref, "authorization voided, booking cancelled");
        Ok(Outcome::applied(record.clone()))
    }

    /// Records a refund of captured funds.
    ///
    /// The refunds of one booking never add up to more than its capture. Capture
    /// rows become `Refunded` once the whole amount is given back.
    pub fn record_refund(
        &self,
        charge_ref: &str,
        refund_ref: &str,
        amount: Decimal,
    ) -> Result<Outcome<Transaction>, BookingError> {
        let charge = self
            .transactions
            .get(charge_ref)
            .ok_or_else(|| BookingError::NotFound(format!("transaction {charge_ref}")))?;
        let booking = self.entry(charge.booking)?;
        let record = booking.lock();

        if let Some(existing) = self.transactions.get(refund_ref) {
            return Ok(Outcome::replayed(existing));
        }
        let captured = record.amount_captured.ok_or_else(|| {
            BookingError::invalid_state(record.id, record.status, "nothing captured to refund")
        })?;
        let amount = round_money(amount);
        let history = self.transactions.for_booking(record.id);
        let refunded: Decimal = history
            .iter()
            .filter(|tx| tx.kind == TransactionKind::Refund)
            .map(|tx| tx.amount)
            .sum();
        if amount <= Decimal::ZERO || refunded + amount > captured {
            let error = BookingError::Validation(format!(
                "refund amount must be positive and at most {} remaining",
                captured - refunded
            ));
            warn!(booking = %record.id, refund_ref, %amount, %refunded, %error, "refund rejected");
            return Err(error);
        }

        let now = Utc::now();
        let refund = Transaction::new(
            record.id,
            TransactionKind::Refund,
            TransactionStatus::Succeeded,
            amount,
            record.currency,
            refund_ref,
            now,
        );
        self.transactions.append(refund.clone())?;
        // Captures count as refunded only once nothing is left to give back.
        if refunded + amount == captured {
            for tx in history.iter().filter(|tx| tx.kind == TransactionKind::Capture) {
                self.transactions
                    .set_status(&tx.reference, TransactionStatus::Refunded, now)?;
            }
        }
        info!(booking = %record.id, refund_ref, amount = %refund.amount, "refund recorded");
        Ok(Outcome::applied(refund))
    }

    fn transfer_ref(&self, id: BookingId) -> Option<String> {
        self.payouts.for_booking(id).and_then(|p| p.transfer_ref)
    }

    fn enqueue(&self, record: &BookingRecord, kinds: &[NotificationKind]) {
        let context = BookingContext::from(record);
        for &kind in kinds {
            let recipient = match kind.audience() {
                Audience::Payer => self.catalog.payer_email(record.payer),
                Audience::Payee => self.catalog.payee_email(record.payee),
                Audience::Admin => Some(self.support_email.clone()),
            };
            match recipient {
                Some(recipient) => self.outbox.enqueue(EmailJob {
                    booking: record.id,
                    kind,
                    recipient,
                    context: context.clone(),
                }),
                None => warn!(booking = %record.id, ?kind, "no recipient, notification skipped"),
            }
        }
    }

    /// Current data of one booking.
    pub fn booking(&self, id: BookingId) -> Result<BookingRecord, BookingError> {
        Ok(self.entry(id)?.snapshot())
    }

    /// All bookings, oldest first.
    pub fn bookings(&self) -> Vec<BookingRecord> {
        let mut all: Vec<_> = self
            .bookings
            .iter()
            .map(|booking| booking.value().snapshot())
            .collect();
        all.sort_by_key(|record| record.id);
        all
    }

    pub fn payout_for(&self, id: BookingId) -> Option<MerchantPayout> {
        self.payouts.for_booking(id)
    }

    pub fn payouts(&self) -> &PayoutLedger {
        &self.payouts
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    pub fn inbox(&self) -> &AdminInbox {
        &self.inbox
    }
}
