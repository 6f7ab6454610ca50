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

//! Payout ledger.
//!
//! One [`MerchantPayout`] per finalized booking. The money figures are copied from
//! the booking when the row is created and never recomputed afterwards.

use crate::base::{BookingId, Currency, Payee, PayoutId};
use crate::booking::BookingRecord;
use crate::error::BookingError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutMethod {
    Manual,
    GatewayTransfer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerchantPayout {
    pub id: PayoutId,
    pub booking: BookingId,
    pub payee: Payee,
    pub total_charged: Decimal,
    pub platform_fee: Decimal,
    pub amount_due: Decimal,
    pub currency: Currency,
    pub status: PayoutStatus,
    pub method: PayoutMethod,
    pub transfer_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MerchantPayout {
    pub fn is_paid(&self) -> bool {
        self.status == PayoutStatus::Paid
    }
}

/// Paid and outstanding totals for one payee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayeeSummary {
    pub payee: Payee,
    pub total_paid: Decimal,
    pub total_pending: Decimal,
    /// Newest first.
    pub payouts: Vec<MerchantPayout>,
}

#[derive(Debug)]
pub struct PayoutLedger {
    payouts: DashMap<PayoutId, MerchantPayout>,
    by_booking: DashMap<BookingId, PayoutId>,
    next_id: AtomicU64,
}

impl PayoutLedger {
    pub fn new() -> Self {
        Self {
            payouts: DashMap::new(),
            by_booking: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates the payout for a finalized booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::Consistency`] if the booking has no final figures or already
    /// has a payout.
    pub fn create(
        &self,
        booking: &BookingRecord,
        now: DateTime<Utc>,
    ) -> Result<MerchantPayout, BookingError> {
        let (Some(total_charged), Some(platform_fee), Some(amount_due)) = (
            booking.adjusted_total_price,
            booking.platform_fee,
            booking.provider_amount,
        ) else {
            return Err(BookingError::Consistency(format!(
                "booking {} has no final figures",
                booking.id
            )));
        };

        match self.by_booking.entry(booking.id) {
            Entry::Occupied(entry) => Err(BookingError::Consistency(format!(
                "booking {} already has payout {}",
                booking.id,
                entry.get()
            ))),
            Entry::Vacant(entry) => {
                let id = PayoutId(self.next_id.fetch_add(1, Ordering::Relaxed));
                let payout = MerchantPayout {
                    id,
                    booking: booking.id,
                    payee: booking.payee,
                    total_charged,
                    platform_fee,
                    amount_due,
                    currency: booking.currency,
                    status: PayoutStatus::Pending,
                    method: PayoutMethod::Manual,
                    transfer_ref: None,
                    paid_at: None,
                    created_at: now,
                };
                self.payouts.insert(id, payout.clone());
                entry.insert(id);
                Ok(payout)
            }
        }
    }

    pub fn get(&self, id: PayoutId) -> Option<MerchantPayout> {
        self.payouts.get(&id).map(|r| r.clone())
    }

    pub fn for_booking(&self, booking: BookingId) -> Option<MerchantPayout> {
        let id = *self.by_booking.get(&booking)?;
        self.get(id)
    }

    /// Marks a pending payout paid by hand.
    ///
    /// # Errors
    ///
    /// [`BookingError::AlreadyPaid`] if it already is, [`BookingError::NotFound`] for
    /// unknown ids.
    pub fn mark_paid(
        &self,
        id: PayoutId,
        now: DateTime<Utc>,
    ) -> Result<MerchantPayout, BookingError> {
        self.settle(id, PayoutMethod::Manual, None, now)
    }

    /// Marks a pending payout paid by a completed gateway transfer.
    pub fn mark_transferred(
        &self,
        id: PayoutId,
        transfer_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<MerchantPayout, BookingError> {
        self.settle(
            id,
            PayoutMethod::GatewayTransfer,
            Some(transfer_ref.to_string()),
            now,
        )
    }

    fn settle(
        &self,
        id: PayoutId,
        method: PayoutMethod,
        transfer_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<MerchantPayout, BookingError> {
        let mut payout = self
            .payouts
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(format!("payout {id}")))?;
        if payout.is_paid() {
            return Err(BookingError::AlreadyPaid(id));
        }
        payout.status = PayoutStatus::Paid;
        payout.method = method;
        payout.transfer_ref = transfer_ref;
        payout.paid_at = Some(now);
        Ok(payout.clone())
    }

    pub fn summary(&self, payee: Payee) -> PayeeSummary {
        let mut payouts: Vec<MerchantPayout> = self
            .payouts
            .iter()
            .filter(|r| r.payee == payee)
            .map(|r| r.clone())
            .collect();
        payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let (mut total_paid, mut total_pending) = (Decimal::ZERO, Decimal::ZERO);
        for payout in &payouts {
            match payout.status {
                PayoutStatus::Paid => total_paid += payout.amount_due,
                PayoutStatus::Pending => total_pending += payout.amount_due,
            }
        }
        PayeeSummary {
            payee,
            total_paid,
            total_pending,
            payouts,
        }
    }

    pub fn len(&self) -> usize {
        self.payouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payouts.is_empty()
    }
}

impl Default for PayoutLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Currency, ListingId, PayerId, ProviderId};
    use crate::booking::NewBooking;
    use crate::catalog::Listing;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn finalized(id: u64, provider: u64, amount_due: Decimal) -> BookingRecord {
        let listing = Listing {
            id: ListingId(1),
            title: "Surf weekend".into(),
            owner: Payee::Provider(ProviderId(provider)),
            image: None,
            sport: "surf".into(),
            price: dec!(100.00),
            currency: Currency::EUR,
        };
        let request = NewBooking {
            payer: PayerId(1),
            listing: ListingId(1),
            session: None,
            start_date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
            end_date: None,
            guests: 1,
        };
        let mut record =
            BookingRecord::new(BookingId(id), &request, &listing, dec!(100.00), Utc::now());
        record.adjusted_total_price = Some(dec!(100.00));
        record.platform_fee = Some(dec!(100.00) - amount_due);
        record.provider_amount = Some(amount_due);
        record
    }

    #[test]
    fn create_snapshots_booking_figures() {
        let ledger = PayoutLedger::new();
        let mut booking = finalized(1, 1, dec!(75.00));
        let payout = ledger.create(&booking, Utc::now()).unwrap();
        assert_eq!(payout.amount_due, dec!(75.00));
        assert_eq!(payout.platform_fee, dec!(25.00));
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert_eq!(payout.method, PayoutMethod::Manual);

        booking.provider_amount = Some(dec!(1.00));
        assert_eq!(ledger.for_booking(BookingId(1)).unwrap().amount_due, dec!(75.00));
    }

    #[test]
    fn second_payout_for_booking_is_rejected() {
        let ledger = PayoutLedger::new();
        let booking = finalized(1, 1, dec!(75.00));
        ledger.create(&booking, Utc::now()).unwrap();
        assert!(matches!(
            ledger.create(&booking, Utc::now()),
            Err(BookingError::Consistency(_))
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn unfinalized_booking_cannot_get_payout() {
        let ledger = PayoutLedger::new();
        let mut booking = finalized(1, 1, dec!(75.00));
        booking.provider_amount = None;
        assert!(matches!(
            ledger.create(&booking, Utc::now()),
            Err(BookingError::Consistency(_))
        ));
    }

    #[test]
    fn mark_paid_twice_fails() {
        let ledger = PayoutLedger::new();
        let payout = ledger.create(&finalized(1, 1, dec!(75.00)), Utc::now()).unwrap();
        let paid = ledger.mark_paid(payout.id, Utc::now()).unwrap();
        assert!(paid.paid_at.is_some());
        assert_eq!(
            ledger.mark_paid(payout.id, Utc::now()),
            Err(BookingError::AlreadyPaid(payout.id))
        );
        assert!(matches!(
            ledger.mark_paid(PayoutId(999), Utc::now()),
            Err(BookingError::NotFound(_))
        ));
    }

    #[test]
    fn transfer_records_method_and_reference() {
        let ledger = PayoutLedger::new();
        let payout = ledger.create(&finalized(1, 1, dec!(10.00)), Utc::now()).unwrap();
        let paid = ledger.mark_transferred(payout.id, "tr_9", Utc::now()).unwrap();
        assert_eq!(paid.method, PayoutMethod::GatewayTransfer);
        assert_eq!(paid.transfer_ref.as_deref(), Some("tr_9"));
    }

    #[test]
    fn summary_splits_paid_and_pending() {
        let ledger = PayoutLedger::new();
        let a = ledger.create(&finalized(1, 1, dec!(10.00)), Utc::now()).unwrap();
        ledger.create(&finalized(2, 1, dec!(20.50)), Utc::now()).unwrap();
        ledger.create(&finalized(3, 2, dec!(99.00)), Utc::now()).unwrap();
        ledger.mark_paid(a.id, Utc::now()).unwrap();

        let summary = ledger.summary(Payee::Provider(ProviderId(1)));
        assert_eq!(summary.total_paid, dec!(10.00));
        assert_eq!(summary.total_pending, dec!(20.50));
        assert_eq!(summary.payouts.len(), 2);
        assert_eq!(summary.payouts[0].booking, BookingId(2));
    }
}
