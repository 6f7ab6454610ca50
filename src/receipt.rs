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

//! Canonical response bodies.
//!
//! Receipts are rebuilt from stored booking state, so an echoed response is
//! identical to the one produced by the call that performed the transition.

use crate::base::BookingId;
use crate::booking::{BookingRecord, BookingStatus};
use crate::calculator::CompletionPercentage;
use crate::error::BookingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Successful result of an idempotent operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    /// `true` when the operation had already been applied and nothing changed.
    pub replayed: bool,
}

impl<T> Outcome<T> {
    pub fn applied(value: T) -> Self {
        Self {
            value,
            replayed: false,
        }
    }

    pub fn replayed(value: T) -> Self {
        Self {
            value,
            replayed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReceipt {
    pub booking_id: BookingId,
    pub status: BookingStatus,
    pub completion_percentage: CompletionPercentage,
    pub adjusted_total_price: Decimal,
    pub platform_fee: Decimal,
    pub provider_amount: Decimal,
    pub commission_rate: Decimal,
    pub capture_required: bool,
    pub admin_notified: bool,
    pub emails_sent: bool,
}

fn missing(booking: BookingId, field: &str) -> BookingError {
    BookingError::Consistency(format!("finalized booking {booking} has no {field}"))
}

impl FinalizeReceipt {
    pub fn from_record(record: &BookingRecord) -> Result<Self, BookingError> {
        Ok(Self {
            booking_id: record.id,
            status: record.status,
            completion_percentage: record
                .completion_percentage
                .ok_or_else(|| missing(record.id, "completion percentage"))?,
            adjusted_total_price: record
                .adjusted_total_price
                .ok_or_else(|| missing(record.id, "adjusted total"))?,
            platform_fee: record
                .platform_fee
                .ok_or_else(|| missing(record.id, "platform fee"))?,
            provider_amount: record
                .provider_amount
                .ok_or_else(|| missing(record.id, "provider amount"))?,
            commission_rate: record
                .commission_rate
                .ok_or_else(|| missing(record.id, "commission rate"))?,
            capture_required: true,
            admin_notified: true,
            emails_sent: true,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReceipt {
    pub booking_id: BookingId,
    pub captured_amount: Decimal,
    pub platform_fee: Decimal,
    pub provider_amount: Decimal,
    pub gateway_transfer_ref: Option<String>,
}

impl CaptureReceipt {
    pub fn from_record(
        record: &BookingRecord,
        gateway_transfer_ref: Option<String>,
    ) -> Result<Self, BookingError> {
        let consistency = |field: &str| {
            BookingError::Consistency(format!("captured booking {} has no {field}", record.id))
        };
        Ok(Self {
            booking_id: record.id,
            captured_amount: record
                .amount_captured
                .ok_or_else(|| consistency("captured amount"))?,
            platform_fee: record.platform_fee.ok_or_else(|| consistency("platform fee"))?,
            provider_amount: record
                .provider_amount
                .ok_or_else(|| consistency("provider amount"))?,
            gateway_transfer_ref,
        })
    }
}
