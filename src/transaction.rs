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

//! Payment transactions recorded against bookings.
//!
//! Every gateway interaction that moved or reserved money leaves one row:
//! - [`TransactionKind::Charge`]: funds authorized on the traveler's card
//! - [`TransactionKind::Capture`]: authorized funds collected
//! - [`TransactionKind::Transfer`]: payout sent to the payee's account
//! - [`TransactionKind::Refund`]: captured funds returned to the traveler
//!
//! A charge row starts [`TransactionStatus::Pending`] and moves to
//! [`TransactionStatus::Succeeded`] once the gateway confirms it, or to
//! [`TransactionStatus::Failed`] when the authorization is voided. Captures become
//! [`TransactionStatus::Refunded`] when the traveler is refunded.

use crate::base::{BookingId, Currency, Payee};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Charge,
    Capture,
    Transfer,
    Refund,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub booking: BookingId,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub currency: Currency,
    /// Gateway reference; unique across the log.
    pub reference: String,
    /// Set on transfers.
    pub payee: Option<Payee>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        booking: BookingId,
        kind: TransactionKind,
        status: TransactionStatus,
        amount: Decimal,
        currency: Currency,
        reference: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            booking,
            kind,
            status,
            amount,
            currency,
            reference: reference.into(),
            payee: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_payee(mut self, payee: Payee) -> Self {
        self.payee = Some(payee);
        self
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self.status, TransactionStatus::Pending)
    }
}
