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

//! Error types for the booking lifecycle.

use crate::base::{BookingId, PayoutId};
use crate::booking::BookingStatus;
use std::time::Duration;
use thiserror::Error;

/// Booking lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed input, rejected before any state mutation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transition attempted from a state that does not permit it
    #[error("booking {booking} is {status}: {reason}")]
    InvalidState {
        booking: BookingId,
        status: BookingStatus,
        reason: &'static str,
    },

    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Payment gateway failure; booking state left unchanged
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Payout was already marked paid
    #[error("payout {0} already paid")]
    AlreadyPaid(PayoutId),

    /// Gateway reference already recorded in the transaction log
    #[error("duplicate transaction reference {0}")]
    DuplicateTransaction(String),

    /// Internal bookkeeping disagrees with booking state
    #[error("consistency violation: {0}")]
    Consistency(String),
}

impl BookingError {
    pub(crate) fn invalid_state(
        booking: BookingId,
        status: BookingStatus,
        reason: &'static str,
    ) -> Self {
        BookingError::InvalidState {
            booking,
            status,
            reason,
        }
    }
}

/// Payment gateway failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway refused the operation
    #[error("declined: {0}")]
    Declined(String),

    /// The request did not reach the gateway or the reply was lost
    #[error("network failure: {0}")]
    Network(String),

    /// No answer within the configured timeout; outcome unknown
    #[error("timed out after {0:?}, outcome unknown")]
    Timeout(Duration),

    /// The referenced charge or account is unknown to the gateway
    #[error("unknown reference {0}")]
    NotFound(String),
}

/// Notification dispatcher failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("transient dispatch failure: {0}")]
    Transient(String),

    #[error("permanent dispatch failure: {0}")]
    Permanent(String),
}
