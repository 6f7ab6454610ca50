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

//! Commission policy.
//!
//! Subscribed payees pay [`SUBSCRIBED_RATE`]; everyone else, including payees the
//! directory cannot resolve, pays [`DEFAULT_RATE`].

use crate::catalog::PayeeProfile;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Commission for payees with an active subscription.
pub const SUBSCRIBED_RATE: Decimal = dec!(0.15);

/// Commission for everyone else.
pub const DEFAULT_RATE: Decimal = dec!(0.25);

/// Returns the commission rate applicable to `payee`.
pub fn rate(payee: Option<&PayeeProfile>) -> Decimal {
    rate_for_subscription(payee.is_some_and(|profile| profile.subscribed))
}

/// Returns the commission rate for a known subscription state.
pub fn rate_for_subscription(subscribed: bool) -> Decimal {
    if subscribed {
        SUBSCRIBED_RATE
    } else {
        DEFAULT_RATE
    }
}
