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

//! Financial calculator.
//!
//! Three steps, each rounded half-up to two fraction digits on its own:
//!
//! ```text
//! adjusted_total  = round(total_price * completion / 100)
//! platform_fee    = round(adjusted_total * commission_rate)
//! provider_amount = round(adjusted_total - platform_fee)
//! ```
//!
//! Rounding per step is what historical invoices were produced with, so the steps
//! must not be fused into one expression.
//!
//! # Example
//!
//! ```
//! use booking_ledger::calculator::{calculate, CompletionPercentage};
//! use rust_decimal_macros::dec;
//!
//! let completion = CompletionPercentage::new(80).unwrap();
//! let figures = calculate(dec!(1000.00), completion, dec!(0.25));
//! assert_eq!(figures.adjusted_total, dec!(800.00));
//! assert_eq!(figures.platform_fee, dec!(200.00));
//! assert_eq!(figures.provider_amount, dec!(600.00));
//! ```

use crate::base::Currency;
use crate::error::BookingError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraction digits carried by every money amount.
pub const MONEY_SCALE: u32 = 2;

/// Rounds half-up (away from zero) to two fraction digits and fixes the scale at two.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Share of a booked activity the provider declares as delivered, 0 to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct CompletionPercentage(u8);

impl CompletionPercentage {
    pub const NONE: CompletionPercentage = CompletionPercentage(0);
    pub const FULL: CompletionPercentage = CompletionPercentage(100);

    pub fn new(value: i64) -> Result<Self, BookingError> {
        if (0..=100).contains(&value) {
            Ok(CompletionPercentage(value as u8))
        } else {
            Err(BookingError::Validation(
                "completion_percentage must be between 0 and 100".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    fn ratio(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::ONE_HUNDRED
    }
}

impl TryFrom<i64> for CompletionPercentage {
    type Error = BookingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CompletionPercentage> for u8 {
    fn from(value: CompletionPercentage) -> Self {
        value.0
    }
}

impl fmt::Display for CompletionPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Result of one calculator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Financials {
    pub adjusted_total: Decimal,
    pub platform_fee: Decimal,
    pub provider_amount: Decimal,
}

/// Computes final figures for a declared completion.
pub fn calculate(
    total_price: Decimal,
    completion: CompletionPercentage,
    commission_rate: Decimal,
) -> Financials {
    let adjusted_total = round_money(total_price * completion.ratio());
    let platform_fee = round_money(adjusted_total * commission_rate);
    let provider_amount = round_money(adjusted_total - platform_fee);

    debug_assert_eq!(
        platform_fee + provider_amount,
        adjusted_total,
        "Invariant violated: fee and payout do not add up to the adjusted total"
    );

    Financials {
        adjusted_total,
        platform_fee,
        provider_amount,
    }
}

/// Computes the preview shown before the provider declares completion.
pub fn estimate(total_price: Decimal, commission_rate: Decimal) -> Financials {
    calculate(total_price, CompletionPercentage::FULL, commission_rate)
}

/// Price preview for a listing, nothing persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base_price: Decimal,
    pub subtotal: Decimal,
    pub service_fee: Decimal,
    pub total_price: Decimal,
    pub commission_rate: Decimal,
    pub currency: Currency,
}

/// Builds a price preview for `guests` places at `unit_price`.
pub fn quote(
    unit_price: Decimal,
    guests: u32,
    commission_rate: Decimal,
    currency: Currency,
) -> Result<PriceQuote, BookingError> {
    if guests == 0 {
        return Err(BookingError::Validation(
            "guests must be at least 1".to_string(),
        ));
    }
    let subtotal = round_money(unit_price * Decimal::from(guests));
    let figures = estimate(subtotal, commission_rate);
    Ok(PriceQuote {
        base_price: round_money(unit_price),
        subtotal,
        service_fee: figures.platform_fee,
        total_price: subtotal,
        commission_rate,
        currency,
    })
}
