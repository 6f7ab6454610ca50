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

//! Read-only view of listings, payees and travelers.
//!
//! The booking engine never writes through this interface; it only resolves what a
//! listing costs, who gets paid for it and where notifications go.

use crate::base::{Currency, ListingId, Payee, PayerId};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bookable activity as the catalog currently describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub owner: Payee,
    pub image: Option<String>,
    pub sport: String,
    /// Price per guest.
    pub price: Decimal,
    pub currency: Currency,
}

/// What the directory knows about a payee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeProfile {
    pub payee: Payee,
    pub display_name: Option<String>,
    pub email: String,
    pub subscribed: bool,
    /// Gateway account that can receive transfers, once onboarded.
    pub payout_account: Option<String>,
}

pub trait Catalog: Send + Sync {
    fn listing(&self, id: ListingId) -> Option<Listing>;

    fn payee(&self, payee: Payee) -> Option<PayeeProfile>;

    fn payer_email(&self, payer: PayerId) -> Option<String>;

    /// Contact address for a payee.
    fn payee_email(&self, payee: Payee) -> Option<String> {
        self.payee(payee).map(|profile| profile.email)
    }
}

/// Catalog backed by concurrent maps, for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    listings: DashMap<ListingId, Listing>,
    payees: DashMap<Payee, PayeeProfile>,
    payers: DashMap<PayerId, String>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_listing(&self, listing: Listing) {
        self.listings.insert(listing.id, listing);
    }

    pub fn upsert_payee(&self, profile: PayeeProfile) {
        self.payees.insert(profile.payee, profile);
    }

    pub fn insert_payer(&self, payer: PayerId, email: impl Into<String>) {
        self.payers.insert(payer, email.into());
    }

    /// Flips a payee's subscription. Returns `false` for unknown payees.
    pub fn set_subscribed(&self, payee: Payee, subscribed: bool) -> bool {
        match self.payees.get_mut(&payee) {
            Some(mut profile) => {
                profile.subscribed = subscribed;
                true
            }
            None => false,
        }
    }

    pub fn set_payout_account(&self, payee: Payee, account: Option<String>) -> bool {
        match self.payees.get_mut(&payee) {
            Some(mut profile) => {
                profile.payout_account = account;
                true
            }
            None => false,
        }
    }

    pub fn update_listing<F>(&self, id: ListingId, update: F) -> bool
    where
        F: FnOnce(&mut Listing),
    {
        match self.listings.get_mut(&id) {
            Some(mut listing) => {
                update(&mut listing);
                true
            }
            None => false,
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn listing(&self, id: ListingId) -> Option<Listing> {
        self.listings.get(&id).map(|r| r.clone())
    }

    fn payee(&self, payee: Payee) -> Option<PayeeProfile> {
        self.payees.get(&payee).map(|r| r.clone())
    }

    fn payer_email(&self, payer: PayerId) -> Option<String> {
        self.payers.get(&payer).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::InstructorId;
    use rust_decimal_macros::dec;

    fn instructor() -> PayeeProfile {
        PayeeProfile {
            payee: Payee::Instructor(InstructorId(4)),
            display_name: None,
            email: "coach@example.com".into(),
            subscribed: false,
            payout_account: None,
        }
    }

    #[test]
    fn subscription_changes_are_visible_to_readers() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_payee(instructor());
        let payee = Payee::Instructor(InstructorId(4));

        assert!(!catalog.payee(payee).unwrap().subscribed);
        assert!(catalog.set_subscribed(payee, true));
        assert!(catalog.payee(payee).unwrap().subscribed);
        assert_eq!(catalog.payee_email(payee).as_deref(), Some("coach@example.com"));
    }

    #[test]
    fn unknown_payee_is_not_updated() {
        let catalog = InMemoryCatalog::new();
        assert!(!catalog.set_subscribed(Payee::Instructor(InstructorId(1)), true));
    }

    #[test]
    fn listing_round_trips() {
        let catalog = InMemoryCatalog::new();
        catalog.insert_listing(Listing {
            id: ListingId(1),
            title: "Kite foil intro".into(),
            owner: Payee::Instructor(InstructorId(4)),
            image: None,
            sport: "kitesurf".into(),
            price: dec!(120.00),
            currency: Currency::EUR,
        });
        assert!(catalog.update_listing(ListingId(1), |l| l.price = dec!(130.00)));
        assert_eq!(catalog.listing(ListingId(1)).unwrap().price, dec!(130.00));
        assert!(catalog.listing(ListingId(2)).is_none());
    }
}
