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

//! # Booking Ledger
//!
//! Financial lifecycle of outdoor-activity bookings: price estimation, payment
//! authorization, provider-declared completion, fee and payout computation, capture
//! and payout transfer. Notifications and payout rows are produced at most once per
//! booking, however often a transition is retried or re-delivered.
//!
//! ## Core Components
//!
//! - [`Engine`]: Booking state machine and owner of the ledgers
//! - [`calculator`]: Fee and payout arithmetic with per-step half-up rounding
//! - [`commission`]: Commission rate for a payee
//! - [`NotificationGate`]: At-most-once gate for notifications
//! - [`PayoutLedger`]: Money owed to providers and instructors
//! - [`BookingError`]: Error types for rejected transitions
//!
//! ## Example
//!
//! ```
//! use booking_ledger::{
//!     CompletionPercentage, Currency, Engine, InMemoryCatalog, Listing, ListingId, LogDispatcher,
//!     NewBooking, NotificationGate, Payee, PayerId, ProviderId, RetryPolicy, SandboxGateway,
//!     email_channel,
//! };
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(InMemoryCatalog::new());
//! catalog.insert_listing(Listing {
//!     id: ListingId(1),
//!     title: "Kite lesson".into(),
//!     owner: Payee::Provider(ProviderId(1)),
//!     image: None,
//!     sport: "kitesurf".into(),
//!     price: dec!(500.00),
//!     currency: Currency::EUR,
//! });
//! let (outbox, _worker) = email_channel(
//!     Arc::new(NotificationGate::new()),
//!     Arc::new(LogDispatcher),
//!     RetryPolicy::default(),
//! );
//! let engine = Engine::new(catalog, Arc::new(SandboxGateway::new()), outbox);
//!
//! let booking = engine
//!     .place_booking(NewBooking {
//!         payer: PayerId(1),
//!         listing: ListingId(1),
//!         session: None,
//!         start_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
//!         end_date: None,
//!         guests: 2,
//!     })
//!     .unwrap();
//! engine.checkout(booking.id).unwrap();
//!
//! let completion = CompletionPercentage::new(80).unwrap();
//! let receipt = engine.finalize(booking.id, completion, "wind dropped").unwrap().value;
//! assert_eq!(receipt.adjusted_total_price, dec!(800.00));
//! assert_eq!(receipt.provider_amount, dec!(600.00));
//! ```
//!
//! ## Thread Safety
//!
//! Every booking carries its own mutex. Transitions on one booking are serialized and
//! transitions on different bookings run in parallel.

pub mod admin;
mod base;
pub mod booking;
pub mod calculator;
pub mod catalog;
pub mod commission;
pub mod config;
mod engine;
pub mod error;
pub mod gateway;
pub mod http;
pub mod idempotency;
pub mod notification;
pub mod payout;
pub mod receipt;
pub mod transaction;
mod transaction_log;
pub mod webhook;

pub use admin::{AdminInbox, AdminNotification, AdminNotificationKind};
pub use base::{
    BookingId, Currency, InstructorId, ListingId, NotificationId, Payee, PayerId, PayoutId,
    ProviderId, SessionId,
};
pub use booking::{Booking, BookingRecord, BookingStatus, ListingSnapshot, NewBooking};
pub use calculator::{CompletionPercentage, Financials, PriceQuote};
pub use catalog::{Catalog, InMemoryCatalog, Listing, PayeeProfile};
pub use config::Config;
pub use engine::Engine;
pub use error::{BookingError, DispatchError, GatewayError};
pub use gateway::{Capture, GatewayOp, PaymentGateway, SandboxGateway, TimedGateway};
pub use notification::{
    BookingContext, Delivery, Dispatcher, EmailJob, EmailQueue, EmailWorker, JobOutcome, LogDispatcher,
    MemoryDispatcher, NotificationGate, NotificationKind, RetryPolicy, email_channel,
};
pub use payout::{MerchantPayout, PayeeSummary, PayoutLedger, PayoutMethod, PayoutStatus};
pub use receipt::{CaptureReceipt, FinalizeReceipt, Outcome};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
pub use transaction_log::TransactionLog;
pub use webhook::{GatewayEvent, WebhookHandler, WebhookOutcome};
