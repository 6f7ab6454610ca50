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

//! Engine public API integration tests.

use booking_ledger::{
    AdminNotificationKind, BookingError, BookingId, BookingStatus, Capture, CompletionPercentage,
    Currency,
    Engine, EmailWorker, GatewayError, GatewayOp, InMemoryCatalog, InstructorId, JobOutcome,
    Listing, ListingId, MemoryDispatcher, NewBooking, NotificationGate, NotificationKind, Payee,
    PayeeProfile, PayerId, PayoutId, PayoutMethod, PayoutStatus, ProviderId, RetryPolicy,
    PaymentGateway, SandboxGateway, TransactionKind, TransactionStatus, email_channel,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SCHOOL: Payee = Payee::Provider(ProviderId(1));
const COACH: Payee = Payee::Instructor(InstructorId(2));

struct Fixture {
    engine: Engine,
    catalog: Arc<InMemoryCatalog>,
    gateway: Arc<SandboxGateway>,
    dispatcher: Arc<MemoryDispatcher>,
    worker: EmailWorker,
}

fn make_catalog() -> Arc<InMemoryCatalog> {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.upsert_payee(PayeeProfile {
        payee: SCHOOL,
        display_name: Some("North Shore Kite School".into()),
        email: "school@example.com".into(),
        subscribed: false,
        payout_account: Some("acct_school".into()),
    });
    catalog.upsert_payee(PayeeProfile {
        payee: COACH,
        display_name: None,
        email: "coach@example.com".into(),
        subscribed: true,
        payout_account: None,
    });
    catalog.insert_listing(Listing {
        id: ListingId(1),
        title: "Kitesurf week".into(),
        owner: SCHOOL,
        image: Some("https://img.example/kite.jpg".into()),
        sport: "kitesurf".into(),
        price: dec!(500.00),
        currency: Currency::EUR,
    });
    catalog.insert_listing(Listing {
        id: ListingId(2),
        title: "Wing foil private".into(),
        owner: COACH,
        image: None,
        sport: "wingfoil".into(),
        price: dec!(250.50),
        currency: Currency::EUR,
    });
    catalog.insert_payer(PayerId(1), "traveler@example.com");
    catalog
}

fn make_fixture() -> Fixture {
    let catalog = make_catalog();
    let gateway = Arc::new(SandboxGateway::new());
    let dispatcher = Arc::new(MemoryDispatcher::new());
    let (outbox, worker) = email_channel(
        Arc::new(NotificationGate::new()),
        dispatcher.clone(),
        RetryPolicy::immediate(3),
    );
    let engine = Engine::new(catalog.clone(), gateway.clone(), outbox)
        .with_support_email("ops@example.com");
    Fixture {
        engine,
        catalog,
        gateway,
        dispatcher,
        worker,
    }
}

fn make_request(listing: u64, guests: u32) -> NewBooking {
    NewBooking {
        payer: PayerId(1),
        listing: ListingId(listing),
        session: None,
        start_date: NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 8, 14),
        guests,
    }
}

/// Authorized booking on listing 1 with two guests, total 1000.00.
fn make_authorized(f: &Fixture) -> BookingId {
    make_authorized_on(f, 1, 2)
}

fn make_authorized_on(f: &Fixture, listing: u64, guests: u32) -> BookingId {
    let booking = f.engine.place_booking(make_request(listing, guests)).unwrap();
    f.engine.checkout(booking.id).unwrap();
    booking.id
}

fn pct(value: i64) -> CompletionPercentage {
    CompletionPercentage::new(value).unwrap()
}

fn make_captured(f: &Fixture, completion: i64) -> BookingId {
    let id = make_authorized(f);
    f.engine.finalize(id, pct(completion), "").unwrap();
    f.engine.capture(id).unwrap();
    id
}

#[test]
fn place_booking_prices_by_guests() {
    let f = make_fixture();
    let booking = f.engine.place_booking(make_request(1, 2)).unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.total_price, dec!(1000.00));
    assert_eq!(booking.currency, Currency::EUR);
    assert_eq!(booking.payee, SCHOOL);
    assert!(booking.listing_snapshot.is_none());
}

#[test]
fn place_booking_validates_input() {
    let f = make_fixture();
    assert!(matches!(
        f.engine.place_booking(make_request(1, 0)),
        Err(BookingError::Validation(_))
    ));
    assert!(matches!(
        f.engine.place_booking(make_request(99, 1)),
        Err(BookingError::NotFound(_))
    ));
    let mut backwards = make_request(1, 1);
    backwards.end_date = NaiveDate::from_ymd_opt(2026, 8, 1);
    assert!(matches!(
        f.engine.place_booking(backwards),
        Err(BookingError::Validation(_))
    ));
}

#[test]
fn quote_uses_payee_commission() {
    let f = make_fixture();
    let quote = f.engine.quote(ListingId(2), 1).unwrap();
    assert_eq!(quote.subtotal, dec!(250.50));
    assert_eq!(quote.service_fee, dec!(37.58));
    assert_eq!(quote.commission_rate, dec!(0.15));

    let quote = f.engine.quote(ListingId(1), 3).unwrap();
    assert_eq!(quote.total_price, dec!(1500.00));
    assert_eq!(quote.service_fee, dec!(375.00));
    assert!(f.engine.bookings().is_empty());
}

#[test]
fn checkout_authorizes_with_estimate() {
    let f = make_fixture();
    let id = make_authorized(&f);
    let booking = f.engine.booking(id).unwrap();

    assert_eq!(booking.status, BookingStatus::Authorized);
    assert_eq!(booking.estimated_platform_fee, Some(dec!(250.00)));
    assert_eq!(booking.estimated_provider_amount, Some(dec!(750.00)));
    assert_eq!(booking.service_fee, dec!(250.00));
    assert_eq!(booking.provider_payout, dec!(750.00));
    assert!(booking.payment_authorized_at.is_some());
    assert!(booking.platform_fee.is_none());

    let snapshot = booking.listing_snapshot.unwrap();
    assert_eq!(snapshot.title, "Kitesurf week");
    assert_eq!(snapshot.provider_name.as_deref(), Some("North Shore Kite School"));

    let charge_ref = booking.charge_ref.unwrap();
    let charge = f.engine.transactions().get(&charge_ref).unwrap();
    assert_eq!(charge.kind, TransactionKind::Charge);
    assert_eq!(charge.status, TransactionStatus::Pending);
    assert_eq!(charge.amount, dec!(1000.00));

    assert_eq!(f.worker.run_pending(), vec![JobOutcome::Sent; 3]);
    assert_eq!(f.dispatcher.count(id, NotificationKind::AuthorizedUser), 1);
    assert_eq!(f.dispatcher.count(id, NotificationKind::AuthorizedProvider), 1);
    assert_eq!(f.dispatcher.count(id, NotificationKind::AuthorizedAdmin), 1);
}

#[test]
fn snapshot_survives_listing_edits() {
    let f = make_fixture();
    let id = make_authorized(&f);
    f.catalog
        .update_listing(ListingId(1), |listing| listing.title = "Renamed".into());
    let snapshot = f.engine.booking(id).unwrap().listing_snapshot.unwrap();
    assert_eq!(snapshot.title, "Kitesurf week");
}

#[test]
fn authorize_redelivery_is_echoed() {
    let f = make_fixture();
    let id = make_authorized(&f);
    let charge_ref = f.engine.booking(id).unwrap().charge_ref.unwrap();

    let echo = f.engine.authorize(id, &charge_ref).unwrap();
    assert!(echo.replayed);
    assert_eq!(f.engine.transactions().count_of(id, TransactionKind::Charge), 1);

    assert!(matches!(
        f.engine.authorize(id, "ch_other"),
        Err(BookingError::InvalidState { .. })
    ));
    assert!(matches!(
        f.engine.authorize(id, "  "),
        Err(BookingError::Validation(_))
    ));
}

#[test]
fn charge_reference_cannot_be_reused_across_bookings() {
    let f = make_fixture();
    let first = make_authorized(&f);
    let charge_ref = f.engine.booking(first).unwrap().charge_ref.unwrap();
    let second = f.engine.place_booking(make_request(1, 1)).unwrap();

    assert!(matches!(
        f.engine.authorize(second.id, &charge_ref),
        Err(BookingError::DuplicateTransaction(_))
    ));
    assert_eq!(f.engine.booking(second.id).unwrap().status, BookingStatus::Pending);
}

#[test]
fn finalize_partial_completion() {
    let f = make_fixture();
    let id = make_authorized(&f);
    let outcome = f.engine.finalize(id, pct(80), "wind dropped").unwrap();
    assert!(!outcome.replayed);

    let receipt = outcome.value;
    assert_eq!(receipt.status, BookingStatus::Completed);
    assert_eq!(receipt.adjusted_total_price, dec!(800.00));
    assert_eq!(receipt.platform_fee, dec!(200.00));
    assert_eq!(receipt.provider_amount, dec!(600.00));
    assert_eq!(receipt.commission_rate, dec!(0.25));
    assert!(receipt.capture_required && receipt.admin_notified && receipt.emails_sent);

    let booking = f.engine.booking(id).unwrap();
    assert!(booking.completed_at.is_some());
    assert!(booking.final_emails_sent_at.is_some());
    assert_eq!(booking.provider_payout, dec!(600.00));
    assert_eq!(booking.adjustment_reason, "wind dropped");

    let payout = f.engine.payout_for(id).unwrap();
    assert_eq!(payout.amount_due, dec!(600.00));
    assert_eq!(payout.total_charged, dec!(800.00));
    assert_eq!(payout.status, PayoutStatus::Pending);

    let rows = f.engine.inbox().for_booking(id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, AdminNotificationKind::Partial);

    f.worker.run_pending();
    assert_eq!(f.dispatcher.count(id, NotificationKind::FinalizedUser), 1);
    assert_eq!(f.dispatcher.count(id, NotificationKind::FinalizedProvider), 1);
    assert_eq!(f.dispatcher.count(id, NotificationKind::FinalizedAdmin), 1);
}

#[test]
fn finalize_full_rounds_fee_half_up() {
    let f = make_fixture();
    let id = make_authorized_on(&f, 2, 1);
    let receipt = f.engine.finalize(id, pct(100), "").unwrap().value;
    assert_eq!(receipt.adjusted_total_price, dec!(250.50));
    assert_eq!(receipt.platform_fee, dec!(37.58));
    assert_eq!(receipt.provider_amount, dec!(212.92));
    assert_eq!(receipt.commission_rate, dec!(0.15));
    assert_eq!(
        f.engine.inbox().for_booking(id)[0].kind,
        AdminNotificationKind::Finalized
    );
}

#[test]
fn finalize_zero_cancels_booking() {
    let f = make_fixture();
    let id = make_authorized(&f);
    let receipt = f.engine.finalize(id, pct(0), "storm").unwrap().value;
    assert_eq!(receipt.status, BookingStatus::Cancelled);
    assert_eq!(receipt.adjusted_total_price, dec!(0.00));

    let booking = f.engine.booking(id).unwrap();
    assert!(booking.cancelled_at.is_some());
    assert!(booking.completed_at.is_none());
    assert_eq!(f.engine.payout_for(id).unwrap().amount_due, dec!(0.00));

    let rows = f.engine.inbox().for_booking(id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, AdminNotificationKind::Cancelled);
}

#[test]
fn finalize_twice_returns_identical_receipt() {
    let f = make_fixture();
    let id = make_authorized(&f);
    let first = f.engine.finalize(id, pct(50), "half day").unwrap();
    let second = f.engine.finalize(id, pct(90), "changed my mind").unwrap();

    assert!(second.replayed);
    assert_eq!(first.value, second.value);
    assert_eq!(
        serde_json::to_vec(&first.value).unwrap(),
        serde_json::to_vec(&second.value).unwrap()
    );
    assert_eq!(f.engine.payouts().len(), 1);
    assert_eq!(f.engine.inbox().for_booking(id).len(), 1);

    f.worker.run_pending();
    assert_eq!(f.dispatcher.count(id, NotificationKind::FinalizedUser), 1);
}

#[test]
fn finalize_requires_authorized_booking() {
    let f = make_fixture();
    let booking = f.engine.place_booking(make_request(1, 1)).unwrap();
    assert!(matches!(
        f.engine.finalize(booking.id, pct(100), ""),
        Err(BookingError::InvalidState {
            status: BookingStatus::Pending,
            ..
        })
    ));
    assert!(f.engine.payouts().is_empty());
    assert!(matches!(
        f.engine.finalize(BookingId(404), pct(100), ""),
        Err(BookingError::NotFound(_))
    ));
}

#[test]
fn finalize_uses_subscription_at_finalize_time() {
    let f = make_fixture();
    let id = make_authorized(&f);
    assert_eq!(
        f.engine.booking(id).unwrap().estimated_platform_fee,
        Some(dec!(250.00))
    );

    f.catalog.set_subscribed(SCHOOL, true);
    let receipt = f.engine.finalize(id, pct(100), "").unwrap().value;
    assert_eq!(receipt.commission_rate, dec!(0.15));
    assert_eq!(receipt.platform_fee, dec!(150.00));
    assert_eq!(receipt.provider_amount, dec!(850.00));
}

#[test]
fn capture_rejected_unless_completed() {
    let f = make_fixture();
    let id = make_authorized(&f);
    assert!(matches!(
        f.engine.capture(id),
        Err(BookingError::InvalidState { .. })
    ));

    f.engine.finalize(id, pct(0), "").unwrap();
    assert!(matches!(
        f.engine.capture(id),
        Err(BookingError::InvalidState {
            status: BookingStatus::Cancelled,
            ..
        })
    ));
    assert_eq!(f.gateway.calls(GatewayOp::Capture), 0);
}

#[test]
fn capture_collects_adjusted_total() {
    let f = make_fixture();
    let id = make_authorized(&f);
    f.engine.finalize(id, pct(80), "").unwrap();

    let outcome = f.engine.capture(id).unwrap();
    assert!(!outcome.replayed);
    assert_eq!(outcome.value.captured_amount, dec!(800.00));
    assert_eq!(outcome.value.platform_fee, dec!(200.00));
    assert_eq!(outcome.value.provider_amount, dec!(600.00));
    assert_eq!(outcome.value.gateway_transfer_ref, None);

    let booking = f.engine.booking(id).unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);
    assert_eq!(booking.amount_captured, Some(dec!(800.00)));

    let rows = f.engine.transactions().for_booking(id);
    let capture = rows
        .iter()
        .find(|tx| tx.kind == TransactionKind::Capture)
        .unwrap();
    assert_eq!(capture.status, TransactionStatus::Succeeded);
    assert_eq!(capture.amount, dec!(800.00));
    let charge = rows
        .iter()
        .find(|tx| tx.kind == TransactionKind::Charge)
        .unwrap();
    assert_eq!(charge.status, TransactionStatus::Succeeded);

    assert!(
        f.engine
            .inbox()
            .for_booking(id)
            .iter()
            .any(|row| row.kind == AdminNotificationKind::PaymentCaptured)
    );

    let again = f.engine.capture(id).unwrap();
    assert!(again.replayed);
    assert_eq!(again.value, outcome.value);
    assert_eq!(f.gateway.calls(GatewayOp::Capture), 1);
}

#[test]
fn finalize_after_capture_is_echoed() {
    let f = make_fixture();
    let id = make_captured(&f, 100);
    let outcome = f.engine.finalize(id, pct(10), "").unwrap();
    assert!(outcome.replayed);
    assert_eq!(outcome.value.adjusted_total_price, dec!(1000.00));
}

#[test]
fn capture_gateway_failure_leaves_booking_unchanged() {
    let f = make_fixture();
    let id = make_authorized(&f);
    f.engine.finalize(id, pct(100), "").unwrap();
    let before = f.engine.booking(id).unwrap();

    f.gateway
        .fail_next(GatewayOp::Capture, GatewayError::Declined("insufficient_funds".into()));
    assert!(matches!(
        f.engine.capture(id),
        Err(BookingError::Gateway(GatewayError::Declined(_)))
    ));
    assert_eq!(f.engine.booking(id).unwrap(), before);
    assert_eq!(f.engine.transactions().count_of(id, TransactionKind::Capture), 0);

    assert!(f.engine.capture(id).is_ok());
}

#[test]
fn capture_timeout_is_reconciled_later() {
    let catalog = make_catalog();
    let gateway = Arc::new(SandboxGateway::new());
    let (outbox, _worker) = email_channel(
        Arc::new(NotificationGate::new()),
        Arc::new(MemoryDispatcher::new()),
        RetryPolicy::immediate(0),
    );
    let engine = Engine::new(catalog, gateway.clone(), outbox)
        .with_gateway_timeout(Duration::from_millis(50));

    let booking = engine.place_booking(make_request(1, 2)).unwrap();
    engine.checkout(booking.id).unwrap();
    engine.finalize(booking.id, pct(100), "").unwrap();

    gateway.set_latency(Duration::from_millis(300));
    assert!(matches!(
        engine.capture(booking.id),
        Err(BookingError::Gateway(GatewayError::Timeout(_)))
    ));
    gateway.set_latency(Duration::ZERO);
    assert_eq!(engine.booking(booking.id).unwrap().amount_captured, None);

    // Let the late gateway call finish.
    thread::sleep(Duration::from_millis(500));
    let receipt = engine.reconcile_capture(booking.id).unwrap().unwrap();
    assert_eq!(receipt.captured_amount, dec!(1000.00));
    assert_eq!(
        engine.booking(booking.id).unwrap().amount_captured,
        Some(dec!(1000.00))
    );
    assert_eq!(
        engine
            .transactions()
            .count_of(booking.id, TransactionKind::Capture),
        1
    );
}

#[test]
fn reconcile_without_gateway_capture_changes_nothing() {
    let f = make_fixture();
    let id = make_authorized(&f);
    f.engine.finalize(id, pct(60), "").unwrap();
    assert_eq!(f.engine.reconcile_capture(id).unwrap(), None);
    assert_eq!(f.engine.booking(id).unwrap().amount_captured, None);
}

#[test]
fn transfer_payout_pays_provider() {
    let f = make_fixture();
    let id = make_captured(&f, 80);

    let outcome = f.engine.transfer_payout(id).unwrap();
    assert!(!outcome.replayed);
    let payout = outcome.value;
    assert_eq!(payout.status, PayoutStatus::Paid);
    assert_eq!(payout.method, PayoutMethod::GatewayTransfer);
    let transfer_ref = payout.transfer_ref.clone().unwrap();
    assert_eq!(f.gateway.transfer_amount(&transfer_ref), Some(dec!(600.00)));

    let transfer = f.engine.transactions().get(&transfer_ref).unwrap();
    assert_eq!(transfer.kind, TransactionKind::Transfer);
    assert_eq!(transfer.payee, Some(SCHOOL));
    assert!(f.engine.booking(id).unwrap().paid_at.is_some());

    let again = f.engine.transfer_payout(id).unwrap();
    assert!(again.replayed);
    assert_eq!(f.gateway.calls(GatewayOp::Transfer), 1);
}

#[test]
fn transfer_requires_capture_and_payout_account() {
    let f = make_fixture();
    let id = make_authorized(&f);
    f.engine.finalize(id, pct(100), "").unwrap();
    assert!(matches!(
        f.engine.transfer_payout(id),
        Err(BookingError::InvalidState { .. })
    ));

    let coach = make_authorized_on(&f, 2, 1);
    f.engine.finalize(coach, pct(100), "").unwrap();
    f.engine.capture(coach).unwrap();
    assert!(matches!(
        f.engine.transfer_payout(coach),
        Err(BookingError::InvalidState { .. })
    ));
    assert_eq!(f.gateway.calls(GatewayOp::Transfer), 0);
}

#[test]
fn capture_and_transfer_reports_transfer_reference() {
    let f = make_fixture();
    let id = make_authorized(&f);
    f.engine.finalize(id, pct(100), "").unwrap();
    let receipt = f.engine.capture_and_transfer(id, true).unwrap();
    assert!(receipt.gateway_transfer_ref.is_some());

    let coach = make_authorized_on(&f, 2, 1);
    f.engine.finalize(coach, pct(100), "").unwrap();
    let receipt = f.engine.capture_and_transfer(coach, true).unwrap();
    assert_eq!(receipt.gateway_transfer_ref, None);
    assert_eq!(receipt.captured_amount, dec!(250.50));
}

#[test]
fn capture_survives_failed_transfer() {
    let f = make_fixture();
    let id = make_authorized(&f);
    f.engine.finalize(id, pct(100), "").unwrap();
    f.gateway
        .fail_next(GatewayOp::Transfer, GatewayError::Network("reset".into()));

    let receipt = f.engine.capture_and_transfer(id, true).unwrap();
    assert_eq!(receipt.gateway_transfer_ref, None);
    assert_eq!(f.engine.payout_for(id).unwrap().status, PayoutStatus::Pending);

    let payout = f.engine.transfer_payout(id).unwrap().value;
    assert!(payout.is_paid());
}

#[test]
fn manual_payouts() {
    let f = make_fixture();
    let a = make_authorized(&f);
    let b = make_authorized(&f);
    f.engine.finalize(a, pct(100), "").unwrap();
    f.engine.finalize(b, pct(50), "").unwrap();
    let pa = f.engine.payout_for(a).unwrap().id;
    let pb = f.engine.payout_for(b).unwrap().id;

    let paid = f.engine.mark_payout_paid(pa).unwrap();
    assert_eq!(paid.method, PayoutMethod::Manual);
    assert!(f.engine.booking(a).unwrap().paid_at.is_some());
    assert_eq!(
        f.engine.mark_payout_paid(pa),
        Err(BookingError::AlreadyPaid(pa))
    );

    assert_eq!(f.engine.mark_payouts_paid(&[pa, pb, PayoutId(999)]), 1);
    assert!(f.engine.payout_for(b).unwrap().is_paid());
}

#[test]
fn payee_summary_totals() {
    let f = make_fixture();
    let a = make_authorized(&f);
    let b = make_authorized(&f);
    f.engine.finalize(a, pct(100), "").unwrap();
    f.engine.finalize(b, pct(50), "").unwrap();
    f.engine
        .mark_payout_paid(f.engine.payout_for(a).unwrap().id)
        .unwrap();

    let summary = f.engine.payee_summary(SCHOOL);
    assert_eq!(summary.total_paid, dec!(750.00));
    assert_eq!(summary.total_pending, dec!(375.00));
    assert_eq!(summary.payouts.len(), 2);
    assert!(f.engine.payee_summary(COACH).payouts.is_empty());
}

#[test]
fn voided_authorization_cancels_booking() {
    let f = make_fixture();
    let id = make_authorized(&f);
    let charge_ref = f.engine.booking(id).unwrap().charge_ref.unwrap();

    let outcome = f.engine.void_authorization(id, &charge_ref).unwrap();
    assert_eq!(outcome.value.status, BookingStatus::Cancelled);
    assert_eq!(
        f.engine.transactions().get(&charge_ref).unwrap().status,
        TransactionStatus::Failed
    );
    assert!(f.engine.void_authorization(id, &charge_ref).unwrap().replayed);
    assert!(matches!(
        f.engine.finalize(id, pct(100), ""),
        Err(BookingError::InvalidState { .. })
    ));
}

fn capture_status(f: &Fixture, id: BookingId) -> TransactionStatus {
    f.engine
        .transactions()
        .for_booking(id)
        .into_iter()
        .find(|tx| tx.kind == TransactionKind::Capture)
        .unwrap()
        .status
}

#[test]
fn partial_refunds_accumulate_up_to_capture() {
    let f = make_fixture();
    let id = make_captured(&f, 100);
    let charge_ref = f.engine.booking(id).unwrap().charge_ref.unwrap();

    let refund = f.engine.record_refund(&charge_ref, "re_1", dec!(800.00)).unwrap();
    assert!(!refund.replayed);
    assert_eq!(refund.value.kind, TransactionKind::Refund);
    assert_eq!(capture_status(&f, id), TransactionStatus::Succeeded);

    assert!(f.engine.record_refund(&charge_ref, "re_1", dec!(800.00)).unwrap().replayed);
    assert!(matches!(
        f.engine.record_refund(&charge_ref, "re_2", dec!(800.00)),
        Err(BookingError::Validation(_))
    ));
    assert!(matches!(
        f.engine.record_refund(&charge_ref, "re_3", dec!(0.00)),
        Err(BookingError::Validation(_))
    ));
    assert_eq!(f.engine.transactions().count_of(id, TransactionKind::Refund), 1);

    f.engine.record_refund(&charge_ref, "re_4", dec!(200.00)).unwrap();
    assert_eq!(capture_status(&f, id), TransactionStatus::Refunded);
    assert!(matches!(
        f.engine.record_refund(&charge_ref, "re_5", dec!(0.01)),
        Err(BookingError::Validation(_))
    ));
}

#[test]
fn refund_requires_capture() {
    let f = make_fixture();
    let id = make_authorized(&f);
    let charge_ref = f.engine.booking(id).unwrap().charge_ref.unwrap();
    assert!(matches!(
        f.engine.record_refund(&charge_ref, "re_1", dec!(10.00)),
        Err(BookingError::InvalidState { .. })
    ));
}

#[test]
fn void_rejects_charge_of_another_booking() {
    let f = make_fixture();
    let first = make_authorized(&f);
    let charge_ref = f.engine.booking(first).unwrap().charge_ref.unwrap();
    let pending = f.engine.place_booking(make_request(1, 1)).unwrap();

    assert!(matches!(
        f.engine.void_authorization(pending.id, &charge_ref),
        Err(BookingError::InvalidState { .. })
    ));
    assert_eq!(f.engine.booking(pending.id).unwrap().status, BookingStatus::Pending);
    assert_eq!(f.engine.booking(first).unwrap().status, BookingStatus::Authorized);
    assert_eq!(
        f.engine.transactions().get(&charge_ref).unwrap().status,
        TransactionStatus::Pending
    );
}

#[test]
fn void_of_pending_booking_with_unknown_charge() {
    let f = make_fixture();
    let pending = f.engine.place_booking(make_request(1, 1)).unwrap();
    let outcome = f.engine.void_authorization(pending.id, "ch_never_seen").unwrap();
    assert_eq!(outcome.value.status, BookingStatus::Cancelled);
}

/// Gateway that hands out the same transfer reference every time.
struct FixedTransferGateway {
    inner: SandboxGateway,
}

impl PaymentGateway for FixedTransferGateway {
    fn authorize(
        &self,
        amount: Decimal,
        currency: Currency,
        payer_ref: &str,
    ) -> Result<String, GatewayError> {
        self.inner.authorize(amount, currency, payer_ref)
    }

    fn capture(&self, charge_ref: &str, amount: Decimal) -> Result<Capture, GatewayError> {
        self.inner.capture(charge_ref, amount)
    }

    fn transfer(
        &self,
        amount: Decimal,
        currency: Currency,
        account: &str,
    ) -> Result<String, GatewayError> {
        self.inner.transfer(amount, currency, account)?;
        Ok("tr_fixed".to_string())
    }

    fn lookup_capture(&self, charge_ref: &str) -> Result<Option<Capture>, GatewayError> {
        self.inner.lookup_capture(charge_ref)
    }
}

#[test]
fn transfer_settles_payout_when_reference_repeats() {
    let (outbox, _worker) = email_channel(
        Arc::new(NotificationGate::new()),
        Arc::new(MemoryDispatcher::new()),
        RetryPolicy::immediate(0),
    );
    let gateway = Arc::new(FixedTransferGateway {
        inner: SandboxGateway::new(),
    });
    let engine = Engine::new(make_catalog(), gateway.clone(), outbox);

    let mut ids = Vec::new();
    for _ in 0..2 {
        let booking = engine.place_booking(make_request(1, 2)).unwrap();
        engine.checkout(booking.id).unwrap();
        engine.finalize(booking.id, pct(100), "").unwrap();
        engine.capture(booking.id).unwrap();
        ids.push(booking.id);
    }

    for &id in &ids {
        let payout = engine.transfer_payout(id).unwrap().value;
        assert!(payout.is_paid());
        assert!(engine.booking(id).unwrap().paid_at.is_some());
    }
    // A retry must not move money again.
    assert!(engine.transfer_payout(ids[1]).unwrap().replayed);
    assert_eq!(gateway.inner.calls(GatewayOp::Transfer), 2);
}
