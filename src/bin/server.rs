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

//! Booking HTTP service.
//!
//! Configuration comes from the environment, see [`booking_ledger::Config`].
//!
//! ```bash
//! LISTEN_ADDR=127.0.0.1:3000 RUST_LOG=info booking-server
//!
//! curl -X POST http://localhost:3000/bookings/calculate \
//!   -H "Content-Type: application/json" \
//!   -d '{"listing_id": 1, "guests": 2}'
//! ```

use booking_ledger::config::LogFormat;
use booking_ledger::http::{AppState, router};
use booking_ledger::{
    Config, Currency, Engine, InMemoryCatalog, InstructorId, Listing, ListingId, LogDispatcher,
    NotificationGate, Payee, PayeeProfile, PayerId, ProviderId, SandboxGateway, email_channel,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Sample listings so a fresh process has something to book.
fn seed_catalog(catalog: &InMemoryCatalog) {
    let school = Payee::Provider(ProviderId(1));
    let coach = Payee::Instructor(InstructorId(1));
    catalog.upsert_payee(PayeeProfile {
        payee: school,
        display_name: Some("Tarifa Kite School".into()),
        email: "school@example.com".into(),
        subscribed: true,
        payout_account: Some("acct_school".into()),
    });
    catalog.upsert_payee(PayeeProfile {
        payee: coach,
        display_name: None,
        email: "coach@example.com".into(),
        subscribed: false,
        payout_account: None,
    });
    catalog.insert_listing(Listing {
        id: ListingId(1),
        title: "Kitesurf beginner course".into(),
        owner: school,
        image: None,
        sport: "kitesurf".into(),
        price: dec!(180.00),
        currency: Currency::EUR,
    });
    catalog.insert_listing(Listing {
        id: ListingId(2),
        title: "Private wing foil session".into(),
        owner: coach,
        image: None,
        sport: "wingfoil".into(),
        price: dec!(95.00),
        currency: Currency::EUR,
    });
    catalog.insert_payer(PayerId(1), "traveler@example.com");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let catalog = Arc::new(InMemoryCatalog::new());
    seed_catalog(&catalog);

    let (outbox, worker) = email_channel(
        Arc::new(NotificationGate::new()),
        Arc::new(LogDispatcher),
        config.email_retry,
    );
    // Exits once the engine and its queue are dropped.
    let _worker = worker.spawn();

    let engine = Engine::new(catalog, Arc::new(SandboxGateway::new()), outbox)
        .with_support_email(config.support_email.clone())
        .with_gateway_timeout(config.gateway_timeout);
    let app = router(AppState::new(Arc::new(engine), config.transfer_on_capture));

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "booking server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("shutting down");
    Ok(())
}
