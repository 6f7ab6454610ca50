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

use booking_ledger::calculator::{self, CompletionPercentage};
use booking_ledger::commission;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Booking settlement - compute final fees and payouts from a CSV of bookings
///
/// Reads bookings from a CSV file and writes the settled figures to stdout.
#[derive(Parser, Debug)]
#[command(name = "booking-ledger")]
#[command(about = "Settles booking CSVs into fees and payouts", long_about = None)]
struct Args {
    /// Path to CSV file with bookings
    ///
    /// Expected format: booking,total_price,completion,subscribed
    /// Example: booking-ledger bookings.csv > settlements.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    match settle(BufReader::new(file), std::io::stdout()) {
        Ok(count) => info!(count, "bookings settled"),
        Err(e) => {
            eprintln!("Error settling bookings: {}", e);
            process::exit(1);
        }
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `booking, total_price, completion, subscribed`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    booking: u64,
    total_price: Decimal,
    completion: i64,
    #[serde(default)]
    subscribed: bool,
}

/// Settled output row.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct Settlement {
    booking: u64,
    adjusted_total: Decimal,
    platform_fee: Decimal,
    provider_amount: Decimal,
    commission_rate: Decimal,
}

impl CsvRecord {
    /// Returns `None` for negative prices or out-of-range completion.
    fn settle(self) -> Option<Settlement> {
        if self.total_price < Decimal::ZERO {
            return None;
        }
        let completion = CompletionPercentage::new(self.completion).ok()?;
        let rate = commission::rate_for_subscription(self.subscribed);
        let figures = calculator::calculate(calculator::round_money(self.total_price), completion, rate);
        Some(Settlement {
            booking: self.booking,
            adjusted_total: figures.adjusted_total,
            platform_fee: figures.platform_fee,
            provider_amount: figures.provider_amount,
            commission_rate: rate,
        })
    }
}

/// Settles bookings from a CSV reader into a CSV writer.
///
/// Rows are streamed one at a time. Malformed rows are skipped, as are repeated
/// booking ids: a booking is settled once, by its first row.
///
/// # CSV Format
///
/// Input columns: `booking, total_price, completion, subscribed`
///
/// ```csv
/// booking,total_price,completion,subscribed
/// 1,1000.00,80,false
/// 2,250.50,100,true
/// ```
///
/// Output columns: `booking, adjusted_total, platform_fee, provider_amount, commission_rate`
///
/// # Errors
///
/// Returns a CSV error if the reader or writer fails.
pub fn settle<R: Read, W: Write>(reader: R, writer: W) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true) // Allow missing subscribed field
        .has_headers(true)
        .from_reader(reader);
    let mut wtr = Writer::from_writer(writer);
    let mut seen = HashSet::new();
    let mut count = 0;

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "skipping malformed row");
                continue;
            }
        };
        let booking = record.booking;
        if !seen.insert(booking) {
            debug!(booking, "skipping repeated booking");
            continue;
        }
        let Some(settlement) = record.settle() else {
            debug!(booking, "skipping invalid booking");
            continue;
        };
        wtr.serialize(&settlement)?;
        count += 1;
    }

    wtr.flush()?;
    Ok(count)
}
