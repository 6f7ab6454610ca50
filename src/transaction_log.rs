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

//! Append-only transaction log with reference deduplication.
//!
//! Gateway references are unique across the log. A second row carrying a reference
//! that is already recorded is rejected, which keeps webhook redeliveries and retried
//! jobs from double-counting money movements.

use crate::base::BookingId;
use crate::error::BookingError;
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Thread-safe transaction log.
///
/// Rows are keyed by gateway reference for O(1) duplicate checks, with a per-booking
/// index that preserves insertion order.
#[derive(Debug, Default)]
pub struct TransactionLog {
    by_reference: DashMap<String, Transaction>,
    by_booking: DashMap<BookingId, Vec<String>>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::DuplicateTransaction`] if the reference is already
    /// recorded.
    pub fn append(&self, transaction: Transaction) -> Result<(), BookingError> {
        // Entry API for atomic check-and-insert
        match self.by_reference.entry(transaction.reference.clone()) {
            Entry::Occupied(entry) => Err(BookingError::DuplicateTransaction(entry.key().clone())),
            Entry::Vacant(entry) => {
                let booking = transaction.booking;
                let reference = transaction.reference.clone();
                entry.insert(transaction);
                self.by_booking.entry(booking).or_default().push(reference);
                Ok(())
            }
        }
    }

    /// Moves a row to a new status.
    pub fn set_status(
        &self,
        reference: &str,
        status: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<Transaction, BookingError> {
        let mut row = self
            .by_reference
            .get_mut(reference)
            .ok_or_else(|| BookingError::NotFound(format!("transaction {reference}")))?;
        row.status = status;
        row.updated_at = now;
        Ok(row.clone())
    }

    pub fn get(&self, reference: &str) -> Option<Transaction> {
        self.by_reference.get(reference).map(|r| r.clone())
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.by_reference.contains_key(reference)
    }

    /// Rows for one booking, oldest first.
    pub fn for_booking(&self, booking: BookingId) -> Vec<Transaction> {
        let references = match self.by_booking.get(&booking) {
            Some(references) => references.clone(),
            None => return Vec::new(),
        };
        references.iter().filter_map(|r| self.get(r)).collect()
    }

    pub fn count_of(&self, booking: BookingId, kind: TransactionKind) -> usize {
        self.for_booking(booking)
            .iter()
            .filter(|tx| tx.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.by_reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_reference.is_empty()
    }
}
