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

//! At-most-once gate for side effects.
//!
//! A key is claimed before the side effect runs and committed after it succeeds.
//! A failed attempt releases the claim so a later retry can take it again. Claims are
//! decided with the map's entry API, so two racing callers never both acquire a key.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    InFlight,
    Done(DateTime<Utc>),
}

/// Outcome of [`IdempotencyLedger::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the key and must either commit or release it.
    Acquired,
    /// Another caller is running the side effect right now.
    InFlight,
    /// The side effect already completed at the given time.
    Done(DateTime<Utc>),
}

#[derive(Debug)]
pub struct IdempotencyLedger<K>
where
    K: Eq + Hash,
{
    slots: DashMap<K, Slot>,
}

impl<K> IdempotencyLedger<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub fn claim(&self, key: K) -> Claim {
        match self.slots.entry(key) {
            Entry::Occupied(entry) => match *entry.get() {
                Slot::InFlight => Claim::InFlight,
                Slot::Done(at) => Claim::Done(at),
            },
            Entry::Vacant(entry) => {
                entry.insert(Slot::InFlight);
                Claim::Acquired
            }
        }
    }

    /// Records success for a claimed key.
    pub fn commit(&self, key: K, at: DateTime<Utc>) {
        self.slots.insert(key, Slot::Done(at));
    }

    /// Gives a claimed key back. Completed keys stay completed.
    pub fn release(&self, key: &K) {
        self.slots
            .remove_if(key, |_, slot| matches!(slot, Slot::InFlight));
    }

    pub fn completed_at(&self, key: &K) -> Option<DateTime<Utc>> {
        match self.slots.get(key).map(|slot| *slot) {
            Some(Slot::Done(at)) => Some(at),
            _ => None,
        }
    }
}

impl<K> Default for IdempotencyLedger<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
