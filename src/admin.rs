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

//! Operational events for platform staff.

use crate::base::{BookingId, NotificationId};
use crate::calculator::CompletionPercentage;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminNotificationKind {
    Finalized,
    Partial,
    Cancelled,
    PaymentCaptured,
}

impl AdminNotificationKind {
    /// Classifies a finalization by declared completion.
    pub fn for_completion(completion: CompletionPercentage) -> Self {
        match completion.value() {
            0 => AdminNotificationKind::Cancelled,
            100 => AdminNotificationKind::Finalized,
            _ => AdminNotificationKind::Partial,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminNotification {
    pub id: NotificationId,
    pub kind: AdminNotificationKind,
    pub booking: BookingId,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Append-only inbox.
#[derive(Debug)]
pub struct AdminInbox {
    rows: DashMap<NotificationId, AdminNotification>,
    next_id: AtomicU64,
}

impl AdminInbox {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn push(
        &self,
        kind: AdminNotificationKind,
        booking: BookingId,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> AdminNotification {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let row = AdminNotification {
            id,
            kind,
            booking,
            title: title.into(),
            message: message.into(),
            is_read: false,
            created_at: now,
        };
        self.rows.insert(id, row.clone());
        row
    }

    /// All rows, newest first.
    pub fn list(&self) -> Vec<AdminNotification> {
        let mut rows: Vec<_> = self.rows.iter().map(|r| r.clone()).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows
    }

    pub fn for_booking(&self, booking: BookingId) -> Vec<AdminNotification> {
        self.list()
            .into_iter()
            .filter(|row| row.booking == booking)
            .collect()
    }

    pub fn unread_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_read).count()
    }

    /// Marks the given rows read. Returns how many changed.
    pub fn mark_read(&self, ids: &[NotificationId]) -> usize {
        let mut changed = 0;
        for id in ids {
            if let Some(mut row) = self.rows.get_mut(id) {
                if !row.is_read {
                    row.is_read = true;
                    changed += 1;
                }
            }
        }
        changed
    }
}

impl Default for AdminInbox {
    fn default() -> Self {
        Self::new()
    }
}
