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

//! Idempotent notification gate and the email outbox.
//!
//! Transitions never send mail themselves. They enqueue an [`EmailJob`] per
//! recipient and the [`EmailWorker`] delivers it through a [`Dispatcher`]. Every
//! attempt, retries included, goes through [`NotificationGate::dispatch_once`], which
//! lets each `(booking, kind)` pair through at most once.

use crate::base::{BookingId, Currency};
use crate::booking::{BookingRecord, BookingStatus};
use crate::calculator::CompletionPercentage;
use crate::error::DispatchError;
use crate::idempotency::{Claim, IdempotencyLedger};
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AuthorizedUser,
    AuthorizedProvider,
    AuthorizedAdmin,
    FinalizedUser,
    FinalizedProvider,
    FinalizedAdmin,
}

impl NotificationKind {
    pub const AUTHORIZED: [NotificationKind; 3] = [
        NotificationKind::AuthorizedUser,
        NotificationKind::AuthorizedProvider,
        NotificationKind::AuthorizedAdmin,
    ];

    pub const FINALIZED: [NotificationKind; 3] = [
        NotificationKind::FinalizedUser,
        NotificationKind::FinalizedProvider,
        NotificationKind::FinalizedAdmin,
    ];

    pub fn audience(&self) -> Audience {
        match self {
            NotificationKind::AuthorizedUser | NotificationKind::FinalizedUser => Audience::Payer,
            NotificationKind::AuthorizedProvider | NotificationKind::FinalizedProvider => {
                Audience::Payee
            }
            NotificationKind::AuthorizedAdmin | NotificationKind::FinalizedAdmin => Audience::Admin,
        }
    }
}

/// Who a notification kind is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Payer,
    Payee,
    Admin,
}

/// Booking details a template may render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingContext {
    pub booking: BookingId,
    pub status: BookingStatus,
    pub listing_title: Option<String>,
    pub currency: Currency,
    pub total_price: Decimal,
    pub completion_percentage: Option<CompletionPercentage>,
    pub adjusted_total_price: Option<Decimal>,
    pub platform_fee: Option<Decimal>,
    pub provider_amount: Option<Decimal>,
    pub adjustment_reason: String,
}

impl From<&BookingRecord> for BookingContext {
    fn from(record: &BookingRecord) -> Self {
        Self {
            booking: record.id,
            status: record.status,
            listing_title: record.listing_snapshot.as_ref().map(|s| s.title.clone()),
            currency: record.currency,
            total_price: record.total_price,
            completion_percentage: record.completion_percentage,
            adjusted_total_price: record.adjusted_total_price,
            platform_fee: record.platform_fee.or(record.estimated_platform_fee),
            provider_amount: record.provider_amount.or(record.estimated_provider_amount),
            adjustment_reason: record.adjustment_reason.clone(),
        }
    }
}

/// Sends one rendered notification. Implementations talk to the mail provider.
pub trait Dispatcher: Send + Sync {
    fn send(
        &self,
        recipient: &str,
        kind: NotificationKind,
        context: &BookingContext,
    ) -> Result<(), DispatchError>;
}

/// Dispatcher that only writes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl Dispatcher for LogDispatcher {
    fn send(
        &self,
        recipient: &str,
        kind: NotificationKind,
        context: &BookingContext,
    ) -> Result<(), DispatchError> {
        info!(booking = %context.booking, ?kind, recipient, "notification sent");
        Ok(())
    }
}

/// A delivered notification as seen by [`MemoryDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub kind: NotificationKind,
    pub booking: BookingId,
}

/// Dispatcher that keeps delivered notifications in memory.
///
/// Failures can be scripted with [`MemoryDispatcher::fail_next`]; each scripted
/// failure is consumed by one `send` call.
#[derive(Debug, Default)]
pub struct MemoryDispatcher {
    sent: Mutex<Vec<SentNotification>>,
    failures: Mutex<VecDeque<DispatchError>>,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: DispatchError) {
        self.failures.lock().push_back(error);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn count(&self, booking: BookingId, kind: NotificationKind) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.booking == booking && n.kind == kind)
            .count()
    }
}

impl Dispatcher for MemoryDispatcher {
    fn send(
        &self,
        recipient: &str,
        kind: NotificationKind,
        context: &BookingContext,
    ) -> Result<(), DispatchError> {
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        self.sent.lock().push(SentNotification {
            recipient: recipient.to_string(),
            kind,
            booking: context.booking,
        });
        Ok(())
    }
}

/// Result of one [`NotificationGate::dispatch_once`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The notification went out on this attempt.
    Sent,
    AlreadySent,
    /// Another attempt holds the claim and has not finished yet.
    InFlight,
}

/// At-most-once gate keyed by booking and notification kind.
#[derive(Debug, Default)]
pub struct NotificationGate {
    ledger: IdempotencyLedger<(BookingId, NotificationKind)>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `send` unless this notification already went out.
    ///
    /// A [`Delivery::InFlight`] result means nothing was sent yet: the caller should
    /// try again later, since the other attempt may still fail. A failed `send`
    /// releases the claim.
    pub fn dispatch_once<F>(
        &self,
        booking: BookingId,
        kind: NotificationKind,
        send: F,
    ) -> Result<Delivery, DispatchError>
    where
        F: FnOnce() -> Result<(), DispatchError>,
    {
        let key = (booking, kind);
        match self.ledger.claim(key) {
            Claim::Acquired => {}
            Claim::InFlight => {
                debug!(%booking, ?kind, "notification in flight elsewhere");
                return Ok(Delivery::InFlight);
            }
            Claim::Done(at) => {
                debug!(%booking, ?kind, sent_at = %at, "notification already sent");
                return Ok(Delivery::AlreadySent);
            }
        }

        match send() {
            Ok(()) => {
                self.ledger.commit(key, Utc::now());
                Ok(Delivery::Sent)
            }
            Err(e) => {
                self.ledger.release(&key);
                Err(e)
            }
        }
    }

    pub fn sent_at(&self, booking: BookingId, kind: NotificationKind) -> Option<DateTime<Utc>> {
        self.ledger.completed_at(&(booking, kind))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailJob {
    pub booking: BookingId,
    pub kind: NotificationKind,
    pub recipient: String,
    pub context: BookingContext,
}

/// Retry schedule for transient dispatch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.min(20);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(300),
        }
    }
}

/// Producer half of the outbox.
#[derive(Debug, Clone)]
pub struct EmailQueue {
    sender: Sender<EmailJob>,
}

impl EmailQueue {
    pub fn enqueue(&self, job: EmailJob) {
        let (booking, kind) = (job.booking, job.kind);
        if self.sender.send(job).is_err() {
            warn!(%booking, ?kind, "email worker gone, notification dropped");
        }
    }
}

/// What happened to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Sent,
    /// Already delivered.
    Skipped,
    Dropped,
}

/// Consumer half of the outbox.
pub struct EmailWorker {
    receiver: Receiver<EmailJob>,
    gate: Arc<NotificationGate>,
    dispatcher: Arc<dyn Dispatcher>,
    policy: RetryPolicy,
}

/// Creates a connected outbox queue and worker.
pub fn email_channel(
    gate: Arc<NotificationGate>,
    dispatcher: Arc<dyn Dispatcher>,
    policy: RetryPolicy,
) -> (EmailQueue, EmailWorker) {
    let (sender, receiver) = channel::unbounded();
    (
        EmailQueue { sender },
        EmailWorker {
            receiver,
            gate,
            dispatcher,
            policy,
        },
    )
}

impl EmailWorker {
    /// Delivers one job, retrying transient failures per the policy.
    ///
    /// A job whose notification is in flight on another worker waits on the same
    /// schedule, so it still goes out if that attempt fails.
    pub fn process(&self, job: &EmailJob) -> JobOutcome {
        let mut retry = 0;
        loop {
            let result = self.gate.dispatch_once(job.booking, job.kind, || {
                self.dispatcher.send(&job.recipient, job.kind, &job.context)
            });
            match result {
                Ok(Delivery::Sent) => return JobOutcome::Sent,
                Ok(Delivery::AlreadySent) => return JobOutcome::Skipped,
                Ok(Delivery::InFlight) if retry < self.policy.max_retries => {
                    thread::sleep(self.policy.delay(retry));
                    retry += 1;
                }
                Ok(Delivery::InFlight) => {
                    if self.gate.sent_at(job.booking, job.kind).is_some() {
                        return JobOutcome::Skipped;
                    }
                    warn!(booking = %job.booking, kind = ?job.kind, "notification still in flight, job dropped");
                    return JobOutcome::Dropped;
                }
                Err(DispatchError::Transient(reason)) if retry < self.policy.max_retries => {
                    let delay = self.policy.delay(retry);
                    warn!(booking = %job.booking, kind = ?job.kind, retry, ?delay, %reason, "dispatch failed, retrying");
                    thread::sleep(delay);
                    retry += 1;
                }
                Err(DispatchError::Transient(reason)) => {
                    error!(booking = %job.booking, kind = ?job.kind, %reason, "dispatch retries exhausted");
                    return JobOutcome::Dropped;
                }
                Err(DispatchError::Permanent(reason)) => {
                    error!(booking = %job.booking, kind = ?job.kind, %reason, "dispatch failed permanently");
                    return JobOutcome::Dropped;
                }
            }
        }
    }

    /// Drains jobs already queued without blocking.
    pub fn run_pending(&self) -> Vec<JobOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(job) => outcomes.push(self.process(&job)),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        outcomes
    }

    /// Runs the worker on its own thread until every queue handle is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || {
            for job in self.receiver.iter() {
                self.process(&job);
            }
            debug!("email worker stopped");
        })
    }
}
