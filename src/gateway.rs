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

//! Payment gateway collaborator.
//!
//! [`PaymentGateway`] is the capability the engine consumes. [`TimedGateway`] puts
//! an upper bound on every call: a call that does not answer in time fails with
//! [`GatewayError::Timeout`], which callers treat as an unknown outcome.
//! [`SandboxGateway`] is an in-memory gateway for local runs and tests.

use crate::base::Currency;
use crate::error::GatewayError;
use crossbeam::channel::{self, RecvTimeoutError};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// A completed capture as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub reference: String,
    pub amount: Decimal,
}

pub trait PaymentGateway: Send + Sync {
    /// Reserves `amount` on the payer's payment method. Returns the charge reference.
    fn authorize(
        &self,
        amount: Decimal,
        currency: Currency,
        payer_ref: &str,
    ) -> Result<String, GatewayError>;

    /// Collects up to the authorized amount.
    fn capture(&self, charge_ref: &str, amount: Decimal) -> Result<Capture, GatewayError>;

    /// Sends funds to a connected payout account. Returns the transfer reference.
    fn transfer(
        &self,
        amount: Decimal,
        currency: Currency,
        account: &str,
    ) -> Result<String, GatewayError>;

    /// Reads back the capture state of a charge.
    fn lookup_capture(&self, charge_ref: &str) -> Result<Option<Capture>, GatewayError>;
}

/// Enforces a deadline on every call to the wrapped gateway.
///
/// The call runs on a helper thread. When the deadline passes the helper is left to
/// finish on its own and its late answer is discarded.
pub struct TimedGateway {
    inner: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl TimedGateway {
    pub fn new(inner: Arc<dyn PaymentGateway>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PaymentGateway) -> Result<T, GatewayError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let (sender, receiver) = channel::bounded(1);
        thread::Builder::new()
            .name(format!("gateway-{operation}"))
            .spawn(move || {
                // Receiver may be gone after a timeout.
                let _ = sender.send(f(inner.as_ref()));
            })
            .map_err(|e| GatewayError::Network(format!("cannot start {operation}: {e}")))?;

        match receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(operation, timeout = ?self.timeout, "gateway call timed out");
                Err(GatewayError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(GatewayError::Network(format!(
                "{operation} aborted without a reply"
            ))),
        }
    }
}

impl PaymentGateway for TimedGateway {
    fn authorize(
        &self,
        amount: Decimal,
        currency: Currency,
        payer_ref: &str,
    ) -> Result<String, GatewayError> {
        let payer_ref = payer_ref.to_string();
        self.call("authorize", move |g| g.authorize(amount, currency, &payer_ref))
    }

    fn capture(&self, charge_ref: &str, amount: Decimal) -> Result<Capture, GatewayError> {
        let charge_ref = charge_ref.to_string();
        self.call("capture", move |g| g.capture(&charge_ref, amount))
    }

    fn transfer(
        &self,
        amount: Decimal,
        currency: Currency,
        account: &str,
    ) -> Result<String, GatewayError> {
        let account = account.to_string();
        self.call("transfer", move |g| g.transfer(amount, currency, &account))
    }

    fn lookup_capture(&self, charge_ref: &str) -> Result<Option<Capture>, GatewayError> {
        let charge_ref = charge_ref.to_string();
        self.call("lookup_capture", move |g| g.lookup_capture(&charge_ref))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    Authorize,
    Capture,
    Transfer,
    LookupCapture,
}

#[derive(Debug, Clone)]
struct SandboxCharge {
    authorized: Decimal,
    capture: Option<Capture>,
}

/// In-memory gateway.
///
/// Charges must be authorized through it (or registered with
/// [`SandboxGateway::register_charge`]) before they can be captured. Failures and
/// latency can be scripted per operation.
#[derive(Debug, Default)]
pub struct SandboxGateway {
    charges: DashMap<String, SandboxCharge>,
    transfers: DashMap<String, (Decimal, String)>,
    failures: Mutex<Vec<(GatewayOp, GatewayError)>>,
    latency: Mutex<Duration>,
    calls: DashMap<GatewayOp, usize>,
    sequence: AtomicU64,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_charge(&self, charge_ref: impl Into<String>, amount: Decimal) {
        self.charges.insert(
            charge_ref.into(),
            SandboxCharge {
                authorized: amount,
                capture: None,
            },
        );
    }

    /// The next call of `op` fails with `error`.
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        self.failures.lock().push((op, error));
    }

    /// Every call sleeps this long before doing its work.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn calls(&self, op: GatewayOp) -> usize {
        self.calls.get(&op).map(|n| *n).unwrap_or(0)
    }

    pub fn captured(&self, charge_ref: &str) -> Option<Capture> {
        self.charges.get(charge_ref).and_then(|c| c.capture.clone())
    }

    pub fn transfer_amount(&self, transfer_ref: &str) -> Option<Decimal> {
        self.transfers.get(transfer_ref).map(|t| t.0)
    }

    fn next_ref(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.sequence.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn begin(&self, op: GatewayOp) -> Result<(), GatewayError> {
        *self.calls.entry(op).or_insert(0) += 1;
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        let mut failures = self.failures.lock();
        match failures.iter().position(|(o, _)| *o == op) {
            Some(index) => Err(failures.remove(index).1),
            None => Ok(()),
        }
    }
}

impl PaymentGateway for SandboxGateway {
    fn authorize(
        &self,
        amount: Decimal,
        _currency: Currency,
        _payer_ref: &str,
    ) -> Result<String, GatewayError> {
        self.begin(GatewayOp::Authorize)?;
        if amount <= Decimal::ZERO {
            return Err(GatewayError::Declined("amount must be positive".into()));
        }
        let charge_ref = self.next_ref("ch");
        self.register_charge(charge_ref.clone(), amount);
        Ok(charge_ref)
    }

    fn capture(&self, charge_ref: &str, amount: Decimal) -> Result<Capture, GatewayError> {
        self.begin(GatewayOp::Capture)?;
        let mut charge = self
            .charges
            .get_mut(charge_ref)
            .ok_or_else(|| GatewayError::NotFound(charge_ref.to_string()))?;
        if let Some(existing) = &charge.capture {
            return Ok(existing.clone());
        }
        if amount > charge.authorized {
            return Err(GatewayError::Declined(format!(
                "capture of {amount} exceeds authorized {}",
                charge.authorized
            )));
        }
        let capture = Capture {
            reference: self.next_ref("cap"),
            amount,
        };
        charge.capture = Some(capture.clone());
        Ok(capture)
    }

    fn transfer(
        &self,
        amount: Decimal,
        _currency: Currency,
        account: &str,
    ) -> Result<String, GatewayError> {
        self.begin(GatewayOp::Transfer)?;
        let transfer_ref = self.next_ref("tr");
        self.transfers
            .insert(transfer_ref.clone(), (amount, account.to_string()));
        Ok(transfer_ref)
    }

    fn lookup_capture(&self, charge_ref: &str) -> Result<Option<Capture>, GatewayError> {
        self.begin(GatewayOp::LookupCapture)?;
        let charge = self
            .charges
            .get(charge_ref)
            .ok_or_else(|| GatewayError::NotFound(charge_ref.to_string()))?;
        Ok(charge.capture.clone())
    }
}
