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

//! REST API over the booking engine.
//!
//! ## Endpoints
//!
//! - `POST /bookings` - Place a booking request
//! - `GET /bookings`, `GET /bookings/{id}` - Read bookings
//! - `POST /bookings/calculate` - Price preview
//! - `POST /bookings/{id}/checkout` - Authorize the total with the gateway
//! - `POST /bookings/{id}/authorize` - Record an authorization made elsewhere
//! - `POST /bookings/{id}/finalize` - Declare completion
//! - `POST /admin/bookings/{id}/capture` - Capture, then transfer when configured
//! - `POST /admin/bookings/{id}/reconcile` - Settle a capture after a timeout
//! - `POST /admin/bookings/{id}/transfer` - Transfer the payout
//! - `POST /admin/payouts/{id}/mark-paid`, `POST /admin/payouts/mark-paid` - Manual payouts
//! - `GET /admin/notifications`, `POST /admin/notifications/mark-read` - Admin inbox
//! - `GET /payees/{kind}/{id}/payouts` - Payee payout summary
//! - `POST /webhooks/gateway` - Gateway events
//!
//! Engine calls may block on the gateway, so handlers run them on the blocking pool.

use crate::admin::AdminNotification;
use crate::base::{BookingId, InstructorId, ListingId, NotificationId, Payee, PayoutId, ProviderId};
use crate::booking::{BookingRecord, NewBooking};
use crate::calculator::{CompletionPercentage, PriceQuote};
use crate::engine::Engine;
use crate::error::{BookingError, GatewayError};
use crate::payout::{MerchantPayout, PayeeSummary};
use crate::receipt::{CaptureReceipt, FinalizeReceipt};
use crate::webhook::{GatewayEvent, WebhookHandler, WebhookOutcome};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub listing_id: ListingId,
    #[serde(default = "one_guest")]
    pub guests: u32,
}

fn one_guest() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub charge_ref: String,
}

/// Finalize body. The percentage is validated by hand so that every malformed
/// value maps to a validation error.
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub completion_percentage: Option<serde_json::Value>,
    #[serde(default)]
    pub reason: String,
}

impl FinalizeRequest {
    fn completion(&self) -> Result<CompletionPercentage, BookingError> {
        let invalid = || {
            BookingError::Validation(
                "completion_percentage must be an integer between 0 and 100".to_string(),
            )
        };
        let value = self.completion_percentage.as_ref().ok_or_else(invalid)?;
        let number = value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(invalid)?;
        CompletionPercentage::new(number)
    }
}

#[derive(Debug, Deserialize)]
pub struct PayoutIdsRequest {
    pub payout_ids: Vec<PayoutId>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationIdsRequest {
    pub ids: Vec<NotificationId>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub unread: usize,
    pub notifications: Vec<AdminNotification>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub outcome: WebhookOutcome,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub webhooks: Arc<WebhookHandler>,
    pub transfer_on_capture: bool,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, transfer_on_capture: bool) -> Self {
        Self {
            webhooks: Arc::new(WebhookHandler::new(Arc::clone(&engine))),
            engine,
            transfer_on_capture,
        }
    }
}

// === Error Handling ===

/// Wrapper for converting `BookingError` into HTTP responses.
#[derive(Debug)]
pub struct AppError(BookingError);

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            BookingError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            BookingError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
            BookingError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            BookingError::Gateway(GatewayError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_TIMEOUT")
            }
            BookingError::Gateway(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
            BookingError::AlreadyPaid(_) => (StatusCode::CONFLICT, "ALREADY_PAID"),
            BookingError::DuplicateTransaction(_) => {
                (StatusCode::CONFLICT, "DUPLICATE_TRANSACTION")
            }
            BookingError::Consistency(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONSISTENCY_ERROR")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Runs an engine call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BookingError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(BookingError::Consistency(format!("engine task failed: {e}"))))?
        .map_err(AppError)
}

// === Handlers ===

async fn place_booking(
    State(state): State<AppState>,
    Json(request): Json<NewBooking>,
) -> Result<(StatusCode, Json<BookingRecord>), AppError> {
    let record = blocking(move || state.engine.place_booking(request)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_bookings(State(state): State<AppState>) -> Json<Vec<BookingRecord>> {
    Json(state.engine.bookings())
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<BookingRecord>, AppError> {
    Ok(Json(state.engine.booking(BookingId(id))?))
}

async fn calculate(
    State(state): State<AppState>,
    Json(request): Json<CalculateRequest>,
) -> Result<Json<PriceQuote>, AppError> {
    Ok(Json(state.engine.quote(request.listing_id, request.guests)?))
}

async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<BookingRecord>, AppError> {
    let outcome = blocking(move || state.engine.checkout(BookingId(id))).await?;
    Ok(Json(outcome.value))
}

async fn authorize(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AuthorizeRequest>,
) -> Result<Json<BookingRecord>, AppError> {
    let outcome =
        blocking(move || state.engine.authorize(BookingId(id), &request.charge_ref)).await?;
    Ok(Json(outcome.value))
}

async fn finalize(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<FinalizeReceipt>, AppError> {
    let completion = request.completion()?;
    let outcome = blocking(move || {
        state
            .engine
            .finalize(BookingId(id), completion, &request.reason)
    })
    .await?;
    Ok(Json(outcome.value))
}

async fn capture(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CaptureReceipt>, AppError> {
    let transfer = state.transfer_on_capture;
    let receipt =
        blocking(move || state.engine.capture_and_transfer(BookingId(id), transfer)).await?;
    Ok(Json(receipt))
}

async fn reconcile(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Option<CaptureReceipt>>, AppError> {
    let receipt = blocking(move || state.engine.reconcile_capture(BookingId(id))).await?;
    Ok(Json(receipt))
}

async fn transfer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MerchantPayout>, AppError> {
    let outcome = blocking(move || state.engine.transfer_payout(BookingId(id))).await?;
    Ok(Json(outcome.value))
}

async fn mark_payout_paid(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MerchantPayout>, AppError> {
    let payout = blocking(move || state.engine.mark_payout_paid(PayoutId(id))).await?;
    Ok(Json(payout))
}

async fn mark_payouts_paid(
    State(state): State<AppState>,
    Json(request): Json<PayoutIdsRequest>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated =
        blocking(move || Ok(state.engine.mark_payouts_paid(&request.payout_ids))).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn payee_payouts(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, u64)>,
) -> Result<Json<PayeeSummary>, AppError> {
    let payee = match kind.as_str() {
        "provider" => Payee::Provider(ProviderId(id)),
        "instructor" => Payee::Instructor(InstructorId(id)),
        other => return Err(AppError(BookingError::NotFound(format!("payee kind {other}")))),
    };
    Ok(Json(state.engine.payee_summary(payee)))
}

async fn admin_notifications(State(state): State<AppState>) -> Json<InboxResponse> {
    let inbox = state.engine.inbox();
    Json(InboxResponse {
        unread: inbox.unread_count(),
        notifications: inbox.list(),
    })
}

async fn mark_notifications_read(
    State(state): State<AppState>,
    Json(request): Json<NotificationIdsRequest>,
) -> Json<UpdatedResponse> {
    Json(UpdatedResponse {
        updated: state.engine.inbox().mark_read(&request.ids),
    })
}

async fn gateway_webhook(
    State(state): State<AppState>,
    Json(event): Json<GatewayEvent>,
) -> Result<Json<WebhookResponse>, AppError> {
    let outcome = blocking(move || state.webhooks.handle(&event)).await?;
    Ok(Json(WebhookResponse { outcome }))
}

async fn health() -> &'static str {
    "ok"
}

// === Router ===

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bookings", post(place_booking).get(list_bookings))
        .route("/bookings/calculate", post(calculate))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/checkout", post(checkout))
        .route("/bookings/{id}/authorize", post(authorize))
        .route("/bookings/{id}/finalize", post(finalize))
        .route("/admin/bookings/{id}/capture", post(capture))
        .route("/admin/bookings/{id}/reconcile", post(reconcile))
        .route("/admin/bookings/{id}/transfer", post(transfer))
        .route("/admin/payouts/mark-paid", post(mark_payouts_paid))
        .route("/admin/payouts/{id}/mark-paid", post(mark_payout_paid))
        .route("/admin/notifications", get(admin_notifications))
        .route("/admin/notifications/mark-read", post(mark_notifications_read))
        .route("/payees/{kind}/{id}/payouts", get(payee_payouts))
        .route("/webhooks/gateway", post(gateway_webhook))
        .with_state(state)
}
