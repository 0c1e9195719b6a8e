//! `POST /api/bet`

use super::{ApiError, AppState};
use crate::bet::{BetReceipt, BetRequest};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;

pub async fn place_bet(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BetRequest>, JsonRejection>,
) -> Result<Json<BetReceipt>, ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::validation(format!("Invalid JSON body: {}", e.body_text())))?;

    let receipt = state
        .bets
        .place_bet(&request)
        .await
        .map_err(ApiError::context("Failed to place bet"))?;

    tracing::info!("Bet confirmed: {}", receipt.transaction_hash);
    Ok(Json(receipt))
}
