//! Bet placement
//!
//! Validates a bet request, scales the amount to the token's smallest unit
//! and submits one `buy_tokens` call. There is no idempotency key: a client
//! that retries places the bet twice.

use crate::aptos::{EntryFunctionPayload, SignerIdentity, TransactionSubmitter};
use crate::error::{BotError, Result};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Token decimals used by the market contract
pub const TOKEN_DECIMALS: u32 = 6;

/// A JSON value clients send either as a number or as a string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    /// Text form, `None` when blank
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        };
        (!text.is_empty()).then_some(text)
    }
}

/// Body of `POST /api/bet`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRequest {
    pub user_id: Option<Scalar>,
    pub market_id: Option<Scalar>,
    pub side: Option<String>,
    pub amount: Option<Scalar>,
    pub user_address: Option<String>,
    /// Sent over the wire for compatibility with existing clients
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetSide {
    Yes,
    No,
}

impl BetSide {
    /// Case-insensitive `yes` / `no`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Some(BetSide::Yes),
            "no" => Some(BetSide::No),
            _ => None,
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, BetSide::Yes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BetSide::Yes => "yes",
            BetSide::No => "no",
        }
    }
}

/// A bet that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBet {
    pub user_id: String,
    pub market_id: String,
    pub side: BetSide,
    pub amount: Decimal,
    /// `amount` in smallest token units
    pub scaled_amount: u64,
    pub user_address: String,
    pub private_key: Option<String>,
}

/// Result returned to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetReceipt {
    pub success: bool,
    pub transaction_hash: String,
    pub message: String,
}

fn present(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Multiply by 10^6 and truncate toward zero
pub fn scale_amount(amount: Decimal) -> Option<u64> {
    let factor = Decimal::from(10u64.pow(TOKEN_DECIMALS));
    amount.checked_mul(factor)?.trunc().to_u64()
}

impl BetRequest {
    pub fn validate(&self) -> Result<ValidatedBet> {
        let user_id = self.user_id.as_ref().and_then(Scalar::as_text);
        let market_id = self.market_id.as_ref().and_then(Scalar::as_text);
        let side = present(&self.side);
        let amount = self.amount.as_ref().and_then(Scalar::as_text);
        let user_address = present(&self.user_address);

        let missing: Vec<&str> = [
            ("userId", user_id.is_none()),
            ("marketId", market_id.is_none()),
            ("side", side.is_none()),
            ("amount", amount.is_none()),
            ("userAddress", user_address.is_none()),
        ]
        .into_iter()
        .filter(|(_, missing)| *missing)
        .map(|(name, _)| name)
        .collect();

        let (Some(user_id), Some(market_id), Some(side), Some(amount), Some(user_address)) =
            (user_id, market_id, side, amount, user_address)
        else {
            return Err(BotError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        let side = BetSide::parse(&side).ok_or_else(|| {
            BotError::Validation(format!("Invalid side '{}': must be 'yes' or 'no'", side))
        })?;

        let amount = parse_amount(&amount).ok_or_else(|| {
            BotError::Validation(format!("Invalid amount '{}': must be a number", amount))
        })?;
        if amount <= Decimal::ZERO {
            return Err(BotError::Validation(format!(
                "Invalid amount {}: must be greater than 0",
                amount
            )));
        }

        let scaled_amount = scale_amount(amount).ok_or_else(|| {
            BotError::Validation(format!("Invalid amount {}: too large", amount))
        })?;
        if scaled_amount == 0 {
            return Err(BotError::Validation(format!(
                "Invalid amount {}: below the smallest token unit",
                amount
            )));
        }

        Ok(ValidatedBet {
            user_id,
            market_id,
            side,
            amount,
            scaled_amount,
            user_address,
            private_key: present(&self.private_key),
        })
    }
}

/// Places bets through a `TransactionSubmitter`
#[derive(Clone)]
pub struct BetService {
    submitter: Arc<dyn TransactionSubmitter>,
    buy_tokens_function: String,
}

impl BetService {
    pub fn new(submitter: Arc<dyn TransactionSubmitter>, buy_tokens_function: String) -> Self {
        Self {
            submitter,
            buy_tokens_function,
        }
    }

    /// `buy_tokens(market_id, is_yes, amount)` payload
    pub fn build_payload(&self, bet: &ValidatedBet) -> EntryFunctionPayload {
        EntryFunctionPayload::new(
            self.buy_tokens_function.clone(),
            vec![
                serde_json::Value::String(bet.market_id.clone()),
                serde_json::Value::Bool(bet.side.is_yes()),
                serde_json::Value::String(bet.scaled_amount.to_string()),
            ],
        )
    }

    pub async fn place_bet(&self, request: &BetRequest) -> Result<BetReceipt> {
        let bet = request.validate()?;
        let payload = self.build_payload(&bet);
        let signer = SignerIdentity {
            address: bet.user_address.clone(),
            private_key: bet.private_key.clone(),
        };

        tracing::info!(
            user_id = %bet.user_id,
            market_id = %bet.market_id,
            side = bet.side.as_str(),
            amount = %bet.amount,
            "Placing bet"
        );

        let outcome = self.submitter.submit_and_wait(&signer, &payload).await?;

        Ok(BetReceipt {
            success: true,
            transaction_hash: outcome.hash,
            message: format!(
                "Successfully placed {} bet of {} on market {}",
                bet.side.as_str().to_uppercase(),
                bet.amount,
                bet.market_id
            ),
        })
    }
}
