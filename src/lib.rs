//! Aptos Prediction Market Bridge
//!
//! Relays bets from an HTTP API onto an Aptos prediction-market contract and
//! fronts the market with Telegram and Twitter bots.
//!
//! ## Architecture
//!
//! ```text
//! Telegram webhook ─┐                         ┌→ TelegramApi (sendMessage)
//! Twitter webhook  ─┼→ API (axum) → Bots ─────┼→ TwitterApi (reply)
//! Wallet callback  ─┘        │                └→ WalletLinkStore
//!                            ↓
//!                 POST /api/bet → BetService → TransactionSubmitter (Aptos REST)
//! ```

pub mod api;
pub mod aptos;
pub mod bet;
pub mod config;
pub mod error;
pub mod telegram;
pub mod twitter;
pub mod wallet;
