//! Aptos fullnode REST client
//!
//! Submission goes through `/transactions/encode_submission` so the node
//! produces the BCS signing message; we only sign it.

use super::{EntryFunctionPayload, LocalAccount, SignerIdentity, TransactionOutcome, TransactionSubmitter};
use crate::config::AptosConfig;
use crate::error::{BotError, Provider, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aptos node client that signs and submits entry-function transactions
#[derive(Clone)]
pub struct AptosClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    default_private_key: Option<String>,
    max_gas_amount: u64,
    gas_unit_price: Option<u64>,
    expiration_secs: u64,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

#[derive(Debug, Serialize)]
struct SubmitTransactionRequest<'a> {
    sender: &'a str,
    sequence_number: String,
    max_gas_amount: String,
    gas_unit_price: String,
    expiration_timestamp_secs: String,
    payload: &'a EntryFunctionPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<Ed25519Signature>,
}

#[derive(Debug, Serialize)]
struct Ed25519Signature {
    #[serde(rename = "type")]
    signature_type: &'static str,
    public_key: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    sequence_number: String,
}

#[derive(Debug, Deserialize)]
struct GasEstimateResponse {
    gas_estimate: u64,
}

#[derive(Debug, Deserialize)]
struct PendingTransactionResponse {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct NodeErrorResponse {
    message: String,
    error_code: Option<String>,
    vm_error_code: Option<u64>,
}

impl AptosClient {
    pub fn new(config: &AptosConfig, request_timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.node_url(),
            api_key: config.api_key.clone(),
            default_private_key: config.signer_private_key.clone(),
            max_gas_amount: config.max_gas_amount,
            gas_unit_price: config.gas_unit_price,
            expiration_secs: config.expiration_secs,
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
            poll_interval: Duration::from_secs(1),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Turn a non-2xx node response into an upstream error
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<NodeErrorResponse>(&body) {
            Ok(err) => {
                let mut msg = err.message;
                if let Some(code) = err.error_code {
                    msg = format!("{} [{}]", msg, code);
                }
                if let Some(vm) = err.vm_error_code {
                    msg = format!("{} (vm_error_code {})", msg, vm);
                }
                msg
            }
            Err(_) if body.is_empty() => status.to_string(),
            Err(_) => body,
        };
        Err(BotError::upstream(Provider::Aptos, message))
    }

    /// Current sequence number of `address`
    pub async fn get_sequence_number(&self, address: &str) -> Result<u64> {
        let url = format!("{}/accounts/{}", self.base_url, address);
        let resp = self.authorize(self.http.get(&url)).send().await?;
        let account: AccountResponse = Self::check(resp).await?.json().await?;

        account
            .sequence_number
            .parse()
            .map_err(|e| BotError::upstream(Provider::Aptos, format!("Invalid sequence number: {}", e)))
    }

    pub async fn estimate_gas_price(&self) -> Result<u64> {
        let url = format!("{}/estimate_gas_price", self.base_url);
        let resp = self.authorize(self.http.get(&url)).send().await?;
        let estimate: GasEstimateResponse = Self::check(resp).await?.json().await?;
        Ok(estimate.gas_estimate)
    }

    async fn encode_submission(&self, request: &SubmitTransactionRequest<'_>) -> Result<Vec<u8>> {
        let url = format!("{}/transactions/encode_submission", self.base_url);
        let resp = self.authorize(self.http.post(&url)).json(request).send().await?;
        let encoded: String = Self::check(resp).await?.json().await?;

        hex::decode(encoded.trim_start_matches("0x"))
            .map_err(|e| BotError::upstream(Provider::Aptos, format!("Invalid signing message: {}", e)))
    }

    async fn submit(&self, request: &SubmitTransactionRequest<'_>) -> Result<String> {
        let url = format!("{}/transactions", self.base_url);
        let resp = self.authorize(self.http.post(&url)).json(request).send().await?;
        let pending: PendingTransactionResponse = Self::check(resp).await?.json().await?;
        Ok(pending.hash)
    }

    /// Poll until the transaction leaves the mempool
    pub async fn wait_for_transaction(&self, hash: &str) -> Result<TransactionOutcome> {
        let url = format!("{}/transactions/by_hash/{}", self.base_url, hash);

        let poll = async {
            loop {
                let resp = self.authorize(self.http.get(&url)).send().await?;

                // Freshly submitted transactions can 404 briefly
                if resp.status() != StatusCode::NOT_FOUND {
                    let txn: serde_json::Value = Self::check(resp).await?.json().await?;
                    if txn["type"].as_str() != Some("pending_transaction") {
                        return Ok::<_, BotError>(txn);
                    }
                }

                tokio::time::sleep(self.poll_interval).await;
            }
        };

        let txn: serde_json::Value = tokio::time::timeout(self.confirm_timeout, poll)
            .await
            .map_err(|_| BotError::Timeout {
                what: format!("transaction {}", hash),
                secs: self.confirm_timeout.as_secs(),
            })??;

        let vm_status = txn["vm_status"].as_str().unwrap_or("unknown").to_string();
        if !txn["success"].as_bool().unwrap_or(false) {
            return Err(BotError::TransactionFailed {
                hash: hash.to_string(),
                vm_status,
            });
        }

        Ok(TransactionOutcome {
            hash: hash.to_string(),
            version: txn["version"].as_str().map(String::from),
            vm_status,
        })
    }

    fn resolve_account(&self, signer: &SignerIdentity) -> Result<LocalAccount> {
        let key = signer
            .private_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .or(self.default_private_key.as_deref())
            .ok_or_else(|| {
                BotError::Validation(
                    "privateKey is required: no server signer is configured".into(),
                )
            })?;
        LocalAccount::from_private_key(&signer.address, key)
    }
}

#[async_trait]
impl TransactionSubmitter for AptosClient {
    async fn submit_and_wait(
        &self,
        signer: &SignerIdentity,
        payload: &EntryFunctionPayload,
    ) -> Result<TransactionOutcome> {
        let account = self.resolve_account(signer)?;

        let sequence_number = self.get_sequence_number(account.address()).await?;
        let gas_unit_price = match self.gas_unit_price {
            Some(price) => price,
            None => self.estimate_gas_price().await?,
        };
        let expiration = Utc::now().timestamp() as u64 + self.expiration_secs;

        let mut request = SubmitTransactionRequest {
            sender: account.address(),
            sequence_number: sequence_number.to_string(),
            max_gas_amount: self.max_gas_amount.to_string(),
            gas_unit_price: gas_unit_price.to_string(),
            expiration_timestamp_secs: expiration.to_string(),
            payload,
            signature: None,
        };

        let signing_message = self.encode_submission(&request).await?;
        request.signature = Some(Ed25519Signature {
            signature_type: "ed25519_signature",
            public_key: account.public_key_hex(),
            signature: account.sign_hex(&signing_message),
        });

        let hash = self.submit(&request).await?;
        tracing::info!(
            "Submitted {} from {} (seq {}): {}",
            payload.function,
            account.address(),
            sequence_number,
            hash
        );

        let outcome = self.wait_for_transaction(&hash).await?;
        tracing::info!(
            "Transaction {} committed at version {}",
            outcome.hash,
            outcome.version.as_deref().unwrap_or("?")
        );
        Ok(outcome)
    }
}
