//! Aptos transaction submission
//!
//! Builds entry-function transactions, signs them with an Ed25519 key and
//! waits for the node to report them final.

pub mod account;
pub mod client;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use account::LocalAccount;
pub use client::AptosClient;

/// JSON form of an entry function payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    /// `<address>::<module>::<function>`
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<serde_json::Value>,
}

impl EntryFunctionPayload {
    pub fn new(function: impl Into<String>, arguments: Vec<serde_json::Value>) -> Self {
        Self {
            payload_type: "entry_function_payload".to_string(),
            function: function.into(),
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

/// Who signs a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct SignerIdentity {
    /// Sender account address
    pub address: String,
    /// Caller-supplied key; the server key is used when absent
    pub private_key: Option<String>,
}

/// A committed transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionOutcome {
    pub hash: String,
    pub version: Option<String>,
    pub vm_status: String,
}

/// Capability to sign, submit and confirm a transaction
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Submit `payload` signed as `signer` and block until it is final.
    ///
    /// A transaction that commits with `success == false` is an error.
    async fn submit_and_wait(
        &self,
        signer: &SignerIdentity,
        payload: &EntryFunctionPayload,
    ) -> Result<TransactionOutcome>;
}
