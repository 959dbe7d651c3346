//! Ethereum JSON-RPC client over HTTP

use crate::ledger::address::Address;
use crate::ledger::LedgerError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Client for a node's JSON-RPC endpoint
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Parameters of `eth_sendTransaction`
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
}

/// The receipt fields the service inspects
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    /// `0x1` success, `0x0` reverted; absent on pre-Byzantium nodes
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() != Some("0x0")
    }
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one JSON-RPC request and deserialize its result
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method = %method, id = id, "JSON-RPC request");

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| LedgerError::MalformedResponse(format!("{}: {}", method, e)))
    }

    pub async fn net_version(&self) -> Result<String, LedgerError> {
        self.request("net_version", json!([])).await
    }

    /// Accounts the node can sign for
    pub async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        self.request("eth_accounts", json!([])).await
    }

    pub async fn balance(&self, address: &Address) -> Result<Quantity, LedgerError> {
        let quantity: String = self
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity(&quantity)
    }

    /// Execute a read-only call and return the raw output bytes
    pub async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let output: String = self
            .request(
                "eth_call",
                json!([{ "to": to, "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;
        decode_data(&output)
    }

    /// Submit a transaction signed by the node; returns its hash
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, LedgerError> {
        self.request("eth_sendTransaction", json!([tx])).await
    }

    pub async fn transaction_receipt(&self, hash: &str) -> Result<Option<TransactionReceipt>, LedgerError> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }

    /// Poll for a receipt until it appears or `timeout` elapses
    pub async fn wait_for_receipt(
        &self,
        hash: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TransactionReceipt, LedgerError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            if Instant::now() + poll_interval > deadline {
                return Err(LedgerError::ReceiptTimeout(hash.to_string()));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Unsigned 256-bit quantity, big-endian
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quantity([u8; 32]);

impl Quantity {
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The value, if it fits in 128 bits
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|&b| b != 0) {
            return None;
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(bytes))
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = hex::encode(self.0);
        let digits = digits.trim_start_matches('0');
        write!(f, "0x{}", if digits.is_empty() { "0" } else { digits })
    }
}

/// Parse a hex-encoded quantity such as `0x1bc16d674ec80000`
pub fn parse_quantity(quantity: &str) -> Result<Quantity, LedgerError> {
    let malformed = || LedgerError::MalformedResponse(format!("quantity {:?}", quantity));
    let digits = quantity.strip_prefix("0x").ok_or_else(malformed)?;
    if digits.len() > 64 {
        return Err(malformed());
    }

    let padded = format!("{:0>64}", digits);
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(&padded, &mut bytes).map_err(|_| malformed())?;
    Ok(Quantity(bytes))
}

fn decode_data(data: &str) -> Result<Vec<u8>, LedgerError> {
    let digits = data
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::MalformedResponse(format!("data {:?}", data)))?;
    hex::decode(digits).map_err(|_| LedgerError::MalformedResponse(format!("data {:?}", data)))
}
