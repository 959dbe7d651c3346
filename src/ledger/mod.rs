//! On-chain recording of predictions through the patient registration contract

pub mod abi;
pub mod address;
pub mod artifact;
pub mod contract;
pub mod recorder;
pub mod rpc;

pub use address::Address;
pub use artifact::ContractArtifact;
pub use contract::{PatientDetails, PatientRegistry, StoredPrediction};
pub use recorder::{PredictionRecorder, RecordReceipt};
pub use rpc::{Quantity, RpcClient};

use abi::AbiError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed RPC response: {0}")]
    MalformedResponse(String),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("contract has no function {0}")]
    UnknownFunction(String),

    #[error("retrieved non-address value from blockchain: {0}")]
    NonAddressValue(String),

    #[error("invalid patient address: {0}")]
    InvalidAddress(String),

    #[error("patient address {0} is not an account of the connected node")]
    UnknownAccount(Address),

    #[error("patient address mismatch: registered {registered}, provided {provided}")]
    AddressMismatch { registered: Address, provided: Address },

    #[error("patient with HH number {0} is not registered on the blockchain")]
    NotRegistered(String),

    #[error("account {0} has zero balance")]
    ZeroBalance(Address),

    #[error("transaction {0} reverted")]
    Reverted(String),

    #[error("timed out waiting for receipt of transaction {0}")]
    ReceiptTimeout(String),
}
