//! Patient registration contract client

use crate::ledger::abi::{Function, Token};
use crate::ledger::address::Address;
use crate::ledger::artifact::ContractArtifact;
use crate::ledger::rpc::{RpcClient, TransactionRequest};
use crate::ledger::LedgerError;
use std::collections::HashMap;
use tracing::debug;

/// Contract functions the recorder calls
pub const REGISTRY_FUNCTIONS: [&str; 4] = [
    "getPatientDetails",
    "isRegisteredPatient",
    "updateAIPrediction",
    "getAIPrediction",
];

/// Registration record returned by `getPatientDetails`.
///
/// The first field is the patient's wallet; the remaining profile fields
/// are kept as decoded tokens.
#[derive(Debug, Clone)]
pub struct PatientDetails {
    pub wallet: Token,
    pub profile: Vec<Token>,
}

impl PatientDetails {
    /// The registered wallet, if the first field holds an address
    pub fn wallet_address(&self) -> Result<Address, LedgerError> {
        match &self.wallet {
            Token::Address(addr) => Ok(*addr),
            Token::String(s) => s
                .trim()
                .parse()
                .map_err(|_| LedgerError::NonAddressValue(s.clone())),
            other => Err(LedgerError::NonAddressValue(other.to_string())),
        }
    }
}

/// AI prediction as stored on chain
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPrediction {
    pub probability: String,
    pub risk_level: String,
}

/// Typed access to the `PatientRegistration` contract
pub struct PatientRegistry {
    rpc: RpcClient,
    address: Address,
    functions: HashMap<String, Function>,
}

impl PatientRegistry {
    /// Resolve the registry functions from the artifact ABI.
    ///
    /// Other entries are skipped, so unrelated functions with types the
    /// codec does not handle (arrays, tuples) do not matter.
    pub fn new(rpc: RpcClient, address: Address, artifact: &ContractArtifact) -> Result<Self, LedgerError> {
        let mut functions = HashMap::new();
        for entry in &artifact.abi {
            let Some(resolved) = Function::from_entry(entry) else {
                continue;
            };
            if !REGISTRY_FUNCTIONS.contains(&entry.name.as_str()) {
                if let Err(e) = &resolved {
                    debug!(function = %entry.name, error = %e, "Skipping unused ABI entry");
                }
                continue;
            }
            let function = resolved?;
            functions.insert(function.name.clone(), function);
        }

        Ok(Self {
            rpc,
            address,
            functions,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn function(&self, name: &str) -> Result<&Function, LedgerError> {
        self.functions
            .get(name)
            .ok_or_else(|| LedgerError::UnknownFunction(name.to_string()))
    }

    /// Read-only call by function name
    pub async fn call(&self, name: &str, args: &[&str]) -> Result<Vec<Token>, LedgerError> {
        let function = self.function(name)?;
        let data = function.encode_call(args)?;
        let output = self.rpc.call(&self.address, &data).await?;
        let tokens = function.decode_output(&output)?;
        debug!(function = %name, outputs = tokens.len(), "Contract call returned");
        Ok(tokens)
    }

    /// State-changing call by function name, signed by `from`
    pub async fn transact(
        &self,
        name: &str,
        args: &[&str],
        from: Address,
        gas: Option<u64>,
    ) -> Result<String, LedgerError> {
        let function = self.function(name)?;
        let data = function.encode_call(args)?;
        let tx = TransactionRequest {
            from,
            to: self.address,
            data: format!("0x{}", hex::encode(data)),
            gas: gas.map(|g| format!("{:#x}", g)),
        };
        self.rpc.send_transaction(&tx).await
    }

    pub async fn get_patient_details(&self, hh_number: &str) -> Result<PatientDetails, LedgerError> {
        let mut tokens = self.call("getPatientDetails", &[hh_number]).await?.into_iter();
        let wallet = tokens.next().ok_or_else(|| {
            LedgerError::MalformedResponse("getPatientDetails returned no fields".to_string())
        })?;
        Ok(PatientDetails {
            wallet,
            profile: tokens.collect(),
        })
    }

    pub async fn is_registered_patient(&self, hh_number: &str) -> Result<bool, LedgerError> {
        self.call("isRegisteredPatient", &[hh_number])
            .await?
            .first()
            .and_then(Token::as_bool)
            .ok_or_else(|| LedgerError::MalformedResponse("isRegisteredPatient".to_string()))
    }

    pub async fn update_ai_prediction(
        &self,
        hh_number: &str,
        probability: &str,
        risk_level: &str,
        from: Address,
        gas: Option<u64>,
    ) -> Result<String, LedgerError> {
        self.transact(
            "updateAIPrediction",
            &[hh_number, probability, risk_level],
            from,
            gas,
        )
        .await
    }

    pub async fn get_ai_prediction(&self, hh_number: &str) -> Result<StoredPrediction, LedgerError> {
        let tokens = self.call("getAIPrediction", &[hh_number]).await?;
        match tokens.as_slice() {
            [probability, risk_level, ..] => Ok(StoredPrediction {
                probability: probability.to_string(),
                risk_level: risk_level.to_string(),
            }),
            _ => Err(LedgerError::MalformedResponse("getAIPrediction".to_string())),
        }
    }
}
