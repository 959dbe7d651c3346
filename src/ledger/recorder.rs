//! Records predictions against a patient's on-chain registration

use crate::config::BlockchainConfig;
use crate::ledger::address::Address;
use crate::ledger::artifact::ContractArtifact;
use crate::ledger::contract::{PatientRegistry, StoredPrediction};
use crate::ledger::rpc::RpcClient;
use crate::ledger::LedgerError;
use crate::types::prediction::Prediction;
use anyhow::Context;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a successful ledger write
#[derive(Debug, Clone)]
pub struct RecordReceipt {
    pub transaction_hash: String,
    pub block_number: Option<String>,
    pub stored: StoredPrediction,
}

/// Writes predictions to the patient registration contract after
/// checking that the submitting address owns the HH number.
pub struct PredictionRecorder {
    registry: PatientRegistry,
    gas: Option<u64>,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl PredictionRecorder {
    pub fn new(registry: PatientRegistry, config: &BlockchainConfig) -> Self {
        Self {
            registry,
            gas: config.gas,
            receipt_poll: Duration::from_millis(config.receipt_poll_ms),
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
        }
    }

    /// Load the contract artifact and connect to the configured node
    pub async fn connect(config: &BlockchainConfig) -> anyhow::Result<Self> {
        let artifact = ContractArtifact::load(&config.artifact_path)?;
        let deployment = artifact.deployment(config.network_id.as_deref())?;

        let rpc = RpcClient::new(
            config.rpc_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;

        match rpc.net_version().await {
            Ok(version) if version != deployment.network_id => warn!(
                node_network = %version,
                artifact_network = %deployment.network_id,
                "Node network differs from the artifact deployment"
            ),
            Ok(version) => info!(network_id = %version, rpc_url = %config.rpc_url, "Connected to node"),
            Err(e) => warn!(error = %e, rpc_url = %config.rpc_url, "Node not reachable yet"),
        }

        let registry = PatientRegistry::new(rpc, deployment.address, &artifact)
            .context("Registry functions in the contract ABI use unsupported types")?;

        Ok(Self::new(registry, config))
    }

    pub fn registry(&self) -> &PatientRegistry {
        &self.registry
    }

    /// Record a prediction for `hh_number`, sent from `patient_address`.
    ///
    /// Every check must pass before the transaction is sent: the
    /// registered wallet is a real address, the submitted address is one
    /// of the node's accounts and equals the registered wallet, the
    /// patient is registered, and the account can pay for gas.
    pub async fn store_prediction(
        &self,
        hh_number: &str,
        prediction: &Prediction,
        patient_address: &str,
    ) -> Result<RecordReceipt, LedgerError> {
        info!(hh_number = %hh_number, "Preparing to store prediction");

        let details = self.registry.get_patient_details(hh_number).await?;
        debug!(hh_number = %hh_number, details = ?details, "Patient details from chain");
        let registered = details.wallet_address()?;

        let provided: Address = patient_address
            .parse()
            .map_err(|_| LedgerError::InvalidAddress(patient_address.to_string()))?;

        info!(registered = %registered, provided = %provided, "Comparing patient addresses");

        let accounts = self.registry.rpc().accounts().await?;
        if !accounts.contains(&provided) {
            return Err(LedgerError::UnknownAccount(provided));
        }

        if registered != provided {
            return Err(LedgerError::AddressMismatch {
                registered,
                provided,
            });
        }

        if !self.registry.is_registered_patient(hh_number).await? {
            return Err(LedgerError::NotRegistered(hh_number.to_string()));
        }

        let balance = self.registry.rpc().balance(&provided).await?;
        if balance.is_zero() {
            return Err(LedgerError::ZeroBalance(provided));
        }
        debug!(account = %provided, balance = %balance, "Account balance");

        let probability = prediction.probability_text();
        let risk_level = prediction.risk_level.as_str();

        info!(from = %provided, probability = %probability, risk_level = %risk_level, "Sending prediction transaction");

        let tx_hash = self
            .registry
            .update_ai_prediction(hh_number, &probability, risk_level, provided, self.gas)
            .await?;

        let receipt = self
            .registry
            .rpc()
            .wait_for_receipt(&tx_hash, self.receipt_poll, self.receipt_timeout)
            .await?;
        if !receipt.succeeded() {
            return Err(LedgerError::Reverted(receipt.transaction_hash));
        }

        info!(
            tx_hash = %receipt.transaction_hash,
            block = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            "Prediction transaction confirmed"
        );

        let stored = self.registry.get_ai_prediction(hh_number).await?;
        info!(
            hh_number = %hh_number,
            probability = %stored.probability,
            risk_level = %stored.risk_level,
            "Stored AI prediction read back from chain"
        );

        Ok(RecordReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            stored,
        })
    }
}
