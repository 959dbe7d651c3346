//! Truffle build artifact loading

use crate::ledger::abi::AbiEntry;
use crate::ledger::address::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// The parts of a Truffle `build/contracts/<Name>.json` file the service reads
#[derive(Debug, Clone, Deserialize)]
pub struct ContractArtifact {
    #[serde(rename = "contractName", default)]
    pub contract_name: String,
    pub abi: Vec<AbiEntry>,
    /// Deployments keyed by network id, in file order
    #[serde(default)]
    pub networks: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NetworkDeployment {
    address: String,
}

/// Where the contract lives on a given network
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub network_id: String,
    pub address: Address,
}

impl ContractArtifact {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read contract artifact {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Failed to parse contract artifact {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let artifact: Self = serde_json::from_str(raw)?;
        info!(
            contract = %artifact.contract_name,
            abi_entries = artifact.abi.len(),
            "Contract ABI loaded"
        );
        Ok(artifact)
    }

    /// Resolve the deployment on `network_id`, or on the first listed network
    pub fn deployment(&self, network_id: Option<&str>) -> Result<Deployment> {
        let network_id = match network_id {
            Some(id) => id.to_string(),
            None => self
                .networks
                .keys()
                .next()
                .cloned()
                .context("Contract artifact lists no deployed networks; run `truffle migrate --reset`")?,
        };

        let Some(entry) = self.networks.get(&network_id) else {
            let available: Vec<&String> = self.networks.keys().collect();
            warn!(network_id = %network_id, available = ?available, "Contract not found for network");
            anyhow::bail!("Contract not deployed on network {}", network_id);
        };

        let deployment: NetworkDeployment = serde_json::from_value(entry.clone())
            .with_context(|| format!("Malformed deployment entry for network {}", network_id))?;
        let address = deployment
            .address
            .parse()
            .with_context(|| format!("Invalid contract address for network {}", network_id))?;

        info!(network_id = %network_id, address = %address, "Loaded contract address");

        Ok(Deployment {
            network_id,
            address,
        })
    }
}
