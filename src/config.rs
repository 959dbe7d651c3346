//! Configuration management for the heart risk service

use crate::types::prediction::{ModelKind, RiskThresholds};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "HEART_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub risk: RiskThresholds,
    pub blockchain: BlockchainConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing ONNX model files
    pub models_dir: String,
    /// File name per classifier, relative to `models_dir`
    #[serde(default)]
    pub files: ModelFiles,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelFiles {
    pub gb: String,
    pub rf: String,
    pub knn: String,
}

impl ModelFiles {
    pub fn file_for(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::GradientBoosting => &self.gb,
            ModelKind::RandomForest => &self.rf,
            ModelKind::Knn => &self.knn,
        }
    }
}

impl Default for ModelFiles {
    fn default() -> Self {
        Self {
            gb: "modelsv.onnx".to_string(),
            rf: "modelrf.onnx".to_string(),
            knn: "modelknn.onnx".to_string(),
        }
    }
}

impl ModelsConfig {
    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        Path::new(&self.models_dir).join(self.files.file_for(kind))
    }
}

fn default_onnx_threads() -> usize {
    1
}

/// Blockchain ledger configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainConfig {
    /// Record predictions on chain
    pub enabled: bool,
    /// JSON-RPC endpoint of the node
    pub rpc_url: String,
    /// Truffle build artifact of the patient registration contract
    pub artifact_path: String,
    /// Network id to take the contract address from; first listed when unset
    #[serde(default)]
    pub network_id: Option<String>,
    /// Gas limit for prediction updates; node estimates when unset
    #[serde(default)]
    pub gas: Option<u64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

fn default_receipt_poll_ms() -> u64 {
    100
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between summary log lines; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 300,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `HEART_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// Values can be overridden with `HEART__SECTION__KEY` environment variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("HEART").separator("__"))
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.as_ref().display()))?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                files: ModelFiles::default(),
                onnx_threads: 1,
            },
            risk: RiskThresholds::default(),
            blockchain: BlockchainConfig {
                enabled: true,
                rpc_url: "http://127.0.0.1:8545".to_string(),
                artifact_path: "contracts/PatientRegistration.json".to_string(),
                network_id: None,
                gas: None,
                request_timeout_secs: default_request_timeout_secs(),
                receipt_timeout_secs: default_receipt_timeout_secs(),
                receipt_poll_ms: default_receipt_poll_ms(),
            },
            metrics: MetricsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
