//! ML model inference components

pub mod inference;
pub mod loader;

pub use inference::{InferenceEngine, RiskModel};
pub use loader::ModelLoader;
