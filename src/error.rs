//! Error types for Empathic Core

use thiserror::Error;

/// Errors that can occur while loading catalogs or talking to collaborators.
///
/// The engine itself has no fatal paths: insufficient history, failed
/// rephrasing, and out-of-range configuration all degrade to conservative
/// defaults instead of erroring.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Rephrasing failed: {0}")]
    RephraseFailed(String),
}
