//! Error types for Universal Edges

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("timeout waiting for edge {0}")]
    EdgeTimeout(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Unknown destination node: {0}")]
    UnknownDestination(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Simulation command error: {0}")]
    Simulation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid edge directory: {0}")]
    InvalidDirectory(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EdgeError>;
