use std::path::PathBuf;

use lambda_deploy_core::contract::ValidationError;
use thiserror::Error;

/// Failures of the archive pipeline. Any of these aborts the deploy before
/// a region is touched.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source directory '{}' does not exist", .0.display())]
    MissingSource(PathBuf),

    #[error("invalid exclude glob '{pattern}': {message}")]
    InvalidExcludeGlob { pattern: String, message: String },

    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("dependency install failed ({status}): {output}")]
    DependencyInstall { status: String, output: String },

    #[error("post-install script failed ({status}): {output}")]
    PostInstall { status: String, output: String },

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("archive build task did not complete: {0}")]
    Task(String),

    #[error("failed to write artifact to '{}': {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The addressed resource does not exist; a routing signal for existence checks.
    NotFound,
    /// The resource or permission already exists.
    Conflict,
    Other,
}

/// Error returned by a provider call, classified by the adapter that made it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct ProviderError {
    pub operation: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        operation: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn other(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(operation, ProviderErrorKind::Other, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ProviderErrorKind::Conflict
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid manifest: {0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Config(String),
}
