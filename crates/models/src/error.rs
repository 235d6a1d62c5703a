use crate::stage::BuildStage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BakeError {
    #[error("Invalid build plan: {reason}")]
    InvalidPlan { reason: String },

    #[error("Illegal stage transition: {from} -> {to}")]
    StageOrder { from: BuildStage, to: BuildStage },

    #[error("Dependency manifest not found: {path}")]
    ManifestNotFound { path: String },

    #[error("Dependency manifest is empty: {path}")]
    EmptyManifest { path: String },

    #[error("Application source directory not found: {path}")]
    SourceNotFound { path: String },

    #[error("Base image pull failed for {image}: {message}")]
    BaseImagePull { image: String, message: String },

    #[error("Runtime user creation conflict: {user}")]
    UserConflict { user: String },

    #[error("Dependency resolution failed: {message}")]
    DependencyResolution { message: String },

    #[error("Network fetch failed: {message}")]
    NetworkFetch { message: String },

    #[error("Docker error: {message}")]
    DockerError { message: String },

    #[error("Container wait failed: {message}")]
    ContainerWait { message: String },

    #[error("Internal error: {reason}")]
    InternalError { reason: String },

    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },
}

impl BakeError {
    pub fn error_type(&self) -> &'static str {
        match self {
            BakeError::InvalidPlan { .. } => "InvalidPlan",
            BakeError::StageOrder { .. } => "StageOrder",
            BakeError::ManifestNotFound { .. } => "ManifestNotFound",
            BakeError::EmptyManifest { .. } => "EmptyManifest",
            BakeError::SourceNotFound { .. } => "SourceNotFound",
            BakeError::BaseImagePull { .. } => "BaseImagePull",
            BakeError::UserConflict { .. } => "UserConflict",
            BakeError::DependencyResolution { .. } => "DependencyResolution",
            BakeError::NetworkFetch { .. } => "NetworkFetch",
            BakeError::DockerError { .. } => "DockerError",
            BakeError::ContainerWait { .. } => "ContainerWait",
            BakeError::InternalError { .. } => "InternalError",
            BakeError::ConfigError { .. } => "ConfigError",
        }
    }

    /// Build-time failures abort the pipeline at the failing stage; runtime
    /// failures are surfaced to the orchestrator via the exit code.
    pub fn is_build_failure(&self) -> bool {
        !matches!(self, BakeError::ContainerWait { .. })
    }
}
