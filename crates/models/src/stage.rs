use crate::error::BakeError;
use serde::{Deserialize, Serialize};

/// Build pipeline stages, in the order they must execute. Each stage depends
/// on the filesystem state produced by its predecessor, so the only legal
/// transition from a non-terminal stage is to its successor or to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStage {
    Pending,
    BaseSelected,
    EnvConfigured,
    UserCreated,
    WorkdirSet,
    ManifestCopied,
    DepsInstalled,
    SourceCopied,
    UserDropped,
    PortDeclared,
    EntrypointDefined,
    Failed,
}

impl BuildStage {
    pub fn successor(&self) -> Option<BuildStage> {
        match self {
            BuildStage::Pending => Some(BuildStage::BaseSelected),
            BuildStage::BaseSelected => Some(BuildStage::EnvConfigured),
            BuildStage::EnvConfigured => Some(BuildStage::UserCreated),
            BuildStage::UserCreated => Some(BuildStage::WorkdirSet),
            BuildStage::WorkdirSet => Some(BuildStage::ManifestCopied),
            BuildStage::ManifestCopied => Some(BuildStage::DepsInstalled),
            BuildStage::DepsInstalled => Some(BuildStage::SourceCopied),
            BuildStage::SourceCopied => Some(BuildStage::UserDropped),
            BuildStage::UserDropped => Some(BuildStage::PortDeclared),
            BuildStage::PortDeclared => Some(BuildStage::EntrypointDefined),
            BuildStage::EntrypointDefined => None,
            BuildStage::Failed => None,
        }
    }

    /// Terminal stages: build success or unrecoverable failure. A failed
    /// build requires a full re-run from `Pending`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStage::EntrypointDefined | BuildStage::Failed)
    }

    /// Stages at or after the privilege drop. No stage in this range may
    /// require elevated privilege.
    pub fn is_unprivileged(&self) -> bool {
        matches!(
            self,
            BuildStage::UserDropped | BuildStage::PortDeclared | BuildStage::EntrypointDefined
        )
    }

    pub fn advance(&self, to: BuildStage) -> Result<BuildStage, BakeError> {
        if to == BuildStage::Failed && !self.is_terminal() {
            return Ok(BuildStage::Failed);
        }
        match self.successor() {
            Some(next) if next == to => Ok(to),
            _ => Err(BakeError::StageOrder {
                from: *self,
                to,
            }),
        }
    }
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStage::Pending => "Pending",
            BuildStage::BaseSelected => "BaseSelected",
            BuildStage::EnvConfigured => "EnvConfigured",
            BuildStage::UserCreated => "UserCreated",
            BuildStage::WorkdirSet => "WorkdirSet",
            BuildStage::ManifestCopied => "ManifestCopied",
            BuildStage::DepsInstalled => "DepsInstalled",
            BuildStage::SourceCopied => "SourceCopied",
            BuildStage::UserDropped => "UserDropped",
            BuildStage::PortDeclared => "PortDeclared",
            BuildStage::EntrypointDefined => "EntrypointDefined",
            BuildStage::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}
