use bakehouse_models::BakeError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, instrument};

/// Digest and summary of a dependency manifest. The manifest's format is an
/// external collaborator's concern; it is hashed verbatim and only checked
/// for emptiness here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestInfo {
    pub file_name: String,
    pub sha256: String,
    pub entries: usize,
}

#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_manifest(path: impl AsRef<Path>) -> Result<ManifestInfo, BakeError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(BakeError::ManifestNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path).map_err(|e| BakeError::InternalError {
        reason: e.to_string(),
    })?;

    let text = String::from_utf8_lossy(&data);
    let entries = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .count();
    if entries == 0 {
        return Err(BakeError::EmptyManifest {
            path: path.display().to_string(),
        });
    }

    let mut hasher = Sha256::new();
    hasher.update(&data);
    let sha256 = format!("{:x}", hasher.finalize());

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    info!("Loaded manifest {} with {} entries, SHA256: {}", file_name, entries, sha256);

    Ok(ManifestInfo {
        file_name,
        sha256,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_sha_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "fastapi==0.115.0").unwrap();
        writeln!(f, "uvicorn==0.30.6").unwrap();
        drop(f);

        let a = load_manifest(&path).unwrap();
        let b = load_manifest(&path).unwrap();
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.entries, 2);
    }

    #[test]
    fn test_manifest_change_changes_sha() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "fastapi==0.115.0\n").unwrap();
        let before = load_manifest(&path).unwrap();
        std::fs::write(&path, "fastapi==0.115.1\n").unwrap();
        let after = load_manifest(&path).unwrap();
        assert_ne!(before.sha256, after.sha256);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        let err = load_manifest(dir.path().join("requirements.txt")).unwrap_err();
        assert_eq!(err.error_type(), "ManifestNotFound");
    }

    #[test]
    fn test_empty_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "# only a comment\n\n").unwrap();
        let err = load_manifest(&path).unwrap_err();
        assert_eq!(err.error_type(), "EmptyManifest");
    }
}
