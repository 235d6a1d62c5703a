use crate::dockerfile::RenderedBuild;
use bakehouse_models::{BakeError, BuildPlan};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use walkdir::WalkDir;

/// Entries never copied into a build context. Derived artifacts would break
/// digest stability; VCS metadata is irrelevant to the image.
const EXCLUDED: &[&str] = &["__pycache__", ".git", ".venv"];

fn excluded(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    EXCLUDED.contains(&name.as_ref()) || name.ends_with(".pyc")
}

/// A staged, self-contained build context in a temporary directory:
/// manifest at the root, source tree beside it, Dockerfile last.
#[derive(Debug)]
pub struct StagedContext {
    temp: tempfile::TempDir,
    pub dockerfile_path: PathBuf,
    pub source_digest: String,
}

impl StagedContext {
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// Content digest of an application source tree: relative paths and file
/// bytes, in sorted order, so the digest is stable across hosts.
#[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
pub fn source_digest(dir: impl AsRef<Path>) -> Result<String, BakeError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(BakeError::SourceNotFound {
            path: dir.display().to_string(),
        });
    }

    let mut hasher = Sha256::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !excluded(e));
    for entry in walker {
        let entry = entry.map_err(|e| BakeError::InternalError {
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| BakeError::InternalError {
                reason: e.to_string(),
            })?;
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0]);
        let data = std::fs::read(entry.path()).map_err(|e| BakeError::InternalError {
            reason: e.to_string(),
        })?;
        hasher.update(&data);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), BakeError> {
    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !excluded(e));
    for entry in walker {
        let entry = entry.map_err(|e| BakeError::InternalError {
            reason: e.to_string(),
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| BakeError::InternalError {
                reason: e.to_string(),
            })?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| BakeError::InternalError {
                reason: e.to_string(),
            })?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| BakeError::InternalError {
                    reason: e.to_string(),
                })?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| BakeError::InternalError {
                reason: e.to_string(),
            })?;
        }
    }
    Ok(())
}

/// Stage a build context from the application directory. The manifest is
/// copied first and the source tree after it, mirroring the layer order of
/// the rendered build.
#[instrument(skip_all, fields(context = %app_dir.as_ref().display()))]
pub fn stage_context(
    plan: &BuildPlan,
    rendered: &RenderedBuild,
    app_dir: impl AsRef<Path>,
) -> Result<StagedContext, BakeError> {
    let app_dir = app_dir.as_ref();

    let manifest_src = app_dir.join(&plan.manifest_file);
    if !manifest_src.is_file() {
        return Err(BakeError::ManifestNotFound {
            path: manifest_src.display().to_string(),
        });
    }
    let source_src = app_dir.join(&plan.source_dir);
    let digest = source_digest(&source_src)?;

    let temp = tempfile::tempdir().map_err(|e| BakeError::InternalError {
        reason: e.to_string(),
    })?;

    std::fs::copy(&manifest_src, temp.path().join(&plan.manifest_file)).map_err(|e| {
        BakeError::InternalError {
            reason: e.to_string(),
        }
    })?;
    copy_tree(&source_src, &temp.path().join(&plan.source_dir))?;

    let dockerfile_path = temp.path().join("Dockerfile");
    std::fs::write(&dockerfile_path, &rendered.dockerfile).map_err(|e| {
        BakeError::InternalError {
            reason: e.to_string(),
        }
    })?;

    info!("Staged build context at {}", temp.path().display());

    Ok(StagedContext {
        temp,
        dockerfile_path,
        source_digest: digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::render;
    use bakehouse_models::Config;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, BuildPlan) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "fastapi==0.115.0\n").unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("main.py"), "app = object()\n").unwrap();
        (dir, BuildPlan::from_config(&Config::default()))
    }

    #[test]
    fn test_stage_context_layout() {
        let (dir, plan) = fixture();
        let rendered = render(&plan).unwrap();
        let staged = stage_context(&plan, &rendered, dir.path()).unwrap();

        assert!(staged.path().join("requirements.txt").is_file());
        assert!(staged.path().join("app/main.py").is_file());
        assert!(staged.dockerfile_path.is_file());
        let written = std::fs::read_to_string(&staged.dockerfile_path).unwrap();
        assert_eq!(written, rendered.dockerfile);
    }

    #[test]
    fn test_source_digest_stable_and_sensitive() {
        let (dir, _plan) = fixture();
        let app = dir.path().join("app");
        let a = source_digest(&app).unwrap();
        let b = source_digest(&app).unwrap();
        assert_eq!(a, b);

        std::fs::write(app.join("main.py"), "app = None\n").unwrap();
        let c = source_digest(&app).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_source_digest_ignores_bytecode_cache() {
        let (dir, _plan) = fixture();
        let app = dir.path().join("app");
        let before = source_digest(&app).unwrap();

        let pycache = app.join("__pycache__");
        std::fs::create_dir_all(&pycache).unwrap();
        std::fs::write(pycache.join("main.cpython-312.pyc"), b"\x00\x01").unwrap();
        let after = source_digest(&app).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_manifest_aborts_staging() {
        let (dir, plan) = fixture();
        std::fs::remove_file(dir.path().join("requirements.txt")).unwrap();
        let rendered = render(&plan).unwrap();
        let err = stage_context(&plan, &rendered, dir.path()).unwrap_err();
        assert_eq!(err.error_type(), "ManifestNotFound");
    }

    #[test]
    fn test_missing_source_aborts_staging() {
        let (dir, plan) = fixture();
        std::fs::remove_dir_all(dir.path().join("app")).unwrap();
        let rendered = render(&plan).unwrap();
        let err = stage_context(&plan, &rendered, dir.path()).unwrap_err();
        assert_eq!(err.error_type(), "SourceNotFound");
    }
}
