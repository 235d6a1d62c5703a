use bakehouse_models::{BakeError, BuildPlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedImage {
    pub image_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted map from build-input fingerprint to built image tag. Purely an
/// accelerator: a cold cache only costs a rebuild, never correctness.
pub struct ImageCache {
    cache_dir: PathBuf,
    images: HashMap<String, CachedImage>,
}

/// Fingerprint of everything that determines a build's output: the full
/// plan, the manifest digest, and the source-tree digest.
pub fn build_fingerprint(
    plan: &BuildPlan,
    manifest_sha256: &str,
    source_digest: &str,
) -> Result<String, BakeError> {
    let plan_json = serde_json::to_vec(plan).map_err(|e| BakeError::InternalError {
        reason: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&plan_json);
    hasher.update(manifest_sha256.as_bytes());
    hasher.update(source_digest.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

impl ImageCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self, BakeError> {
        fs::create_dir_all(&cache_dir).map_err(|e| BakeError::InternalError {
            reason: e.to_string(),
        })?;

        let mut cache = Self {
            cache_dir,
            images: HashMap::new(),
        };
        cache.load_cache()?;
        Ok(cache)
    }

    #[instrument(skip(self))]
    pub fn get(&self, fingerprint: &str) -> Option<&CachedImage> {
        self.images.get(fingerprint)
    }

    #[instrument(skip(self))]
    pub fn insert(&mut self, fingerprint: String, image_ref: String) {
        self.images.insert(
            fingerprint.clone(),
            CachedImage {
                image_ref: image_ref.clone(),
                created_at: Utc::now(),
            },
        );
        info!("Cached image {} for fingerprint {}", image_ref, fingerprint);
    }

    fn cache_file(&self) -> PathBuf {
        self.cache_dir.join("image_cache.json")
    }

    fn load_cache(&mut self) -> Result<(), BakeError> {
        let cache_file = self.cache_file();
        if cache_file.exists() {
            let data = fs::read_to_string(&cache_file).map_err(|e| BakeError::InternalError {
                reason: e.to_string(),
            })?;
            self.images = serde_json::from_str(&data).map_err(|e| BakeError::InternalError {
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn save_cache(&self) -> Result<(), BakeError> {
        let data = serde_json::to_string_pretty(&self.images).map_err(|e| {
            BakeError::InternalError {
                reason: e.to_string(),
            }
        })?;
        fs::write(self.cache_file(), data).map_err(|e| BakeError::InternalError {
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
