use crate::cache::{build_fingerprint, ImageCache};
use crate::context::source_digest;
use crate::image_builder::ImageBuilder;
use crate::manifest::load_manifest;
use bakehouse_models::{BakeError, BuildPlan, Config};
use std::path::Path;
use tracing::{info, instrument};

/// Result of one `bake` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeOutcome {
    pub image_ref: String,
    pub fingerprint: String,
    /// True when the image cache satisfied the request and no build ran.
    pub cached: bool,
}

/// Orchestrates one build end to end: plan, fingerprint, cache check, build,
/// cache update.
pub struct BakePipeline {
    config: Config,
    builder: ImageBuilder,
    cache: ImageCache,
}

impl BakePipeline {
    pub fn new(config: Config) -> Result<Self, BakeError> {
        let builder = ImageBuilder::new(config.docker.host.clone());
        let cache = ImageCache::new(config.build.cache_dir.clone().into())?;
        Ok(Self {
            config,
            builder,
            cache,
        })
    }

    pub fn plan(&self) -> BuildPlan {
        BuildPlan::from_config(&self.config)
    }

    #[instrument(skip(self), fields(app_dir = %app_dir.display()))]
    pub async fn bake(&mut self, app_dir: &Path) -> Result<BakeOutcome, BakeError> {
        let plan = self.plan();
        plan.validate()?;

        let manifest = load_manifest(app_dir.join(&plan.manifest_file))?;
        let src_digest = source_digest(app_dir.join(&plan.source_dir))?;
        let fingerprint = build_fingerprint(&plan, &manifest.sha256, &src_digest)?;

        if let Some(hit) = self.cache.get(&fingerprint) {
            info!("Image cache hit: {}", hit.image_ref);
            return Ok(BakeOutcome {
                image_ref: hit.image_ref.clone(),
                fingerprint,
                cached: true,
            });
        }

        let image_ref = format!("{}:{}", self.config.image.repository, &fingerprint[..12]);
        self.builder
            .build_image(&plan, app_dir, &image_ref)
            .await?;

        self.cache.insert(fingerprint.clone(), image_ref.clone());
        self.cache.save_cache()?;

        Ok(BakeOutcome {
            image_ref,
            fingerprint,
            cached: false,
        })
    }
}
