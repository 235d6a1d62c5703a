use crate::context::{stage_context, StagedContext};
use crate::dockerfile::render;
use crate::manifest::{load_manifest, ManifestInfo};
use bakehouse_models::{BakeError, BuildPlan, BuildStage};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info, instrument};

/// Outcome of a successful image build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub image_ref: String,
    pub manifest: ManifestInfo,
    pub source_digest: String,
    pub stage: BuildStage,
}

pub struct ImageBuilder {
    docker_host: String,
}

impl ImageBuilder {
    pub fn new(docker_host: String) -> Self {
        Self { docker_host }
    }

    /// Execute the full stage pipeline for a plan against an application
    /// directory. Any failing stage aborts the build; no image tag is
    /// published on failure.
    #[instrument(skip(self, plan), fields(image_ref = %image_ref))]
    pub async fn build_image(
        &self,
        plan: &BuildPlan,
        app_dir: &Path,
        image_ref: &str,
    ) -> Result<BuildReport, BakeError> {
        plan.validate()?;

        let manifest = load_manifest(app_dir.join(&plan.manifest_file))?;
        let rendered = render(plan)?;
        let staged = stage_context(plan, &rendered, app_dir)?;

        for stage in &rendered.stages {
            info!("Stage queued: {}", stage);
        }

        self.run_docker_build(plan, &staged, image_ref).await?;

        info!("Built image: {}", image_ref);
        Ok(BuildReport {
            image_ref: image_ref.to_string(),
            manifest,
            source_digest: staged.source_digest.clone(),
            stage: BuildStage::EntrypointDefined,
        })
    }

    async fn run_docker_build(
        &self,
        plan: &BuildPlan,
        staged: &StagedContext,
        image_ref: &str,
    ) -> Result<(), BakeError> {
        info!("Building image: {}", image_ref);
        info!("Build context: {:?}", staged.path());

        let mut command = Command::new("docker");
        command
            .arg("build")
            .arg("-t")
            .arg(image_ref)
            .arg("-f")
            .arg(&staged.dockerfile_path)
            .arg(staged.path())
            // Cache mounts require BuildKit.
            .env("DOCKER_BUILDKIT", "1")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if !self.docker_host.is_empty() {
            command.env("DOCKER_HOST", &self.docker_host);
        }

        let output = command.output().await.map_err(|e| BakeError::DockerError {
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Image build failed - stdout: {}", stdout);
            error!("Image build failed - stderr: {}", stderr);
            return Err(classify_build_failure(plan, &stderr));
        }

        Ok(())
    }
}

/// Map a failed build's stderr to a failure class: base image fetch, user
/// conflict, dependency resolution, network fetch, or a generic docker
/// error.
pub fn classify_build_failure(plan: &BuildPlan, stderr: &str) -> BakeError {
    let lower = stderr.to_lowercase();

    if lower.contains("pull access denied")
        || lower.contains("manifest unknown")
        || lower.contains("failed to resolve source metadata")
        || (lower.contains("not found") && lower.contains(&plan.base_image.to_lowercase()))
    {
        return BakeError::BaseImagePull {
            image: plan.base_image.clone(),
            message: first_line(stderr),
        };
    }

    if lower.contains("useradd") && lower.contains("already exists") {
        return BakeError::UserConflict {
            user: plan.user.name.clone(),
        };
    }

    if lower.contains("no matching distribution found")
        || lower.contains("could not find a version that satisfies")
    {
        return BakeError::DependencyResolution {
            message: first_line(stderr),
        };
    }

    if lower.contains("temporary failure in name resolution")
        || lower.contains("network is unreachable")
        || lower.contains("connection timed out")
        || lower.contains("proxyconnect")
    {
        return BakeError::NetworkFetch {
            message: first_line(stderr),
        };
    }

    BakeError::DockerError {
        message: first_line(stderr),
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("build failed")
        .to_string()
}
