use bakehouse_models::{BakeError, BuildPlan, BuildStage};

/// Target of the package installer's download cache inside the build
/// container. Mounted as a BuildKit cache so repeated builds reuse fetched
/// wheels without committing them to any image layer.
pub const PIP_CACHE_TARGET: &str = "/root/.cache/pip";

/// A rendered build description: one Dockerfile line group per pipeline
/// stage, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBuild {
    pub dockerfile: String,
    pub stages: Vec<BuildStage>,
}

struct Renderer {
    lines: Vec<String>,
    stage: BuildStage,
    stages: Vec<BuildStage>,
}

impl Renderer {
    fn new() -> Self {
        Self {
            lines: vec!["# syntax=docker/dockerfile:1".to_string()],
            stage: BuildStage::Pending,
            stages: Vec::new(),
        }
    }

    fn emit(&mut self, to: BuildStage, line: String) -> Result<(), BakeError> {
        self.stage = self.stage.advance(to)?;
        self.stages.push(to);
        self.lines.push(line);
        Ok(())
    }

    fn finish(self) -> Result<RenderedBuild, BakeError> {
        if self.stage != BuildStage::EntrypointDefined {
            return Err(BakeError::InternalError {
                reason: format!("render stopped at stage {}", self.stage),
            });
        }
        let mut dockerfile = self.lines.join("\n");
        dockerfile.push('\n');
        Ok(RenderedBuild {
            dockerfile,
            stages: self.stages,
        })
    }
}

/// Render the deterministic Dockerfile for a plan. A fixed plan always
/// produces byte-identical output.
pub fn render(plan: &BuildPlan) -> Result<RenderedBuild, BakeError> {
    plan.validate()?;

    let mut r = Renderer::new();

    r.emit(
        BuildStage::BaseSelected,
        format!("FROM {}", plan.base_image),
    )?;

    let env = plan
        .env
        .variables()
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" \\\n    ");
    r.emit(BuildStage::EnvConfigured, format!("ENV {env}"))?;

    r.emit(
        BuildStage::UserCreated,
        format!(
            "RUN useradd --create-home --home-dir {} {}",
            plan.user.home, plan.user.name
        ),
    )?;

    r.emit(BuildStage::WorkdirSet, format!("WORKDIR {}", plan.workdir))?;

    // Manifest alone first: source-only changes must not invalidate the
    // dependency-install layer.
    r.emit(
        BuildStage::ManifestCopied,
        format!("COPY {} ./", plan.manifest_file),
    )?;

    r.emit(
        BuildStage::DepsInstalled,
        format!(
            "RUN --mount=type=cache,target={} pip install -r {}",
            PIP_CACHE_TARGET, plan.manifest_file
        ),
    )?;

    r.emit(
        BuildStage::SourceCopied,
        format!("COPY {} ./{}", plan.source_dir, plan.source_dir),
    )?;

    r.emit(BuildStage::UserDropped, format!("USER {}", plan.user.name))?;

    r.emit(
        BuildStage::PortDeclared,
        format!("EXPOSE {}", plan.declared_port),
    )?;

    let command = serde_json::to_string(&plan.entrypoint.command()).map_err(|e| {
        BakeError::InternalError {
            reason: e.to_string(),
        }
    })?;
    r.emit(BuildStage::EntrypointDefined, format!("CMD {command}"))?;

    r.finish()
}
