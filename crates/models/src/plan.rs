use crate::config::Config;
use crate::error::BakeError;
use serde::{Deserialize, Serialize};

/// Unprivileged execution identity created during the build and used for
/// every process started from the image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeUser {
    pub name: String,
    pub home: String,
}

/// Process-wide environment baked into the image: set once at build time,
/// immutable for the life of every container started from it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProcessEnv {
    /// Disable compiled-bytecode cache writes to the image filesystem.
    pub disable_bytecode_cache: bool,
    /// Force unbuffered stdout/stderr so logs reach the collector promptly.
    pub unbuffered_stdio: bool,
}

impl Default for ProcessEnv {
    fn default() -> Self {
        Self {
            disable_bytecode_cache: true,
            unbuffered_stdio: true,
        }
    }
}

impl ProcessEnv {
    pub fn variables(&self) -> Vec<(&'static str, &'static str)> {
        let mut vars = Vec::new();
        if self.disable_bytecode_cache {
            vars.push(("PYTHONDONTWRITEBYTECODE", "1"));
        }
        if self.unbuffered_stdio {
            vars.push(("PYTHONUNBUFFERED", "1"));
        }
        vars
    }
}

/// The command invoked once per container start by the external runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entrypoint {
    pub program: String,
    pub app: String,
    pub host: String,
    pub port: u16,
}

impl Entrypoint {
    pub fn command(&self) -> Vec<String> {
        vec![
            self.program.clone(),
            self.app.clone(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ]
    }
}

/// Immutable description of one image build. Fixed before the pipeline
/// starts; every stage reads from it and none mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildPlan {
    pub base_image: String,
    pub env: ProcessEnv,
    pub user: RuntimeUser,
    pub workdir: String,
    pub manifest_file: String,
    pub source_dir: String,
    pub declared_port: u16,
    pub entrypoint: Entrypoint,
}

impl BuildPlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_image: config.image.base.clone(),
            env: ProcessEnv::default(),
            user: RuntimeUser {
                name: config.build.user.clone(),
                home: config.build.user_home.clone(),
            },
            workdir: config.build.workdir.clone(),
            manifest_file: config.build.manifest.clone(),
            source_dir: config.build.source_dir.clone(),
            declared_port: config.server.port,
            entrypoint: Entrypoint {
                program: config.server.program.clone(),
                app: config.server.app.clone(),
                host: config.server.bind.clone(),
                port: config.server.port,
            },
        }
    }

    pub fn validate(&self) -> Result<(), BakeError> {
        if self.base_image.trim().is_empty() {
            return Err(BakeError::InvalidPlan {
                reason: "base image reference is empty".to_string(),
            });
        }
        if self.base_image == "latest" || self.base_image.ends_with(":latest") {
            return Err(BakeError::InvalidPlan {
                reason: format!(
                    "base image '{}' is not an exact pin; builds would not be reproducible",
                    self.base_image
                ),
            });
        }
        if self.user.name.is_empty() || self.user.name == "root" {
            return Err(BakeError::InvalidPlan {
                reason: format!("runtime user '{}' is not an unprivileged identity", self.user.name),
            });
        }
        if !self.user.home.starts_with('/') {
            return Err(BakeError::InvalidPlan {
                reason: format!("user home '{}' is not an absolute path", self.user.home),
            });
        }
        if !self.workdir.starts_with('/') {
            return Err(BakeError::InvalidPlan {
                reason: format!("workdir '{}' is not an absolute path", self.workdir),
            });
        }
        if self.manifest_file.is_empty() || self.manifest_file.contains('/') {
            return Err(BakeError::InvalidPlan {
                reason: format!(
                    "manifest '{}' must be a bare file name at the context root",
                    self.manifest_file
                ),
            });
        }
        if self.source_dir.is_empty() || self.source_dir.starts_with('/') {
            return Err(BakeError::InvalidPlan {
                reason: format!("source dir '{}' must be relative to the context", self.source_dir),
            });
        }
        if self.declared_port == 0 {
            return Err(BakeError::InvalidPlan {
                reason: "declared port must be non-zero".to_string(),
            });
        }
        if self.entrypoint.port != self.declared_port {
            return Err(BakeError::InvalidPlan {
                reason: format!(
                    "entrypoint binds port {} but the declared port is {}",
                    self.entrypoint.port, self.declared_port
                ),
            });
        }
        if self.entrypoint.app.is_empty() || !self.entrypoint.app.contains(':') {
            return Err(BakeError::InvalidPlan {
                reason: format!(
                    "entrypoint app '{}' is not a module:attribute reference",
                    self.entrypoint.app
                ),
            });
        }
        Ok(())
    }
}
