use crate::docker::{DockerLike, LaunchSpec};
use bakehouse_models::BakeError;
use std::collections::HashMap;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub enum ContainerStatus {
    Starting,
    Running,
    Exited(i64),
    Removed,
}

#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub container_id: String,
    pub image: String,
    pub created_at: std::time::Instant,
    pub status: ContainerStatus,
}

/// Tracks containers started from baked images. Each start is an independent
/// invocation; instances share nothing at this layer.
pub struct ContainerManager<D: DockerLike> {
    docker: D,
    active_containers: HashMap<String, ContainerInfo>,
}

impl<D: DockerLike> ContainerManager<D> {
    pub fn new(docker: D) -> Self {
        Self {
            docker,
            active_containers: HashMap::new(),
        }
    }

    #[instrument(skip(self, spec), fields(image = %spec.image, name = %spec.name))]
    pub async fn create_and_start(&mut self, spec: LaunchSpec) -> Result<String, BakeError> {
        let image = spec.image.clone();
        let container_id =
            self.docker
                .create(spec)
                .await
                .map_err(|e| BakeError::DockerError {
                    message: e.to_string(),
                })?;

        self.active_containers.insert(
            container_id.clone(),
            ContainerInfo {
                container_id: container_id.clone(),
                image,
                created_at: std::time::Instant::now(),
                status: ContainerStatus::Starting,
            },
        );

        self.docker
            .start(&container_id)
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;

        if let Some(info) = self.active_containers.get_mut(&container_id) {
            info.status = ContainerStatus::Running;
        }

        info!("Created and started container: {}", container_id);
        Ok(container_id)
    }

    /// Start a container and block until it exits, returning the raw exit
    /// code. The container is removed afterwards; the code is the caller's
    /// to interpret.
    #[instrument(skip(self, spec), fields(image = %spec.image))]
    pub async fn run_to_exit(&mut self, spec: LaunchSpec) -> Result<i64, BakeError> {
        let container_id = self.create_and_start(spec).await?;

        let exit_code = self
            .docker
            .wait(&container_id)
            .await
            .map_err(|e| BakeError::ContainerWait {
                message: e.to_string(),
            })?;

        if let Some(info) = self.active_containers.get_mut(&container_id) {
            info.status = ContainerStatus::Exited(exit_code);
        }
        info!("Container {} exited with code {}", container_id, exit_code);

        self.remove(&container_id, false).await?;
        Ok(exit_code)
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self, container_id: &str, timeout_secs: u64) -> Result<(), BakeError> {
        self.docker
            .stop(container_id, timeout_secs)
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;
        if let Some(info) = self.active_containers.get_mut(container_id) {
            info.status = ContainerStatus::Exited(0);
        }
        info!("Stopped container: {}", container_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove(&mut self, container_id: &str, force: bool) -> Result<(), BakeError> {
        self.docker
            .remove(container_id, force)
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;
        if let Some(info) = self.active_containers.get_mut(container_id) {
            info.status = ContainerStatus::Removed;
        }
        self.active_containers.remove(container_id);
        info!("Removed container: {}", container_id);
        Ok(())
    }

    pub fn get_container_info(&self, container_id: &str) -> Option<&ContainerInfo> {
        self.active_containers.get(container_id)
    }

    pub fn active_count(&self) -> usize {
        self.active_containers.len()
    }
}
