use async_trait::async_trait;
use bakehouse_models::{BakeError, Config as AppConfig};
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{ContainerCreateResponse, HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::HashMap;
use tracing::{info, instrument};

#[derive(Clone, Debug)]
pub struct LaunchSpec {
    pub image: String,
    pub name: String,
    pub container_port: u16,
    pub host_port: u16,
    pub env: Vec<(String, String)>,
    pub labels: Vec<(String, String)>,
}

impl Default for LaunchSpec {
    fn default() -> Self {
        Self {
            image: "test:latest".to_string(),
            name: "test-container".to_string(),
            container_port: 8080,
            host_port: 8080,
            env: vec![],
            labels: vec![],
        }
    }
}

/// Seam over the container runtime so lifecycle logic can be exercised
/// without a Docker daemon.
#[async_trait]
pub trait DockerLike: Send + Sync + 'static {
    async fn create(&self, spec: LaunchSpec) -> anyhow::Result<String>; // returns container_id
    async fn start(&self, container_id: &str) -> anyhow::Result<()>;
    /// Block until the container exits, returning its raw exit code.
    async fn wait(&self, container_id: &str) -> anyhow::Result<i64>;
    async fn stop(&self, container_id: &str, timeout_secs: u64) -> anyhow::Result<()>;
    async fn remove(&self, container_id: &str, force: bool) -> anyhow::Result<()>;
}

pub struct Launcher {
    docker: Docker,
    config: AppConfig,
}

impl Launcher {
    pub async fn new(config: AppConfig) -> Result<Self, BakeError> {
        let docker = Docker::connect_with_socket_defaults().map_err(|e| BakeError::DockerError {
            message: e.to_string(),
        })?;
        Ok(Self { docker, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn launch_spec(&self, image_ref: &str) -> LaunchSpec {
        LaunchSpec {
            image: image_ref.to_string(),
            name: format!("bakehouse-{}", uuid::Uuid::new_v4()),
            container_port: self.config.server.port,
            host_port: self.config.docker.host_port,
            env: vec![],
            labels: vec![("bakehouse.managed".to_string(), "true".to_string())],
        }
    }

    #[instrument(skip(self))]
    pub async fn create_container(&self, spec: &LaunchSpec) -> Result<String, BakeError> {
        let container_port = format!("{}/tcp", spec.container_port);

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(container_port.clone(), HashMap::new());

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(spec.host_port.to_string()),
            }]),
        );

        // Restart policy stays `no`: restart decisions belong to the
        // external orchestrator, not this layer.
        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::NO),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let labels: HashMap<String, String> = spec.labels.iter().cloned().collect();

        let container_config = Config {
            image: Some(spec.image.clone()),
            env: Some(env),
            labels: Some(labels),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response: ContainerCreateResponse = self
            .docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;

        info!("Created container: {} with ID: {}", spec.name, response.id);
        Ok(response.id)
    }

    #[instrument(skip(self))]
    pub async fn start_container(&self, container_id: &str) -> Result<(), BakeError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;
        info!("Started container: {}", container_id);
        Ok(())
    }

    /// Wait for the container to exit and return its exit code verbatim.
    /// Propagation, not interpretation, is this layer's only contract.
    #[instrument(skip(self))]
    pub async fn wait_container(&self, container_id: &str) -> Result<i64, BakeError> {
        let mut wait_stream = self
            .docker
            .wait_container(container_id, None::<WaitContainerOptions<String>>);

        match wait_stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // A non-zero exit surfaces as an Err carrying the response.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(BakeError::ContainerWait {
                message: e.to_string(),
            }),
            None => Err(BakeError::ContainerWait {
                message: "wait stream ended without a status".to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn stop_container(&self, container_id: &str, timeout_secs: u64) -> Result<(), BakeError> {
        let options = StopContainerOptions {
            t: timeout_secs as i64,
        };
        self.docker
            .stop_container(container_id, Some(options))
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;
        info!("Stopped container: {}", container_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_container(&self, container_id: &str, force: bool) -> Result<(), BakeError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker
            .remove_container(container_id, Some(options))
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;
        info!("Removed container: {}", container_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn container_logs(&self, container_id: &str) -> Result<String, BakeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = self.docker.logs(container_id, Some(options));
        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk.map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })? {
                LogOutput::StdOut { message } | LogOutput::StdErr { message } => {
                    collected.push_str(&String::from_utf8_lossy(&message));
                }
                _ => {}
            }
        }
        Ok(collected)
    }

    /// Run a command inside a running container and return its combined
    /// output. Used by verification to assert the effective user.
    #[instrument(skip(self))]
    pub async fn exec_capture(&self, container_id: &str, cmd: &[&str]) -> Result<String, BakeError> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(cmd.iter().map(|s| s.to_string()).collect()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;

        let started = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| BakeError::DockerError {
                message: e.to_string(),
            })?;

        let mut collected = String::new();
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(chunk) = output.next().await {
                match chunk.map_err(|e| BakeError::DockerError {
                    message: e.to_string(),
                })? {
                    LogOutput::StdOut { message } | LogOutput::StdErr { message } => {
                        collected.push_str(&String::from_utf8_lossy(&message));
                    }
                    _ => {}
                }
            }
        }
        Ok(collected)
    }
}

#[async_trait]
impl DockerLike for Launcher {
    async fn create(&self, spec: LaunchSpec) -> anyhow::Result<String> {
        Ok(self.create_container(&spec).await?)
    }

    async fn start(&self, container_id: &str) -> anyhow::Result<()> {
        Ok(self.start_container(container_id).await?)
    }

    async fn wait(&self, container_id: &str) -> anyhow::Result<i64> {
        Ok(self.wait_container(container_id).await?)
    }

    async fn stop(&self, container_id: &str, timeout_secs: u64) -> anyhow::Result<()> {
        Ok(self.stop_container(container_id, timeout_secs).await?)
    }

    async fn remove(&self, container_id: &str, force: bool) -> anyhow::Result<()> {
        Ok(self.remove_container(container_id, force).await?)
    }
}
