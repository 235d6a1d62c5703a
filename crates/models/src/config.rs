use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub image: ImageConfig,
    pub build: BuildConfig,
    pub server: ServerConfig,
    pub docker: DockerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    /// Pinned base image reference. An exact pin is required for
    /// reproducible builds; `latest` is rejected at plan validation.
    pub base: String,
    /// Repository prefix for built image tags.
    pub repository: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    pub user: String,
    pub user_home: String,
    pub workdir: String,
    /// Dependency manifest file name, relative to the application context.
    pub manifest: String,
    /// Application source directory name, relative to the context.
    pub source_dir: String,
    /// Directory for the persisted image cache.
    pub cache_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub program: String,
    pub app: String,
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DockerConfig {
    pub host: String,
    /// Host port the declared container port is published to by `run`.
    pub host_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image: ImageConfig {
                base: "python:3.12-slim".to_string(),
                repository: "bakehouse/app".to_string(),
            },
            build: BuildConfig {
                user: "appuser".to_string(),
                user_home: "/home/appuser".to_string(),
                workdir: "/app".to_string(),
                manifest: "requirements.txt".to_string(),
                source_dir: "app".to_string(),
                cache_dir: "data/cache".to_string(),
            },
            server: ServerConfig {
                program: "uvicorn".to_string(),
                app: "app.main:app".to_string(),
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
            docker: DockerConfig {
                host: "".to_string(),
                host_port: 8080,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_artifact() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.app, "app.main:app");
        assert_ne!(config.build.user, "root");
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_deny_unknown_fields() {
        let toml_str = r#"
            [image]
            base = "python:3.12-slim"
            repository = "bakehouse/app"
            surprise = true
        "#;
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }
}
