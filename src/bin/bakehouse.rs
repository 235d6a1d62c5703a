use anyhow::Result;
use bakehouse_launcher::{ContainerManager, Launcher};
use bakehouse_models::{BuildPlan, Config};
use bakehouse_packaging::{render, BakePipeline};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "bakehouse")]
#[command(about = "Bake and launch the service image")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file; defaults are used when absent
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the build description without building
    Plan,
    /// Build the image from an application directory
    Build {
        /// Directory containing the manifest and the source tree
        #[arg(default_value = ".")]
        app_dir: PathBuf,
    },
    /// Start a container from a built image and wait for it to exit
    Run {
        /// Image reference to launch
        image_ref: String,
    },
}

fn load_config(explicit: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config_paths: Vec<PathBuf> = Vec::new();
    if let Some(path) = explicit {
        config_paths.push(path.to_path_buf());
    }
    config_paths.push(PathBuf::from("bakehouse.toml"));
    config_paths.push(PathBuf::from("configs/default.toml"));

    for path in &config_paths {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Configuration loaded from {}", path.display());
            return Ok(config);
        }
    }

    Err("No config file found".into())
}

/// Check if Docker is running and accessible
async fn is_docker_running() -> bool {
    match tokio::process::Command::new("docker")
        .args(["version", "--format", "{{.Server.Version}}"])
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Failed to load config file: {}, using defaults", e);
        Config::default()
    });

    match cli.command {
        Commands::Plan => {
            let plan = BuildPlan::from_config(&config);
            let rendered = render(&plan)?;
            for stage in &rendered.stages {
                info!("Stage: {}", stage);
            }
            print!("{}", rendered.dockerfile);
        }
        Commands::Build { app_dir } => {
            if !is_docker_running().await {
                error!("Docker is not running or not accessible");
                std::process::exit(1);
            }
            let mut pipeline = BakePipeline::new(config)?;
            let outcome = pipeline.bake(&app_dir).await?;
            if outcome.cached {
                info!("Image cache hit, no build ran");
            }
            println!("{}", outcome.image_ref);
        }
        Commands::Run { image_ref } => {
            if !is_docker_running().await {
                error!("Docker is not running or not accessible");
                std::process::exit(1);
            }
            let launcher = Launcher::new(config).await?;
            let spec = launcher.launch_spec(&image_ref);
            info!(
                "Launching {} publishing port {} -> {}",
                image_ref, spec.host_port, spec.container_port
            );
            let mut manager = ContainerManager::new(launcher);
            let exit_code = manager.run_to_exit(spec).await?;
            // The container's exit code is this process's exit code.
            std::process::exit(exit_code as i32);
        }
    }

    Ok(())
}
