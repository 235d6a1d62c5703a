#![cfg(feature = "docker_tests")]

mod common;

use bakehouse_launcher::Launcher;
use bakehouse_packaging::BakePipeline;
use common::*;
use std::time::Duration;

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn container_runs_unprivileged_and_serves_declared_port() -> anyhow::Result<()> {
    assert!(docker_available().await, "docker daemon required");

    let app_dir = tempfile::tempdir()?;
    write_fixture_app(app_dir.path())?;
    let cache_dir = tempfile::tempdir()?;
    let config = test_config(cache_dir.path());

    let mut pipeline = BakePipeline::new(config.clone())?;
    let outcome = pipeline.bake(app_dir.path()).await?;

    let launcher = Launcher::new(config.clone()).await?;
    let spec = launcher.launch_spec(&outcome.image_ref);
    let container_id = launcher.create_container(&spec).await?;
    launcher.start_container(&container_id).await?;

    // The process must never run as the superuser.
    let whoami = launcher
        .exec_capture(&container_id, &["whoami"])
        .await?;
    assert_eq!(whoami.trim(), config.build.user);
    assert_ne!(whoami.trim(), "root");

    // The declared port must accept connections once the server is up.
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/", config.docker.host_port);
    let mut response = None;
    for _ in 0..60 {
        match client.get(&url).send().await {
            Ok(r) => {
                response = Some(r);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_secs(1)).await,
        }
    }
    let response = response.expect("no connection accepted on the declared port");
    assert!(response.status().is_success());

    launcher.stop_container(&container_id, 5).await?;
    launcher.remove_container(&container_id, true).await?;
    Ok(())
}
