#![cfg(feature = "docker_tests")]

mod common;

use bakehouse_models::BuildPlan;
use bakehouse_packaging::{render, stage_context, BakePipeline, ImageBuilder};
use common::*;

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn bake_then_rebake_hits_image_cache() -> anyhow::Result<()> {
    assert!(docker_available().await, "docker daemon required");

    let app_dir = tempfile::tempdir()?;
    write_fixture_app(app_dir.path())?;
    let cache_dir = tempfile::tempdir()?;
    let config = test_config(cache_dir.path());

    let mut pipeline = BakePipeline::new(config)?;
    let first = pipeline.bake(app_dir.path()).await?;
    assert!(!first.cached);

    let second = pipeline.bake(app_dir.path()).await?;
    assert!(second.cached);
    assert_eq!(first.image_ref, second.image_ref);
    Ok(())
}

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn source_only_change_skips_install_layer() -> anyhow::Result<()> {
    assert!(docker_available().await, "docker daemon required");

    let app_dir = tempfile::tempdir()?;
    write_fixture_app(app_dir.path())?;
    let cache_dir = tempfile::tempdir()?;
    let config = test_config(cache_dir.path());
    let plan = BuildPlan::from_config(&config);
    let rendered = render(&plan)?;

    let build = |staged_path: std::path::PathBuf, tag: &str| {
        let tag = tag.to_string();
        async move {
            tokio::process::Command::new("docker")
                .args(["build", "--progress=plain", "-t", &tag])
                .arg(&staged_path)
                .env("DOCKER_BUILDKIT", "1")
                .output()
                .await
        }
    };

    let staged = stage_context(&plan, &rendered, app_dir.path())?;
    let first = build(staged.path().to_path_buf(), "bakehouse-test/layers:a").await?;
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));

    // Change only the application source; the manifest layer must stay cached.
    std::fs::write(
        app_dir.path().join("app/main.py"),
        "from fastapi import FastAPI\n\napp = FastAPI()\n",
    )?;
    let staged = stage_context(&plan, &rendered, app_dir.path())?;
    let second = build(staged.path().to_path_buf(), "bakehouse-test/layers:b").await?;
    assert!(second.status.success());

    // BuildKit plain progress tags each step with `#N`; the cache hit is
    // reported as a separate `#N CACHED` line.
    let log = String::from_utf8_lossy(&second.stderr).to_string();
    let step_id = log
        .lines()
        .find(|l| l.contains("pip install"))
        .and_then(|l| l.split_whitespace().next())
        .map(str::to_string)
        .expect("install step not found in build log");
    let cached = log
        .lines()
        .any(|l| l.trim() == format!("{step_id} CACHED"));
    assert!(
        cached,
        "install stage was not layer-cached on a source-only rebuild:\n{log}"
    );
    Ok(())
}

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn unresolvable_pin_fails_and_publishes_no_tag() -> anyhow::Result<()> {
    assert!(docker_available().await, "docker daemon required");

    let app_dir = tempfile::tempdir()?;
    write_fixture_app(app_dir.path())?;
    std::fs::write(
        app_dir.path().join("requirements.txt"),
        "fastapi==999.999.999\n",
    )?;

    let cache_dir = tempfile::tempdir()?;
    let config = test_config(cache_dir.path());
    let plan = BuildPlan::from_config(&config);
    let tag = "bakehouse-test/broken:pin";

    let builder = ImageBuilder::new(config.docker.host.clone());
    let err = builder
        .build_image(&plan, app_dir.path(), tag)
        .await
        .unwrap_err();
    assert!(err.is_build_failure());
    assert_eq!(err.error_type(), "DependencyResolution");

    // No partial image may be published under the requested tag.
    let inspect = tokio::process::Command::new("docker")
        .args(["image", "inspect", tag])
        .output()
        .await?;
    assert!(!inspect.status.success());
    Ok(())
}
