use bakehouse_models::Config;
use std::path::Path;

/// Write a minimal ASGI application fixture: a pinned manifest and an
/// `app/main.py` exposing `app`.
pub fn write_fixture_app(dir: &Path) -> anyhow::Result<()> {
    std::fs::write(
        dir.join("requirements.txt"),
        "fastapi==0.115.0\nuvicorn==0.30.6\n",
    )?;
    let app = dir.join("app");
    std::fs::create_dir_all(&app)?;
    std::fs::write(app.join("__init__.py"), "")?;
    std::fs::write(
        app.join("main.py"),
        r#"from fastapi import FastAPI

app = FastAPI()


@app.get("/")
def index():
    return {"ok": True}
"#,
    )?;
    Ok(())
}

/// Default config with the image cache isolated to a temp directory so
/// tests never share cache state.
pub fn test_config(cache_dir: &Path) -> Config {
    let mut config = Config::default();
    config.build.cache_dir = cache_dir.display().to_string();
    config.image.repository = "bakehouse-test/app".to_string();
    config
}

pub async fn docker_available() -> bool {
    tokio::process::Command::new("docker")
        .args(["version", "--format", "{{.Server.Version}}"])
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}
