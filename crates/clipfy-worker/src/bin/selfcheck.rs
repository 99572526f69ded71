use std::path::Path;

use clipfy_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();
    config.validate()?;

    println!(
        "clipfy-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_dir(&config.scratch_dir()).await?;
    ensure_dir(&config.output_dir).await?;
    ensure_encoder(&config.encoder_bin).await?;

    println!("clipfy-selfcheck: ok");
    Ok(())
}

async fn ensure_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))?;
    Ok(())
}

async fn ensure_encoder(program: &str) -> anyhow::Result<()> {
    let binary = clipfy_media::check_encoder(program)?;

    let output = tokio::process::Command::new(&binary)
        .arg("-version")
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("{} not available: {}", program, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            program,
            output.status
        ));
    }
    Ok(())
}
