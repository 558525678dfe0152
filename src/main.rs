use anyhow::Result;
use blood_transfusion::{BloodTransfusion, Config};
use reqwest::Client;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configure ────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(
        data_dir = %cfg.data_dir.display(),
        url = %cfg.url,
        batch_rows = cfg.batch_rows,
        force = cfg.force_download,
        "config"
    );

    // ─── 3) download, generate, register ─────────────────────────────
    let client = Client::new();
    let builder = BloodTransfusion;
    let info = builder.download_and_prepare(&client, &cfg).await?;

    for split in &info.splits {
        info!(
            split = split.name.as_str(),
            examples = split.num_examples,
            bytes = split.num_bytes,
            files = ?split.files,
            "split ready"
        );
    }
    info!(dir = %cfg.dataset_dir().display(), "all done");
    Ok(())
}
