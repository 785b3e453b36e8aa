use anyhow::{Context, Result};
use photorank_slideshow::photorank::ReqwestTransport;
use photorank_slideshow::stage::DocumentStage;
use photorank_slideshow::{Error, Slideshow, SlideshowConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path: PathBuf = std::env::var("SLIDESHOW_CONFIG")
        .unwrap_or_else(|_| "slideshow.toml".into())
        .into();
    let config = SlideshowConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;

    tracing::info!(
        "Showing {} pages of {} items from {}",
        config.number_of_pages,
        config.items_per_page,
        config.api_url
    );

    let client = reqwest::Client::builder()
        .timeout(config.fetch_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let stage = match config.output_path.clone() {
        Some(path) => {
            let (stage, writer) = DocumentStage::with_output(path);
            tokio::spawn(writer.run());
            stage
        }
        None => DocumentStage::new(),
    };
    let mut handle = Slideshow::new(config, ReqwestTransport::new(client), stage)
        .context("Failed to set up slideshow")?
        .start();
    tracing::info!("Slideshow {} running", handle.id());

    let result = tokio::select! {
        result = handle.wait() => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutting down");
            handle.stop();
            handle.wait().await
        }
    };

    match result {
        Ok(()) | Err(Error::Cancelled) => Ok(()),
        Err(e) => Err(e).context("Slideshow stopped"),
    }
}
