use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use pixtag_clients::chat::{is_supported_image, media_type};
use pixtag_core::{
    AnnotationPipeline, AnnotationRequest, AnnotationService, Config, MemoryStore, ProviderConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pixtag=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let provider_config = config.provider_config()?;
    log_startup_status(&config, &provider_config);

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        anyhow::bail!("usage: pixtag <image> [<image> ...]");
    }

    let service = Arc::new(AnnotationService::from_config(&provider_config)?);
    let store = Arc::new(MemoryStore::new());
    let pipeline = AnnotationPipeline::new(service, store.clone());

    let mut handles = Vec::with_capacity(paths.len());
    for path in &paths {
        let image = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match media_type(&image) {
            Some(mime) if is_supported_image(mime) => {}
            Some(mime) => warn!("{} is {}, which remote models may reject", path.display(), mime),
            None => warn!("{} is not a recognized image format, annotating anyway", path.display()),
        }

        let image_id = Uuid::new_v4();
        store.insert_pending(image_id)?;
        info!("{} -> image {}", path.display(), image_id);
        handles.push(pipeline.schedule(AnnotationRequest::new(image_id, image)));
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("{}", e),
            Err(e) => error!("Pipeline task failed: {}", e),
        }
    }

    let records = store.records()?;
    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}

/// Log which annotation backends are usable with the current environment
fn log_startup_status(config: &Config, provider: &ProviderConfig) {
    info!("Configuration loaded");
    info!(
        "  Chat vision: {}",
        if config.chat_api_key.is_some() {
            format!("available ({})", config.chat_model)
        } else {
            "no credential".to_string()
        }
    );
    info!(
        "  Caption/classifier: {}",
        if config.inference_api_key.is_some() {
            format!("available ({} + {})", config.caption_model, config.classifier_model)
        } else {
            "no credential".to_string()
        }
    );
    info!("  Heuristic: always available");
    info!("Using provider: {}", provider.name());
}
