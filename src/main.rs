use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use base64::Engine;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use rust_photo_gallery::bridge::PhotoLibraryBridge;
use rust_photo_gallery::config::Configuration;
use rust_photo_gallery::events::{FetchOutcome, Photo, SkipReason};
use rust_photo_gallery::permission::{PermissionGate, StaticAuthorizationStore};
use rust_photo_gallery::source::{AssetSource, GallerySource};
use rust_photo_gallery::tasks::fetcher::PageFetcher;

#[derive(Debug, Parser)]
#[command(
    name = "photo-gallery",
    version,
    about = "Page through a photo library the way the in-app gallery does"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Load-more pages to fetch after the initial page
    #[arg(long, value_name = "N", default_value_t = 0)]
    pages: usize,
    /// Ask for library access before the first fetch
    #[arg(long = "request-access")]
    request_access: bool,
    /// Export the full-size image for this asset id instead of paging
    #[arg(long = "full-image", value_name = "ID")]
    full_image: Option<String>,
    /// Destination for --full-image
    #[arg(long, value_name = "FILE", requires = "full_image")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        pages,
        request_access,
        full_image,
        out,
    } = Args::parse();

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let gate = PermissionGate::new(Arc::new(StaticAuthorizationStore::from(cfg.permission)));
    let source: Arc<dyn AssetSource> = Arc::new(GallerySource::probe(&cfg));
    tracing::info!(kind = ?source.kind(), "photo source selected");

    if request_access {
        let status = gate.request_access().await;
        tracing::info!(?status, "library access");
    }

    if let Some(identifier) = full_image {
        let bridge = PhotoLibraryBridge::new(gate, source, cfg.default_request_count);
        return export_full_image(&bridge, &identifier, out).await;
    }

    let fetcher = PageFetcher::new(gate, source, cfg.max_window);
    {
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; closing gallery");
            fetcher.close();
        });
    }

    let outcome = fetcher.fetch_initial(cfg.page_size).await;
    print_outcome(&fetcher, &outcome)?;

    for _ in 0..pages {
        let outcome = fetcher.fetch_more(cfg.page_size).await;
        print_outcome(&fetcher, &outcome)?;
        if matches!(
            outcome,
            FetchOutcome::Skipped(SkipReason::Exhausted | SkipReason::Closed)
                | FetchOutcome::NeedsPermission { .. }
                | FetchOutcome::Discarded
        ) {
            break;
        }
    }

    let snapshot = fetcher.snapshot();
    println!(
        "{}",
        json!({
            "window": snapshot.photos.len(),
            "offset": snapshot.offset,
            "hasMore": snapshot.has_more,
            "totalCount": snapshot.total_count,
            "endOfPhotos": snapshot.end_of_photos(),
        })
    );
    fetcher.close();
    Ok(())
}

fn describe(photo: &Photo) -> serde_json::Value {
    let created = if photo.creation_timestamp > 0.0 {
        let millis = (photo.creation_timestamp * 1000.0).trunc() as i64;
        DateTime::<Utc>::from_timestamp_millis(millis).map(|t| t.to_rfc3339())
    } else {
        None
    };
    json!({
        "index": photo.sequence_index,
        "id": photo.id,
        "created": created,
        "bytes": photo.data.len(),
    })
}

fn print_outcome(fetcher: &PageFetcher, outcome: &FetchOutcome) -> Result<()> {
    match outcome {
        FetchOutcome::Loaded { appended, .. } => {
            let snapshot = fetcher.snapshot();
            let start = snapshot.photos.len().saturating_sub(*appended);
            for photo in &snapshot.photos[start..] {
                println!("{}", serde_json::to_string(&describe(photo))?);
            }
        }
        FetchOutcome::NeedsPermission { denied } => {
            println!("{}", json!({ "needsPermission": true, "permissionDenied": denied }));
        }
        other => tracing::info!(outcome = ?other, "no page loaded"),
    }
    Ok(())
}

async fn export_full_image(
    bridge: &PhotoLibraryBridge,
    identifier: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let response = bridge
        .dispatch("getFullImage", json!({ "identifier": identifier }))
        .await?;
    let Some(data) = response.get("data").and_then(|v| v.as_str()) else {
        bail!("getFullImage returned no data");
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("getFullImage returned invalid base64")?;
    match out {
        Some(path) => {
            std::fs::write(&path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(bytes = bytes.len(), path = %path.display(), "full image written");
        }
        None => println!("{}", json!({ "id": identifier, "bytes": bytes.len() })),
    }
    Ok(())
}
