use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{bail, Context};
use listing_media::config::{Config, StorageKind};
use listing_media::utils::format_percent;
use listing_media::{
    BatchCoordinator, CurrentUser, HttpListingApi, HttpObjectStore, MediaPayload,
    MemoryObjectStore, ObjectStore, ServiceEditor, UploadEvent,
};
use tracing_subscriber::EnvFilter;

struct Args {
    config_path: PathBuf,
    service_id: String,
    user_id: String,
    cover: Option<PathBuf>,
    gallery: Vec<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let usage = "usage: listing-media <config.toml> <service-id> <user-id> [--cover FILE] [FILE...]";

    let config_path: PathBuf = args.next().context(usage)?.into();
    let service_id = args.next().context(usage)?;
    let user_id = args.next().context(usage)?;

    let mut cover: Option<PathBuf> = None;
    let mut gallery: Vec<PathBuf> = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--cover" {
            cover = Some(args.next().context("--cover needs a file")?.into());
        } else {
            gallery.push(arg.into());
        }
    }

    Ok(Args { config_path, service_id, user_id, cover, gallery })
}

async fn read_payload(path: &Path) -> anyhow::Result<MediaPayload> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();

    Ok(MediaPayload::new(name, data))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let config = Config::load(&args.config_path).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let store: Arc<dyn ObjectStore> = match config.storage.kind {
        StorageKind::Http => Arc::new(HttpObjectStore::new(&config.storage)?),
        StorageKind::Memory => Arc::new(MemoryObjectStore::new(&config.storage.endpoint)),
    };
    let coordinator = BatchCoordinator::new(store, config.upload.clone());
    let api = HttpListingApi::new(&config.api)?;

    // 打印上传进度
    let mut events = coordinator.subscribe_events();
    let mut progress = coordinator.subscribe_progress();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = progress.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let value = *progress.borrow_and_update();
                    println!("progress {}", format_percent(value));
                }
                event = events.recv() => match event {
                    Ok(UploadEvent::Failed { upload_id, error }) => println!("upload {} failed: {}", upload_id, error),
                    Ok(UploadEvent::BatchSettled { slot, state, .. }) => println!("{} batch {:?}", slot, state),
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(_) => break,
                }
            }
        }
    });

    let mut editor = ServiceEditor::load(&api, &args.service_id, &config).await?;

    if let Some(path) = &args.cover {
        let payload = read_payload(path).await?;
        if editor.upload_cover(&coordinator, Some(payload)).await.is_err() {
            bail!("{}", editor.error().unwrap_or("cover upload failed"));
        }
    }

    if !args.gallery.is_empty() {
        let mut payloads = Vec::with_capacity(args.gallery.len());
        for path in &args.gallery {
            payloads.push(read_payload(path).await?);
        }
        if editor.upload_gallery(&coordinator, payloads).await.is_err() {
            bail!("{}", editor.error().unwrap_or("gallery upload failed"));
        }
    }

    let user = CurrentUser::new(args.user_id);
    match editor.submit(&api, &user).await {
        Ok(record) => {
            println!(
                "service {} saved with {} images",
                record.id.as_deref().unwrap_or(&args.service_id),
                record.image_urls.len()
            );
            Ok(())
        }
        Err(_) => bail!("{}", editor.error().unwrap_or("update failed")),
    }
}
