use anyhow::{Context, Result};
use rollcall_core::{ArcFaceEncoder, FaceCatalog, ScrfdDetector};
use rollcall_hw::Camera;
use rollcall_store::{AttendanceStore, SqliteAttendanceStore};
use rollcalld::dbus_interface::{RollcallService, BUS_NAME, OBJECT_PATH};
use rollcalld::{CapturePipeline, Config, FrameProcessor, RecognitionHub, SnapshotSink};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(
        camera = %config.camera_device,
        catalog = %config.catalog_dir.display(),
        db = %config.db_path.display(),
        threshold = config.match_threshold,
        "configuration loaded"
    );

    let store: Arc<dyn AttendanceStore> = Arc::new(
        SqliteAttendanceStore::open(&config.db_path)
            .with_context(|| format!("failed to open attendance store {}", config.db_path.display()))?,
    );

    let mut detector = ScrfdDetector::load(&config.scrfd_model_path())
        .context("failed to load face detector")?;
    let mut encoder = ArcFaceEncoder::load(&config.arcface_model_path())
        .context("failed to load face encoder")?;

    let catalog = FaceCatalog::load(&config.catalog_dir, &mut detector, &mut encoder)
        .context("failed to load face catalog")?;
    if catalog.is_empty() {
        tracing::warn!(dir = %config.catalog_dir.display(), "face catalog is empty; every face will be Unknown");
    }
    let catalog = Arc::new(catalog);

    let camera = Camera::open(&config.camera_device)
        .with_context(|| format!("failed to open camera {}", config.camera_device))?;

    let hub = Arc::new(RecognitionHub::new(config.hub_capacity));
    let snapshot = SnapshotSink::default();

    let processor = FrameProcessor::new(
        Box::new(detector),
        Box::new(encoder),
        Arc::clone(&catalog),
        Arc::clone(&store),
    )
    .with_threshold(config.match_threshold)
    .with_downscale(config.downscale);

    let pipeline = CapturePipeline::new(
        Box::new(camera),
        processor,
        Arc::clone(&hub),
        Box::new(snapshot.clone()),
    )
    .with_warmup(config.warmup_frames);
    let stats = pipeline.stats();
    let handle = pipeline.spawn().context("failed to spawn capture thread")?;

    let service = RollcallService {
        hub,
        store,
        snapshot,
        stats,
        catalog_size: catalog.len(),
        camera_device: config.camera_device.clone(),
    };

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on D-Bus")?;

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "rollcalld ready");

    let mut poll = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("rollcalld shutting down");
                break;
            }
            _ = poll.tick() => {
                if handle.is_finished() {
                    tracing::warn!("capture pipeline exited on its own");
                    break;
                }
            }
        }
    }

    handle.stop();
    let exit = tokio::task::spawn_blocking(move || handle.join()).await?;
    tracing::info!(?exit, "capture pipeline joined");

    if !exit.was_requested() {
        anyhow::bail!("capture pipeline ended unexpectedly: {exit:?}");
    }
    Ok(())
}
