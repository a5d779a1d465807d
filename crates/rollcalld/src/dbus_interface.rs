use crate::hub::RecognitionHub;
use crate::processor::RecognitionBatch;
use crate::sink::SnapshotSink;
use crate::stats::PipelineStats;
use chrono::NaiveDate;
use rollcall_store::{AttendanceRecord, AttendanceStore, StoreError};
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "org.rollcall.Rollcall1";
pub const OBJECT_PATH: &str = "/org/rollcall/Rollcall1";

/// D-Bus interface for the Rollcall daemon.
///
/// Bus name: org.rollcall.Rollcall1
/// Object path: /org/rollcall/Rollcall1
pub struct RollcallService {
    pub hub: Arc<RecognitionHub>,
    pub store: Arc<dyn AttendanceStore>,
    pub snapshot: SnapshotSink,
    pub stats: Arc<PipelineStats>,
    pub catalog_size: usize,
    pub camera_device: String,
}

#[interface(name = "org.rollcall.Rollcall1")]
impl RollcallService {
    /// Take the oldest pending recognition batch, as `{"names": [...]}`.
    async fn recognitions(&self) -> zbus::fdo::Result<String> {
        Ok(recognitions_json(self.hub.try_consume()))
    }

    /// Attendance records for `date` (`YYYY-MM-DD`, empty for today).
    async fn attendance(&self, date: &str) -> zbus::fdo::Result<String> {
        let date = parse_date(date)?;
        tracing::debug!(%date, "attendance requested");

        let store = Arc::clone(&self.store);
        let records = tokio::task::spawn_blocking(move || store.report(date))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("report task failed: {e}")))?;

        attendance_json(records).map_err(|e| {
            tracing::error!(error = %e, %date, "attendance report failed");
            zbus::fdo::Error::Failed(e.to_string())
        })
    }

    /// Latest annotated frame as JPEG.
    async fn snapshot(&self) -> zbus::fdo::Result<Vec<u8>> {
        match self.snapshot.jpeg() {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(zbus::fdo::Error::Failed("no frame captured yet".into())),
            Err(e) => Err(zbus::fdo::Error::Failed(format!("JPEG encoding failed: {e}"))),
        }
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "camera": self.camera_device,
            "catalog_size": self.catalog_size,
            "pending_batches": self.hub.len(),
            "pipeline": self.stats.snapshot(),
        })
        .to_string())
    }
}

fn recognitions_json(batch: Option<RecognitionBatch>) -> String {
    let names: Vec<String> = batch
        .unwrap_or_default()
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    serde_json::json!({ "names": names }).to_string()
}

fn attendance_json(records: Result<Vec<AttendanceRecord>, StoreError>) -> Result<String, StoreError> {
    let rows: Vec<serde_json::Value> = records?
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "name": r.identity.as_str(),
                "time": r.recorded_at.format("%H:%M:%S").to_string(),
            })
        })
        .collect();
    Ok(serde_json::Value::Array(rows).to_string())
}

fn parse_date(raw: &str) -> zbus::fdo::Result<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(chrono::Local::now().date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("invalid date {raw:?}: {e}")))
}
