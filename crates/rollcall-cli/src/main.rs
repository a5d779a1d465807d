use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{ArcFaceEncoder, FaceCatalog, ScrfdDetector};
use rollcall_hw::Camera;
use std::path::PathBuf;

#[zbus::proxy(
    interface = "org.rollcall.Rollcall1",
    default_service = "org.rollcall.Rollcall1",
    default_path = "/org/rollcall/Rollcall1"
)]
trait Rollcall {
    fn recognitions(&self) -> zbus::Result<String>;
    fn attendance(&self, date: &str) -> zbus::Result<String>;
    fn snapshot(&self) -> zbus::Result<Vec<u8>>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall face recognition attendance CLI")]
struct Cli {
    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take the oldest pending batch of recognized names
    Recognitions,
    /// Show who was seen on a day
    Attendance {
        /// Day in YYYY-MM-DD form (default: today)
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Save the latest annotated frame as JPEG
    Snapshot {
        #[arg(short, long, default_value = "snapshot.jpg")]
        output: PathBuf,
    },
    /// Show daemon status
    Status,
    /// List V4L2 capture devices
    Devices,
    /// Load a catalog directory offline and print its entries
    Catalog {
        dir: PathBuf,
        /// Directory containing the ONNX models
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Recognitions => {
            let json = connect(cli.system).await?.recognitions().await?;
            let value: serde_json::Value = serde_json::from_str(&json)?;
            let names: Vec<&str> = value["names"]
                .as_array()
                .map(|a| a.iter().filter_map(|n| n.as_str()).collect())
                .unwrap_or_default();
            if names.is_empty() {
                println!("No pending recognitions");
            } else {
                println!("{}", names.join(", "));
            }
        }
        Commands::Attendance { date } => {
            let json = connect(cli.system).await?.attendance(date.as_deref().unwrap_or("")).await?;
            let rows: serde_json::Value = serde_json::from_str(&json)?;
            match rows.as_array() {
                Some(rows) if !rows.is_empty() => {
                    for row in rows {
                        println!(
                            "{:<10} {}",
                            row["time"].as_str().unwrap_or("?"),
                            row["name"].as_str().unwrap_or("?")
                        );
                    }
                }
                _ => println!("No attendance recorded"),
            }
        }
        Commands::Snapshot { output } => {
            let jpeg = connect(cli.system).await?.snapshot().await?;
            std::fs::write(&output, &jpeg)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Saved {} bytes to {}", jpeg.len(), output.display());
        }
        Commands::Status => {
            let json = connect(cli.system).await?.status().await?;
            let value: serde_json::Value = serde_json::from_str(&json)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Devices => list_devices(),
        Commands::Catalog { dir, model_dir } => print_catalog(dir, model_dir)?,
    }

    Ok(())
}

async fn connect(system: bool) -> Result<RollcallProxy<'static>> {
    tracing::debug!(system, "connecting to rollcalld");
    let conn = if system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("failed to connect to D-Bus")?;
    RollcallProxy::new(&conn)
        .await
        .context("rollcalld is not reachable")
}

fn list_devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for dev in devices {
        println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
    }
}

fn print_catalog(dir: PathBuf, model_dir: Option<PathBuf>) -> Result<()> {
    let model_dir = model_dir.unwrap_or_else(rollcall_core::default_model_dir);
    let mut detector = ScrfdDetector::load(&model_dir.join(rollcall_core::SCRFD_MODEL_FILE))
        .context("failed to load face detector")?;
    let mut encoder = ArcFaceEncoder::load(&model_dir.join(rollcall_core::ARCFACE_MODEL_FILE))
        .context("failed to load face encoder")?;

    let catalog = FaceCatalog::load(&dir, &mut detector, &mut encoder)?;
    for entry in catalog.entries() {
        println!("{}  ({}-d)", entry.identity, entry.embedding.len());
    }
    for warning in catalog.warnings() {
        println!("skipped: {warning}");
    }
    println!("{} entries, {} skipped", catalog.len(), catalog.warnings().len());
    Ok(())
}
