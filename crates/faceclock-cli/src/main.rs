use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use faceclock_core::session::{self, FrameSink, ScanConfig, SessionError, SessionStatus};
use faceclock_store::{AttendanceLedger, KnownFacesStore, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;
mod replay;

use config::Config;
use replay::{CaptureReader, RawFrame, ReplayModel};

#[derive(Parser)]
#[command(name = "faceclock", about = "Face attendance: register faces and punch in/out")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user from a face capture
    Register {
        /// Name to enroll under (overwrites an existing enrollment)
        #[arg(short, long)]
        name: String,
        /// Capture file with one frame of detections per line
        #[arg(short, long)]
        capture: PathBuf,
        /// Samples to collect (default: FACECLOCK_ENROLL_SAMPLES or 20)
        #[arg(long)]
        samples: Option<usize>,
    },
    /// Mark attendance for the first live, recognized face in a capture
    Mark {
        /// Capture file with one frame of detections per line
        #[arg(short, long)]
        capture: PathBuf,
        /// Cosine distance threshold (default: FACECLOCK_MATCH_THRESHOLD or 0.4)
        #[arg(long)]
        threshold: Option<f32>,
        /// Give up after this many frames
        #[arg(long)]
        max_frames: Option<usize>,
    },
    /// List enrolled users
    Users,
    /// Remove an enrolled user
    Remove {
        /// Name to remove
        name: String,
    },
    /// Show configuration and store status
    Status,
}

/// Prints registration progress to stderr; scanning frames are only traced.
struct ProgressSink;

impl FrameSink<RawFrame> for ProgressSink {
    fn show(&mut self, frame: &RawFrame, status: &SessionStatus) {
        match status {
            SessionStatus::Collecting { collected, required } => {
                eprint!("\rcapturing face samples... {collected}/{required}");
                if collected == required {
                    eprintln!();
                }
            }
            SessionStatus::Scanning { frames, blinked } => {
                tracing::trace!(line = frame.line, frames, blinked, "scanning");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Register {
            name,
            capture,
            samples,
        } => register(&config, &name, &capture, samples).await,
        Commands::Mark {
            capture,
            threshold,
            max_frames,
        } => mark(&config, &capture, threshold, max_frames).await,
        Commands::Users => {
            for name in users(&config)? {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Remove { name } => {
            remove(&config, &name)?;
            println!("{name} removed");
            Ok(())
        }
        Commands::Status => {
            println!("{}", status(&config).await?);
            Ok(())
        }
    }
}

async fn register(
    config: &Config,
    name: &str,
    capture: &Path,
    samples: Option<usize>,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("user name must not be empty");
    }

    let mut store = open_faces(config)?;
    let required = samples.unwrap_or(config.enroll_samples).max(1);
    let frames = open_capture(capture)?;
    let max_frames = config.max_frames;

    tracing::info!(user = name, required, "registration started");
    println!("Capturing face samples... Blink naturally.");

    let collected = tokio::task::spawn_blocking(move || {
        session::run_registration(frames, &mut ReplayModel, &mut ProgressSink, required, max_frames)
    })
    .await
    .context("registration task panicked")?
    .map_err(|e| match e {
        SessionError::Exhausted { frames } => anyhow::anyhow!(
            "capture ended after {frames} frames before {required} face samples were collected"
        ),
        other => anyhow::Error::new(other),
    })?;

    store
        .enroll(name, &collected, required)
        .with_context(|| format!("failed to enroll {name}"))?;

    println!("{name} registered successfully!");
    Ok(())
}

async fn mark(
    config: &Config,
    capture: &Path,
    threshold: Option<f32>,
    max_frames: Option<usize>,
) -> Result<()> {
    let ledger = AttendanceLedger::open(&config.db_path, Arc::new(SystemClock))
        .await
        .context("failed to open attendance database")?;

    let store = open_faces(config)?;
    if store.faces().is_empty() {
        bail!("no users enrolled; run `faceclock register` first");
    }
    let gallery = store.faces().clone();

    let scan = ScanConfig {
        match_threshold: threshold.unwrap_or(config.match_threshold),
        ear_threshold: config.ear_threshold,
        max_frames: max_frames.or(config.max_frames),
    };
    let frames = open_capture(capture)?;

    tracing::info!(enrolled = gallery.len(), threshold = scan.match_threshold, "attendance scan started");

    let found = tokio::task::spawn_blocking(move || {
        session::run_attendance_scan(frames, &mut ReplayModel, &mut ProgressSink, &gallery, &scan)
    })
    .await
    .context("attendance scan task panicked")?
    .map_err(|e| match e {
        SessionError::Exhausted { frames } => {
            anyhow::anyhow!("no live, recognized face after {frames} frames")
        }
        other => anyhow::Error::new(other),
    })?;

    let action = ledger
        .mark_attendance(&found.name)
        .await
        .with_context(|| format!("failed to record attendance for {}", found.name))?;

    println!("{}: {action}", found.name);
    Ok(())
}

fn users(config: &Config) -> Result<Vec<String>> {
    let store = open_faces(config)?;
    Ok(store.faces().names().map(str::to_string).collect())
}

fn remove(config: &Config, name: &str) -> Result<()> {
    let mut store = open_faces(config)?;
    if !store
        .remove(name)
        .with_context(|| format!("failed to remove {name}"))?
    {
        bail!("no enrolled user named {name:?}");
    }
    Ok(())
}

async fn status(config: &Config) -> Result<serde_json::Value> {
    let store = open_faces(config)?;
    let ledger = AttendanceLedger::open(&config.db_path, Arc::new(SystemClock))
        .await
        .context("failed to open attendance database")?;
    let rows = ledger.count_all().await?;

    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "data_dir": config.data_dir,
        "faces_path": config.faces_path,
        "db_path": config.db_path,
        "enrolled": store.faces().len(),
        "attendance_rows": rows,
        "match_threshold": config.match_threshold,
        "ear_threshold": config.ear_threshold,
        "enroll_samples": config.enroll_samples,
    }))
}

fn open_faces(config: &Config) -> Result<KnownFacesStore> {
    KnownFacesStore::open(&config.faces_path).context("failed to load known faces")
}

fn open_capture(path: &Path) -> Result<CaptureReader<std::io::BufReader<std::fs::File>>> {
    CaptureReader::open(path).with_context(|| format!("failed to open capture {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceclock_core::Embedding;

    /// 68 points with both eyes 30 px wide and `eye_height` px tall.
    fn landmarks(eye_height: f32) -> Vec<(f32, f32)> {
        let mut points = vec![(0.0, 0.0); 68];
        for (start, x0) in [(36usize, 200.0f32), (42, 400.0)] {
            let (third, half) = (10.0, eye_height / 2.0);
            let eye = [
                (x0, 100.0),
                (x0 + third, 100.0 - half),
                (x0 + 2.0 * third, 100.0 - half),
                (x0 + 30.0, 100.0),
                (x0 + 2.0 * third, 100.0 + half),
                (x0 + third, 100.0 + half),
            ];
            points[start..start + 6].copy_from_slice(&eye);
        }
        points
    }

    fn face_line(embedding: &[f32], eye_height: f32) -> String {
        serde_json::json!({
            "faces": [{ "embedding": embedding, "landmarks": landmarks(eye_height) }]
        })
        .to_string()
    }

    fn write_capture(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn test_config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            db_path: dir.join("attendance.db"),
            faces_path: dir.join("known_faces.json"),
            match_threshold: 0.4,
            ear_threshold: 0.21,
            enroll_samples: 3,
            max_frames: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_mark() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let open = face_line(&[1.0, 0.0, 0.0], 9.0);
        let reg = write_capture(
            dir.path(),
            "register.jsonl",
            &[open.clone(), r#"{"faces":[]}"#.to_string(), open.clone(), open.clone()],
        );
        register(&config, "alice", &reg, None).await.unwrap();

        let store = KnownFacesStore::open(&config.faces_path).unwrap();
        assert_eq!(store.faces().get("alice"), Some(&Embedding::new(vec![1.0, 0.0, 0.0])));

        let blink = face_line(&[0.98, 0.05, 0.0], 3.0);
        let scan = write_capture(dir.path(), "mark.jsonl", &[open.clone(), blink]);
        mark(&config, &scan, None, None).await.unwrap();

        let ledger = AttendanceLedger::open(&config.db_path, Arc::new(SystemClock))
            .await
            .unwrap();
        assert_eq!(ledger.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_requires_blink() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let open = face_line(&[1.0, 0.0, 0.0], 9.0);
        let reg = write_capture(dir.path(), "register.jsonl", &vec![open.clone(); 3]);
        register(&config, "alice", &reg, None).await.unwrap();

        let scan = write_capture(dir.path(), "mark.jsonl", &vec![open; 5]);
        let err = mark(&config, &scan, None, None).await.unwrap_err();
        assert!(err.to_string().contains("after 5 frames"));
    }

    #[tokio::test]
    async fn test_mark_with_no_enrolled_users() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let scan = write_capture(dir.path(), "mark.jsonl", &[face_line(&[1.0], 3.0)]);

        assert!(mark(&config, &scan, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_short_registration_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let reg = write_capture(
            dir.path(),
            "register.jsonl",
            &[face_line(&[1.0, 0.0], 9.0), r#"{"faces":[]}"#.to_string()],
        );
        let err = register(&config, "alice", &reg, None).await.unwrap_err();
        assert!(err.to_string().contains("capture ended after 2 frames"));
        assert!(!config.faces_path.exists());
    }

    #[tokio::test]
    async fn test_unreadable_capture_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let open = face_line(&[1.0, 0.0, 0.0], 9.0);
        let reg = write_capture(dir.path(), "register.jsonl", &vec![open.clone(); 3]);
        register(&config, "alice", &reg, None).await.unwrap();

        let scan = dir.path().join("mark.jsonl");
        let mut bytes = open.into_bytes();
        bytes.extend_from_slice(b"\n\xff\xfe\n");
        bytes.extend_from_slice(face_line(&[1.0, 0.0, 0.0], 3.0).as_bytes());
        std::fs::write(&scan, bytes).unwrap();

        let err = mark(&config, &scan, None, None).await.unwrap_err();
        let root = err.root_cause().to_string();
        assert!(root.contains("line 2"), "{root}");
        assert!(!err.to_string().contains("no live, recognized face"));
    }

    #[tokio::test]
    async fn test_remove_then_users() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let reg = write_capture(
            dir.path(),
            "register.jsonl",
            &vec![face_line(&[1.0, 0.0], 9.0); 3],
        );
        register(&config, "alice", &reg, None).await.unwrap();
        register(&config, "bob", &reg, None).await.unwrap();
        assert_eq!(users(&config).unwrap(), vec!["alice", "bob"]);

        remove(&config, "alice").unwrap();
        assert_eq!(users(&config).unwrap(), vec!["bob"]);

        let err = remove(&config, "alice").unwrap_err();
        assert!(err.to_string().contains("no enrolled user"));
    }

    #[tokio::test]
    async fn test_status_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let empty = status(&config).await.unwrap();
        assert_eq!(empty["enrolled"], 0);
        assert_eq!(empty["attendance_rows"], 0);

        let open = face_line(&[1.0, 0.0, 0.0], 9.0);
        let reg = write_capture(dir.path(), "register.jsonl", &vec![open.clone(); 3]);
        register(&config, "alice", &reg, None).await.unwrap();
        let scan = write_capture(
            dir.path(),
            "mark.jsonl",
            &[face_line(&[1.0, 0.0, 0.0], 3.0)],
        );
        mark(&config, &scan, None, None).await.unwrap();

        let after = status(&config).await.unwrap();
        assert_eq!(after["enrolled"], 1);
        assert_eq!(after["attendance_rows"], 1);
        assert_eq!(after["enroll_samples"], 3);
    }
}
