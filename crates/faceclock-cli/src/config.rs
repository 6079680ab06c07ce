use std::path::PathBuf;

use faceclock_core::{DEFAULT_EAR_THRESHOLD, DEFAULT_MATCH_THRESHOLD, DEFAULT_MIN_SAMPLES};

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the database and the known-faces file.
    pub data_dir: PathBuf,
    /// Path to the SQLite attendance database.
    pub db_path: PathBuf,
    /// Path to the known-faces JSON file.
    pub faces_path: PathBuf,
    /// Cosine distance below which a face matches an enrolled user.
    pub match_threshold: f32,
    /// Mean eye aspect ratio below which the eyes count as closed.
    pub ear_threshold: f32,
    /// Number of face samples averaged per registration.
    pub enroll_samples: usize,
    /// Frame cap per session. `None` runs until the source ends.
    pub max_frames: Option<usize>,
}

impl Config {
    /// Load configuration from `FACECLOCK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("FACECLOCK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| {
                        let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("faceclock")
            });

        let db_path = var("FACECLOCK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("attendance.db"));

        let faces_path = var("FACECLOCK_FACES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("known_faces.json"));

        Self {
            match_threshold: parse_or(&var, "FACECLOCK_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            ear_threshold: parse_or(&var, "FACECLOCK_EAR_THRESHOLD", DEFAULT_EAR_THRESHOLD),
            enroll_samples: parse_or(&var, "FACECLOCK_ENROLL_SAMPLES", DEFAULT_MIN_SAMPLES).max(1),
            max_frames: Some(parse_or(&var, "FACECLOCK_MAX_FRAMES", 0usize)).filter(|&n| n > 0),
            data_dir,
            db_path,
            faces_path,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
