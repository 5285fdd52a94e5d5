use likeness_core::{CapturePolicy, CoreError, Threshold};
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Path to the ONNX embedding model.
    pub model_path: PathBuf,
    /// Path to the SQLite template database.
    pub db_path: PathBuf,
    /// Minimum cosine similarity for an accepted match.
    pub threshold: Threshold,
    /// Enrollment sampling policy.
    pub capture: CapturePolicy,
    /// Upper bound on still-image uploads, in bytes.
    pub max_image_bytes: usize,
    /// Camera polls allowed when looking for a live query frame.
    pub identify_attempts: usize,
    /// Serve on the session bus instead of the system bus.
    pub session_bus: bool,
}

impl Config {
    /// Load configuration from `LIKENESS_*` environment variables with defaults.
    ///
    /// Out-of-range threshold or capture settings fail here, at startup.
    pub fn from_env() -> Result<Self, CoreError> {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("likeness");

        let model_dir = std::env::var("LIKENESS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));
        let model_file = std::env::var("LIKENESS_MODEL_FILE")
            .unwrap_or_else(|_| "face_embedding.onnx".to_string());

        let db_path = std::env::var("LIKENESS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("templates.db"));

        let threshold = Threshold::new(env_or(
            "LIKENESS_SIMILARITY_THRESHOLD",
            likeness_core::matcher::DEFAULT_THRESHOLD,
        ))?;
        let capture = CapturePolicy::from_secs(
            env_or("LIKENESS_ENROLL_WINDOW_SECS", 20.0),
            env_or("LIKENESS_ENROLL_MAX_SAMPLES", 40),
            env_or("LIKENESS_ENROLL_SPACING_SECS", 0.5),
        )?;

        Ok(Self {
            camera_device: std::env::var("LIKENESS_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_path: model_dir.join(model_file),
            db_path,
            threshold,
            capture,
            max_image_bytes: env_or::<usize>("LIKENESS_MAX_IMAGE_SIZE_MB", 8)
                .saturating_mul(1024 * 1024),
            identify_attempts: env_or("LIKENESS_IDENTIFY_ATTEMPTS", 10),
            session_bus: std::env::var("LIKENESS_SESSION_BUS")
                .map(|v| v != "0")
                .unwrap_or(false),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
