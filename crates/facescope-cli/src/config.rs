use facescope_core::matcher::{MatchPolicy, DEFAULT_TOLERANCE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "facescope.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Runtime configuration: defaults, then TOML file, then `FACESCOPE_*` variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// V4L2 device path.
    pub camera_device: String,
    /// Enrollment directory or single image.
    pub enroll_path: PathBuf,
    /// Image analyzed in static mode.
    pub target_image: PathBuf,
    /// Upper bound on a video session.
    pub video_duration_secs: u64,
    /// Maximum Euclidean distance between encodings for a match.
    pub match_tolerance: f32,
    pub match_policy: MatchPolicy,
    /// ONNX Runtime intra-op threads per model.
    pub intra_threads: usize,
    /// Label font; common system fonts are searched when unset.
    pub font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            camera_device: "/dev/video0".to_string(),
            enroll_path: PathBuf::from("./images/individuals"),
            target_image: PathBuf::from("./images/group/group_image.png"),
            video_duration_secs: 10,
            match_tolerance: DEFAULT_TOLERANCE,
            match_policy: MatchPolicy::First,
            intra_threads: 2,
            font_path: None,
        }
    }
}

impl Config {
    /// Load `explicit`, or `facescope.toml` if present, then apply the environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from `FACESCOPE_*` variables returned by `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACESCOPE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACESCOPE_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("FACESCOPE_ENROLL_PATH") {
            self.enroll_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACESCOPE_TARGET_IMAGE") {
            self.target_image = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACESCOPE_FONT_PATH") {
            self.font_path = Some(PathBuf::from(v));
        }
        env_parse(&lookup, "FACESCOPE_VIDEO_DURATION_SECS", &mut self.video_duration_secs);
        env_parse(&lookup, "FACESCOPE_MATCH_TOLERANCE", &mut self.match_tolerance);
        env_parse(&lookup, "FACESCOPE_MATCH_POLICY", &mut self.match_policy);
        env_parse(&lookup, "FACESCOPE_INTRA_THREADS", &mut self.intra_threads);
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment variable"),
    }
}
