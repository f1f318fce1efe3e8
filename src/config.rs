use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{EarshotError, Result};

const fn default_score_threshold() -> f32 {
    0.3
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_event_capacity() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AudioConfig {
    /// Input device name; `None` selects the system default.
    pub device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Path to the YAMNet ONNX model. Downloaded on first use if unset.
    pub model_path: Option<String>,

    /// Path to the YAMNet class map CSV. Downloaded on first use if unset.
    pub labels_path: Option<String>,

    /// Categories scoring at or below this are never published.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Fixed inter-tick delay of the classification loop.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            labels_path: None,
            score_threshold: default_score_threshold(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Broadcast buffer capacity. Oldest events are dropped on overflow.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EarshotError::Config(format!(
                "config file not found: {} — run `earshot init` or use --config to specify a path",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            EarshotError::Config(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_yaml_ng::from_str(&contents).map_err(|e| {
            EarshotError::Config(format!(
                "failed to parse config file {}: {e}",
                path.display()
            ))
        })?;

        Ok(config)
    }

    /// Load the config at `path`, falling back to defaults when absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    #[must_use]
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        config_dir.join("earshot/config.yaml")
    }

    /// Expand `~` in a path string to the user's home directory.
    #[must_use]
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    /// Write `device` into the `audio` section of the config file at `path`,
    /// creating the file (and parent directories) if needed. Other sections
    /// are preserved as written.
    pub fn set_audio_device(path: &Path, device: &str) -> Result<()> {
        use serde_yaml_ng::{Mapping, Value};

        let mut root: Mapping = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                EarshotError::Config(format!(
                    "failed to read config file {}: {e}",
                    path.display()
                ))
            })?;
            serde_yaml_ng::from_str(&contents).map_err(|e| {
                EarshotError::Config(format!(
                    "failed to parse config file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            Mapping::new()
        };

        let audio = root
            .entry(Value::String("audio".to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()))
            .as_mapping_mut()
            .ok_or_else(|| EarshotError::Config("audio section is not a mapping".to_string()))?;

        audio.insert(
            Value::String("device".to_string()),
            Value::String(device.to_string()),
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EarshotError::Config(format!(
                    "failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let yaml = serde_yaml_ng::to_string(&Value::Mapping(root))
            .map_err(|e| EarshotError::Config(format!("failed to serialize config: {e}")))?;

        std::fs::write(path, &yaml).map_err(|e| {
            EarshotError::Config(format!(
                "failed to write config file {}: {e}",
                path.display()
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let yaml = "{}";
        let config: Config =
            serde_yaml_ng::from_str(yaml).unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert!(config.audio.device.is_none());
        assert!((config.classifier.score_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.classifier.tick_interval_ms, 100);
        assert_eq!(config.events.capacity, 1);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
audio:
  device: "USB Stereo Mic"

classifier:
  model_path: /models/yamnet.onnx
  labels_path: /models/yamnet_class_map.csv
  score_threshold: 0.5
  tick_interval_ms: 250

events:
  capacity: 4
"#;
        let config: Config =
            serde_yaml_ng::from_str(yaml).unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(config.audio.device.as_deref(), Some("USB Stereo Mic"));
        assert_eq!(
            config.classifier.model_path.as_deref(),
            Some("/models/yamnet.onnx")
        );
        assert!((config.classifier.score_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.classifier.tick_interval_ms, 250);
        assert_eq!(config.events.capacity, 4);
    }

    #[test]
    fn missing_config_file_gives_error() {
        let result = Config::load(Path::new("/nonexistent/config.yaml"));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("config file not found"));
    }

    #[test]
    fn load_or_default_falls_back() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.yaml"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(config.classifier.tick_interval_ms, 100);
    }

    #[test]
    fn expand_tilde_path() {
        let expanded = Config::expand_path("~/earshot");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn set_audio_device_creates_and_preserves() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("config.yaml");

        std::fs::write(&path, "classifier:\n  score_threshold: 0.6\n")
            .unwrap_or_else(|e| panic!("{e}"));

        Config::set_audio_device(&path, "Front Mic").unwrap_or_else(|e| panic!("{e}"));

        let config = Config::load(&path).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(config.audio.device.as_deref(), Some("Front Mic"));
        assert!((config.classifier.score_threshold - 0.6).abs() < f32::EPSILON);
    }
}
