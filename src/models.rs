use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{EarshotError, Result};

/// Waveform-input ONNX export of YAMNet.
const YAMNET_MODEL_URL: &str =
    "https://huggingface.co/onnx-community/yamnet/resolve/main/onnx/model.onnx";

/// AudioSet class map covering the full 521-category taxonomy.
const CLASS_MAP_URL: &str = "https://raw.githubusercontent.com/tensorflow/models/master/research/audioset/yamnet/yamnet_class_map.csv";

/// Resolve the YAMNet model path: an explicit config path must exist;
/// otherwise the model is downloaded into the data directory on first use.
pub fn resolve_yamnet_model(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(explicit) = explicit {
        let path = Config::expand_path(explicit);
        if !path.exists() {
            return Err(EarshotError::Classifier(format!(
                "classifier model not found at {}",
                path.display()
            )));
        }
        return Ok(path);
    }

    let path = models_dir()?.join("yamnet.onnx");
    ensure_model(&path, YAMNET_MODEL_URL, "YAMNet model")?;
    Ok(path)
}

/// Resolve the class map path, mirroring [`resolve_yamnet_model`].
pub fn resolve_class_map(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(explicit) = explicit {
        let path = Config::expand_path(explicit);
        if !path.exists() {
            return Err(EarshotError::Classifier(format!(
                "class map not found at {}",
                path.display()
            )));
        }
        return Ok(path);
    }

    let path = models_dir()?.join("yamnet_class_map.csv");
    ensure_model(&path, CLASS_MAP_URL, "YAMNet class map")?;
    Ok(path)
}

fn models_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| EarshotError::Other("could not determine data directory".to_string()))?;
    Ok(data_dir.join("earshot/models"))
}

/// Ensure a model artifact exists at `path`, downloading it from `url` if
/// missing.
///
/// Downloads to a `{path}.part` temp file first, then renames into place so
/// interrupted downloads don't leave a corrupt file behind.
pub fn ensure_model(path: &Path, url: &str, description: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let part_path = path.with_extension(
        path.extension()
            .map_or_else(|| "part".to_string(), |e| format!("{}.part", e.to_string_lossy())),
    );

    tracing::info!("downloading {description} from {url}");

    let response = ureq::get(url)
        .call()
        .map_err(|e| EarshotError::Network(format!("failed to download {description}: {e}")))?;

    let mut reader = response.into_body().into_reader();
    let mut file = fs::File::create(&part_path)?;
    io::copy(&mut reader, &mut file)?;

    fs::rename(&part_path, path)?;

    tracing::info!("downloaded {description} to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_model_path_must_exist() {
        let result = resolve_yamnet_model(Some("/nonexistent/yamnet.onnx"));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("not found"));
    }

    #[test]
    fn explicit_paths_are_used_verbatim() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let model = dir.path().join("model.onnx");
        std::fs::write(&model, b"stub").unwrap_or_else(|e| panic!("{e}"));

        let resolved = resolve_yamnet_model(model.to_str()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(resolved, model);
    }

    #[test]
    fn ensure_model_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"already here").unwrap_or_else(|e| panic!("{e}"));

        // URL is unreachable; this only passes because no download happens.
        ensure_model(&path, "http://127.0.0.1:1/model.onnx", "stub model")
            .unwrap_or_else(|e| panic!("{e}"));
    }
}
