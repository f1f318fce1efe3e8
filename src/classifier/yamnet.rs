use std::path::Path;

use ort::session::Session;

use crate::audio::decimate::WINDOW_LEN;
use crate::config::ClassifierConfig;
use crate::error::{EarshotError, Result};

use super::{Category, ClassifierEngine};

/// YAMNet: pretrained AudioSet event classifier over 0.975 s mono windows.
///
/// The ONNX session and the 521-label class map are loaded once at
/// construction and reused for every call.
pub struct YamnetEngine {
    session: Session,
    labels: Vec<String>,
}

impl YamnetEngine {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let model_path = crate::models::resolve_yamnet_model(config.model_path.as_deref())?;
        let labels_path = crate::models::resolve_class_map(config.labels_path.as_deref())?;

        let session = load_session(&model_path)?;
        let labels = load_class_map(&labels_path)?;

        tracing::info!(
            "loaded YAMNet model with {} categories from {}",
            labels.len(),
            model_path.display()
        );

        Ok(Self { session, labels })
    }
}

impl ClassifierEngine for YamnetEngine {
    fn classify(&mut self, window: &[f32]) -> Result<Vec<Category>> {
        if window.len() != WINDOW_LEN {
            return Err(EarshotError::Classifier(format!(
                "window must be exactly {WINDOW_LEN} samples, got {}",
                window.len()
            )));
        }

        // The model expects the raw waveform; adapt to the exported rank:
        // `[num_samples]` for rank 1 or `[1, num_samples]` for rank 2.
        let input_rank = match self.session.inputs().first() {
            Some(input) => match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } => shape.len(),
                other => {
                    return Err(EarshotError::Classifier(format!(
                        "expected tensor input, got: {other:?}"
                    )));
                }
            },
            None => {
                return Err(EarshotError::Classifier("model has no inputs".to_string()));
            }
        };

        let input_tensor = match input_rank {
            1 => ort::value::Tensor::from_array(([WINDOW_LEN], window.to_vec())),
            2 => ort::value::Tensor::from_array(([1usize, WINDOW_LEN], window.to_vec())),
            n => {
                return Err(EarshotError::Classifier(format!(
                    "unsupported input tensor rank {n}, expected 1 or 2"
                )));
            }
        }
        .map_err(|e| EarshotError::Classifier(format!("failed to create input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| EarshotError::Classifier(format!("model inference failed: {e}")))?;

        let (_shape, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EarshotError::Classifier(format!("failed to extract score tensor: {e}")))?;

        if scores.len() != self.labels.len() {
            return Err(EarshotError::Classifier(format!(
                "model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )));
        }

        Ok(self
            .labels
            .iter()
            .zip(scores.iter())
            .map(|(label, &score)| Category {
                label: label.clone(),
                score,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "yamnet"
    }
}

fn load_session(model_path: &Path) -> Result<Session> {
    let mut builder = Session::builder()
        .map_err(|e| EarshotError::Classifier(format!("failed to create session builder: {e}")))?;

    #[cfg(feature = "cuda")]
    let mut builder = {
        use ort::ep::CUDA;
        builder
            .with_execution_providers([CUDA::default().build()])
            .map_err(|e| {
                EarshotError::Classifier(format!(
                    "failed to register CUDA execution provider: {e}"
                ))
            })?
    };

    builder
        .commit_from_file(model_path)
        .map_err(|e| EarshotError::Classifier(format!("failed to load YAMNet model: {e}")))
}

/// Parse the AudioSet class map CSV (`index,mid,display_name`). Display names
/// containing commas are quoted.
fn load_class_map(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        EarshotError::Classifier(format!(
            "failed to read class map {}: {e}",
            path.display()
        ))
    })?;

    let mut labels = Vec::new();
    for line in contents.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let after_index = line
            .split_once(',')
            .map(|(_, rest)| rest)
            .ok_or_else(|| EarshotError::Classifier(format!("malformed class map row: {line}")))?;
        let display_name = after_index
            .split_once(',')
            .map(|(_, rest)| rest)
            .ok_or_else(|| EarshotError::Classifier(format!("malformed class map row: {line}")))?;

        labels.push(display_name.trim_matches('"').to_string());
    }

    if labels.is_empty() {
        return Err(EarshotError::Classifier(format!(
            "class map {} contains no categories",
            path.display()
        )));
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_map_parses_plain_and_quoted_names() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("class_map.csv");
        std::fs::write(
            &path,
            "index,mid,display_name\n\
             0,/m/09x0r,Speech\n\
             20,/t/dd00002,\"Baby cry, infant cry\"\n\
             302,/m/0912c9,\"Vehicle horn, car horn, honking\"\n",
        )
        .unwrap_or_else(|e| panic!("{e}"));

        let labels = load_class_map(&path).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            labels,
            vec![
                "Speech".to_string(),
                "Baby cry, infant cry".to_string(),
                "Vehicle horn, car horn, honking".to_string(),
            ]
        );
    }

    #[test]
    fn empty_class_map_is_an_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("class_map.csv");
        std::fs::write(&path, "index,mid,display_name\n").unwrap_or_else(|e| panic!("{e}"));

        assert!(load_class_map(&path).is_err());
    }

    #[test]
    fn missing_class_map_is_an_error() {
        assert!(load_class_map(Path::new("/nonexistent/map.csv")).is_err());
    }
}
