pub mod yamnet;

use std::cmp::Ordering;

use crate::config::ClassifierConfig;
use crate::error::Result;

/// One scored category out of the classifier's taxonomy.
#[derive(Debug, Clone)]
pub struct Category {
    pub label: String,
    pub score: f32,
}

/// Trait for fixed-window audio event classifiers.
///
/// Implementations load their model once at construction and reuse it across
/// calls; `classify` must never reload per tick.
pub trait ClassifierEngine: Send {
    /// Score every category in the taxonomy for one mono window of exactly
    /// [`crate::audio::decimate::WINDOW_LEN`] samples at 16 kHz.
    fn classify(&mut self, window: &[f32]) -> Result<Vec<Category>>;

    fn name(&self) -> &str;
}

/// Create the classifier engine for this config.
pub fn create_engine(config: &ClassifierConfig) -> Result<Box<dyn ClassifierEngine>> {
    Ok(Box::new(yamnet::YamnetEngine::new(config)?))
}

/// Pick the single category to publish this tick, if any qualifies.
///
/// Categories scoring at or below `threshold` are dropped. The survivors are
/// sorted descending by score with a stable sort, so equal scores keep their
/// taxonomy order and the first element wins ties.
#[must_use]
pub fn select_category(mut categories: Vec<Category>, threshold: f32) -> Option<Category> {
    categories.retain(|c| c.score > threshold);
    categories.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    categories.into_iter().next()
}
