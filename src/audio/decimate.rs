/// Samples per classifier window: 0.975 s at 16 kHz.
pub const WINDOW_LEN: usize = 15_600;

/// Native rate over classifier rate: 48 kHz / 16 kHz.
pub const DECIMATION_FACTOR: usize = 3;

/// Native-rate samples consumed per window.
pub const SEGMENT_LEN: usize = WINDOW_LEN * DECIMATION_FACTOR;

/// Downsamples a stereo channel pair to one classifier window by
/// nearest-neighbor sample selection, mixing to mono at the same time. No
/// anti-alias filtering is applied.
///
/// When a tick carries fewer than [`WINDOW_LEN`] decimated samples the whole
/// tick is discarded; leftovers never carry over into the next tick.
pub struct Decimator {
    window: Vec<f32>,
}

impl Decimator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: vec![0.0; WINDOW_LEN],
        }
    }

    /// Produce one mono window from the most recent [`SEGMENT_LEN`] native
    /// samples, or `None` when the tick is too short.
    ///
    /// Also returns the native-rate offset the window was taken from, so the
    /// direction estimator can correlate the exact same span.
    pub fn process(&mut self, left: &[f32], right: &[f32]) -> Option<(&[f32], usize)> {
        let frames = left.len().min(right.len());
        let available = frames / DECIMATION_FACTOR;
        if available < WINDOW_LEN {
            return None;
        }

        let offset = frames - SEGMENT_LEN;
        for (i, out) in self.window.iter_mut().enumerate() {
            let src = offset + i * DECIMATION_FACTOR;
            *out = (left[src] + right[src]) / 2.0;
        }

        Some((&self.window, offset))
    }
}

impl Default for Decimator {
    fn default() -> Self {
        Self::new()
    }
}
