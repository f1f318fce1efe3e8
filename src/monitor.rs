use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::audio::capture::{self, CaptureSource, READ_BUFFER_SAMPLES};
use crate::audio::decimate::Decimator;
use crate::audio::split::split_channels;
use crate::classifier::{self, ClassifierEngine, select_category};
use crate::config::Config;
use crate::direction::estimate_bearing;
use crate::error::{EarshotError, Result};
use crate::events::{EventChannel, SoundEvent};

/// Holds the classifier engine between runs so stop/start cycles never
/// reload the model.
type EngineSlot = Arc<Mutex<Option<Box<dyn ClassifierEngine>>>>;

/// Drives the capture → split → decimate → classify → direction pipeline on
/// a dedicated background thread and publishes qualifying results.
///
/// `start` and `stop` never block and never fail from the caller's
/// perspective; problems surface in the logs and as a quiet event stream.
/// Callers invoking start/stop from multiple threads must serialize those
/// calls themselves.
pub struct SoundMonitor {
    config: Config,
    running: Arc<AtomicBool>,
    engine: EngineSlot,
    channel: EventChannel,
}

/// Clears the running flag when the loop thread exits, however it exits.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SoundMonitor {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let channel = EventChannel::new(config.events.capacity);
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            engine: Arc::new(Mutex::new(None)),
            channel,
        }
    }

    /// Subscribe to the sound-event broadcast.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SoundEvent> {
        self.channel.subscribe()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the classification loop. A no-op when already running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("classification loop already running");
            return;
        }

        let running = Arc::clone(&self.running);
        let engine_slot = Arc::clone(&self.engine);
        let events = self.channel.clone();
        let config = self.config.clone();

        let spawned = thread::Builder::new()
            .name("earshot-classify".to_string())
            .spawn(move || {
                let _guard = RunningGuard(Arc::clone(&running));
                if let Err(e) = run_loop(&config, &engine_slot, &events, &running) {
                    tracing::error!("classification loop terminated: {e}");
                }
                tracing::debug!("classification loop exited");
            });

        if let Err(e) = spawned {
            tracing::error!("failed to spawn classification thread: {e}");
            self.running.store(false, Ordering::SeqCst);
        }
    }

    /// Ask the loop to stop. Cooperative: the loop observes the flag within
    /// one iteration (read timeout plus the tick delay). A no-op when idle.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::debug!("classification loop stop requested");
        }
    }
}

fn run_loop(
    config: &Config,
    engine_slot: &EngineSlot,
    events: &EventChannel,
    running: &AtomicBool,
) -> Result<()> {
    // Record capability is a precondition, not an error: without a capture
    // device the start request is silently declined.
    if !capture::input_available(&config.audio) {
        tracing::warn!("no capture device available, not starting classification");
        return Ok(());
    }

    let mut engine = {
        let mut slot = engine_slot
            .lock()
            .map_err(|_| EarshotError::Other("classifier slot poisoned".to_string()))?;
        match slot.take() {
            Some(engine) => engine,
            None => classifier::create_engine(&config.classifier)?,
        }
    };

    let result = run_ticks(config, engine.as_mut(), events, running);

    // The engine outlives the run; the next start reuses it.
    if let Ok(mut slot) = engine_slot.lock() {
        *slot = Some(engine);
    }

    result
}

fn run_ticks(
    config: &Config,
    engine: &mut dyn ClassifierEngine,
    events: &EventChannel,
    running: &AtomicBool,
) -> Result<()> {
    let mut source = CaptureSource::open(&config.audio)?;
    let tick = Duration::from_millis(config.classifier.tick_interval_ms);
    let threshold = config.classifier.score_threshold;

    let mut raw = vec![0i16; READ_BUFFER_SAMPLES];
    let mut decimator = Decimator::new();

    tracing::info!(
        "classification loop running with {} engine, tick {}ms",
        engine.name(),
        config.classifier.tick_interval_ms
    );

    while running.load(Ordering::SeqCst) {
        let read = source.read(&mut raw);
        if read > 0 {
            if let Some(event) = process_tick(&raw[..read], &mut decimator, engine, threshold)? {
                events.publish(event);
            }
        }

        thread::sleep(tick);
    }

    source.stop();
    Ok(())
}

/// One tick of the pipeline: split, decimate, classify, and — only for a
/// qualifying classification — estimate the bearing from the same native-rate
/// span the window was decimated from. At most one event per tick.
fn process_tick(
    raw: &[i16],
    decimator: &mut Decimator,
    engine: &mut dyn ClassifierEngine,
    threshold: f32,
) -> Result<Option<SoundEvent>> {
    let (left, right) = split_channels(raw);

    let Some((window, offset)) = decimator.process(&left, &right) else {
        tracing::trace!("tick discarded: {} frames too short for a window", left.len());
        return Ok(None);
    };

    let categories = match engine.classify(window) {
        Ok(categories) => categories,
        Err(EarshotError::Classifier(e)) => {
            tracing::warn!("classification failed, skipping tick: {e}");
            return Ok(None);
        }
        // Anything outside the classifier taxonomy of failures stops the loop.
        Err(e) => return Err(e),
    };

    let Some(top) = select_category(categories, threshold) else {
        return Ok(None);
    };

    let direction = estimate_bearing(&left[offset..], &right[offset..]);
    tracing::debug!(
        "result: {} ({:.2}), direction {direction:.1}°",
        top.label,
        top.score
    );

    Ok(Some(SoundEvent::new(top.label, direction)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decimate::SEGMENT_LEN;
    use crate::classifier::Category;

    /// Scripted engine: returns a fixed result set and counts calls.
    struct ScriptedEngine {
        categories: Vec<Category>,
        calls: usize,
        fail_with: Option<fn() -> EarshotError>,
    }

    impl ScriptedEngine {
        fn returning(categories: Vec<Category>) -> Self {
            Self {
                categories,
                calls: 0,
                fail_with: None,
            }
        }
    }

    impl ClassifierEngine for ScriptedEngine {
        fn classify(&mut self, _window: &[f32]) -> Result<Vec<Category>> {
            self.calls += 1;
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(self.categories.clone())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn cat(label: &str, score: f32) -> Category {
        Category {
            label: label.to_string(),
            score,
        }
    }

    /// A full tick's worth of interleaved stereo at the native rate.
    fn raw_frame(value: i16) -> Vec<i16> {
        vec![value; SEGMENT_LEN * 2]
    }

    #[test]
    fn silence_publishes_nothing() {
        // An all-zero frame scores below threshold across the taxonomy.
        let mut engine =
            ScriptedEngine::returning(vec![cat("Silence", 0.1), cat("Speech", 0.05)]);
        let mut decimator = Decimator::new();

        let result = process_tick(&raw_frame(0), &mut decimator, &mut engine, 0.3)
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(result.is_none());
        assert_eq!(engine.calls, 1);
    }

    #[test]
    fn identical_channels_yield_zero_direction() {
        let mut engine = ScriptedEngine::returning(vec![cat("Knock", 0.8)]);
        let mut decimator = Decimator::new();

        // Channel-identical two-tone signal with incommensurate frequencies,
        // so the correlation peak at lag 0 is strict.
        let mut raw = Vec::with_capacity(SEGMENT_LEN * 2);
        for i in 0..SEGMENT_LEN {
            let x = i as f32;
            let s = (((x * 0.7127).sin() * 0.6 + (x * 1.9373).sin() * 0.4) * 8000.0) as i16;
            raw.push(s);
            raw.push(s);
        }

        let event = process_tick(&raw, &mut decimator, &mut engine, 0.3)
            .unwrap_or_else(|e| panic!("{e}"))
            .unwrap_or_else(|| panic!("expected an event"));

        assert_eq!(event.label, "Knock");
        assert!((event.direction_degrees - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn short_tick_never_reaches_the_classifier() {
        let mut engine = ScriptedEngine::returning(vec![cat("Knock", 0.9)]);
        let mut decimator = Decimator::new();

        let raw = vec![0i16; 1000];
        let result = process_tick(&raw, &mut decimator, &mut engine, 0.3)
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(result.is_none());
        assert_eq!(engine.calls, 0);
    }

    #[test]
    fn classifier_failure_skips_the_tick() {
        let mut engine = ScriptedEngine::returning(Vec::new());
        engine.fail_with = Some(|| EarshotError::Classifier("inference failed".to_string()));
        let mut decimator = Decimator::new();

        let result = process_tick(&raw_frame(100), &mut decimator, &mut engine, 0.3)
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(result.is_none());
    }

    #[test]
    fn unexpected_failure_stops_the_loop() {
        let mut engine = ScriptedEngine::returning(Vec::new());
        engine.fail_with = Some(|| EarshotError::Other("broken invariant".to_string()));
        let mut decimator = Decimator::new();

        let result = process_tick(&raw_frame(100), &mut decimator, &mut engine, 0.3);
        assert!(result.is_err());
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let monitor = SoundMonitor::new(Config::default());
        assert!(!monitor.is_running());
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[test]
    fn subscribers_outlive_restarts() {
        let monitor = SoundMonitor::new(Config::default());
        let mut rx = monitor.subscribe();
        monitor.stop();
        // Channel stays open across stop cycles; nothing was published.
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
