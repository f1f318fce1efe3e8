use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// A recognized ambient sound, ready for an alerting surface.
///
/// Immutable once constructed; ownership moves to the [`EventChannel`] on
/// publish.
#[derive(Debug, Clone)]
pub struct SoundEvent {
    /// Millisecond timestamp of `observed_at`; monotonic at the loop's
    /// bounded emission rate.
    pub id: i64,
    pub label: String,
    /// Coarse bearing hint in degrees, in [-90, 90]. Positive interaural lag
    /// (right channel leading) yields a negative angle.
    pub direction_degrees: f32,
    pub observed_at: DateTime<Utc>,
}

impl SoundEvent {
    #[must_use]
    pub fn new(label: String, direction_degrees: f32) -> Self {
        let observed_at = Utc::now();
        Self {
            id: observed_at.timestamp_millis(),
            label,
            direction_degrees,
            observed_at,
        }
    }
}

/// Single-producer, multi-consumer publish point for sound events.
///
/// Bounded with drop-oldest overflow: a slow subscriber loses the oldest
/// buffered events and only ever observes newer ones than it has already
/// consumed. Publication never blocks and never fails.
#[derive(Clone)]
pub struct EventChannel {
    tx: broadcast::Sender<SoundEvent>,
}

impl EventChannel {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SoundEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers. With no subscribers the
    /// event is dropped.
    pub fn publish(&self, event: SoundEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("sound event dropped: no subscribers");
        }
    }
}
