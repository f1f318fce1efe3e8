//! Ambient sound-event detection core for accessibility alerting.
//!
//! Earshot continuously captures a stereo microphone feed, classifies
//! ambient sound events with a pretrained YAMNet model, estimates a coarse
//! source bearing from interaural timing, and broadcasts rate-bounded
//! [`events::SoundEvent`]s to subscribers. The [`monitor::SoundMonitor`] is
//! the entry point; everything else is the pipeline underneath it.

pub mod alert;
pub mod audio;
pub mod classifier;
pub mod config;
pub mod direction;
pub mod error;
pub mod events;
pub mod models;
pub mod monitor;
