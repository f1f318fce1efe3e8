use std::collections::VecDeque;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use crossbeam_channel::{Receiver, bounded};

use crate::config::AudioConfig;
use crate::error::{EarshotError, Result};

/// Fixed capture format consumed by the pipeline: stereo, 48 kHz, 16-bit PCM.
pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u16 = 2;

/// Interleaved samples per `read` request: `2 × sample_rate`, one second of
/// stereo audio. Large enough that a filled read always covers a classifier
/// window after decimation.
pub const READ_BUFFER_SAMPLES: usize = 2 * SAMPLE_RATE as usize;

/// Interleaved samples held between the device callback and the reader: two
/// seconds of stereo audio at the native rate.
const BUFFERED_SAMPLES: usize = 2 * SAMPLE_RATE as usize * CHANNELS as usize;

/// Callback batches are at least ~1k samples on the backends we target, so
/// this many channel slots keeps two seconds of audio in flight.
const CHANNEL_CAPACITY: usize = BUFFERED_SAMPLES / 1024;

/// How long `read` waits on a stalled stream before giving up on the rest of
/// the buffer.
const STALL_TIMEOUT: Duration = Duration::from_millis(250);

/// Manages microphone capture via cpal.
///
/// The audio callback stays lock-free: it `try_send`s interleaved i16 batches
/// into a bounded channel and drops batches when the reader falls behind.
/// `read` drains that channel into a caller-supplied buffer.
pub struct CaptureSource {
    stream: Option<Stream>,
    receiver: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
}

impl CaptureSource {
    /// Open the configured input device at the fixed capture format and start
    /// the stream.
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let device = resolve_device(config.device.as_deref())?;

        let stream_config = StreamConfig {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE,
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = bounded::<Vec<i16>>(CHANNEL_CAPACITY);

        let err_fn = |err: cpal::StreamError| {
            tracing::error!("audio stream error: {err}");
        };

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                    // try_send to stay lock-free in the audio callback
                    let _ = tx.try_send(data.to_vec());
                },
                err_fn,
                None,
            )
            .map_err(|e| EarshotError::Audio(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| EarshotError::Audio(format!("failed to start audio stream: {e}")))?;

        Ok(Self {
            stream: Some(stream),
            receiver: rx,
            pending: VecDeque::new(),
        })
    }

    /// Fill `buf` with interleaved samples, blocking while the stream
    /// produces more. Returns the number of samples written — `buf.len()`
    /// unless the stream stalls for [`STALL_TIMEOUT`], in which case the
    /// partial count (possibly 0) is returned. A short read is not an error.
    pub fn read(&mut self, buf: &mut [i16]) -> usize {
        let mut filled = 0;

        while filled < buf.len() {
            while filled < buf.len() {
                match self.pending.pop_front() {
                    Some(sample) => {
                        buf[filled] = sample;
                        filled += 1;
                    }
                    None => break,
                }
            }

            if filled == buf.len() {
                break;
            }

            match self.receiver.recv_timeout(STALL_TIMEOUT) {
                Ok(batch) => self.pending.extend(batch),
                Err(_) => break,
            }
        }

        filled
    }

    /// Stop the stream and release the device. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("failed to pause audio stream on stop: {e}");
            }
        }
        self.pending.clear();
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn resolve_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if let Some(name) = name {
        host.input_devices()
            .map_err(|e| EarshotError::Audio(format!("failed to enumerate input devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name().to_string())
                    .as_deref()
                    == Some(name)
            })
            .ok_or_else(|| EarshotError::Audio(format!("input device not found: {name}")))
    } else {
        host.default_input_device()
            .ok_or_else(|| EarshotError::Audio("no default input device available".to_string()))
    }
}

/// Whether any capture device is available. The classification loop treats
/// this as its record-capability precondition and silently declines to start
/// without one.
#[must_use]
pub fn input_available(config: &AudioConfig) -> bool {
    resolve_device(config.device.as_deref()).is_ok()
}

/// Names of all input devices known to the default host.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| EarshotError::Audio(format!("failed to enumerate input devices: {e}")))?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(desc) = device.description() {
            names.push(desc.name().to_string());
        }
    }
    Ok(names)
}

#[must_use]
pub fn default_input_device_name() -> Option<String> {
    let host = cpal::default_host();
    let device = host.default_input_device()?;
    device.description().ok().map(|d| d.name().to_string())
}
