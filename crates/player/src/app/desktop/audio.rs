use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

/// Rate the console produces its mono sample blocks at.
pub(crate) const CONSOLE_SAMPLE_RATE: u32 = 44_100;
const MAX_BUFFERED_SECONDS: usize = 1;

type SampleQueue = Arc<Mutex<VecDeque<f32>>>;

/// cpal output stream fed from a mono queue. Every device channel plays the
/// same sample.
pub(crate) struct AudioSink {
    _stream: cpal::Stream,
    queue: SampleQueue,
    device_rate: u32,
}

impl AudioSink {
    /// Opens the default output device. Returns None when no usable device
    /// exists; the console then runs silent.
    pub(crate) fn open() -> Option<Self> {
        let host = cpal::default_host();
        let Some(device) = host.default_output_device() else {
            warn!("audio_device_missing");
            return None;
        };
        let config = match device.default_output_config() {
            Ok(config) => config,
            Err(error) => {
                warn!(error = %error, "audio_config_failed");
                return None;
            }
        };
        let device_rate = config.sample_rate().0;
        let channels = usize::from(config.channels().max(1));
        info!(
            device = device.name().unwrap_or_default().as_str(),
            sample_rate = device_rate,
            channels,
            "audio_device_opened"
        );

        let queue: SampleQueue = Arc::new(Mutex::new(VecDeque::with_capacity(
            device_rate as usize * MAX_BUFFERED_SECONDS,
        )));
        let playback = Arc::clone(&queue);
        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = playback.lock().unwrap_or_else(PoisonError::into_inner);
                for frame in data.chunks_mut(channels) {
                    let sample = queue.pop_front().unwrap_or(0.0);
                    frame.fill(sample);
                }
            },
            |error| error!(error = %error, "audio_stream_error"),
            None,
        );
        let stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                warn!(error = %error, "audio_stream_build_failed");
                return None;
            }
        };
        if let Err(error) = stream.play() {
            warn!(error = %error, "audio_stream_play_failed");
            return None;
        }

        Some(Self {
            _stream: stream,
            queue,
            device_rate,
        })
    }

    pub(crate) fn queue(&self, samples: &[i16]) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        resample_into(&mut queue, samples, CONSOLE_SAMPLE_RATE, self.device_rate);
        let limit = self.device_rate as usize * MAX_BUFFERED_SECONDS;
        let excess = queue.len().saturating_sub(limit);
        queue.drain(..excess);
    }
}

/// Linear interpolation from `source_rate` to `target_rate`, appended as
/// normalized floats.
fn resample_into(queue: &mut VecDeque<f32>, samples: &[i16], source_rate: u32, target_rate: u32) {
    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return;
    }

    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let output_len = (samples.len() as f64 * ratio).round() as usize;
    let last = samples.len() - 1;
    for index in 0..output_len {
        let position = index as f64 / ratio;
        let base = (position as usize).min(last);
        let next = (base + 1).min(last);
        let fraction = (position - base as f64) as f32;
        let current = f32::from(samples[base]) / 32768.0;
        let following = f32::from(samples[next]) / 32768.0;
        queue.push_back(current + (following - current) * fraction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_rates_copy_samples_through() {
        let mut queue = VecDeque::new();

        resample_into(&mut queue, &[16384, -16384], 44_100, 44_100);

        assert_eq!(queue, VecDeque::from(vec![0.5, -0.5]));
    }

    #[test]
    fn upsampling_interpolates_between_neighbours() {
        let mut queue = VecDeque::new();

        resample_into(&mut queue, &[0, 16384], 24_000, 48_000);

        assert_eq!(queue.len(), 4);
        assert_eq!(queue[0], 0.0);
        assert!((queue[1] - 0.25).abs() < 1e-6);
        assert!((queue[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_block_or_zero_rate_is_ignored() {
        let mut queue = VecDeque::new();

        resample_into(&mut queue, &[], 44_100, 48_000);
        resample_into(&mut queue, &[1, 2], 0, 48_000);

        assert!(queue.is_empty());
    }
}
