use crate::error::{CaptionError, Result};
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved).
    pub samples: Vec<i16>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Timestamp in milliseconds since capture started.
    pub timestamp_ms: u64,
}

/// Configuration for an audio source.
#[derive(Debug, Clone)]
pub struct AudioSourceConfig {
    /// Target sample rate (sources downsample if needed).
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono).
    pub target_channels: u16,
    /// Samples per delivered frame.
    pub frame_samples: usize,
}

impl Default for AudioSourceConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            target_channels: 1,
            frame_samples: 4096,
        }
    }
}

/// Audio capture boundary.
///
/// The capture device itself is an external collaborator; implementations
/// adapt whatever delivers PCM (a capture callback, a WAV file, a test
/// harness) into a channel of mono 16 kHz frames.
#[async_trait::async_trait]
pub trait AudioSource: Send {
    /// Start delivering audio frames.
    ///
    /// Fails fast with `PermissionDenied` when the device cannot be opened;
    /// no transcription backend is constructed in that case.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and release the device.
    async fn stop(&mut self) -> Result<()>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Source backed by an externally fed channel.
///
/// The integration point for real capture devices: the surrounding
/// application pushes frames into the sender half and hands this source to
/// the session controller.
pub struct ChannelSource {
    receiver: Option<mpsc::Receiver<AudioFrame>>,
}

impl ChannelSource {
    /// Create a source plus the sender the capture side feeds.
    pub fn new(buffer: usize) -> (mpsc::Sender<AudioFrame>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { receiver: Some(rx) })
    }
}

#[async_trait::async_trait]
impl AudioSource for ChannelSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        self.receiver.take().ok_or_else(|| CaptionError::AudioSource {
            message: "channel source already started".to_string(),
        })
    }

    async fn stop(&mut self) -> Result<()> {
        self.receiver = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Convert i16 samples to little-endian PCM bytes for the wire.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Convert little-endian PCM bytes back to i16 samples.
pub fn le_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Downsample by decimation. Upsampling is not supported; the frame is
/// returned unchanged when the target rate is not lower.
pub fn downsample(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate {
        return frame;
    }

    let ratio = frame.sample_rate / target_rate;
    if ratio <= 1 {
        return frame;
    }

    let downsampled: Vec<i16> = frame
        .samples
        .iter()
        .step_by(ratio as usize)
        .copied()
        .collect();

    AudioFrame {
        samples: downsampled,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Convert stereo to mono by summing channels, clamped to i16 range.
pub fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels != 2 {
        return frame;
    }

    let mut mono_samples = Vec::with_capacity(frame.samples.len() / 2);
    for chunk in frame.samples.chunks_exact(2) {
        let sum = chunk[0] as i32 + chunk[1] as i32;
        mono_samples.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_byte_roundtrip() {
        let samples: Vec<i16> = vec![100, -200, 300, i16::MIN, i16::MAX];
        let bytes = samples_to_le_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);
        assert_eq!(le_bytes_to_samples(&bytes), samples);
    }

    #[test]
    fn downsample_48k_to_16k() {
        let frame = AudioFrame {
            samples: (0..48).map(|i| i as i16).collect(),
            sample_rate: 48000,
            channels: 1,
            timestamp_ms: 0,
        };
        let out = downsample(frame, 16000);
        assert_eq!(out.sample_rate, 16000);
        assert_eq!(out.samples.len(), 16);
        assert_eq!(out.samples[0], 0);
        assert_eq!(out.samples[1], 3);
    }

    #[test]
    fn stereo_sum_clamps() {
        let frame = AudioFrame {
            samples: vec![i16::MAX, i16::MAX, -100, 100],
            sample_rate: 16000,
            channels: 2,
            timestamp_ms: 0,
        };
        let out = stereo_to_mono(frame);
        assert_eq!(out.channels, 1);
        assert_eq!(out.samples, vec![i16::MAX, 0]);
    }
}
