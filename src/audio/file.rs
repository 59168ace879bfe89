use crate::audio::source::{downsample, stereo_to_mono, AudioFrame, AudioSource, AudioSourceConfig};
use crate::error::{CaptionError, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// WAV-file-backed audio source.
///
/// Stands in for a live capture device during tests and offline runs. Frames
/// are delivered at the configured size, optionally paced to real time so
/// streaming backends see device-like timing.
pub struct WavFileSource {
    path: PathBuf,
    config: AudioSourceConfig,
    realtime: bool,
    task: Option<JoinHandle<()>>,
}

impl WavFileSource {
    pub fn new(path: impl AsRef<Path>, config: AudioSourceConfig, realtime: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
            realtime,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioSource for WavFileSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let reader = WavReader::open(&self.path).map_err(|e| CaptionError::AudioSource {
            message: format!("failed to open {}: {}", self.path.display(), e),
        })?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| CaptionError::AudioSource {
                message: format!("failed to read samples: {}", e),
            })?;

        info!(
            path = %self.path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            samples = samples.len(),
            "opened WAV source"
        );

        let normalized = normalize(
            AudioFrame {
                samples,
                sample_rate: spec.sample_rate,
                channels: spec.channels,
                timestamp_ms: 0,
            },
            &self.config,
        );

        let (tx, rx) = mpsc::channel(32);
        let frame_samples = self.config.frame_samples;
        let sample_rate = normalized.sample_rate;
        let realtime = self.realtime;

        let task = tokio::spawn(async move {
            let mut timestamp_ms = 0u64;
            let frame_ms = (frame_samples as u64 * 1000) / sample_rate as u64;

            for chunk in normalized.samples.chunks(frame_samples) {
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels: 1,
                    timestamp_ms,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
                timestamp_ms += frame_ms;
                if realtime {
                    tokio::time::sleep(std::time::Duration::from_millis(frame_ms)).await;
                }
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

fn normalize(frame: AudioFrame, config: &AudioSourceConfig) -> AudioFrame {
    let mut frame = frame;
    if frame.channels != config.target_channels && config.target_channels == 1 {
        frame = stereo_to_mono(frame);
    }
    if frame.sample_rate != config.target_sample_rate {
        frame = downsample(frame, config.target_sample_rate);
    }
    frame
}
