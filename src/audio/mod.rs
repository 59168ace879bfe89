pub mod file;
pub mod source;

pub use file::WavFileSource;
pub use source::{
    le_bytes_to_samples, samples_to_le_bytes, AudioFrame, AudioSource, AudioSourceConfig,
    ChannelSource,
};
