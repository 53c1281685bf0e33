/// External-library glue for glyphcast.
///
/// Owns the demuxer, the video/audio codecs, pixel-format conversion and
/// audio resampling. Produces `VideoFrame`s (RGB24) and `AudioFrame`s
/// (48 kHz stereo s16) on bounded queues that backpressure the demuxer.

pub mod decoder;
pub mod error;

pub use decoder::Decoder;
pub use error::MediaError;
